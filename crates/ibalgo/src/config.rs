//! Process-wide settings.
//!
//! Read and written by name, like the global `attribute` call of
//! OpenImageIO:
//!
//! | name                    | default | meaning                                          |
//! |-------------------------|---------|--------------------------------------------------|
//! | `threads`               | 0       | workers used for `nthreads == 0`; 0 = rayon pool |
//! | `parallel_min_pixels`   | 1000    | smaller regions run serially                     |
//!
//! ```
//! use ibalgo::config;
//!
//! assert!(config::attribute("parallel_min_pixels", 4096));
//! assert_eq!(config::get_int_attribute("parallel_min_pixels"), Some(4096));
//! assert!(!config::attribute("no_such_setting", 1));
//! # config::attribute("parallel_min_pixels", 1000);
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default serial/parallel threshold, in pixels.
pub const DEFAULT_PARALLEL_MIN_PIXELS: u64 = 1000;

static THREADS: AtomicUsize = AtomicUsize::new(0);
static PARALLEL_MIN_PIXELS: AtomicU64 = AtomicU64::new(DEFAULT_PARALLEL_MIN_PIXELS);

/// Sets a global attribute. Negative values are stored as 0.
///
/// Returns false for unknown names.
pub fn attribute(name: &str, value: i64) -> bool {
    let value = value.max(0);
    match name {
        "threads" => THREADS.store(value as usize, Ordering::Relaxed),
        "parallel_min_pixels" => PARALLEL_MIN_PIXELS.store(value as u64, Ordering::Relaxed),
        _ => return false,
    }
    true
}

/// Reads a global attribute, `None` for unknown names.
pub fn get_int_attribute(name: &str) -> Option<i64> {
    match name {
        "threads" => Some(threads() as i64),
        "parallel_min_pixels" => Some(parallel_min_pixels() as i64),
        _ => None,
    }
}

/// The `threads` setting.
#[inline]
pub fn threads() -> usize {
    THREADS.load(Ordering::Relaxed)
}

/// The `parallel_min_pixels` setting.
#[inline]
pub fn parallel_min_pixels() -> u64 {
    PARALLEL_MIN_PIXELS.load(Ordering::Relaxed)
}

/// Turns a caller's `nthreads` into an actual worker count.
///
/// 0 falls back to the `threads` setting, then to the rayon pool size.
pub fn resolve_nthreads(nthreads: usize) -> usize {
    if nthreads > 0 {
        return nthreads;
    }
    match threads() {
        0 => rayon::current_num_threads().max(1),
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_attribute() {
        assert!(!attribute("bogus", 3));
        assert_eq!(get_int_attribute("bogus"), None);
    }

    #[test]
    fn explicit_nthreads_wins() {
        assert_eq!(resolve_nthreads(3), 3);
        assert!(resolve_nthreads(0) >= 1);
    }
}
