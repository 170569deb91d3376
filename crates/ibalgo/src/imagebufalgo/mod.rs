//! OIIO-compatible ImageBufAlgo implementation.
//!
//! Every algorithm follows the same protocol:
//!
//! 1. [`prep`](prep::prep) validates the sources and makes the destination
//!    ready, allocating it from the sources when it is uninitialized.
//! 2. The pixel loop is instantiated for the concrete pixel types of the
//!    destination and sources (`u8`, `u16`, `u32`, `f16`, `f32`).
//! 3. [`parallel_image`](parallel::parallel_image) splits the region into
//!    disjoint tiles and runs them on the rayon pool.
//!
//! The `*_into` functions write into a caller-supplied destination and
//! return `false` on failure, leaving the message in the destination
//! (see [`ImageBuf::geterror`]). The shorter forms return a new image.
//! `roi: None` means "everything", `nthreads: 0` means "use the
//! configured default" (see [`crate::config`]).
//!
//! # Modules
//!
//! - [`patterns`] - fill, zero, checker
//! - [`arithmetic`] - add, sub, mul_scalar, over
//! - [`geometry`] - paste, transpose
//! - [`resize`] - filtered resize and point/bilinear resample
//! - [`warp`] - affine warp and rotate
//! - [`convolve`] - convolution, kernels, unsharp mask
//! - [`fft`] - unitary 2D FFT and polar conversions
//! - [`fillholes`] - push-pull hole filling
//! - [`text`] - text rendering
//!
//! # Example
//!
//! ```
//! use ibalgo::imagebufalgo::{checker, resize_by_name};
//! use ibalgo_core::Roi3D;
//!
//! let roi = Roi3D::new(0, 64, 0, 64, 0, 1, 0, 3);
//! let board = checker((8, 8, 1), &[0.0; 3], &[1.0; 3], (0, 0, 0), roi);
//! let small = resize_by_name(&board, "triangle", 0.0, 16, 16);
//! assert_eq!(small.width(), 16);
//! ```

/// Calls `$f::<T1, .., Tn>(args)` with one pixel type per format
/// expression, covering every combination.
macro_rules! dispatch_types {
    (@go [], $f:ident, [$($t:ty),*], ($($arg:expr),* $(,)?)) => {
        $f::<$($t),*>($($arg),*)
    };
    (@go [$fmt:expr $(, $rest:expr)*], $f:ident, [$($t:ty),*], $args:tt) => {
        match $fmt {
            ::ibalgo_core::DataFormat::U8 => dispatch_types!(@go [$($rest),*], $f, [$($t,)* u8], $args),
            ::ibalgo_core::DataFormat::U16 => dispatch_types!(@go [$($rest),*], $f, [$($t,)* u16], $args),
            ::ibalgo_core::DataFormat::U32 => dispatch_types!(@go [$($rest),*], $f, [$($t,)* u32], $args),
            ::ibalgo_core::DataFormat::F16 => dispatch_types!(@go [$($rest),*], $f, [$($t,)* ::half::f16], $args),
            ::ibalgo_core::DataFormat::F32 => dispatch_types!(@go [$($rest),*], $f, [$($t,)* f32], $args),
        }
    };
    ([$($fmt:expr),+], $f:ident, $args:tt) => {
        dispatch_types!(@go [$($fmt),+], $f, [], $args)
    };
}

pub mod dual;
pub mod filter;
pub mod parallel;
pub mod prep;

pub mod arithmetic;
pub mod convolve;
pub mod fft;
pub mod fillholes;
pub mod geometry;
pub mod patterns;
pub mod resize;
pub mod text;
pub mod warp;

pub use arithmetic::{add, add_into, mul_scalar, mul_scalar_into, over, over_into, sub, sub_into};
pub use convolve::{
    convolve, convolve_into, make_kernel, make_kernel_into, unsharp_mask, unsharp_mask_into,
};
pub use dual::Dual2;
pub use fft::{
    complex_to_polar, complex_to_polar_into, fft, fft_into, ifft, ifft_into, polar_to_complex,
    polar_to_complex_into,
};
pub use fillholes::{fillholes_pushpull, fillholes_pushpull_into};
pub use filter::{Filter2D, FilterDesc, get_filterdesc, num_filters};
pub use geometry::{paste, transpose, transpose_into};
pub use parallel::{parallel_image, SplitAxis};
pub use patterns::{checker, checker_into, fill, fill_into, zero, zero_into};
pub use prep::{prep, PrepFlags};
pub use resize::{
    resample, resample_into, resize, resize_by_name, resize_by_name_into, resize_into,
};
pub use text::{render_text, TextOptions};
pub use warp::{
    rotate, rotate_by_name_into, rotate_into, warp, warp_by_name_into, warp_into, Matrix33,
};

use ibalgo_core::Result;

use crate::imagebuf::ImageBuf;

/// Turns an algorithm result into the boolean protocol: on error the
/// message goes to `dst` and a warning is logged.
pub(crate) fn finish(dst: &mut ImageBuf, op: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(op, error = %e, "image operation failed");
            dst.error(e);
            false
        }
    }
}
