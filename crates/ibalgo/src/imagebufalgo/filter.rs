//! Named 2D reconstruction filters.
//!
//! The registry lists every filter [`Filter2D::create`] understands, with
//! its default width. A filter evaluates to a weight at an offset from the
//! sample centre, in pixels; its support is `width x height` pixels.
//!
//! | Name              | Width | Separable |
//! |-------------------|-------|-----------|
//! | `box`             | 1     | yes       |
//! | `triangle`        | 2     | yes       |
//! | `gaussian`        | 3     | yes       |
//! | `catrom`          | 4     | yes       |
//! | `blackman-harris` | 3     | yes       |
//! | `sinc`            | 4     | yes       |
//! | `lanczos3`        | 6     | yes       |
//! | `radial-lanczos3` | 6     | no        |
//! | `mitchell`        | 4     | yes       |
//! | `bspline`         | 4     | yes       |
//! | `disk`            | 1     | no        |
//! | `cubic`           | 4     | yes       |
//! | `keys`            | 4     | yes       |
//! | `simon`           | 4     | yes       |
//! | `rifman`          | 4     | yes       |
//!
//! # Example
//!
//! ```
//! use ibalgo::imagebufalgo::filter::Filter2D;
//!
//! let f = Filter2D::create("lanczos3", 6.0, 6.0).unwrap();
//! assert!(f.separable());
//! assert!((f.eval(0.0, 0.0) - 1.0).abs() < 1e-6);
//! assert!(Filter2D::create("no-such-filter", 1.0, 1.0).is_none());
//! ```

use std::f32::consts::PI;

/// Registry entry describing a filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDesc {
    /// Registry name.
    pub name: &'static str,
    /// Dimensionality (always 2 here).
    pub dim: u32,
    /// Recommended width in pixels.
    pub width: f32,
    /// True if the width cannot be changed.
    pub fixedwidth: bool,
    /// True if the filter may be stretched to a larger width.
    pub scalable: bool,
    /// True if `f(x, y) == fx(x) * fy(y)`.
    pub separable: bool,
}

const fn desc(name: &'static str, width: f32, separable: bool) -> FilterDesc {
    FilterDesc {
        name,
        dim: 2,
        width,
        fixedwidth: false,
        scalable: true,
        separable,
    }
}

static FILTERS: [FilterDesc; 15] = [
    desc("box", 1.0, true),
    desc("triangle", 2.0, true),
    desc("gaussian", 3.0, true),
    desc("catrom", 4.0, true),
    desc("blackman-harris", 3.0, true),
    desc("sinc", 4.0, true),
    desc("lanczos3", 6.0, true),
    desc("radial-lanczos3", 6.0, false),
    desc("mitchell", 4.0, true),
    desc("bspline", 4.0, true),
    desc("disk", 1.0, false),
    desc("cubic", 4.0, true),
    desc("keys", 4.0, true),
    desc("simon", 4.0, true),
    desc("rifman", 4.0, true),
];

/// Number of registered filters.
pub fn num_filters() -> usize {
    FILTERS.len()
}

/// Description of filter `i`, `None` past the end of the registry.
pub fn get_filterdesc(i: usize) -> Option<&'static FilterDesc> {
    FILTERS.get(i)
}

/// Looks up a filter description by name.
pub fn find_filterdesc(name: &str) -> Option<&'static FilterDesc> {
    let name = if name == "catmull-rom" { "catrom" } else { name };
    FILTERS.iter().find(|d| d.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Box,
    Triangle,
    Gaussian,
    CatmullRom,
    BlackmanHarris,
    Sinc,
    Lanczos3,
    RadialLanczos3,
    Mitchell,
    BSpline,
    Disk,
    Cubic(f32),
}

/// A filter instance with a concrete width and height.
///
/// Instances are plain values; dropping one releases it.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter2D {
    name: &'static str,
    kind: Kind,
    width: f32,
    height: f32,
}

impl Filter2D {
    /// Creates the named filter with the given support, or `None` if the
    /// name is not registered.
    pub fn create(name: &str, width: f32, height: f32) -> Option<Self> {
        let desc = find_filterdesc(name)?;
        let kind = match desc.name {
            "box" => Kind::Box,
            "triangle" => Kind::Triangle,
            "gaussian" => Kind::Gaussian,
            "catrom" => Kind::CatmullRom,
            "blackman-harris" => Kind::BlackmanHarris,
            "sinc" => Kind::Sinc,
            "lanczos3" => Kind::Lanczos3,
            "radial-lanczos3" => Kind::RadialLanczos3,
            "mitchell" => Kind::Mitchell,
            "bspline" => Kind::BSpline,
            "disk" => Kind::Disk,
            "cubic" => Kind::Cubic(0.0),
            "keys" => Kind::Cubic(-0.5),
            "simon" => Kind::Cubic(-0.75),
            "rifman" => Kind::Cubic(-1.0),
            _ => return None,
        };
        Some(Self {
            name: desc.name,
            kind,
            width,
            height,
        })
    }

    /// Registry name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Support width in pixels.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Support height in pixels.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// True if [`Filter2D::xfilt`] and [`Filter2D::yfilt`] can be used in
    /// place of [`Filter2D::eval`].
    pub fn separable(&self) -> bool {
        !matches!(self.kind, Kind::RadialLanczos3 | Kind::Disk)
    }

    /// Horizontal factor of a separable filter.
    #[inline]
    pub fn xfilt(&self, x: f32) -> f32 {
        eval1d(self.kind, x, self.width)
    }

    /// Vertical factor of a separable filter.
    #[inline]
    pub fn yfilt(&self, y: f32) -> f32 {
        eval1d(self.kind, y, self.height)
    }

    /// Weight at offset `(x, y)`.
    pub fn eval(&self, x: f32, y: f32) -> f32 {
        match self.kind {
            Kind::RadialLanczos3 => {
                let x = x * 6.0 / self.width;
                let y = y * 6.0 / self.height;
                lanczos3(x.hypot(y))
            }
            Kind::Disk => {
                let x = x * 2.0 / self.width;
                let y = y * 2.0 / self.height;
                if x * x + y * y < 1.0 { 1.0 } else { 0.0 }
            }
            _ => self.xfilt(x) * self.yfilt(y),
        }
    }
}

fn eval1d(kind: Kind, x: f32, width: f32) -> f32 {
    match kind {
        Kind::Box => {
            if x.abs() <= width * 0.5 { 1.0 } else { 0.0 }
        }
        Kind::Triangle => triangle(x * 2.0 / width),
        Kind::Gaussian => {
            let x = x.abs() * 2.0 / width;
            if x < 1.0 { (-2.0 * x * x).exp() } else { 0.0 }
        }
        Kind::CatmullRom => catrom(x * 4.0 / width),
        Kind::BlackmanHarris => blackman_harris(x * 2.0 / width),
        Kind::Sinc => {
            if x.abs() > width * 0.5 { 0.0 } else { sinc(x) }
        }
        Kind::Lanczos3 | Kind::RadialLanczos3 => lanczos3(x * 6.0 / width),
        Kind::Mitchell => mitchell(x * 2.0 / width),
        Kind::BSpline => bspline(x * 4.0 / width),
        Kind::Disk => {
            if (x * 2.0 / width).abs() < 1.0 { 1.0 } else { 0.0 }
        }
        Kind::Cubic(a) => cubic(x * 4.0 / width, a),
    }
}

#[inline]
fn triangle(x: f32) -> f32 {
    let x = x.abs();
    if x < 1.0 { 1.0 - x } else { 0.0 }
}

fn catrom(x: f32) -> f32 {
    let x = x.abs();
    let x2 = x * x;
    let x3 = x * x2;
    if x >= 2.0 {
        0.0
    } else if x < 1.0 {
        (3.0 * x3 - 5.0 * x2 + 2.0) * 0.5
    } else {
        (-x3 + 5.0 * x2 - 8.0 * x + 4.0) * 0.5
    }
}

fn blackman_harris(x: f32) -> f32 {
    if !(-1.0..=1.0).contains(&x) {
        return 0.0;
    }
    // Shift [-1, 1] onto one period of the window.
    let u = (x + 1.0) * 0.5;
    0.35875 - 0.48829 * (2.0 * PI * u).cos() + 0.14128 * (4.0 * PI * u).cos()
        - 0.01168 * (6.0 * PI * u).cos()
}

#[inline]
fn sinc(x: f32) -> f32 {
    let x = x.abs();
    if x < 1e-4 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn lanczos3(x: f32) -> f32 {
    const A: f32 = 3.0;
    let x = x.abs();
    if x > A {
        return 0.0;
    }
    if x < 1e-4 {
        return 1.0;
    }
    let pix = PI * x;
    A * pix.sin() * (pix / A).sin() / (pix * pix)
}

fn mitchell(x: f32) -> f32 {
    // Mitchell-Netravali with B=1/3, C=1/3
    const B: f32 = 1.0 / 3.0;
    const C: f32 = 1.0 / 3.0;
    let x = x.abs();
    if x > 1.0 {
        return 0.0;
    }
    let x = x * 2.0;
    let x2 = x * x;
    let x3 = x2 * x;
    if x >= 1.0 {
        ((-B - 6.0 * C) * x3 + (6.0 * B + 30.0 * C) * x2 + (-12.0 * B - 48.0 * C) * x
            + (8.0 * B + 24.0 * C))
            / 6.0
    } else {
        ((12.0 - 9.0 * B - 6.0 * C) * x3 + (-18.0 + 12.0 * B + 6.0 * C) * x2 + (6.0 - 2.0 * B))
            / 6.0
    }
}

fn bspline(x: f32) -> f32 {
    let x = x.abs();
    if x <= 1.0 {
        x * x * (0.5 * x - 1.0) + 2.0 / 3.0
    } else if x < 2.0 {
        let t = 2.0 - x;
        t * t * t / 6.0
    } else {
        0.0
    }
}

fn cubic(x: f32, a: f32) -> f32 {
    let x = x.abs();
    if x >= 2.0 {
        0.0
    } else if x > 1.0 {
        ((a * x - 5.0 * a) * x + 8.0 * a) * x - 4.0 * a
    } else {
        ((a + 2.0) * x - (a + 3.0)) * x * x + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn registry_contents() {
        assert_eq!(num_filters(), 15);
        let names: Vec<_> = (0..num_filters())
            .filter_map(get_filterdesc)
            .map(|d| d.name)
            .collect();
        assert!(names.contains(&"blackman-harris"));
        assert!(get_filterdesc(num_filters()).is_none());
        assert_eq!(find_filterdesc("catmull-rom").map(|d| d.width), Some(4.0));
        assert!(!find_filterdesc("disk").unwrap().separable);
    }

    #[test]
    fn every_filter_peaks_at_origin() {
        for desc in FILTERS.iter() {
            let f = Filter2D::create(desc.name, desc.width, desc.width).unwrap();
            assert_eq!(f.separable(), desc.separable, "{}", desc.name);
            assert!(f.eval(0.0, 0.0) > 0.0, "{}", desc.name);
            assert_eq!(f.eval(desc.width, desc.width), 0.0, "{}", desc.name);
        }
    }

    #[test]
    fn filter_shapes() {
        let tri = Filter2D::create("triangle", 2.0, 2.0).unwrap();
        assert_abs_diff_eq!(tri.xfilt(0.5), 0.5);
        assert_abs_diff_eq!(tri.eval(0.5, 0.5), 0.25);

        let lz = Filter2D::create("lanczos3", 6.0, 6.0).unwrap();
        assert_abs_diff_eq!(lz.xfilt(1.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(lz.xfilt(2.0), 0.0, epsilon = 1e-6);

        let cr = Filter2D::create("catrom", 4.0, 4.0).unwrap();
        assert_abs_diff_eq!(cr.xfilt(0.0), 1.0);
        assert_abs_diff_eq!(cr.xfilt(1.0), 0.0);

        let bh = Filter2D::create("blackman-harris", 3.0, 3.0).unwrap();
        assert_abs_diff_eq!(bh.xfilt(0.0), 1.0, epsilon = 1e-4);

        let keys = Filter2D::create("keys", 4.0, 4.0).unwrap();
        assert_abs_diff_eq!(keys.xfilt(0.0), 1.0);
        assert_abs_diff_eq!(keys.xfilt(1.0), 0.0);
    }

    #[test]
    fn stretched_filter_widens_support() {
        let narrow = Filter2D::create("triangle", 2.0, 2.0).unwrap();
        let wide = Filter2D::create("triangle", 4.0, 2.0).unwrap();
        assert_eq!(narrow.xfilt(1.5), 0.0);
        assert_abs_diff_eq!(wide.xfilt(1.5), 0.25);
        assert_eq!(wide.yfilt(1.5), 0.0);
    }

    #[test]
    fn disk_is_round() {
        let disk = Filter2D::create("disk", 4.0, 4.0).unwrap();
        assert_eq!(disk.eval(1.9, 0.0), 1.0);
        assert_eq!(disk.eval(1.5, 1.5), 0.0);
    }
}
