//! Affine warping.
//!
//! - [`warp`] - transform an image by a 3x3 matrix
//! - [`rotate`] - rotate about a centre point
//!
//! Matrices use the row-vector convention: a point `(x, y)` maps to
//! `[x y 1] * M`. Each destination pixel centre is pushed back through
//! `M⁻¹` together with its derivatives, and the source is filtered over
//! the footprint those derivatives describe.
//!
//! # Example
//!
//! ```
//! use ibalgo::imagebuf::WrapMode;
//! use ibalgo::imagebufalgo::{fill, warp, Matrix33};
//! use ibalgo_core::Roi3D;
//!
//! let grey = fill(&[0.5], Roi3D::new(0, 10, 0, 10, 0, 1, 0, 1));
//! let out = warp(&grey, &Matrix33::identity(), None, false, WrapMode::Black);
//! assert!((out.getchannel(5, 5, 0, 0, WrapMode::Black) - 0.5).abs() < 1e-4);
//! ```

use std::ops::Mul;

use ibalgo_core::{Error, Result, Roi3D};

use super::dual::Dual2;
use super::filter::{find_filterdesc, Filter2D};
use super::finish;
use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use crate::imagebuf::{ConstIter, ImageBuf, IterMut, Pixel, WrapMode};

/// Filter used when the caller supplies none.
const DEFAULT_FILTER: &str = "lanczos3";
const DEFAULT_FILTER_WIDTH: f32 = 6.0;

/// A 3x3 homogeneous 2D transform, `m[row][col]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix33(pub [[f32; 3]; 3]);

impl Default for Matrix33 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix33 {
    /// The identity transform.
    pub const fn identity() -> Self {
        Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Translation by `(tx, ty)`.
    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [tx, ty, 1.0]])
    }

    /// Scaling by `(sx, sy)` about the origin.
    pub const fn scaling(sx: f32, sy: f32) -> Self {
        Self([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Rotation by `angle` radians about the origin. With y pointing down
    /// a positive angle turns the image clockwise.
    pub fn rotation(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self([[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Rotation by `angle` radians about `(cx, cy)`.
    pub fn rotation_about(angle: f32, cx: f32, cy: f32) -> Self {
        Self::translation(-cx, -cy) * Self::rotation(angle) * Self::translation(cx, cy)
    }

    fn determinant(&self) -> f32 {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// The inverse transform, or `None` if the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let m = &self.0;
        let inv = 1.0 / det;
        let mut r = [[0.0f32; 3]; 3];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                // Cofactor of m[j][i], read cyclically.
                let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
                let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
                *v = (m[j1][i1] * m[j2][i2] - m[j1][i2] * m[j2][i1]) * inv;
            }
        }
        Some(Self(r))
    }

    /// Maps `(x, y)`, returning `None` when the homogeneous coordinate is 0.
    pub fn transform_point(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let m = &self.0;
        let w = x * m[0][2] + y * m[1][2] + m[2][2];
        if w == 0.0 {
            return None;
        }
        Some((
            (x * m[0][0] + y * m[1][0] + m[2][0]) / w,
            (x * m[0][1] + y * m[1][1] + m[2][1]) / w,
        ))
    }

    /// Maps a point carrying derivatives, or `None` when the homogeneous
    /// coordinate is 0.
    fn transform_dual(&self, x: Dual2, y: Dual2) -> Option<(Dual2, Dual2)> {
        let m = &self.0;
        let w = x * m[0][2] + y * m[1][2] + m[2][2];
        if w.val == 0.0 {
            return None;
        }
        let a = x * m[0][0] + y * m[1][0] + m[2][0];
        let b = x * m[0][1] + y * m[1][1] + m[2][1];
        Some((a / w, b / w))
    }
}

impl Mul for Matrix33 {
    type Output = Self;

    /// `self` applied first, then `rhs`.
    fn mul(self, rhs: Self) -> Self {
        let (a, b) = (&self.0, &rhs.0);
        let mut r = [[0.0f32; 3]; 3];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Self(r)
    }
}

/// Bounding box of the pixel centres of `roi` after mapping through `m`.
fn transform_roi(m: &Matrix33, roi: &Roi3D) -> Roi3D {
    let corners = [
        (roi.xbegin as f32 + 0.5, roi.ybegin as f32 + 0.5),
        (roi.xend as f32 - 0.5, roi.ybegin as f32 + 0.5),
        (roi.xbegin as f32 + 0.5, roi.yend as f32 - 0.5),
        (roi.xend as f32 - 0.5, roi.yend as f32 - 0.5),
    ];
    let (mut xmin, mut ymin) = (f32::INFINITY, f32::INFINITY);
    let (mut xmax, mut ymax) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for (x, y) in corners {
        let (x, y) = m.transform_point(x, y).unwrap_or((0.0, 0.0));
        xmin = xmin.min(x);
        ymin = ymin.min(y);
        xmax = xmax.max(x);
        ymax = ymax.max(y);
    }
    Roi3D::new(
        xmin.floor() as i32,
        xmax.floor() as i32 + 1,
        ymin.floor() as i32,
        ymax.floor() as i32 + 1,
        roi.zbegin,
        roi.zend,
        roi.chbegin,
        roi.chend,
    )
}

/// Warps `src` by `m` into a new image.
///
/// The result covers `src`'s pixel window, or the transformed window
/// when `recompute_roi` is set.
pub fn warp(
    src: &ImageBuf,
    m: &Matrix33,
    filter: Option<&Filter2D>,
    recompute_roi: bool,
    wrap: WrapMode,
) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    warp_into(&mut dst, src, m, filter, recompute_roi, wrap, None, 0);
    dst
}

/// Warps `src` into `dst`, where `m` maps source positions to destination
/// positions.
///
/// # Arguments
///
/// * `dst` - Destination image
/// * `src` - Source image
/// * `m` - Source-to-destination transform
/// * `filter` - Reconstruction filter (`lanczos3`, width 6, when `None`)
/// * `recompute_roi` - For an uninitialized `dst`, size it to the
///   transformed pixel window of `src` instead of copying it
/// * `wrap` - How source lookups outside the pixel window are resolved
/// * `roi` - Destination region to compute
/// * `nthreads` - Worker count, 0 for the default
#[allow(clippy::too_many_arguments)]
pub fn warp_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    m: &Matrix33,
    filter: Option<&Filter2D>,
    recompute_roi: bool,
    wrap: WrapMode,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = warp_impl(dst, src, m, filter, recompute_roi, wrap, roi, nthreads);
    finish(dst, "warp", result)
}

/// Warps with a filter from the registry.
///
/// An empty name means `lanczos3`; a positive `filterwidth` replaces the
/// registry width on both axes.
#[allow(clippy::too_many_arguments)]
pub fn warp_by_name_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    m: &Matrix33,
    filtername: &str,
    filterwidth: f32,
    recompute_roi: bool,
    wrap: WrapMode,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = named_filter(filtername, filterwidth)
        .and_then(|f| warp_impl(dst, src, m, Some(&f), recompute_roi, wrap, roi, nthreads));
    finish(dst, "warp", result)
}

fn named_filter(filtername: &str, filterwidth: f32) -> Result<Filter2D> {
    let name = if filtername.is_empty() { DEFAULT_FILTER } else { filtername };
    let desc = find_filterdesc(name).ok_or_else(|| Error::UnknownFilter(name.to_string()))?;
    let w = if filterwidth > 0.0 { filterwidth } else { desc.width };
    Filter2D::create(name, w, w).ok_or_else(|| Error::UnknownFilter(name.to_string()))
}

#[allow(clippy::too_many_arguments)]
fn warp_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    m: &Matrix33,
    filter: Option<&Filter2D>,
    recompute_roi: bool,
    wrap: WrapMode,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    if !src.initialized() {
        return Err(Error::UninitializedInput);
    }
    let roi = roi.filter(Roi3D::defined);
    let mut dst_roi = if dst.initialized() {
        roi.unwrap_or_else(|| dst.roi())
    } else if let Some(roi) = roi {
        roi
    } else if recompute_roi {
        transform_roi(m, &src.roi())
    } else {
        src.roi()
    };
    dst_roi.chend = dst_roi.chend.min(src.nchannels() as i32);
    prep(&mut dst_roi, dst, Some(src), None, None, PrepFlags::NO_SUPPORT_VOLUME)?;

    let minv = m.inverse().ok_or(Error::SingularMatrix)?;
    let fallback;
    let filter = match filter {
        Some(f) => f,
        None => {
            fallback = Filter2D::create(DEFAULT_FILTER, DEFAULT_FILTER_WIDTH, DEFAULT_FILTER_WIDTH)
                .ok_or_else(|| Error::UnknownFilter(DEFAULT_FILTER.into()))?;
            &fallback
        }
    };
    tracing::debug!(roi = %dst_roi, filter = filter.name(), width = filter.width(), ?wrap, "warp");
    let formats = (dst.format(), src.format());
    parallel_image(dst, dst_roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], warp_pixels, (tile, src, &minv, filter, wrap, r))
    })
}

fn warp_pixels<D: Pixel, S: Pixel>(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    minv: &Matrix33,
    filter: &Filter2D,
    wrap: WrapMode,
    roi: Roi3D,
) -> Result<()> {
    let mut pel = vec![0.0f32; src.nchannels() as usize];
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        let x = Dual2::new(d.x() as f32 + 0.5, 1.0, 0.0);
        let y = Dual2::new(d.y() as f32 + 0.5, 0.0, 1.0);
        match minv.transform_dual(x, y) {
            Some((s, t)) => filtered_sample::<S>(src, s, t, filter, wrap, &mut pel),
            None => pel.fill(0.0),
        }
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            d.set(c, pel[c]);
        }
        d.advance();
    }
    Ok(())
}

/// Filters `src` around `(s.val, t.val)` with a footprint stretched by the
/// derivatives (isotropically, at least one pixel).
fn filtered_sample<S: Pixel>(
    src: &ImageBuf,
    s: Dual2,
    t: Dual2,
    filter: &Filter2D,
    wrap: WrapMode,
    result: &mut [f32],
) {
    let ds = s.dx.abs().max(s.dy.abs()).max(1.0);
    let dt = t.dx.abs().max(t.dy.abs()).max(1.0);
    let (ds_inv, dt_inv) = (1.0 / ds, 1.0 / dt);
    let rad_s = 0.5 * ds * filter.width();
    let rad_t = 0.5 * dt * filter.width();
    let range = Roi3D::new(
        (s.val - rad_s).floor() as i32,
        (s.val + rad_s).ceil() as i32,
        (t.val - rad_t).floor() as i32,
        (t.val + rad_t).ceil() as i32,
        0,
        1,
        0,
        result.len() as i32,
    );
    result.fill(0.0);
    let mut total = 0.0f32;
    let mut samp = ConstIter::<S>::new(src, range, wrap);
    while !samp.done() {
        let w = filter.eval(
            ds_inv * (samp.x() as f32 + 0.5 - s.val),
            dt_inv * (samp.y() as f32 + 0.5 - t.val),
        );
        if w != 0.0 {
            for (c, r) in result.iter_mut().enumerate() {
                *r += w * samp.get(c);
            }
            total += w;
        }
        samp.advance();
    }
    if total != 0.0 {
        result.iter_mut().for_each(|r| *r /= total);
    } else {
        result.fill(0.0);
    }
}

/// Rotates `src` by `angle` radians about the centre of its display window
/// into a new image.
pub fn rotate(src: &ImageBuf, angle: f32, filter: Option<&Filter2D>, recompute_roi: bool) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    rotate_into(&mut dst, src, angle, None, filter, recompute_roi, None, 0);
    dst
}

fn display_centre(src: &ImageBuf) -> (f32, f32) {
    let full = src.roi_full();
    (
        0.5 * (full.xbegin + full.xend) as f32,
        0.5 * (full.ybegin + full.yend) as f32,
    )
}

/// Rotates `src` by `angle` radians about `center` (the middle of the
/// display window when `None`). Lookups outside the source are black.
#[allow(clippy::too_many_arguments)]
pub fn rotate_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    angle: f32,
    center: Option<(f32, f32)>,
    filter: Option<&Filter2D>,
    recompute_roi: bool,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let (cx, cy) = center.unwrap_or_else(|| display_centre(src));
    let m = Matrix33::rotation_about(angle, cx, cy);
    warp_into(dst, src, &m, filter, recompute_roi, WrapMode::Black, roi, nthreads)
}

/// [`rotate_into`] with a filter from the registry.
#[allow(clippy::too_many_arguments)]
pub fn rotate_by_name_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    angle: f32,
    center: Option<(f32, f32)>,
    filtername: &str,
    filterwidth: f32,
    recompute_roi: bool,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let (cx, cy) = center.unwrap_or_else(|| display_centre(src));
    let m = Matrix33::rotation_about(angle, cx, cy);
    warp_by_name_into(
        dst,
        src,
        &m,
        filtername,
        filterwidth,
        recompute_roi,
        WrapMode::Black,
        roi,
        nthreads,
    )
}
