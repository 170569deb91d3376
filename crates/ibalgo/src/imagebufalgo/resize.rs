//! Resizing between display windows.
//!
//! Both [`resize`] and [`resample`] map the source's display window onto
//! the destination's display window:
//!
//! ```text
//! s      = (x - dst.full_x + 0.5) / dst.full_width
//! src_xf = src.full_x + s * src.full_width
//! ```
//!
//! and likewise for y. `resize` integrates a reconstruction filter around
//! `src_xf`, stretched by the scale ratio when downsizing so that every
//! source pixel contributes. `resample` point-samples or bilinearly
//! interpolates instead.
//!
//! # Example
//!
//! ```
//! use ibalgo::imagebufalgo::{fill, resize_by_name};
//! use ibalgo::imagebuf::WrapMode;
//! use ibalgo_core::Roi3D;
//!
//! let grey = fill(&[0.5], Roi3D::new(0, 32, 0, 32, 0, 1, 0, 1));
//! let small = resize_by_name(&grey, "", 0.0, 8, 8);
//! assert!((small.getchannel(4, 4, 0, 0, WrapMode::Black) - 0.5).abs() < 1e-5);
//! ```

use ibalgo_core::{Error, Result, Roi3D};

use super::filter::{find_filterdesc, Filter2D};
use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use super::finish;
use crate::imagebuf::{floorfrac, ConstIter, ImageBuf, IterMut, Pixel, WrapMode};

const RESIZE_FLAGS: PrepFlags = PrepFlags::REQUIRE_SAME_NCHANNELS
    .union(PrepFlags::NO_SUPPORT_VOLUME)
    .union(PrepFlags::NO_COPY_ROI_FULL);

/// A destination for `src` resized to `width x height`, with both windows
/// at the origin.
fn target(src: &ImageBuf, width: u32, height: u32) -> ImageBuf {
    let mut spec = src.spec().clone();
    spec.x = 0;
    spec.y = 0;
    spec.width = width;
    spec.height = height;
    spec.full_x = 0;
    spec.full_y = 0;
    spec.full_width = width;
    spec.full_height = height;
    let mut dst = ImageBuf::new_uninit();
    let mut roi = spec.roi();
    if let Err(e) = prep(&mut roi, &mut dst, Some(src), None, Some(&spec), PrepFlags::NO_COPY_ROI_FULL) {
        dst.error(e);
    }
    dst
}

/// Display-window scale ratios `(x, y)` from `src` to `dst`; above 1 means
/// enlarging.
fn ratios(dst: &ImageBuf, src: &ImageBuf) -> (f32, f32) {
    let d = dst.spec();
    let s = src.spec();
    (
        d.full_width as f32 / s.full_width as f32,
        d.full_height as f32 / s.full_height as f32,
    )
}

/// Resizes `src` to `width x height` with `filter` (or a triangle sized to
/// the ratio when `None`).
pub fn resize(src: &ImageBuf, filter: Option<&Filter2D>, width: u32, height: u32) -> ImageBuf {
    let mut dst = target(src, width, height);
    resize_into(&mut dst, src, filter, None, 0);
    dst
}

/// Resizes `src`'s display window into `dst`'s display window.
///
/// Without a filter a triangle of width `2 * max(1, ratio)` is used on
/// each axis. Channel counts must match; volumes are rejected.
///
/// # Arguments
///
/// * `dst` - Destination; its display window sets the output size
/// * `src` - Source image
/// * `filter` - Reconstruction filter, borrowed from the caller
/// * `roi` - Destination region to compute
/// * `nthreads` - Worker count, 0 for the default
pub fn resize_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    filter: Option<&Filter2D>,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = resize_impl(dst, src, filter, roi, nthreads);
    finish(dst, "resize", result)
}

/// Resizes `src` to `width x height` with a filter from the registry.
///
/// See [`resize_by_name_into`] for how `filtername` and `filterwidth` are
/// interpreted.
pub fn resize_by_name(src: &ImageBuf, filtername: &str, filterwidth: f32, width: u32, height: u32) -> ImageBuf {
    let mut dst = target(src, width, height);
    resize_by_name_into(&mut dst, src, filtername, filterwidth, None, 0);
    dst
}

/// Resizes with a named filter.
///
/// An empty name picks `blackman-harris` when enlarging along either axis
/// and `lanczos3` otherwise. A positive `filterwidth` is used as is;
/// otherwise the registry width is scaled by `max(1, ratio)` per axis.
pub fn resize_by_name_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    filtername: &str,
    filterwidth: f32,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = resize_by_name_impl(dst, src, filtername, filterwidth, roi, nthreads);
    finish(dst, "resize", result)
}

fn resize_by_name_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    filtername: &str,
    filterwidth: f32,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(src), None, None, RESIZE_FLAGS)?;
    let (xratio, yratio) = ratios(dst, src);
    let filter = resize_filter(filtername, filterwidth, xratio, yratio)?;
    resize_impl(dst, src, Some(&filter), Some(roi), nthreads)
}

/// Picks and sizes the filter for a resize by name.
fn resize_filter(filtername: &str, filterwidth: f32, xratio: f32, yratio: f32) -> Result<Filter2D> {
    let name = match filtername {
        "" if xratio > 1.0 || yratio > 1.0 => "blackman-harris",
        "" => "lanczos3",
        name => name,
    };
    let desc = find_filterdesc(name).ok_or_else(|| Error::UnknownFilter(name.to_string()))?;
    let (w, h) = if filterwidth > 0.0 {
        (filterwidth, filterwidth)
    } else {
        (desc.width * xratio.max(1.0), desc.width * yratio.max(1.0))
    };
    Filter2D::create(name, w, h).ok_or_else(|| Error::UnknownFilter(name.to_string()))
}

fn resize_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    filter: Option<&Filter2D>,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(src), None, None, RESIZE_FLAGS)?;
    let (xratio, yratio) = ratios(dst, src);
    let fallback;
    let filter = match filter {
        Some(f) => f,
        None => {
            fallback = Filter2D::create("triangle", 2.0 * xratio.max(1.0), 2.0 * yratio.max(1.0))
                .ok_or_else(|| Error::UnknownFilter("triangle".into()))?;
            &fallback
        }
    };
    tracing::debug!(
        src = %src.roi_full(),
        dst = %dst.roi_full(),
        filter = filter.name(),
        width = filter.width(),
        nthreads,
        "resize"
    );
    let formats = (dst.format(), src.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], resize_pixels, (tile, src, filter, r))
    })
}

fn resize_pixels<D: Pixel, S: Pixel>(dst: &mut ImageBuf, src: &ImageBuf, filter: &Filter2D, roi: Roi3D) -> Result<()> {
    let srcfull = src.roi_full();
    let dstfull = dst.roi_full();
    let (srcfw, srcfh) = (srcfull.width() as f32, srcfull.height() as f32);
    let (dstfw, dstfh) = (dstfull.width() as f32, dstfull.height() as f32);
    let xratio = dstfw / srcfw;
    let yratio = dstfh / srcfh;

    let filterrad = filter.width() / 2.0;
    let radi = (filterrad / xratio).ceil() as i32;
    let radj = (filterrad / yratio).ceil() as i32;
    let xtaps = (2 * radi + 1) as usize;
    let ytaps = (2 * radj + 1) as usize;
    let separable = filter.separable();
    tracing::trace!(roi = %roi, radi, radj, separable, "resize tile");

    let nch = dst.nchannels() as usize;
    let z = src.spec().z;
    let mut xfiltval = vec![0.0f32; xtaps];
    let mut yfiltval = vec![0.0f32; ytaps];
    let mut pel = vec![0.0f32; nch];
    let mut srcpel = ConstIter::<S>::new(src, src.roi(), WrapMode::Clamp);
    let mut out = IterMut::<D>::new(dst, roi);

    let mut row = None;
    let mut totalweight_y = 0.0f32;
    let (mut src_y, mut src_yf_frac) = (0, 0.0f32);
    while !out.done() {
        let (x, y) = (out.x(), out.y());
        if row != Some((y, out.z())) {
            row = Some((y, out.z()));
            let t = (y - dstfull.ybegin) as f32 + 0.5;
            let src_yf = srcfull.ybegin as f32 + t / dstfh * srcfh;
            (src_y, src_yf_frac) = floorfrac(src_yf);
            // Vertical weights are shared by the whole scanline.
            if separable {
                totalweight_y = 0.0;
                for (j, w) in yfiltval.iter_mut().enumerate() {
                    *w = filter.yfilt(yratio * (j as f32 - radj as f32 - (src_yf_frac - 0.5)));
                    totalweight_y += *w;
                }
                if totalweight_y != 0.0 {
                    yfiltval.iter_mut().for_each(|w| *w /= totalweight_y);
                }
            }
        }

        let s = (x - dstfull.xbegin) as f32 + 0.5;
        let src_xf = srcfull.xbegin as f32 + s / dstfw * srcfw;
        let (src_x, src_xf_frac) = floorfrac(src_xf);
        pel.fill(0.0);

        if separable {
            let mut totalweight_x = 0.0f32;
            for (i, w) in xfiltval.iter_mut().enumerate() {
                *w = filter.xfilt(xratio * (i as f32 - radi as f32 - (src_xf_frac - 0.5)));
                totalweight_x += *w;
            }
            if totalweight_x != 0.0 {
                xfiltval.iter_mut().for_each(|w| *w /= totalweight_x);
                for (j, &wy) in yfiltval.iter().enumerate() {
                    if wy == 0.0 {
                        continue;
                    }
                    let sy = src_y + j as i32 - radj;
                    for (i, &wx) in xfiltval.iter().enumerate() {
                        let w = wy * wx;
                        if w == 0.0 {
                            continue;
                        }
                        srcpel.pos(src_x + i as i32 - radi, sy, z);
                        for (c, p) in pel.iter_mut().enumerate() {
                            *p += w * srcpel.get(c);
                        }
                    }
                }
            }
            if totalweight_y == 0.0 {
                pel.fill(0.0);
            }
        } else {
            let mut totalweight = 0.0f32;
            for j in -radj..=radj {
                let wy = yratio * (j as f32 - (src_yf_frac - 0.5));
                for i in -radi..=radi {
                    let w = filter.eval(xratio * (i as f32 - (src_xf_frac - 0.5)), wy);
                    if w == 0.0 {
                        continue;
                    }
                    totalweight += w;
                    srcpel.pos(src_x + i, src_y + j, z);
                    for (c, p) in pel.iter_mut().enumerate() {
                        *p += w * srcpel.get(c);
                    }
                }
            }
            if totalweight == 0.0 {
                pel.fill(0.0);
            } else {
                pel.iter_mut().for_each(|p| *p /= totalweight);
            }
        }

        for (c, &v) in pel.iter().enumerate() {
            out.set(c, v);
        }
        out.advance();
    }
    Ok(())
}

/// Resamples `src` to `width x height` without a reconstruction filter.
pub fn resample(src: &ImageBuf, interpolate: bool, width: u32, height: u32) -> ImageBuf {
    let mut dst = target(src, width, height);
    resample_into(&mut dst, src, interpolate, None, 0);
    dst
}

/// Resamples `src`'s display window into `dst`'s display window.
///
/// With `interpolate` each output pixel is the bilinear interpolation of
/// the source at the mapped position (edges clamped); otherwise it copies
/// the source pixel containing that position.
pub fn resample_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    interpolate: bool,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = resample_impl(dst, src, interpolate, roi, nthreads);
    finish(dst, "resample", result)
}

fn resample_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    interpolate: bool,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(src), None, None, RESIZE_FLAGS)?;
    tracing::debug!(src = %src.roi_full(), dst = %dst.roi_full(), interpolate, "resample");
    let formats = (dst.format(), src.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], resample_pixels, (tile, src, interpolate, r))
    })
}

fn resample_pixels<D: Pixel, S: Pixel>(dst: &mut ImageBuf, src: &ImageBuf, interpolate: bool, roi: Roi3D) -> Result<()> {
    let srcfull = src.roi_full();
    let dstfull = dst.roi_full();
    let (srcfw, srcfh) = (srcfull.width() as f32, srcfull.height() as f32);
    let (dstfw, dstfh) = (dstfull.width() as f32, dstfull.height() as f32);
    let z = src.spec().z;
    let mut pel = vec![0.0f32; src.nchannels() as usize];
    let mut srcpel = ConstIter::<S>::new(src, src.roi(), WrapMode::Black);
    let mut out = IterMut::<D>::new(dst, roi);
    while !out.done() {
        let s = ((out.x() - dstfull.xbegin) as f32 + 0.5) / dstfw;
        let t = ((out.y() - dstfull.ybegin) as f32 + 0.5) / dstfh;
        let src_xf = srcfull.xbegin as f32 + s * srcfw;
        let src_yf = srcfull.ybegin as f32 + t * srcfh;
        if interpolate {
            src.interppixel(src_xf, src_yf, &mut pel, WrapMode::Clamp);
            for c in roi.chbegin..roi.chend {
                let c = c as usize;
                out.set(c, pel.get(c).copied().unwrap_or(0.0));
            }
        } else {
            srcpel.pos(src_xf.floor() as i32, src_yf.floor() as i32, z);
            for c in roi.chbegin..roi.chend {
                let c = c as usize;
                out.set(c, srcpel.get(c));
            }
        }
        out.advance();
    }
    Ok(())
}
