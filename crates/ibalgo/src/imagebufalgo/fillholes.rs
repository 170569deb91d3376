//! Push-pull hole filling.
//!
//! Pixels with zero alpha are filled from their surroundings through an
//! image pyramid:
//!
//! 1. **Push**: halve the image repeatedly with a triangle filter and
//!    un-premultiply every level by its (non-zero) alpha, so coverage
//!    spreads into the holes as the levels shrink.
//! 2. **Pull**: from the coarsest level up, composite each level over the
//!    upsized level below it. Covered pixels keep their colour; holes take
//!    the blended colour of the coarser levels.
//!
//! The input alpha is kept in the result.

use ibalgo_core::{roi_intersection, DataFormat, Error, Result, Roi3D};

use super::arithmetic::over_into;
use super::finish;
use super::geometry::paste;
use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use super::resize::resize_by_name_into;
use crate::imagebuf::{ImageBuf, InitializePixels, IterMut};

/// Fills the holes of `src` into a new image.
pub fn fillholes_pushpull(src: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    fillholes_pushpull_into(&mut dst, src, None, 0);
    dst
}

/// Fills the zero-alpha pixels of `src` into `dst`.
///
/// `dst` and `src` must have the same channel count and the same alpha
/// channel; volumes are rejected.
pub fn fillholes_pushpull_into(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = fillholes_impl(dst, src, roi, nthreads);
    finish(dst, "fillholes_pushpull", result)
}

fn fillholes_impl(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(src), None, None, PrepFlags::NONE)?;
    if dst.nchannels() != src.nchannels() {
        return Err(Error::channel_mismatch(dst.nchannels(), src.nchannels()));
    }
    if dst.spec().depth > 1 || src.spec().depth > 1 {
        return Err(Error::volume_not_supported_by("ImageBufAlgo::fillholes_pushpull"));
    }
    let alpha = dst.spec().alpha_channel;
    if alpha < 0 || alpha != src.spec().alpha_channel {
        return Err(Error::MissingAlpha);
    }

    let mut top = ImageBuf::new_uninit();
    top.copy(src, Some(DataFormat::F32));
    let mut pyramid = vec![top];
    let (mut w, mut h) = (src.width(), src.height());
    while w > 1 || h > 1 {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        let level = push_level(&pyramid[pyramid.len() - 1], w, h, alpha as usize, nthreads)?;
        pyramid.push(level);
    }
    tracing::debug!(roi = %roi, levels = pyramid.len(), "fillholes_pushpull");

    let mut filled = pyramid.pop().ok_or_else(|| Error::other("empty pyramid"))?;
    while let Some(big) = pyramid.pop() {
        filled = pull_level(&big, &filled, nthreads)?;
    }

    let region = roi_intersection(&roi, &filled.roi());
    if !paste(dst, region.xbegin, region.ybegin, region.zbegin, region.chbegin, &filled, Some(region), nthreads) {
        return Err(Error::other(dst.geterror()));
    }
    if (region.chbegin..region.chend).contains(&alpha) {
        let a = region.with_channels(alpha, alpha + 1);
        if !paste(dst, a.xbegin, a.ybegin, a.zbegin, alpha, src, Some(a), nthreads) {
            return Err(Error::other(dst.geterror()));
        }
    }
    Ok(())
}

/// The next coarser level: `prev` shrunk to `w x h` and divided by alpha.
fn push_level(prev: &ImageBuf, w: u32, h: u32, alpha: usize, nthreads: usize) -> Result<ImageBuf> {
    let mut spec = prev.spec().clone();
    spec.x = 0;
    spec.y = 0;
    spec.width = w;
    spec.height = h;
    spec.full_x = 0;
    spec.full_y = 0;
    spec.full_width = w;
    spec.full_height = h;
    let mut small = ImageBuf::new(spec, InitializePixels::Yes);
    if !resize_by_name_into(&mut small, prev, "triangle", 0.0, None, nthreads) {
        return Err(Error::other(small.geterror()));
    }
    let roi = small.roi();
    parallel_image(&mut small, roi, nthreads, |tile, r| divide_by_alpha(tile, alpha, r))?;
    Ok(small)
}

/// `big` over `small` upsized to `big`'s geometry.
fn pull_level(big: &ImageBuf, small: &ImageBuf, nthreads: usize) -> Result<ImageBuf> {
    let mut blowup = ImageBuf::new(big.spec().clone(), InitializePixels::Yes);
    if !resize_by_name_into(&mut blowup, small, "triangle", 0.0, None, nthreads) {
        return Err(Error::other(blowup.geterror()));
    }
    let mut out = ImageBuf::new_uninit();
    if !over_into(&mut out, big, &blowup, None, nthreads) {
        return Err(Error::other(out.geterror()));
    }
    Ok(out)
}

/// Divides every channel by alpha where alpha is non-zero. `buf` is float.
fn divide_by_alpha(buf: &mut ImageBuf, alpha: usize, roi: Roi3D) -> Result<()> {
    let nch = buf.nchannels() as usize;
    let mut p = IterMut::<f32>::new(buf, roi);
    while !p.done() {
        let a = p.get(alpha);
        if a != 0.0 {
            for c in 0..nch {
                let v = p.get(c) / a;
                p.set(c, v);
            }
        }
        p.advance();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::WrapMode;
    use approx::assert_abs_diff_eq;
    use ibalgo_core::ImageSpec;

    fn rgba(w: u32, h: u32) -> ImageBuf {
        ImageBuf::new(ImageSpec::new(w, h, 4, DataFormat::F32), InitializePixels::Yes)
    }

    #[test]
    fn single_seed_fills_everything() {
        let mut src = rgba(3, 3);
        src.setpixel(1, 1, 0, &[1.0, 1.0, 1.0, 1.0]);
        let out = fillholes_pushpull(&src);
        let mut px = [0.0; 4];
        for y in 0..3 {
            for x in 0..3 {
                out.getpixel(x, y, 0, &mut px, WrapMode::Black);
                for c in 0..3 {
                    assert_abs_diff_eq!(px[c], 1.0, epsilon = 1e-4);
                }
                assert_eq!(px[3], src.getchannel(x, y, 0, 3, WrapMode::Black));
            }
        }
    }

    #[test]
    fn covered_pixels_keep_colour() {
        let mut src = rgba(8, 8);
        for y in 0..8 {
            for x in 0..4 {
                src.setpixel(x, y, 0, &[0.2, 0.4, 0.6, 1.0]);
            }
        }
        let out = fillholes_pushpull(&src);
        let mut px = [0.0; 4];
        out.getpixel(1, 3, 0, &mut px, WrapMode::Black);
        assert_abs_diff_eq!(px[1], 0.4, epsilon = 1e-6);
        out.getpixel(7, 3, 0, &mut px, WrapMode::Black);
        assert!(px[..3].iter().all(|v| v.is_finite() && *v > 0.0));
        assert_abs_diff_eq!(px[2] / px[0], 3.0, epsilon = 1e-3);
        assert_eq!(px[3], 0.0);
    }

    #[test]
    fn requires_alpha() {
        let src = ImageBuf::new(ImageSpec::new(4, 4, 3, DataFormat::F32), InitializePixels::Yes);
        let mut dst = ImageBuf::new_uninit();
        assert!(!fillholes_pushpull_into(&mut dst, &src, None, 1));
        assert_eq!(dst.geterror(), "Must have alpha channels");
    }

    #[test]
    fn channel_mismatch() {
        let src = rgba(4, 4);
        let mut dst = ImageBuf::new(ImageSpec::new(4, 4, 3, DataFormat::F32), InitializePixels::Yes);
        assert!(!fillholes_pushpull_into(&mut dst, &src, None, 1));
        assert_eq!(dst.geterror(), "channel number mismatch: 3 vs. 4");
    }
}
