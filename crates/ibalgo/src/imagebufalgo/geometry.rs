//! Region copies that move pixels without resampling.
//!
//! - [`paste`] - copy a region of one image into another at an offset
//! - [`transpose`] - swap the x and y axes

use ibalgo_core::{Error, ImageSpec, Result, Roi3D};

use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use super::finish;
use crate::imagebuf::{ConstIter, ImageBuf, IterMut, Pixel, WrapMode};

/// Copies `srcroi` of `src` into `dst` so that its corner lands on
/// `(xbegin, ybegin, zbegin)` and its first channel on `chbegin`.
///
/// Only the part overlapping `dst`'s pixel window is written; pixels of
/// `srcroi` outside `src`'s window paste as zero. An uninitialized `dst`
/// is allocated as float, exactly covering the pasted region.
///
/// # Arguments
///
/// * `dst` - Destination image
/// * `xbegin`, `ybegin`, `zbegin` - Destination of the region's corner
/// * `chbegin` - Destination of the region's first channel
/// * `src` - Source image
/// * `srcroi` - Region of `src` to copy (`None` for its pixel window)
/// * `nthreads` - Worker count, 0 for the default
#[allow(clippy::too_many_arguments)]
pub fn paste(
    dst: &mut ImageBuf,
    xbegin: i32,
    ybegin: i32,
    zbegin: i32,
    chbegin: i32,
    src: &ImageBuf,
    srcroi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = paste_impl(dst, (xbegin, ybegin, zbegin, chbegin), src, srcroi, nthreads);
    finish(dst, "paste", result)
}

fn paste_impl(
    dst: &mut ImageBuf,
    origin: (i32, i32, i32, i32),
    src: &ImageBuf,
    srcroi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    if !src.initialized() {
        return Err(Error::UninitializedInput);
    }
    let (xbegin, ybegin, zbegin, chbegin) = origin;
    let mut srcroi = srcroi.filter(Roi3D::defined).unwrap_or_else(|| src.roi());
    srcroi.chend = srcroi.chend.min(src.nchannels() as i32);
    let mut dstroi = Roi3D::new(
        xbegin,
        xbegin + srcroi.width(),
        ybegin,
        ybegin + srcroi.height(),
        zbegin,
        zbegin + srcroi.depth(),
        chbegin,
        chbegin + srcroi.nchannels(),
    );
    prep(&mut dstroi, dst, None, None, None, PrepFlags::NONE)?;
    tracing::debug!(srcroi = %srcroi, dstroi = %dstroi, "paste");
    // Source coordinate = destination coordinate + shift.
    let shift = (
        srcroi.xbegin - xbegin,
        srcroi.ybegin - ybegin,
        srcroi.zbegin - zbegin,
        srcroi.chbegin - chbegin,
    );
    let formats = (dst.format(), src.format());
    parallel_image(dst, dstroi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], paste_pixels, (tile, src, shift, r))
    })
}

fn paste_pixels<D: Pixel, S: Pixel>(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    shift: (i32, i32, i32, i32),
    roi: Roi3D,
) -> Result<()> {
    let (sx, sy, sz, sc) = shift;
    let mut s = ConstIter::<S>::new(src, roi, WrapMode::Black);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        s.pos(d.x() + sx, d.y() + sy, d.z() + sz);
        for c in roi.chbegin..roi.chend {
            d.set(c as usize, s.get((c + sc) as usize));
        }
        d.advance();
    }
    Ok(())
}

/// Transposes `src` into a new image.
pub fn transpose(src: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    transpose_into(&mut dst, src, None, 0);
    dst
}

/// Writes `src(x, y, z)` to `dst(y, x, z)` for every pixel of `roi`
/// (a region of `src`).
///
/// An uninitialized `dst` gets `src`'s format and channels, with both the
/// pixel and display windows transposed.
pub fn transpose_into(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = transpose_impl(dst, src, roi, nthreads);
    finish(dst, "transpose", result)
}

fn swap_xy(r: &Roi3D) -> Roi3D {
    Roi3D::new(r.ybegin, r.yend, r.xbegin, r.xend, r.zbegin, r.zend, r.chbegin, r.chend)
}

fn transpose_impl(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> Result<()> {
    if !src.initialized() {
        return Err(Error::UninitializedInput);
    }
    let mut roi = roi.filter(Roi3D::defined).unwrap_or_else(|| src.roi());
    roi.chend = roi.chend.min(src.nchannels() as i32);
    let mut dst_roi = swap_xy(&roi);
    if dst.initialized() {
        prep(&mut dst_roi, dst, None, None, None, PrepFlags::NONE)?;
    } else {
        let mut spec: ImageSpec = src.spec().clone();
        spec.tile_width = 0;
        spec.tile_height = 0;
        spec.tile_depth = 0;
        prep(&mut dst_roi, dst, None, None, Some(&spec), PrepFlags::NONE)?;
        dst.set_roi_full(&swap_xy(&src.roi_full()));
    }
    tracing::debug!(roi = %roi, "transpose");
    let formats = (dst.format(), src.format());
    parallel_image(dst, dst_roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], transpose_pixels, (tile, src, r))
    })
}

fn transpose_pixels<D: Pixel, S: Pixel>(dst: &mut ImageBuf, src: &ImageBuf, roi: Roi3D) -> Result<()> {
    let mut s = ConstIter::<S>::new(src, swap_xy(&roi), WrapMode::Black);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        s.pos(d.y(), d.x(), d.z());
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            d.set(c, s.get(c));
        }
        d.advance();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::InitializePixels;
    use ibalgo_core::DataFormat;

    fn ramp(w: u32, h: u32) -> ImageBuf {
        let mut buf = ImageBuf::new(ImageSpec::new(w, h, 1, DataFormat::F32), InitializePixels::Yes);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                buf.setpixel(x, y, 0, &[(y * 10 + x) as f32]);
            }
        }
        buf
    }

    #[test]
    fn paste_at_offset() {
        let src = ramp(3, 2);
        let mut dst = ImageBuf::new(ImageSpec::new(4, 4, 2, DataFormat::F32), InitializePixels::Yes);
        assert!(paste(&mut dst, 2, 1, 0, 1, &src, None, 1));
        assert_eq!(dst.getchannel(2, 1, 0, 1, WrapMode::Black), 0.0);
        assert_eq!(dst.getchannel(3, 2, 0, 1, WrapMode::Black), 11.0);
        assert_eq!(dst.getchannel(3, 2, 0, 0, WrapMode::Black), 0.0);
        assert_eq!(dst.getchannel(1, 1, 0, 1, WrapMode::Black), 0.0);
    }

    #[test]
    fn paste_subregion_into_new_image() {
        let src = ramp(4, 4);
        let mut dst = ImageBuf::new_uninit();
        let region = Roi3D::new(1, 3, 2, 5, 0, 1, 0, 1);
        assert!(paste(&mut dst, 0, 0, 0, 0, &src, Some(region), 1));
        assert_eq!(dst.roi(), Roi3D::new(0, 2, 0, 3, 0, 1, 0, 1));
        assert_eq!(dst.getchannel(0, 0, 0, 0, WrapMode::Black), 21.0);
        assert_eq!(dst.getchannel(1, 1, 0, 0, WrapMode::Black), 32.0);
        // Row 4 of the source does not exist.
        assert_eq!(dst.getchannel(0, 2, 0, 0, WrapMode::Black), 0.0);
    }

    #[test]
    fn paste_uninitialized_source() {
        let mut dst = ImageBuf::new_uninit();
        assert!(!paste(&mut dst, 0, 0, 0, 0, &ImageBuf::new_uninit(), None, 1));
        assert_eq!(dst.geterror(), "Uninitialized input image");
    }

    #[test]
    fn transpose_swaps_windows() {
        let mut src = ramp(3, 2);
        src.spec_mut().full_width = 5;
        let t = transpose(&src);
        assert_eq!(t.width(), 2);
        assert_eq!(t.height(), 3);
        assert_eq!(t.spec().full_height, 5);
        assert_eq!(t.getchannel(1, 2, 0, 0, WrapMode::Black), 12.0);
        assert_eq!(t.getchannel(0, 1, 0, 0, WrapMode::Black), 1.0);
        let back = transpose(&t);
        assert_eq!(back.getchannel(2, 1, 0, 0, WrapMode::Black), 12.0);
    }
}
