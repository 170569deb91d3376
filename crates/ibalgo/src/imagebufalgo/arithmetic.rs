//! Per-pixel arithmetic and compositing.
//!
//! - [`add`] / [`sub`] - channel-wise sum and difference of two images
//! - [`mul_scalar`] - channel-wise scaling
//! - [`over`] - premultiplied Porter-Duff "over"
//!
//! Pixels a source does not cover read as zero. When the two sources
//! differ in pixel format, a new destination is allocated as float.

use ibalgo_core::{Result, Roi3D};

use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use super::finish;
use crate::imagebuf::{ConstIter, ImageBuf, IterMut, Pixel, WrapMode};

/// Computes `A + B` into a new image.
pub fn add(a: &ImageBuf, b: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    add_into(&mut dst, a, b, None, 0);
    dst
}

/// Computes `A + B` into `dst`.
pub fn add_into(dst: &mut ImageBuf, a: &ImageBuf, b: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = binary(dst, a, b, roi, nthreads, "add", |x, y| x + y);
    finish(dst, "add", result)
}

/// Computes `A - B` into a new image.
pub fn sub(a: &ImageBuf, b: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    sub_into(&mut dst, a, b, None, 0);
    dst
}

/// Computes `A - B` into `dst`.
pub fn sub_into(dst: &mut ImageBuf, a: &ImageBuf, b: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = binary(dst, a, b, roi, nthreads, "sub", |x, y| x - y);
    finish(dst, "sub", result)
}

fn binary(
    dst: &mut ImageBuf,
    a: &ImageBuf,
    b: &ImageBuf,
    roi: Option<Roi3D>,
    nthreads: usize,
    op: &str,
    f: fn(f32, f32) -> f32,
) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(a), Some(b), None, PrepFlags::NONE)?;
    tracing::debug!(op, roi = %roi, "binary op");
    let formats = (dst.format(), a.format(), b.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1, formats.2], binary_pixels, (tile, a, b, r, f))
    })
}

fn binary_pixels<D: Pixel, A: Pixel, B: Pixel>(
    dst: &mut ImageBuf,
    a: &ImageBuf,
    b: &ImageBuf,
    roi: Roi3D,
    f: fn(f32, f32) -> f32,
) -> Result<()> {
    let mut ia = ConstIter::<A>::new(a, roi, WrapMode::Black);
    let mut ib = ConstIter::<B>::new(b, roi, WrapMode::Black);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            d.set(c, f(ia.get(c), ib.get(c)));
        }
        d.advance();
        ia.advance();
        ib.advance();
    }
    Ok(())
}

/// Multiplies every channel `c` of `A` by `k[c]` into a new image.
pub fn mul_scalar(a: &ImageBuf, k: &[f32]) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    mul_scalar_into(&mut dst, a, k, None, 0);
    dst
}

/// Multiplies every channel `c` of `A` by `k[c]` into `dst`.
///
/// Missing factors repeat the last one.
pub fn mul_scalar_into(dst: &mut ImageBuf, a: &ImageBuf, k: &[f32], roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = mul_scalar_impl(dst, a, k, roi, nthreads);
    finish(dst, "mul", result)
}

fn mul_scalar_impl(dst: &mut ImageBuf, a: &ImageBuf, k: &[f32], roi: Option<Roi3D>, nthreads: usize) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(a), None, None, PrepFlags::NONE)?;
    tracing::debug!(roi = %roi, ?k, "mul");
    let k: Vec<f32> = (0..roi.chend.max(0) as usize)
        .map(|c| k.get(c).or(k.last()).copied().unwrap_or(1.0))
        .collect();
    let formats = (dst.format(), a.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], mul_pixels, (tile, a, &k, r))
    })
}

fn mul_pixels<D: Pixel, A: Pixel>(dst: &mut ImageBuf, a: &ImageBuf, k: &[f32], roi: Roi3D) -> Result<()> {
    let mut ia = ConstIter::<A>::new(a, roi, WrapMode::Black);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            d.set(c, ia.get(c) * k[c]);
        }
        d.advance();
        ia.advance();
    }
    Ok(())
}

/// Composites `A` over `B` into a new image.
pub fn over(a: &ImageBuf, b: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    over_into(&mut dst, a, b, None, 0);
    dst
}

/// Composites `A` over `B`: `R = A + (1 - A.alpha) * B` on every channel.
///
/// Both images must be premultiplied, have alpha and the same channel
/// count.
pub fn over_into(dst: &mut ImageBuf, a: &ImageBuf, b: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = over_impl(dst, a, b, roi, nthreads);
    finish(dst, "over", result)
}

fn over_impl(dst: &mut ImageBuf, a: &ImageBuf, b: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(
        &mut roi,
        dst,
        Some(a),
        Some(b),
        None,
        PrepFlags::REQUIRE_ALPHA | PrepFlags::REQUIRE_SAME_NCHANNELS,
    )?;
    tracing::debug!(roi = %roi, "over");
    let alpha = a.spec().alpha_channel as usize;
    let formats = (dst.format(), a.format(), b.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1, formats.2], over_pixels, (tile, a, b, alpha, r))
    })
}

fn over_pixels<D: Pixel, A: Pixel, B: Pixel>(
    dst: &mut ImageBuf,
    a: &ImageBuf,
    b: &ImageBuf,
    alpha: usize,
    roi: Roi3D,
) -> Result<()> {
    let mut ia = ConstIter::<A>::new(a, roi, WrapMode::Black);
    let mut ib = ConstIter::<B>::new(b, roi, WrapMode::Black);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        let one_minus_alpha = 1.0 - ia.get(alpha);
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            d.set(c, ia.get(c) + one_minus_alpha * ib.get(c));
        }
        d.advance();
        ia.advance();
        ib.advance();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::InitializePixels;
    use crate::imagebufalgo::fill;
    use ibalgo_core::{DataFormat, ImageSpec};

    fn solid(w: i32, h: i32, values: &[f32]) -> ImageBuf {
        fill(values, Roi3D::new(0, w, 0, h, 0, 1, 0, values.len() as i32))
    }

    #[test]
    fn add_and_sub() {
        let a = solid(4, 4, &[0.25, 0.5]);
        let b = solid(4, 4, &[0.5, 0.125]);
        let s = add(&a, &b);
        assert_eq!(s.getchannel(3, 3, 0, 0, WrapMode::Black), 0.75);
        assert_eq!(s.getchannel(3, 3, 0, 1, WrapMode::Black), 0.625);
        let d = sub(&a, &b);
        assert_eq!(d.getchannel(0, 0, 0, 0, WrapMode::Black), -0.25);
    }

    #[test]
    fn add_covers_union_of_windows() {
        let a = solid(2, 2, &[1.0]);
        let b = solid(4, 1, &[0.5]);
        let s = add(&a, &b);
        assert_eq!(s.roi(), Roi3D::new(0, 4, 0, 2, 0, 1, 0, 1));
        assert_eq!(s.getchannel(3, 0, 0, 0, WrapMode::Black), 0.5);
        assert_eq!(s.getchannel(1, 1, 0, 0, WrapMode::Black), 1.0);
        assert_eq!(s.getchannel(3, 1, 0, 0, WrapMode::Black), 0.0);
    }

    #[test]
    fn mixed_formats_into_existing_dst() {
        let mut a = ImageBuf::new(ImageSpec::new(2, 2, 1, DataFormat::U8), InitializePixels::Yes);
        a.setpixel(0, 0, 0, &[1.0]);
        let b = solid(2, 2, &[-0.5]);
        let mut dst = ImageBuf::new(ImageSpec::new(2, 2, 1, DataFormat::F16), InitializePixels::Yes);
        assert!(add_into(&mut dst, &a, &b, None, 1));
        assert_eq!(dst.getchannel(0, 0, 0, 0, WrapMode::Black), 0.5);
        assert_eq!(dst.getchannel(1, 1, 0, 0, WrapMode::Black), -0.5);
    }

    #[test]
    fn mul_scalar_per_channel() {
        let a = solid(2, 2, &[0.5, 0.5, 0.5]);
        let m = mul_scalar(&a, &[2.0, 0.5]);
        let mut px = [0.0; 3];
        m.getpixel(1, 1, 0, &mut px, WrapMode::Black);
        assert_eq!(px, [1.0, 0.25, 0.25]);
    }

    #[test]
    fn over_premultiplied() {
        let mut spec = ImageSpec::new(1, 1, 4, DataFormat::F32);
        spec.alpha_channel = 3;
        let mut a = ImageBuf::new(spec.clone(), InitializePixels::Yes);
        a.setpixel(0, 0, 0, &[0.25, 0.0, 0.0, 0.5]);
        let mut b = ImageBuf::new(spec, InitializePixels::Yes);
        b.setpixel(0, 0, 0, &[0.0, 1.0, 0.0, 1.0]);
        let r = over(&a, &b);
        let mut px = [0.0; 4];
        r.getpixel(0, 0, 0, &mut px, WrapMode::Black);
        assert_eq!(px, [0.25, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn over_requires_alpha() {
        let a = solid(1, 1, &[1.0, 1.0, 1.0]);
        let mut dst = ImageBuf::new_uninit();
        assert!(!over_into(&mut dst, &a, &a, None, 1));
        assert_eq!(dst.geterror(), "images must have alpha channels");
    }
}
