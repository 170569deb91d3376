//! Pattern generation functions for ImageBuf.
//!
//! - [`zero`] - all-black image
//! - [`fill`] - solid colour
//! - [`checker`] - checkerboard

use ibalgo_core::{DataFormat, ImageSpec, Result, Roi3D};

use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use super::finish;
use crate::imagebuf::{ImageBuf, InitializePixels, IterMut, Pixel};

/// Expands `values` to `n` channels; missing channels repeat the last
/// value (or 0 if `values` is empty).
fn expand(values: &[f32], n: usize) -> Vec<f32> {
    (0..n)
        .map(|c| values.get(c).or(values.last()).copied().unwrap_or(0.0))
        .collect()
}

fn new_dst(roi: &Roi3D) -> ImageBuf {
    if roi.defined() && roi.chend != i32::MAX {
        ImageBuf::new(ImageSpec::from_roi(roi, DataFormat::F32), InitializePixels::Yes)
    } else {
        ImageBuf::new_uninit()
    }
}

/// Creates an all-black float image covering `roi`.
///
/// # Example
///
/// ```
/// use ibalgo::imagebufalgo::zero;
/// use ibalgo_core::Roi3D;
///
/// let black = zero(Roi3D::new(0, 16, 0, 8, 0, 1, 0, 4));
/// assert_eq!(black.nchannels(), 4);
/// ```
pub fn zero(roi: Roi3D) -> ImageBuf {
    let mut dst = new_dst(&roi);
    zero_into(&mut dst, Some(roi), 0);
    dst
}

/// Sets the channels of `roi` to zero.
pub fn zero_into(dst: &mut ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = fill_impl(dst, &[0.0], roi, nthreads, "zero");
    finish(dst, "zero", result)
}

/// Creates a float image covering `roi` filled with `values`.
pub fn fill(values: &[f32], roi: Roi3D) -> ImageBuf {
    let mut dst = new_dst(&roi);
    fill_into(&mut dst, values, Some(roi), 0);
    dst
}

/// Writes `values[c]` into channel `c` of every pixel of `roi`.
///
/// # Arguments
///
/// * `dst` - Destination image; allocated as float from `roi` if uninitialized
/// * `values` - Channel values (last value repeats for missing channels)
/// * `roi` - Region to fill (defaults to the whole image)
/// * `nthreads` - Worker count, 0 for the default
pub fn fill_into(dst: &mut ImageBuf, values: &[f32], roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = fill_impl(dst, values, roi, nthreads, "fill");
    finish(dst, "fill", result)
}

fn fill_impl(dst: &mut ImageBuf, values: &[f32], roi: Option<Roi3D>, nthreads: usize, op: &str) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, None, None, None, PrepFlags::NONE)?;
    tracing::debug!(op, roi = %roi, "fill");
    let values = expand(values, roi.chend.max(0) as usize);
    let format = dst.format();
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([format], fill_pixels, (tile, &values, r))
    })
}

fn fill_pixels<T: Pixel>(dst: &mut ImageBuf, values: &[f32], roi: Roi3D) -> Result<()> {
    let mut it = IterMut::<T>::new(dst, roi);
    while !it.done() {
        for c in roi.chbegin..roi.chend {
            it.set(c as usize, values[c as usize]);
        }
        it.advance();
    }
    Ok(())
}

/// Creates a float checkerboard covering `roi`.
///
/// # Arguments
///
/// * `size` - Checker width, height and depth in pixels
/// * `color1` - Colour of the checker containing `offset`
/// * `color2` - The other colour
/// * `offset` - Pattern origin (x, y, z)
/// * `roi` - Region defining the image size and channel count
pub fn checker(
    size: (i32, i32, i32),
    color1: &[f32],
    color2: &[f32],
    offset: (i32, i32, i32),
    roi: Roi3D,
) -> ImageBuf {
    let mut dst = new_dst(&roi);
    checker_into(&mut dst, size, color1, color2, offset, Some(roi), 0);
    dst
}

/// Fills `roi` with a checkerboard.
///
/// Pixel `(x, y, z)` gets `color2` when
/// `floor((x-ox)/w) + floor((y-oy)/h) + floor((z-oz)/d)` is odd, else
/// `color1`.
pub fn checker_into(
    dst: &mut ImageBuf,
    size: (i32, i32, i32),
    color1: &[f32],
    color2: &[f32],
    offset: (i32, i32, i32),
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = checker_impl(dst, size, color1, color2, offset, roi, nthreads);
    finish(dst, "checker", result)
}

fn checker_impl(
    dst: &mut ImageBuf,
    size: (i32, i32, i32),
    color1: &[f32],
    color2: &[f32],
    offset: (i32, i32, i32),
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, None, None, None, PrepFlags::NONE)?;
    tracing::debug!(roi = %roi, ?size, ?offset, "checker");
    let n = roi.chend.max(0) as usize;
    let colors = [expand(color1, n), expand(color2, n)];
    let size = (size.0.max(1), size.1.max(1), size.2.max(1));
    let format = dst.format();
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([format], checker_pixels, (tile, &colors, size, offset, r))
    })
}

fn checker_pixels<T: Pixel>(
    dst: &mut ImageBuf,
    colors: &[Vec<f32>; 2],
    size: (i32, i32, i32),
    offset: (i32, i32, i32),
    roi: Roi3D,
) -> Result<()> {
    let (w, h, d) = size;
    let (ox, oy, oz) = offset;
    let mut it = IterMut::<T>::new(dst, roi);
    while !it.done() {
        let parity = (it.x() - ox).div_euclid(w) + (it.y() - oy).div_euclid(h) + (it.z() - oz).div_euclid(d);
        let color = &colors[parity.rem_euclid(2) as usize];
        for c in roi.chbegin..roi.chend {
            it.set(c as usize, color[c as usize]);
        }
        it.advance();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::WrapMode;

    #[test]
    fn fill_respects_channel_range() {
        let mut buf = ImageBuf::new(ImageSpec::new(4, 4, 3, DataFormat::U8), InitializePixels::Yes);
        let roi = Roi3D::new(1, 3, 1, 3, 0, 1, 1, 3);
        assert!(fill_into(&mut buf, &[0.25, 1.0, 0.5], Some(roi), 1));
        let mut px = [0.0; 3];
        buf.getpixel(1, 1, 0, &mut px, WrapMode::Black);
        assert_eq!(px[0], 0.0);
        assert_eq!(px[1], 1.0);
        assert!((px[2] - 128.0 / 255.0).abs() < 1e-6);
        buf.getpixel(0, 0, 0, &mut px, WrapMode::Black);
        assert_eq!(px, [0.0; 3]);
    }

    #[test]
    fn fill_allocates_from_roi() {
        let img = fill(&[0.5, 0.25], Roi3D::new(0, 3, 0, 2, 0, 1, 0, 2));
        assert!(img.initialized());
        assert_eq!(img.format(), DataFormat::F32);
        assert_eq!(img.nchannels(), 2);
        assert_eq!(img.getchannel(2, 1, 0, 1, WrapMode::Black), 0.25);
    }

    #[test]
    fn fill_without_channel_count_fails() {
        let mut dst = ImageBuf::new_uninit();
        assert!(!fill_into(&mut dst, &[1.0], Some(Roi3D::new_2d(0, 2, 0, 2)), 1));
        assert!(dst.geterror().contains("channel count"));
    }

    #[test]
    fn zero_clears() {
        let mut buf = fill(&[1.0], Roi3D::new(0, 2, 0, 2, 0, 1, 0, 1));
        assert!(zero_into(&mut buf, None, 1));
        assert_eq!(buf.getchannel(1, 1, 0, 0, WrapMode::Black), 0.0);
    }

    #[test]
    fn checker_negative_coordinates() {
        let roi = Roi3D::new(-4, 4, 0, 1, 0, 1, 0, 1);
        let img = checker((2, 1, 1), &[0.0], &[1.0], (0, 0, 0), roi);
        let row: Vec<f32> = (-4..4).map(|x| img.getchannel(x, 0, 0, 0, WrapMode::Black)).collect();
        assert_eq!(row, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn checker_offset() {
        let roi = Roi3D::new(0, 4, 0, 1, 0, 1, 0, 1);
        let img = checker((2, 2, 1), &[0.0], &[1.0], (1, 0, 0), roi);
        let row: Vec<f32> = (0..4).map(|x| img.getchannel(x, 0, 0, 0, WrapMode::Black)).collect();
        assert_eq!(row, vec![1.0, 0.0, 0.0, 1.0]);
    }
}
