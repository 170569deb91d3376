//! Convolution with a kernel image.
//!
//! - [`convolve`] - weighted sum over a kernel centred on each pixel
//! - [`make_kernel`] - build a kernel from a filter name
//! - [`unsharp_mask`] - sharpen by adding back the high frequencies
//!
//! A kernel is an ordinary single-channel image whose pixel window is
//! centred on the origin: pixel `(kx, ky, kz)` weights the source pixel at
//! that offset.

use ibalgo_core::{roi_intersection, DataFormat, Error, ImageSpec, Result, Roi3D};

use super::arithmetic::{add_into, sub_into};
use super::filter::Filter2D;
use super::finish;
use super::parallel::parallel_image;
use super::prep::{prep, PrepFlags};
use crate::imagebuf::{ConstIter, ImageBuf, InitializePixels, IterMut, Pixel, WrapMode};

/// Convolves `src` with `kernel` into a new image.
pub fn convolve(src: &ImageBuf, kernel: &ImageBuf, normalize: bool) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    convolve_into(&mut dst, src, kernel, normalize, None, 0);
    dst
}

/// Convolves `src` with `kernel` into `dst`.
///
/// Source lookups past the pixel window clamp to the edge. With
/// `normalize` the result is divided by the sum of the kernel weights; a
/// kernel summing to zero (an edge detector, say) is applied as is.
///
/// # Arguments
///
/// * `dst` - Destination image
/// * `src` - Source image; must have as many channels as `dst`
/// * `kernel` - Kernel image (channel 0 is used)
/// * `normalize` - Divide by the kernel sum
/// * `roi` - Region to compute
/// * `nthreads` - Worker count, 0 for the default
pub fn convolve_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    kernel: &ImageBuf,
    normalize: bool,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = convolve_impl(dst, src, kernel, normalize, roi, nthreads);
    finish(dst, "convolve", result)
}

/// Kernel taps as `(offset, weight)`, skipping zero weights.
fn kernel_taps(kernel: &ImageBuf) -> Vec<((i32, i32, i32), f32)> {
    let kroi = kernel.roi();
    let mut taps = Vec::with_capacity(kroi.npixels() as usize);
    for z in kroi.zbegin..kroi.zend {
        for y in kroi.ybegin..kroi.yend {
            for x in kroi.xbegin..kroi.xend {
                let w = kernel.getchannel(x, y, z, 0, WrapMode::Black);
                if w != 0.0 {
                    taps.push(((x, y, z), w));
                }
            }
        }
    }
    taps
}

fn convolve_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    kernel: &ImageBuf,
    normalize: bool,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    if !kernel.initialized() {
        return Err(Error::UninitializedInput);
    }
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(src), None, None, PrepFlags::NONE)?;
    if dst.nchannels() != src.nchannels() {
        return Err(Error::channel_mismatch(dst.nchannels(), src.nchannels()));
    }
    let mut taps = kernel_taps(kernel);
    if normalize {
        let sum: f32 = taps.iter().map(|(_, w)| w).sum();
        if sum != 0.0 {
            let scale = 1.0 / sum;
            taps.iter_mut().for_each(|(_, w)| *w *= scale);
        } else {
            tracing::debug!(kernel = %kernel.roi(), "kernel sums to zero, not normalized");
        }
    }
    tracing::debug!(roi = %roi, kernel = %kernel.roi(), taps = taps.len(), normalize, "convolve");
    let formats = (dst.format(), src.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], convolve_pixels, (tile, src, &taps, r))
    })
}

fn convolve_pixels<D: Pixel, S: Pixel>(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    taps: &[((i32, i32, i32), f32)],
    roi: Roi3D,
) -> Result<()> {
    let mut sum = vec![0.0f32; roi.chend.max(0) as usize];
    let mut s = ConstIter::<S>::new(src, roi, WrapMode::Clamp);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        sum.fill(0.0);
        for &((kx, ky, kz), w) in taps {
            s.pos(d.x() + kx, d.y() + ky, d.z() + kz);
            for c in roi.chbegin..roi.chend {
                let c = c as usize;
                sum[c] += w * s.get(c);
            }
        }
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            d.set(c, sum[c]);
        }
        d.advance();
    }
    Ok(())
}

/// Builds a kernel image; see [`make_kernel_into`].
pub fn make_kernel(name: &str, width: f32, height: f32, depth: f32, normalize: bool) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    make_kernel_into(&mut dst, name, width, height, depth, normalize);
    dst
}

/// Allocates `dst` as a single-channel float kernel and fills it.
///
/// Each dimension is rounded up to an odd pixel count and the pixel and
/// display windows are centred on the origin. `name` is either a filter
/// from the registry, sampled at integer offsets, or `"binomial"`. Any
/// other name leaves a box of ones (normalized if asked) and fails with
/// `Unknown kernel`.
pub fn make_kernel_into(
    dst: &mut ImageBuf,
    name: &str,
    width: f32,
    height: f32,
    depth: f32,
    normalize: bool,
) -> bool {
    let result = make_kernel_impl(dst, name, width, height, depth, normalize);
    finish(dst, "make_kernel", result)
}

/// Odd pixel count covering `size`.
fn odd_size(size: f32) -> i32 {
    (size.ceil() as i32).max(1) | 1
}

/// `C(n, k)` as a float.
fn binomial(n: i32, k: i32) -> f32 {
    (1..=k).fold(1.0f32, |p, i| p * (n - (k - i)) as f32 / i as f32)
}

fn binomial_row(n: i32) -> Vec<f32> {
    (0..n).map(|i| binomial(n - 1, i)).collect()
}

fn make_kernel_impl(
    dst: &mut ImageBuf,
    name: &str,
    width: f32,
    height: f32,
    depth: f32,
    normalize: bool,
) -> Result<()> {
    let (w, h, d) = (odd_size(width), odd_size(height), odd_size(depth));
    let roi = Roi3D::new(-w / 2, -w / 2 + w, -h / 2, -h / 2 + h, -d / 2, -d / 2 + d, 0, 1);
    let spec = ImageSpec::from_roi(&roi, DataFormat::F32);
    dst.alloc(&spec);
    tracing::debug!(name, kernel = %roi, normalize, "make_kernel");

    let mut p = IterMut::<f32>::new(dst, roi);
    if let Some(filter) = Filter2D::create(name, width, height) {
        while !p.done() {
            let v = filter.eval(p.x() as f32, p.y() as f32);
            p.set(0, v);
            p.advance();
        }
    } else if name == "binomial" {
        let (wf, hf) = (binomial_row(w), binomial_row(h));
        let df = if d == 1 { vec![1.0] } else { binomial_row(d) };
        while !p.done() {
            let v = wf[(p.x() - roi.xbegin) as usize]
                * hf[(p.y() - roi.ybegin) as usize]
                * df[(p.z() - roi.zbegin) as usize];
            p.set(0, v);
            p.advance();
        }
    } else {
        let v = if normalize { 1.0 / (w * h * d) as f32 } else { 1.0 };
        while !p.done() {
            p.set(0, v);
            p.advance();
        }
        return Err(Error::UnknownKernel(name.to_string()));
    }

    let sum: f32 = dst.pixels().to_f32_vec().iter().sum();
    if normalize && sum != 0.0 {
        let mut p = IterMut::<f32>::new(dst, roi);
        while !p.done() {
            let v = p.get(0) / sum;
            p.set(0, v);
            p.advance();
        }
    }
    Ok(())
}

/// Sharpens `src` into a new image; see [`unsharp_mask_into`].
pub fn unsharp_mask(src: &ImageBuf, kernel: &str, width: f32, contrast: f32, threshold: f32) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    unsharp_mask_into(&mut dst, src, kernel, width, contrast, threshold, None, 0);
    dst
}

/// Unsharp mask: `dst = src + contrast * (src - blur(src))`.
///
/// The blur is a normalized convolution with `make_kernel(kernel, width,
/// width)`. When `threshold > 0`, differences with magnitude below it are
/// dropped before scaling. Channel counts must match; volumes are
/// rejected.
#[allow(clippy::too_many_arguments)]
pub fn unsharp_mask_into(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    kernel: &str,
    width: f32,
    contrast: f32,
    threshold: f32,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> bool {
    let result = unsharp_mask_impl(dst, src, kernel, width, contrast, threshold, roi, nthreads);
    finish(dst, "unsharp_mask", result)
}

#[allow(clippy::too_many_arguments)]
fn unsharp_mask_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    kernel: &str,
    width: f32,
    contrast: f32,
    threshold: f32,
    roi: Option<Roi3D>,
    nthreads: usize,
) -> Result<()> {
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(
        &mut roi,
        dst,
        Some(src),
        None,
        None,
        PrepFlags::REQUIRE_SAME_NCHANNELS | PrepFlags::NO_SUPPORT_VOLUME,
    )?;
    tracing::debug!(roi = %roi, kernel, width, contrast, threshold, "unsharp_mask");

    let mut k = ImageBuf::new_uninit();
    if !make_kernel_into(&mut k, kernel, width, width, 1.0, true) {
        return Err(Error::other(k.geterror()));
    }

    let mut spec = src.spec().clone();
    spec.set_format(DataFormat::F32);
    let mut blurry = ImageBuf::new(spec.clone(), InitializePixels::Yes);
    if !convolve_into(&mut blurry, src, &k, true, Some(roi), nthreads) {
        return Err(Error::other(blurry.geterror()));
    }

    let mut diff = ImageBuf::new(spec, InitializePixels::Yes);
    if !sub_into(&mut diff, src, &blurry, Some(roi), nthreads) {
        return Err(Error::other(diff.geterror()));
    }
    let diff_roi = roi_intersection(&roi, &diff.roi());
    parallel_image(&mut diff, diff_roi, nthreads, |tile, r| {
        threshold_and_scale(tile, threshold, contrast, r)
    })?;

    if !add_into(dst, src, &diff, Some(roi), nthreads) {
        return Err(Error::other(dst.geterror()));
    }
    Ok(())
}

/// Zeroes values with magnitude below `threshold` (when positive), then
/// scales by `contrast`. `buf` is float.
fn threshold_and_scale(buf: &mut ImageBuf, threshold: f32, contrast: f32, roi: Roi3D) -> Result<()> {
    let mut p = IterMut::<f32>::new(buf, roi);
    while !p.done() {
        for c in roi.chbegin..roi.chend {
            let c = c as usize;
            let v = p.get(c);
            let v = if threshold > 0.0 && v.abs() < threshold { 0.0 } else { v };
            p.set(c, v * contrast);
        }
        p.advance();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebufalgo::{checker, fill};
    use approx::assert_abs_diff_eq;

    fn impulse(w: u32, h: u32, x: i32, y: i32) -> ImageBuf {
        let mut buf = ImageBuf::new(ImageSpec::new(w, h, 1, DataFormat::F32), InitializePixels::Yes);
        buf.setpixel(x, y, 0, &[1.0]);
        buf
    }

    #[test]
    fn kernel_is_odd_and_centred() {
        let k = make_kernel("gaussian", 4.0, 2.5, 1.0, true);
        assert_eq!(k.roi(), Roi3D::new(-2, 3, -1, 2, 0, 1, 0, 1));
        assert_eq!(k.roi_full(), k.roi());
        let sum: f32 = k.pixels().to_f32_vec().iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
        let centre = k.getchannel(0, 0, 0, 0, WrapMode::Black);
        assert!(centre > k.getchannel(1, 0, 0, 0, WrapMode::Black));
        assert_eq!(k.getchannel(-1, 0, 0, 0, WrapMode::Black), k.getchannel(1, 0, 0, 0, WrapMode::Black));
    }

    #[test]
    fn binomial_kernel() {
        let k = make_kernel("binomial", 5.0, 3.0, 1.0, false);
        let row: Vec<f32> = (-2..=2).map(|x| k.getchannel(x, -1, 0, 0, WrapMode::Black)).collect();
        assert_eq!(row, vec![1.0, 4.0, 6.0, 4.0, 1.0]);
        assert_eq!(k.getchannel(0, 0, 0, 0, WrapMode::Black), 12.0);
    }

    #[test]
    fn unknown_kernel_is_a_box() {
        let mut k = ImageBuf::new_uninit();
        assert!(!make_kernel_into(&mut k, "wobble", 3.0, 3.0, 1.0, true));
        assert_eq!(k.geterror(), "Unknown kernel \"wobble\"");
        assert_abs_diff_eq!(k.getchannel(1, 1, 0, 0, WrapMode::Black), 1.0 / 9.0, epsilon = 1e-7);
    }

    #[test]
    fn convolve_impulse_reproduces_kernel() {
        let src = impulse(7, 7, 3, 3);
        let k = make_kernel("binomial", 3.0, 3.0, 1.0, false);
        let out = convolve(&src, &k, false);
        // Taps read src(x + kx), so the impulse comes back mirrored.
        assert_eq!(out.getchannel(3, 3, 0, 0, WrapMode::Black), 4.0);
        assert_eq!(out.getchannel(2, 3, 0, 0, WrapMode::Black), 2.0);
        assert_eq!(out.getchannel(2, 2, 0, 0, WrapMode::Black), 1.0);
        assert_eq!(out.getchannel(0, 0, 0, 0, WrapMode::Black), 0.0);
    }

    #[test]
    fn normalized_blur_keeps_constant() {
        let src = fill(&[0.25, 0.75], Roi3D::new(0, 6, 0, 5, 0, 1, 0, 2));
        let k = make_kernel("gaussian", 5.0, 5.0, 1.0, false);
        let out = convolve(&src, &k, true);
        // Clamped lookups keep the border constant too.
        for (x, y) in [(0, 0), (5, 4), (3, 2)] {
            assert_abs_diff_eq!(out.getchannel(x, y, 0, 0, WrapMode::Black), 0.25, epsilon = 1e-5);
            assert_abs_diff_eq!(out.getchannel(x, y, 0, 1, WrapMode::Black), 0.75, epsilon = 1e-5);
        }
    }

    #[test]
    fn zero_sum_kernel_is_not_normalized() {
        let mut src = ImageBuf::new(ImageSpec::new(6, 1, 1, DataFormat::F32), InitializePixels::Yes);
        for x in 0..6 {
            src.setpixel(x, 0, 0, &[(x * x) as f32]);
        }
        let kroi = Roi3D::new(-1, 2, 0, 1, 0, 1, 0, 1);
        let mut k = ImageBuf::new(ImageSpec::from_roi(&kroi, DataFormat::F32), InitializePixels::Yes);
        for (x, w) in [(-1, 1.0), (0, -2.0), (1, 1.0)] {
            k.setpixel(x, 0, 0, &[w]);
        }
        let plain = convolve(&src, &k, false);
        let normalized = convolve(&src, &k, true);
        for x in 0..6 {
            let v = normalized.getchannel(x, 0, 0, 0, WrapMode::Black);
            assert!(v.is_finite());
            assert_eq!(v, plain.getchannel(x, 0, 0, 0, WrapMode::Black));
        }
        // Second difference of x^2 away from the clamped edges.
        assert_eq!(normalized.getchannel(2, 0, 0, 0, WrapMode::Black), 2.0);
    }

    #[test]
    fn convolve_channel_mismatch() {
        let src = fill(&[1.0, 1.0], Roi3D::new(0, 2, 0, 2, 0, 1, 0, 2));
        let k = make_kernel("box", 1.0, 1.0, 1.0, true);
        let mut dst = ImageBuf::new(ImageSpec::new(2, 2, 3, DataFormat::F32), InitializePixels::Yes);
        assert!(!convolve_into(&mut dst, &src, &k, true, None, 1));
        assert_eq!(dst.geterror(), "channel number mismatch: 3 vs. 2");
    }

    #[test]
    fn unsharp_flat_image_is_unchanged() {
        let src = fill(&[0.5], Roi3D::new(0, 8, 0, 8, 0, 1, 0, 1));
        let out = unsharp_mask(&src, "gaussian", 3.0, 1.0, 0.0);
        assert_abs_diff_eq!(out.getchannel(4, 4, 0, 0, WrapMode::Black), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn unsharp_boosts_edges() {
        let roi = Roi3D::new(0, 8, 0, 8, 0, 1, 0, 1);
        let src = checker((4, 8, 1), &[0.25], &[0.75], (0, 0, 0), roi);
        let out = unsharp_mask(&src, "gaussian", 3.0, 1.0, 0.0);
        assert!(out.getchannel(3, 4, 0, 0, WrapMode::Black) < 0.25);
        assert!(out.getchannel(4, 4, 0, 0, WrapMode::Black) > 0.75);
        // Far from the edge nothing changes.
        assert_abs_diff_eq!(out.getchannel(0, 4, 0, 0, WrapMode::Black), 0.25, epsilon = 1e-5);

        let gated = unsharp_mask(&src, "gaussian", 3.0, 1.0, 1.0);
        assert_abs_diff_eq!(gated.getchannel(3, 4, 0, 0, WrapMode::Black), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn unsharp_unknown_kernel() {
        let src = fill(&[0.5], Roi3D::new(0, 4, 0, 4, 0, 1, 0, 1));
        let mut dst = ImageBuf::new_uninit();
        assert!(!unsharp_mask_into(&mut dst, &src, "wobble", 3.0, 1.0, 0.0, None, 1));
        assert_eq!(dst.geterror(), "Unknown kernel \"wobble\"");
    }
}
