//! Discrete Fourier transforms and complex pixel conversions.
//!
//! Complex images are 2-channel float images with channels `real` and
//! `imag`. Both directions are unitary: every 1D pass is scaled by
//! `1/sqrt(N)`, so [`ifft`] of [`fft`] returns the input.
//!
//! The 2D transform runs the rows through `rustfft`, transposes, runs the
//! former columns as rows and transposes back.

use std::sync::Arc;

use ibalgo_core::{roi_union, DataFormat, Error, ImageSpec, Result, Roi3D};
use num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

use super::finish;
use super::geometry::{paste, transpose_into};
use super::parallel::{parallel_image, parallel_image_split, SplitAxis};
use super::prep::{apply_metadata_policy, prep, PrepFlags};
use crate::imagebuf::{ConstIter, ImageBuf, InitializePixels, IterMut, Pixel, WrapMode};

/// Spec of a `width x height` complex image at the origin, carrying the
/// metadata of `src` minus its pixel hashes.
fn complex_spec(src: &ImageBuf, width: u32, height: u32) -> ImageSpec {
    let mut spec = src.spec().clone();
    apply_metadata_policy(&mut spec, PrepFlags::NONE);
    spec.x = 0;
    spec.y = 0;
    spec.z = 0;
    spec.full_x = 0;
    spec.full_y = 0;
    spec.full_z = 0;
    spec.width = width;
    spec.height = height;
    spec.depth = 1;
    spec.full_width = width;
    spec.full_height = height;
    spec.full_depth = 1;
    spec.tile_width = 0;
    spec.tile_height = 0;
    spec.tile_depth = 0;
    spec.set_format(DataFormat::F32);
    spec.nchannels = 2;
    spec.channelnames = vec!["real".into(), "imag".into()];
    spec.alpha_channel = -1;
    spec.z_channel = -1;
    spec
}

/// Transforms every row of `src` into the same row of `dst`. Both are
/// 2-channel float images with the same pixel window.
fn hfft(dst: &mut ImageBuf, src: &ImageBuf, direction: FftDirection, nthreads: usize) -> Result<()> {
    let roi = dst.roi();
    let width = roi.width().max(0) as usize;
    if width == 0 {
        return Ok(());
    }
    let plan: Arc<dyn Fft<f32>> = FftPlanner::<f32>::new().plan_fft(width, direction);
    let rescale = (1.0 / width as f32).sqrt();
    parallel_image_split(dst, roi, nthreads, Some(SplitAxis::Y), |tile, r| {
        hfft_rows(tile, src, plan.as_ref(), rescale, r)
    })
}

fn hfft_rows(dst: &mut ImageBuf, src: &ImageBuf, plan: &dyn Fft<f32>, rescale: f32, roi: Roi3D) -> Result<()> {
    let s = f32::slice(src.pixels()).ok_or_else(|| Error::UnsupportedFormat(src.format().to_string()))?;
    let width = roi.width().max(0) as usize;
    let mut row = vec![Complex::<f32>::default(); width];
    let mut scratch = vec![Complex::<f32>::default(); plan.get_inplace_scratch_len()];
    for z in roi.zbegin..roi.zend {
        for y in roi.ybegin..roi.yend {
            let (Some(so), Some(doff)) = (src.pixeladdr(roi.xbegin, y, z), dst.pixeladdr(roi.xbegin, y, z)) else {
                continue;
            };
            for (x, v) in row.iter_mut().enumerate() {
                *v = Complex::new(s[so + 2 * x], s[so + 2 * x + 1]);
            }
            plan.process_with_scratch(&mut row, &mut scratch);
            let format = dst.format();
            let d = f32::slice_mut(dst.pixels_mut_unchecked())
                .ok_or_else(|| Error::UnsupportedFormat(format.to_string()))?;
            for (x, v) in row.iter().enumerate() {
                d[doff + 2 * x] = v.re * rescale;
                d[doff + 2 * x + 1] = v.im * rescale;
            }
        }
    }
    Ok(())
}

/// Forward transform of `src` into a new complex image.
pub fn fft(src: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    fft_into(&mut dst, src, None, 0);
    dst
}

/// Forward unitary 2D DFT of one channel of `src`.
///
/// `roi` selects the region and the channel (`chbegin`); when undefined
/// it is the union of the pixel and display windows, channel 0. `dst` is
/// reset to a 2-channel float image of the region's size at the origin.
pub fn fft_into(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = fft_impl(dst, src, roi, nthreads);
    finish(dst, "fft", result)
}

fn fft_impl(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> Result<()> {
    if !src.initialized() {
        return Err(Error::UninitializedInput);
    }
    if src.spec().depth > 1 {
        return Err(Error::volume_not_supported_by("ImageBufAlgo::fft"));
    }
    let mut roi = roi
        .filter(Roi3D::defined)
        .unwrap_or_else(|| roi_union(&src.roi(), &src.roi_full()));
    roi.chend = roi.chbegin + 1;
    tracing::debug!(roi = %roi, "fft");

    let spec = complex_spec(src, roi.width() as u32, roi.height() as u32);
    let name = dst.name().to_string();
    dst.reset(name, &spec);

    let mut a = ImageBuf::new(spec.clone(), InitializePixels::Yes);
    if !paste(&mut a, 0, 0, 0, 0, src, Some(roi), nthreads) {
        return Err(Error::other(a.geterror()));
    }
    let b = two_passes(a, FftDirection::Forward, nthreads)?;
    if !transpose_into(dst, &b, None, nthreads) {
        return Err(Error::other(dst.geterror()));
    }
    Ok(())
}

/// Row pass, transpose, row pass. The result is still transposed.
fn two_passes(a: ImageBuf, direction: FftDirection, nthreads: usize) -> Result<ImageBuf> {
    let mut b = ImageBuf::new(a.spec().clone(), InitializePixels::Yes);
    hfft(&mut b, &a, direction, nthreads)?;
    let mut t = ImageBuf::new_uninit();
    if !transpose_into(&mut t, &b, None, nthreads) {
        return Err(Error::other(t.geterror()));
    }
    let mut b = ImageBuf::new(t.spec().clone(), InitializePixels::Yes);
    hfft(&mut b, &t, direction, nthreads)?;
    Ok(b)
}

/// Inverse transform of a complex image into a new real image.
pub fn ifft(src: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    ifft_into(&mut dst, src, None, 0);
    dst
}

/// Inverse unitary 2D DFT of a 2-channel float image.
///
/// `dst` is reset to a single float channel named `R` holding the real
/// part; the imaginary part is dropped.
pub fn ifft_into(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = ifft_impl(dst, src, roi, nthreads);
    finish(dst, "ifft", result)
}

fn ifft_impl(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> Result<()> {
    if !src.initialized() {
        return Err(Error::UninitializedInput);
    }
    if src.nchannels() != 2 || src.format() != DataFormat::F32 {
        return Err(Error::RequireComplexFloat);
    }
    if src.spec().depth > 1 {
        return Err(Error::volume_not_supported_by("ImageBufAlgo::ifft"));
    }
    let roi = roi
        .filter(Roi3D::defined)
        .unwrap_or_else(|| roi_union(&src.roi(), &src.roi_full()))
        .with_channels(0, 2);
    tracing::debug!(roi = %roi, "ifft");

    let spec = complex_spec(src, roi.width() as u32, roi.height() as u32);
    let mut a = ImageBuf::new(spec.clone(), InitializePixels::Yes);
    if !paste(&mut a, 0, 0, 0, 0, src, Some(roi), nthreads) {
        return Err(Error::other(a.geterror()));
    }
    let b = two_passes(a, FftDirection::Inverse, nthreads)?;

    let mut out = spec;
    out.nchannels = 1;
    out.channelnames = vec!["R".into()];
    let name = dst.name().to_string();
    dst.reset(name, &out);
    if !transpose_into(dst, &b, Some(b.roi().with_channels(0, 1)), nthreads) {
        return Err(Error::other(dst.geterror()));
    }
    Ok(())
}

/// Converts `(amplitude, phase)` pixels to `(real, imag)` in a new image.
pub fn polar_to_complex(src: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    polar_to_complex_into(&mut dst, src, None, 0);
    dst
}

/// Converts `(amplitude, phase)` to `(amp * cos(phase), amp * sin(phase))`.
/// Both images must have exactly 2 channels.
pub fn polar_to_complex_into(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = convert_impl(dst, src, roi, nthreads, Conversion::PolarToComplex);
    finish(dst, "polar_to_complex", result)
}

/// Converts `(real, imag)` pixels to `(amplitude, phase)` in a new image.
pub fn complex_to_polar(src: &ImageBuf) -> ImageBuf {
    let mut dst = ImageBuf::new_uninit();
    complex_to_polar_into(&mut dst, src, None, 0);
    dst
}

/// Converts `(real, imag)` to `(hypot(re, im), atan2(im, re))`, with the
/// phase in `[0, 2π)`. Both images must have exactly 2 channels.
pub fn complex_to_polar_into(dst: &mut ImageBuf, src: &ImageBuf, roi: Option<Roi3D>, nthreads: usize) -> bool {
    let result = convert_impl(dst, src, roi, nthreads, Conversion::ComplexToPolar);
    finish(dst, "complex_to_polar", result)
}

#[derive(Debug, Clone, Copy)]
enum Conversion {
    PolarToComplex,
    ComplexToPolar,
}

impl Conversion {
    fn name(self) -> &'static str {
        match self {
            Self::PolarToComplex => "polar_to_complex",
            Self::ComplexToPolar => "complex_to_polar",
        }
    }

    #[inline]
    fn apply(self, a: f32, b: f32) -> (f32, f32) {
        match self {
            Self::PolarToComplex => {
                let (sin, cos) = b.sin_cos();
                (a * cos, a * sin)
            }
            Self::ComplexToPolar => {
                let phase = b.atan2(a);
                let phase = if phase < 0.0 { phase + std::f32::consts::TAU } else { phase };
                (a.hypot(b), phase)
            }
        }
    }
}

fn convert_impl(
    dst: &mut ImageBuf,
    src: &ImageBuf,
    roi: Option<Roi3D>,
    nthreads: usize,
    conv: Conversion,
) -> Result<()> {
    if src.nchannels() != 2 {
        return Err(Error::require_two_channels(conv.name()));
    }
    let mut roi = roi.unwrap_or_else(Roi3D::all);
    prep(&mut roi, dst, Some(src), None, None, PrepFlags::NONE)?;
    if dst.nchannels() != 2 {
        return Err(Error::require_two_channels(conv.name()));
    }
    tracing::debug!(roi = %roi, op = conv.name(), "complex conversion");
    let formats = (dst.format(), src.format());
    parallel_image(dst, roi, nthreads, |tile, r| {
        dispatch_types!([formats.0, formats.1], convert_pixels, (tile, src, conv, r))
    })
}

fn convert_pixels<D: Pixel, S: Pixel>(dst: &mut ImageBuf, src: &ImageBuf, conv: Conversion, roi: Roi3D) -> Result<()> {
    let mut s = ConstIter::<S>::new(src, roi, WrapMode::Black);
    let mut d = IterMut::<D>::new(dst, roi);
    while !d.done() {
        let (r0, r1) = conv.apply(s.get(0), s.get(1));
        d.set(0, r0);
        d.set(1, r1);
        d.advance();
        s.advance();
    }
    Ok(())
}
