//! Typed pixel values for ImageBuf.
//!
//! [`Pixel`] ties a Rust channel type to its [`DataFormat`] and converts it
//! to and from the `f32` working space of the algorithms. Integer types are
//! normalized to [0, 1].

use half::f16;
use ibalgo_core::DataFormat;

use super::storage::PixelData;

/// A channel value type an ImageBuf can store.
pub trait Pixel: Copy + Default + Send + Sync + 'static {
    /// Storage format of this type.
    const FORMAT: DataFormat;

    /// Converts to f32.
    fn to_f32(self) -> f32;

    /// Converts from f32, clamping and rounding for integer types.
    fn from_f32(v: f32) -> Self;

    /// Borrows the typed slice if `data` holds this type.
    fn slice(data: &PixelData) -> Option<&[Self]>;

    /// Mutably borrows the typed slice if `data` holds this type.
    fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]>;
}

macro_rules! impl_pixel_uint {
    ($ty:ty, $variant:ident) => {
        impl Pixel for $ty {
            const FORMAT: DataFormat = DataFormat::$variant;

            #[inline]
            fn to_f32(self) -> f32 {
                (self as f64 / <$ty>::MAX as f64) as f32
            }

            #[inline]
            fn from_f32(v: f32) -> Self {
                (v.clamp(0.0, 1.0) as f64 * <$ty>::MAX as f64).round() as $ty
            }

            #[inline]
            fn slice(data: &PixelData) -> Option<&[Self]> {
                match data {
                    PixelData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            #[inline]
            fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]> {
                match data {
                    PixelData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_pixel_uint!(u8, U8);
impl_pixel_uint!(u16, U16);
impl_pixel_uint!(u32, U32);

impl Pixel for f16 {
    const FORMAT: DataFormat = DataFormat::F16;

    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }

    #[inline]
    fn slice(data: &PixelData) -> Option<&[Self]> {
        match data {
            PixelData::F16(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]> {
        match data {
            PixelData::F16(v) => Some(v),
            _ => None,
        }
    }
}

impl Pixel for f32 {
    const FORMAT: DataFormat = DataFormat::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline]
    fn slice(data: &PixelData) -> Option<&[Self]> {
        match data {
            PixelData::F32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]> {
        match data {
            PixelData::F32(v) => Some(v),
            _ => None,
        }
    }
}

/// Linear interpolation between two values.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Bilinear interpolation.
#[inline]
pub fn bilerp(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = lerp(v00, v10, fx);
    let bot = lerp(v01, v11, fx);
    lerp(top, bot, fy)
}

/// Splits `x` into its floor and the fractional remainder.
#[inline]
pub fn floorfrac(x: f32) -> (i32, f32) {
    let f = x.floor();
    (f as i32, x - f)
}
