//! Pixel storage backends for ImageBuf.
//!
//! [`PixelData`] is a contiguous, channel-interleaved buffer in one of the
//! supported formats. Layout is `((z * height + y) * width + x) * nchannels
//! + c` relative to the pixel window origin.

use half::f16;
use ibalgo_core::DataFormat;

use super::pixels::Pixel;

/// Typed pixel storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PixelData {
    /// No pixel data.
    #[default]
    Empty,
    /// 8-bit unsigned values.
    U8(Vec<u8>),
    /// 16-bit unsigned values.
    U16(Vec<u16>),
    /// 32-bit unsigned values.
    U32(Vec<u32>),
    /// Half-float values.
    F16(Vec<f16>),
    /// Float values.
    F32(Vec<f32>),
}

impl PixelData {
    /// Allocates `len` zeroed channel values of the given format.
    pub fn allocate(format: DataFormat, len: usize) -> Self {
        match format {
            DataFormat::U8 => Self::U8(vec![0; len]),
            DataFormat::U16 => Self::U16(vec![0; len]),
            DataFormat::U32 => Self::U32(vec![0; len]),
            DataFormat::F16 => Self::F16(vec![f16::ZERO; len]),
            DataFormat::F32 => Self::F32(vec![0.0; len]),
        }
    }

    /// Builds storage of `format` from float values.
    pub fn from_f32_slice(format: DataFormat, values: &[f32]) -> Self {
        fn conv<T: Pixel>(values: &[f32]) -> Vec<T> {
            values.iter().map(|&v| T::from_f32(v)).collect()
        }
        match format {
            DataFormat::U8 => Self::U8(conv(values)),
            DataFormat::U16 => Self::U16(conv(values)),
            DataFormat::U32 => Self::U32(conv(values)),
            DataFormat::F16 => Self::F16(conv(values)),
            DataFormat::F32 => Self::F32(values.to_vec()),
        }
    }

    /// Format of the stored values, `None` when empty.
    pub fn format(&self) -> Option<DataFormat> {
        match self {
            Self::Empty => None,
            Self::U8(_) => Some(DataFormat::U8),
            Self::U16(_) => Some(DataFormat::U16),
            Self::U32(_) => Some(DataFormat::U32),
            Self::F16(_) => Some(DataFormat::F16),
            Self::F32(_) => Some(DataFormat::F32),
        }
    }

    /// Number of channel values.
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F16(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    /// Returns true if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one value as float; out-of-range indices read 0.
    #[inline]
    pub fn get(&self, idx: usize) -> f32 {
        fn at<T: Pixel>(v: &[T], idx: usize) -> f32 {
            v.get(idx).map_or(0.0, |p| p.to_f32())
        }
        match self {
            Self::Empty => 0.0,
            Self::U8(v) => at(v, idx),
            Self::U16(v) => at(v, idx),
            Self::U32(v) => at(v, idx),
            Self::F16(v) => at(v, idx),
            Self::F32(v) => at(v, idx),
        }
    }

    /// Writes one value; out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, idx: usize, value: f32) {
        fn put<T: Pixel>(v: &mut [T], idx: usize, value: f32) {
            if let Some(p) = v.get_mut(idx) {
                *p = T::from_f32(value);
            }
        }
        match self {
            Self::Empty => {}
            Self::U8(v) => put(v, idx, value),
            Self::U16(v) => put(v, idx, value),
            Self::U32(v) => put(v, idx, value),
            Self::F16(v) => put(v, idx, value),
            Self::F32(v) => put(v, idx, value),
        }
    }

    /// Copies `len` raw values from `src` without conversion.
    ///
    /// Returns false if the formats differ or a range is out of bounds.
    pub fn copy_span(&mut self, dst_off: usize, src: &PixelData, src_off: usize, len: usize) -> bool {
        fn span<T: Copy>(d: &mut [T], doff: usize, s: &[T], soff: usize, len: usize) -> bool {
            match (d.get_mut(doff..doff + len), s.get(soff..soff + len)) {
                (Some(d), Some(s)) => {
                    d.copy_from_slice(s);
                    true
                }
                _ => false,
            }
        }
        match (self, src) {
            (Self::U8(d), Self::U8(s)) => span(d, dst_off, s, src_off, len),
            (Self::U16(d), Self::U16(s)) => span(d, dst_off, s, src_off, len),
            (Self::U32(d), Self::U32(s)) => span(d, dst_off, s, src_off, len),
            (Self::F16(d), Self::F16(s)) => span(d, dst_off, s, src_off, len),
            (Self::F32(d), Self::F32(s)) => span(d, dst_off, s, src_off, len),
            _ => len == 0,
        }
    }

    /// Converts every value to float.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Returns a copy converted to another format.
    pub fn convert_to(&self, format: DataFormat) -> PixelData {
        if self.format() == Some(format) {
            return self.clone();
        }
        Self::from_f32_slice(format, &self.to_f32_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_access() {
        let mut data = PixelData::allocate(DataFormat::U8, 6);
        assert_eq!(data.len(), 6);
        assert_eq!(data.format(), Some(DataFormat::U8));
        data.set(2, 1.0);
        assert_eq!(data.get(2), 1.0);
        assert_eq!(data.get(100), 0.0);
        data.set(100, 1.0);
    }

    #[test]
    fn test_copy_span_same_format() {
        let src = PixelData::from_f32_slice(DataFormat::F32, &[1.0, 2.0, 3.0, 4.0]);
        let mut dst = PixelData::allocate(DataFormat::F32, 4);
        assert!(dst.copy_span(1, &src, 2, 2));
        assert_eq!(dst.to_f32_vec(), vec![0.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_copy_span_rejects_mismatch() {
        let src = PixelData::from_f32_slice(DataFormat::F32, &[1.0, 2.0]);
        let mut dst = PixelData::allocate(DataFormat::U8, 2);
        assert!(!dst.copy_span(0, &src, 0, 2));
        assert!(!PixelData::allocate(DataFormat::F32, 2).copy_span(1, &src, 0, 2));
    }

    #[test]
    fn test_convert_to() {
        let src = PixelData::from_f32_slice(DataFormat::F32, &[0.0, 0.5, 1.0]);
        let u16s = src.convert_to(DataFormat::U16);
        assert_eq!(u16s.format(), Some(DataFormat::U16));
        assert!((u16s.get(1) - 0.5).abs() < 1e-4);
    }
}
