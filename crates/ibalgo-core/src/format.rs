//! Pixel data formats.
//!
//! [`DataFormat`] is the per-image (or per-channel) numeric encoding of
//! pixel values. Every format converts to and from `f32`; algorithms work in
//! float and store back in the buffer's native format.
//!
//! # Usage
//!
//! ```rust
//! use ibalgo_core::DataFormat;
//!
//! let fmt = DataFormat::F16;
//! assert_eq!(fmt.bytes_per_channel(), 2);
//! assert!(fmt.is_float());
//! assert_eq!(DataFormat::U8.to_string(), "uint8");
//! ```

/// Runtime pixel data format.
///
/// Represents the storage type of one channel value in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataFormat {
    /// 8-bit unsigned integer, normalized to [0, 1].
    U8,
    /// 16-bit unsigned integer, normalized to [0, 1].
    U16,
    /// 32-bit unsigned integer, normalized to [0, 1].
    U32,
    /// 16-bit half-precision float.
    F16,
    /// 32-bit single-precision float.
    #[default]
    F32,
}

impl DataFormat {
    /// Number of bytes per channel.
    #[inline]
    pub const fn bytes_per_channel(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::F16 => 2,
            Self::F32 => 4,
        }
    }

    /// Whether this is a floating-point format.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Short name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::F16 => "half",
            Self::F32 => "float",
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_channel() {
        assert_eq!(DataFormat::U8.bytes_per_channel(), 1);
        assert_eq!(DataFormat::U16.bytes_per_channel(), 2);
        assert_eq!(DataFormat::F16.bytes_per_channel(), 2);
        assert_eq!(DataFormat::F32.bytes_per_channel(), 4);
    }

    #[test]
    fn test_is_float() {
        assert!(!DataFormat::U8.is_float());
        assert!(!DataFormat::U32.is_float());
        assert!(DataFormat::F16.is_float());
        assert!(DataFormat::F32.is_float());
    }

    #[test]
    fn test_names() {
        let all = [DataFormat::U8, DataFormat::U16, DataFormat::U32, DataFormat::F16, DataFormat::F32];
        let names: Vec<_> = all.iter().map(DataFormat::to_string).collect();
        assert_eq!(names, ["uint8", "uint16", "uint32", "half", "float"]);
    }
}
