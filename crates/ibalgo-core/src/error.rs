//! Error types for image buffer algorithms.
//!
//! # Overview
//!
//! The [`Error`] enum covers every failure an algorithm can report:
//! - Precondition failures (uninitialized inputs, missing alpha or depth,
//!   channel-count mismatch, volumes where only 2D is supported)
//! - Resource failures (unknown filter or kernel name, missing font)
//! - Image cache and I/O failures
//!
//! The `Display` text of each variant is the message an algorithm stores in
//! its destination buffer's error slot, so callers can match on text or on
//! the variant.
//!
//! # Usage
//!
//! ```rust
//! use ibalgo_core::{Error, Result};
//!
//! fn check_channels(a: u32, b: u32) -> Result<()> {
//!     if a != b {
//!         return Err(Error::ChannelMismatch { a, b });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_channels(3, 4).unwrap_err();
//! assert_eq!(err.to_string(), "channel number mismatch: 3 vs. 4");
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or running an image algorithm.
#[derive(Debug, Error)]
pub enum Error {
    /// A source image has no pixels attached.
    #[error("Uninitialized input image")]
    UninitializedInput,

    /// An operation that needs an alpha channel got an image without one.
    #[error("images must have alpha channels")]
    RequireAlpha,

    /// An operation that needs a depth channel got an image without one.
    #[error("images must have depth channels")]
    RequireZ,

    /// Images that must agree on channel count do not.
    #[error("images must have the same number of channels")]
    RequireSameChannels,

    /// Explicit channel-count mismatch between two images.
    #[error("channel number mismatch: {a} vs. {b}")]
    ChannelMismatch {
        /// First image channel count
        a: u32,
        /// Second image channel count
        b: u32,
    },

    /// A 3D image was passed to a 2D-only operation.
    #[error("volumes not supported")]
    VolumeNotSupported,

    /// A 3D image was passed to a named 2D-only operation.
    #[error("{op} does not support volume images")]
    VolumeNotSupportedBy {
        /// Operation name
        op: String,
    },

    /// An operation that works on complex (two-channel) data got
    /// something else.
    #[error("{op} can only be done on 2-channel images")]
    RequireTwoChannels {
        /// Operation name
        op: String,
    },

    /// `ifft` input must be two float channels.
    #[error("ifft can only be done on 2-channel float images")]
    RequireComplexFloat,

    /// A filter name was not found in the registry.
    #[error("Filter \"{0}\" not recognized")]
    UnknownFilter(String),

    /// A kernel name was not recognized by `make_kernel`.
    #[error("Unknown kernel \"{0}\"")]
    UnknownKernel(String),

    /// A warp matrix cannot be inverted.
    #[error("singular transformation matrix")]
    SingularMatrix,

    /// Push-pull hole filling needs an alpha channel.
    #[error("Must have alpha channels")]
    MissingAlpha,

    /// No default font could be located.
    #[error("Could not set default font face")]
    DefaultFontNotFound,

    /// The named font could not be located or loaded.
    #[error("Could not set font face to \"{0}\"")]
    FontNotFound(String),

    /// The text rasterizer failed earlier and is unusable.
    #[error("Could not initialize text rendering")]
    TextRendererBroken,

    /// Built without the `text` feature.
    #[error("not compiled with text rendering support")]
    TextNotSupported,

    /// The destination format cannot be written by this operation.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// A region does not describe any pixels of the image.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// The image cache could not supply an image.
    #[error("image cache: {0}")]
    Cache(String),

    /// I/O error (font files, cache backing files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::ChannelMismatch`] error.
    #[inline]
    pub fn channel_mismatch(a: u32, b: u32) -> Self {
        Self::ChannelMismatch { a, b }
    }

    /// Creates an [`Error::VolumeNotSupportedBy`] error.
    #[inline]
    pub fn volume_not_supported_by(op: impl Into<String>) -> Self {
        Self::VolumeNotSupportedBy { op: op.into() }
    }

    /// Creates an [`Error::RequireTwoChannels`] error.
    #[inline]
    pub fn require_two_channels(op: impl Into<String>) -> Self {
        Self::RequireTwoChannels { op: op.into() }
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` for failed input preconditions (as opposed to
    /// missing resources).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::UninitializedInput
                | Self::RequireAlpha
                | Self::RequireZ
                | Self::RequireSameChannels
                | Self::ChannelMismatch { .. }
                | Self::VolumeNotSupported
                | Self::VolumeNotSupportedBy { .. }
                | Self::RequireTwoChannels { .. }
                | Self::RequireComplexFloat
                | Self::MissingAlpha
        )
    }
}
