//! # ibalgo
//!
//! In-memory image buffers and the core ImageBufAlgo operations of
//! OpenImageIO.
//!
//! - [`imagebuf`] - [`ImageBuf`](imagebuf::ImageBuf): storage, wrap modes,
//!   typed iterators
//! - [`imagebufalgo`] - the algorithms: resize and resample, warp and
//!   rotate, convolution and unsharp mask, FFT and polar conversions,
//!   push-pull hole filling, text rendering
//! - [`cache`] - the image cache that backs read-only buffers
//! - [`config`] - process-wide settings (thread count, parallel threshold)
//!
//! # Quick Start
//!
//! ```
//! use ibalgo::prelude::*;
//!
//! let spec = ImageSpec::new(64, 64, 3, DataFormat::F32);
//! let src = fill(&[0.5, 0.25, 1.0], Roi3D::new(0, 64, 0, 64, 0, 1, 0, 3));
//!
//! // Filtered downsize
//! let small = resize_by_name(&src, "lanczos3", 0.0, 16, 16);
//! assert_eq!((small.width(), small.height()), (16, 16));
//!
//! // Blur with a normalized gaussian
//! let k = make_kernel("gaussian", 5.0, 5.0, 1.0, true);
//! let soft = convolve(&src, &k, true);
//! assert_eq!(soft.spec().width, spec.width);
//! ```
//!
//! # Errors
//!
//! Algorithms writing into a caller-supplied buffer return `false` on
//! failure and leave the message in the buffer, retrievable with
//! [`ImageBuf::geterror`](imagebuf::ImageBuf::geterror). Failures are also
//! logged through `tracing` at `warn` level.
//!
//! # Feature Flags
//!
//! - `text` - glyph rasterization for
//!   [`render_text`](imagebufalgo::render_text) (cosmic-text)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod config;
pub mod imagebuf;
pub mod imagebufalgo;

/// Prelude module for convenient imports.
///
/// ```
/// use ibalgo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{ImageCache, MemoryCache};
    pub use crate::imagebuf::{ImageBuf, InitializePixels, WrapMode};
    pub use crate::imagebufalgo::*;
    pub use ibalgo_core::prelude::*;
}
