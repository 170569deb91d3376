//! # ibalgo-core
//!
//! Core types shared by the image buffer algorithms.
//!
//! - [`DataFormat`] - Numeric encoding of channel values
//! - [`Roi3D`] - Region of interest over `(x, y, z, channel)`
//! - [`ImageSpec`] - Geometry, channel layout and metadata
//! - [`Error`] / [`Result`] - Crate-wide error type
//!
//! ## Crate Structure
//!
//! This crate has no internal dependencies. `ibalgo` builds the pixel
//! buffer and the algorithms on top of it:
//!
//! ```text
//! ibalgo-core (this crate)
//!    ^
//!    |
//!    +-- ibalgo (ImageBuf, ImageBufAlgo)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod format;
pub mod rect;
pub mod spec;

// Re-exports for convenience
pub use error::*;
pub use format::*;
pub use rect::*;
pub use spec::*;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use ibalgo_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::format::DataFormat;
    pub use crate::rect::{roi_intersection, roi_union, Roi3D};
    pub use crate::spec::{AttrValue, ImageSpec};
}
