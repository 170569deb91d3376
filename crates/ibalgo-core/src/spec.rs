//! Image specification and metadata.
//!
//! This module provides [`ImageSpec`], the "header" for image data: pixel
//! window, display window, tiling, channel layout, pixel format, and a free
//! form attribute bag.
//!
//! # Display vs Pixel Window
//!
//! The pixel window `(x, y, z, width, height, depth)` is where pixel data
//! lives. The display (full) window `(full_x, ..., full_depth)` is the
//! nominal frame, possibly larger or offset. Resizing maps display window to
//! display window.
//!
//! ```text
//! ┌─────────────────────────────┐
//! │        Display Window       │
//! │   ┌───────────────────┐     │
//! │   │   Pixel Window    │     │
//! │   │  (actual pixels)  │     │
//! │   └───────────────────┘     │
//! │                             │
//! └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use ibalgo_core::{DataFormat, ImageSpec};
//!
//! let mut spec = ImageSpec::new(1920, 1080, 4, DataFormat::F16);
//! assert_eq!(spec.channelnames, ["R", "G", "B", "A"]);
//! assert_eq!(spec.alpha_channel, 3);
//!
//! spec.set_attr("ImageDescription", "plate");
//! assert_eq!(spec.get_string("ImageDescription"), Some("plate"));
//! ```

use crate::format::DataFormat;
use crate::rect::Roi3D;
use std::collections::HashMap;

/// Attribute value that can be stored in image metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Integer array
    IntArray(Vec<i64>),
    /// Float array
    FloatArray(Vec<f64>),
}

impl AttrValue {
    /// Returns this value as an integer, if applicable.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns this value as a float, if applicable.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as a string, if applicable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatArray(v)
    }
}

/// Geometry, channel layout and metadata of an image.
///
/// Field names follow the conventions of the OpenImageIO `ImageSpec`, so
/// `x`/`y`/`z` are the pixel window origin and `full_*` the display window.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    /// Pixel window origin, x
    pub x: i32,
    /// Pixel window origin, y
    pub y: i32,
    /// Pixel window origin, z
    pub z: i32,
    /// Pixel window width
    pub width: u32,
    /// Pixel window height
    pub height: u32,
    /// Pixel window depth (1 for 2D images)
    pub depth: u32,
    /// Display window origin, x
    pub full_x: i32,
    /// Display window origin, y
    pub full_y: i32,
    /// Display window origin, z
    pub full_z: i32,
    /// Display window width
    pub full_width: u32,
    /// Display window height
    pub full_height: u32,
    /// Display window depth
    pub full_depth: u32,
    /// Tile width (0 for scanline images)
    pub tile_width: u32,
    /// Tile height (0 for scanline images)
    pub tile_height: u32,
    /// Tile depth (0 for scanline images)
    pub tile_depth: u32,
    /// Number of channels per pixel
    pub nchannels: u32,
    /// Pixel format of every channel, unless `channelformats` overrides it
    pub format: DataFormat,
    /// Optional per-channel formats (empty when all match `format`)
    pub channelformats: Vec<DataFormat>,
    /// Channel names
    pub channelnames: Vec<String>,
    /// Index of the alpha channel, or -1
    pub alpha_channel: i32,
    /// Index of the depth channel, or -1
    pub z_channel: i32,
    /// Arbitrary metadata attributes
    pub attributes: HashMap<String, AttrValue>,
}

impl ImageSpec {
    /// Creates a 2D spec with origin (0, 0) and both windows equal.
    ///
    /// Channels get default names (see [`ImageSpec::default_channel_names`]).
    pub fn new(width: u32, height: u32, nchannels: u32, format: DataFormat) -> Self {
        let mut spec = Self {
            x: 0,
            y: 0,
            z: 0,
            width,
            height,
            depth: 1,
            full_x: 0,
            full_y: 0,
            full_z: 0,
            full_width: width,
            full_height: height,
            full_depth: 1,
            tile_width: 0,
            tile_height: 0,
            tile_depth: 0,
            nchannels,
            format,
            channelformats: Vec::new(),
            channelnames: Vec::new(),
            alpha_channel: -1,
            z_channel: -1,
            attributes: HashMap::new(),
        };
        spec.default_channel_names();
        spec
    }

    /// Creates a spec whose pixel and display windows are `roi`, with
    /// `roi.nchannels()` channels.
    pub fn from_roi(roi: &Roi3D, format: DataFormat) -> Self {
        let mut spec = Self::new(0, 0, roi.nchannels().max(0) as u32, format);
        spec.set_roi(roi);
        spec.set_roi_full(roi);
        spec
    }

    /// Names the channels `R, G, B, A, channel4, ...` (a lone channel is
    /// `Y`) and resets the alpha and depth indices to match.
    pub fn default_channel_names(&mut self) {
        self.alpha_channel = -1;
        self.z_channel = -1;
        self.channelnames.clear();
        if self.nchannels == 1 {
            self.channelnames.push("Y".into());
            return;
        }
        for c in 0..self.nchannels {
            let name = match c {
                0 => "R".to_string(),
                1 => "G".to_string(),
                2 => "B".to_string(),
                3 => "A".to_string(),
                n => format!("channel{n}"),
            };
            self.channelnames.push(name);
        }
        if self.nchannels >= 4 {
            self.alpha_channel = 3;
        }
    }

    /// Sets the pixel format of all channels and drops per-channel formats.
    pub fn set_format(&mut self, format: DataFormat) {
        self.format = format;
        self.channelformats.clear();
    }

    /// Format of channel `c`.
    pub fn channelformat(&self, c: usize) -> DataFormat {
        self.channelformats.get(c).copied().unwrap_or(self.format)
    }

    /// Name of channel `c`, or an empty string.
    pub fn channel_name(&self, c: usize) -> &str {
        self.channelnames.get(c).map(String::as_str).unwrap_or("")
    }

    /// The pixel window as a ROI over all channels.
    pub fn roi(&self) -> Roi3D {
        Roi3D::new(
            self.x,
            self.x + self.width as i32,
            self.y,
            self.y + self.height as i32,
            self.z,
            self.z + self.depth as i32,
            0,
            self.nchannels as i32,
        )
    }

    /// The display window as a ROI over all channels.
    pub fn roi_full(&self) -> Roi3D {
        Roi3D::new(
            self.full_x,
            self.full_x + self.full_width as i32,
            self.full_y,
            self.full_y + self.full_height as i32,
            self.full_z,
            self.full_z + self.full_depth as i32,
            0,
            self.nchannels as i32,
        )
    }

    /// Sets the pixel window from a ROI. Channels are left unchanged.
    pub fn set_roi(&mut self, roi: &Roi3D) {
        self.x = roi.xbegin;
        self.y = roi.ybegin;
        self.z = roi.zbegin;
        self.width = roi.width().max(0) as u32;
        self.height = roi.height().max(0) as u32;
        self.depth = roi.depth().max(0) as u32;
    }

    /// Sets the display window from a ROI. Channels are left unchanged.
    pub fn set_roi_full(&mut self, roi: &Roi3D) {
        self.full_x = roi.xbegin;
        self.full_y = roi.ybegin;
        self.full_z = roi.zbegin;
        self.full_width = roi.width().max(0) as u32;
        self.full_height = roi.height().max(0) as u32;
        self.full_depth = roi.depth().max(0) as u32;
    }

    /// Number of pixels in the pixel window.
    #[inline]
    pub fn image_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }

    /// Number of channel values in the pixel window.
    #[inline]
    pub fn image_values(&self) -> usize {
        self.image_pixels() as usize * self.nchannels as usize
    }

    /// Bytes per pixel in the native format.
    #[inline]
    pub fn pixel_bytes(&self) -> usize {
        (0..self.nchannels as usize)
            .map(|c| self.channelformat(c).bytes_per_channel())
            .sum()
    }

    /// Returns `true` if this is a volumetric image.
    #[inline]
    pub fn is_volume(&self) -> bool {
        self.depth > 1
    }

    /// Returns `true` if the image is tiled.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.tile_width > 0 && self.tile_height > 0
    }

    /// Sets an attribute value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Gets an attribute value by key.
    pub fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Gets an attribute as a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get_attr(key).and_then(|v| v.as_str())
    }

    /// Gets an attribute as an integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_attr(key).and_then(|v| v.as_int())
    }

    /// Gets an attribute as a float.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get_attr(key).and_then(|v| v.as_float())
    }

    /// Removes an attribute, returning its old value.
    pub fn erase_attr(&mut self, key: &str) -> Option<AttrValue> {
        self.attributes.remove(key)
    }
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self::new(0, 0, 0, DataFormat::F32)
    }
}

impl std::fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{}{:+}{:+} {} {}ch",
            self.width, self.height, self.depth, self.x, self.y, self.format, self.nchannels
        )
    }
}
