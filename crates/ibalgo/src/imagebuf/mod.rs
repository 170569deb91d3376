//! OIIO-compatible ImageBuf implementation.
//!
//! ImageBuf is an in-memory image container that supports:
//! - Multiple storage modes (local buffer, application buffer, image cache)
//! - Per-pixel and region-based access with wrap modes
//! - Interpolated pixel sampling
//! - Typed iterator traversal
//!
//! # Example
//!
//! ```
//! use ibalgo::imagebuf::{ImageBuf, InitializePixels, WrapMode};
//! use ibalgo_core::{DataFormat, ImageSpec};
//!
//! // Create a new RGBA image
//! let spec = ImageSpec::new(64, 32, 4, DataFormat::F16);
//! let mut buf = ImageBuf::new(spec, InitializePixels::Yes);
//!
//! // Set a pixel
//! buf.setpixel(10, 10, 0, &[1.0, 0.0, 0.0, 1.0]);
//!
//! // Get it back
//! let mut pixel = [0.0f32; 4];
//! buf.getpixel(10, 10, 0, &mut pixel, WrapMode::Black);
//! assert_eq!(pixel, [1.0, 0.0, 0.0, 1.0]);
//! ```

mod iterators;
mod pixels;
mod storage;

pub use iterators::*;
pub use pixels::*;
pub use storage::*;

use std::fmt;
use std::sync::Arc;

use ibalgo_core::{DataFormat, Error, ImageSpec, Result, Roi3D};
use smallvec::SmallVec;

use crate::cache::ImageCache;

/// Controls whether pixels are initialized when allocating an ImageBuf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializePixels {
    /// Do not request initialized pixels.
    No,
    /// Initialize all pixels to zero/black.
    #[default]
    Yes,
}

/// Wrap mode for pixel access outside image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Use the default wrap mode (black).
    #[default]
    Default,
    /// Return black/zero for out-of-bounds pixels.
    Black,
    /// Clamp coordinates to edge pixels.
    Clamp,
    /// Periodic/tiling wrap.
    Periodic,
    /// Mirror at boundaries.
    Mirror,
}

impl WrapMode {
    /// Maps coordinate `c` onto the span `[begin, begin + len)`.
    ///
    /// Returns `None` when the mode yields black for `c`, or when the span
    /// is empty.
    #[inline]
    pub fn resolve(self, c: i32, begin: i32, len: i32) -> Option<i32> {
        if len <= 0 {
            return None;
        }
        let rel = c - begin;
        let rel = match self {
            WrapMode::Default | WrapMode::Black => {
                if rel < 0 || rel >= len {
                    return None;
                }
                rel
            }
            WrapMode::Clamp => rel.clamp(0, len - 1),
            WrapMode::Periodic => rel.rem_euclid(len),
            WrapMode::Mirror => mirror_coord(rel, len),
        };
        Some(begin + rel)
    }
}

fn mirror_coord(c: i32, size: i32) -> i32 {
    let c = c.rem_euclid(2 * size);
    if c >= size {
        2 * size - c - 1
    } else {
        c
    }
}

/// How pixels are stored in an ImageBuf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IBStorage {
    /// Uninitialized - no image data.
    #[default]
    Uninitialized,
    /// Local buffer owned by ImageBuf.
    LocalBuffer,
    /// Application-supplied buffer handed over to the ImageBuf.
    AppBuffer,
    /// Backed by an [`ImageCache`]; read-only until materialized.
    ImageCache,
}

/// An in-memory image buffer compatible with OpenImageIO's ImageBuf.
///
/// Pixels are stored channel-interleaved in the spec's `format`, laid out
/// over the pixel window. Every buffer carries its own pending error
/// message, set by the algorithms that write into it.
pub struct ImageBuf {
    spec: ImageSpec,
    storage: IBStorage,
    pixels: PixelData,
    name: String,
    subimage: i32,
    miplevel: i32,
    cache: Option<Arc<dyn ImageCache>>,
    error: String,
}

impl Clone for ImageBuf {
    /// Deep copy. Application-buffer and cache-backed images clone into a
    /// local buffer.
    fn clone(&self) -> Self {
        let storage = match self.storage {
            IBStorage::Uninitialized => IBStorage::Uninitialized,
            _ => IBStorage::LocalBuffer,
        };
        Self {
            spec: self.spec.clone(),
            storage,
            pixels: self.pixels.clone(),
            name: self.name.clone(),
            subimage: self.subimage,
            miplevel: self.miplevel,
            cache: None,
            error: self.error.clone(),
        }
    }
}

impl Default for ImageBuf {
    fn default() -> Self {
        Self::new_uninit()
    }
}

impl ImageBuf {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Creates an uninitialized ImageBuf.
    pub fn new_uninit() -> Self {
        Self {
            spec: ImageSpec::default(),
            storage: IBStorage::Uninitialized,
            pixels: PixelData::Empty,
            name: String::new(),
            subimage: 0,
            miplevel: 0,
            cache: None,
            error: String::new(),
        }
    }

    /// Creates an ImageBuf with local storage for `spec`.
    ///
    /// Local storage always starts zeroed, whatever `_zero` says.
    pub fn new(spec: ImageSpec, _zero: InitializePixels) -> Self {
        let mut buf = Self::new_uninit();
        buf.alloc(&spec);
        buf
    }

    /// Creates a named ImageBuf with local storage for `spec`.
    pub fn new_named(name: impl Into<String>, spec: ImageSpec, zero: InitializePixels) -> Self {
        let mut buf = Self::new(spec, zero);
        buf.name = name.into();
        buf
    }

    /// Wraps pixels supplied by the application.
    ///
    /// `data` must hold exactly `spec.image_values()` values of
    /// `spec.format`.
    pub fn from_app_buffer(spec: ImageSpec, data: PixelData) -> Result<Self> {
        if data.format() != Some(spec.format) {
            return Err(Error::UnsupportedFormat(format!(
                "buffer is {:?}, spec wants {}",
                data.format(),
                spec.format
            )));
        }
        if data.len() != spec.image_values() {
            return Err(Error::InvalidRegion(format!(
                "buffer holds {} values, spec needs {}",
                data.len(),
                spec.image_values()
            )));
        }
        let mut buf = Self::new_uninit();
        buf.spec = spec;
        buf.pixels = data;
        buf.storage = IBStorage::AppBuffer;
        Ok(buf)
    }

    /// Creates a buffer backed by subimage 0, MIP level 0 of `name` in
    /// `cache`.
    ///
    /// On failure the buffer stays uninitialized and carries the error.
    pub fn from_cache(name: impl Into<String>, cache: Arc<dyn ImageCache>) -> Self {
        let mut buf = Self::new_uninit();
        buf.name = name.into();
        match fetch(cache.as_ref(), &buf.name, 0, 0) {
            Ok((spec, pixels)) => {
                buf.spec = spec;
                buf.pixels = pixels;
                buf.storage = IBStorage::ImageCache;
                buf.cache = Some(cache);
            }
            Err(e) => {
                tracing::warn!(name = %buf.name, error = %e, "image cache lookup failed");
                buf.error(e);
            }
        }
        buf
    }

    /// Allocates local storage for `spec`, discarding any previous pixels.
    pub fn alloc(&mut self, spec: &ImageSpec) {
        self.spec = spec.clone();
        self.pixels = PixelData::allocate(spec.format, spec.image_values());
        self.storage = IBStorage::LocalBuffer;
        self.cache = None;
    }

    /// Renames the buffer and allocates local storage for `spec`.
    pub fn reset(&mut self, name: impl Into<String>, spec: &ImageSpec) {
        self.name = name.into();
        self.subimage = 0;
        self.miplevel = 0;
        self.alloc(spec);
    }

    /// Releases pixels and returns to the uninitialized state.
    ///
    /// A pending error message is kept.
    pub fn clear(&mut self) {
        let error = std::mem::take(&mut self.error);
        *self = Self::new_uninit();
        self.error = error;
    }

    /// Brings cache-backed pixels of a subimage/MIP level into the buffer.
    ///
    /// With `force`, the buffer takes ownership of the pixels and its
    /// storage becomes [`IBStorage::LocalBuffer`]. Buffers that already own
    /// their pixels return true.
    pub fn read(&mut self, subimage: i32, miplevel: i32, force: bool) -> bool {
        match self.storage {
            IBStorage::Uninitialized => {
                self.error("ImageBuf::read: no image to read");
                false
            }
            IBStorage::LocalBuffer | IBStorage::AppBuffer => true,
            IBStorage::ImageCache => {
                let Some(cache) = self.cache.clone() else {
                    self.error("ImageBuf::read: image cache is gone");
                    return false;
                };
                if subimage != self.subimage || miplevel != self.miplevel {
                    match fetch(cache.as_ref(), &self.name, subimage, miplevel) {
                        Ok((spec, pixels)) => {
                            self.spec = spec;
                            self.pixels = pixels;
                            self.subimage = subimage;
                            self.miplevel = miplevel;
                        }
                        Err(e) => {
                            self.error(e);
                            return false;
                        }
                    }
                }
                if force {
                    tracing::debug!(name = %self.name, subimage, miplevel, "materialized cached image");
                    self.storage = IBStorage::LocalBuffer;
                    self.cache = None;
                }
                true
            }
        }
    }

    /// Copies `src` (spec and pixels) into this buffer, optionally
    /// converting the pixel format.
    ///
    /// Copying an uninitialized `src` clears this buffer.
    pub fn copy(&mut self, src: &ImageBuf, format: Option<DataFormat>) -> bool {
        if !src.initialized() {
            self.clear();
            return true;
        }
        let mut spec = src.spec.clone();
        if let Some(format) = format {
            spec.set_format(format);
        }
        self.pixels = src.pixels.convert_to(spec.format);
        self.spec = spec;
        self.storage = IBStorage::LocalBuffer;
        self.subimage = src.subimage;
        self.miplevel = src.miplevel;
        self.cache = None;
        true
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Returns the storage type.
    pub fn storage(&self) -> IBStorage {
        self.storage
    }

    /// Returns true if the buffer has a spec and pixels.
    pub fn initialized(&self) -> bool {
        self.storage != IBStorage::Uninitialized
    }

    /// Returns true if pixels may be written.
    pub fn is_writable(&self) -> bool {
        matches!(self.storage, IBStorage::LocalBuffer | IBStorage::AppBuffer)
    }

    /// Returns the image name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the image name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Current subimage index.
    pub fn subimage(&self) -> i32 {
        self.subimage
    }

    /// Current MIP level.
    pub fn miplevel(&self) -> i32 {
        self.miplevel
    }

    /// Returns the image spec.
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Mutable access to the spec, for metadata edits.
    ///
    /// Changing the pixel window, channel count or format here does not
    /// reallocate; use [`ImageBuf::alloc`] for that.
    pub fn spec_mut(&mut self) -> &mut ImageSpec {
        &mut self.spec
    }

    /// Number of channels.
    pub fn nchannels(&self) -> u32 {
        self.spec.nchannels
    }

    /// Pixel format.
    pub fn format(&self) -> DataFormat {
        self.spec.format
    }

    /// Pixel window width.
    pub fn width(&self) -> u32 {
        self.spec.width
    }

    /// Pixel window height.
    pub fn height(&self) -> u32 {
        self.spec.height
    }

    /// Pixel window depth.
    pub fn depth(&self) -> u32 {
        self.spec.depth
    }

    /// Pixel window as a ROI over all channels.
    pub fn roi(&self) -> Roi3D {
        self.spec.roi()
    }

    /// Display window as a ROI over all channels.
    pub fn roi_full(&self) -> Roi3D {
        self.spec.roi_full()
    }

    /// Sets the display window.
    pub fn set_roi_full(&mut self, roi: &Roi3D) {
        self.spec.set_roi_full(roi);
    }

    /// Read-only access to the pixel storage.
    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    /// Pixel storage for writers that already checked
    /// [`ImageBuf::is_writable`].
    pub(crate) fn pixels_mut_unchecked(&mut self) -> &mut PixelData {
        &mut self.pixels
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// Appends a message to the pending error.
    pub fn error(&mut self, msg: impl fmt::Display) {
        if !self.error.is_empty() {
            self.error.push('\n');
        }
        self.error.push_str(&msg.to_string());
    }

    /// Returns and clears the pending error message.
    pub fn geterror(&mut self) -> String {
        std::mem::take(&mut self.error)
    }

    /// Returns true if an error is pending.
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    // =========================================================================
    // Pixel Access - Single Pixel
    // =========================================================================

    /// Element offset of channel 0 of pixel (x, y, z), or `None` outside
    /// the pixel window.
    pub fn pixeladdr(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if !self.initialized() || !self.roi().contains(x, y, z) {
            return None;
        }
        Some(element_offset(&self.roi(), self.spec.nchannels as usize, x, y, z))
    }

    /// Gets a single channel value at (x, y, z).
    pub fn getchannel(&self, x: i32, y: i32, z: i32, c: usize, wrap: WrapMode) -> f32 {
        if c >= self.spec.nchannels as usize {
            return 0.0;
        }
        match self.wrapped_addr(x, y, z, wrap) {
            Some(offset) => self.pixels.get(offset + c),
            None => 0.0,
        }
    }

    /// Gets up to `pixel.len()` channels of (x, y, z). Channels past the
    /// image's read as zero.
    pub fn getpixel(&self, x: i32, y: i32, z: i32, pixel: &mut [f32], wrap: WrapMode) {
        pixel.fill(0.0);
        let Some(offset) = self.wrapped_addr(x, y, z, wrap) else {
            return;
        };
        let nch = self.spec.nchannels as usize;
        for (c, p) in pixel.iter_mut().take(nch).enumerate() {
            *p = self.pixels.get(offset + c);
        }
    }

    /// Sets the channels of (x, y, z) from `pixel`.
    ///
    /// Returns false outside the pixel window or when the buffer is
    /// read-only.
    pub fn setpixel(&mut self, x: i32, y: i32, z: i32, pixel: &[f32]) -> bool {
        if !self.is_writable() {
            return false;
        }
        let Some(offset) = self.pixeladdr(x, y, z) else {
            return false;
        };
        let nch = self.spec.nchannels as usize;
        for (c, &v) in pixel.iter().take(nch).enumerate() {
            self.pixels.set(offset + c, v);
        }
        true
    }

    /// Bilinear interpolation at continuous coordinates.
    ///
    /// Pixel centres sit at half-integer positions, so `(x, y)` samples
    /// between the pixels around `(x - 0.5, y - 0.5)`.
    pub fn interppixel(&self, x: f32, y: f32, pixel: &mut [f32], wrap: WrapMode) {
        let (x0, fx) = floorfrac(x - 0.5);
        let (y0, fy) = floorfrac(y - 0.5);
        let z = self.spec.z;
        let nch = (self.spec.nchannels as usize).min(pixel.len());
        let mut corners: SmallVec<[f32; 16]> = SmallVec::from_elem(0.0, 4 * nch);
        let (p00, rest) = corners.split_at_mut(nch);
        let (p10, rest) = rest.split_at_mut(nch);
        let (p01, p11) = rest.split_at_mut(nch);
        self.getpixel(x0, y0, z, p00, wrap);
        self.getpixel(x0 + 1, y0, z, p10, wrap);
        self.getpixel(x0, y0 + 1, z, p01, wrap);
        self.getpixel(x0 + 1, y0 + 1, z, p11, wrap);
        pixel.fill(0.0);
        for (c, out) in pixel.iter_mut().take(nch).enumerate() {
            *out = bilerp(p00[c], p10[c], p01[c], p11[c], fx, fy);
        }
    }

    fn wrapped_addr(&self, x: i32, y: i32, z: i32, wrap: WrapMode) -> Option<usize> {
        if !self.initialized() {
            return None;
        }
        let w = self.roi();
        let x = wrap.resolve(x, w.xbegin, w.width())?;
        let y = wrap.resolve(y, w.ybegin, w.height())?;
        let z = wrap.resolve(z, w.zbegin, w.depth())?;
        Some(element_offset(&w, self.spec.nchannels as usize, x, y, z))
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    /// Copies the pixels of `roi` into a new buffer whose pixel window is
    /// `roi`. The display window and channel layout are kept; metadata is
    /// not.
    pub(crate) fn tile(&self, roi: &Roi3D) -> ImageBuf {
        let mut spec = self.spec.clone();
        spec.attributes.clear();
        spec.set_roi(roi);
        let mut tile = ImageBuf::new(spec, InitializePixels::No);
        let window = tile.roi();
        copy_region(&mut tile.pixels, &window, &self.pixels, &self.roi(), roi);
        tile
    }

    /// Writes the pixels of a buffer made by [`ImageBuf::tile`] back and
    /// takes over its pending error.
    pub(crate) fn store_tile(&mut self, tile: &mut ImageBuf) -> bool {
        if tile.has_error() {
            let msg = tile.geterror();
            self.error(msg);
        }
        let region = tile.roi();
        let window = self.roi();
        copy_region(&mut self.pixels, &window, &tile.pixels, &region, &region)
    }
}

/// Element offset of (x, y, z) in storage laid out over `window`.
#[inline]
pub(crate) fn element_offset(window: &Roi3D, nchannels: usize, x: i32, y: i32, z: i32) -> usize {
    let xo = (x - window.xbegin) as usize;
    let yo = (y - window.ybegin) as usize;
    let zo = (z - window.zbegin) as usize;
    ((zo * window.height() as usize + yo) * window.width() as usize + xo) * nchannels
}

/// Copies `region` row by row between storages of the same format and
/// channel count. Both windows must contain `region`.
fn copy_region(dst: &mut PixelData, dst_window: &Roi3D, src: &PixelData, src_window: &Roi3D, region: &Roi3D) -> bool {
    let nch = dst_window.nchannels() as usize;
    let row = region.width().max(0) as usize * nch;
    let mut ok = true;
    for z in region.zbegin..region.zend {
        for y in region.ybegin..region.yend {
            let d = element_offset(dst_window, nch, region.xbegin, y, z);
            let s = element_offset(src_window, nch, region.xbegin, y, z);
            ok &= dst.copy_span(d, src, s, row);
        }
    }
    ok
}

fn fetch(cache: &dyn ImageCache, name: &str, subimage: i32, miplevel: i32) -> Result<(ImageSpec, PixelData)> {
    let spec = cache.spec(name, subimage, miplevel)?;
    let pixels = cache.get_pixels(name, subimage, miplevel, &spec.roi())?;
    Ok((spec, pixels))
}

impl fmt::Debug for ImageBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuf")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .field("width", &self.spec.width)
            .field("height", &self.spec.height)
            .field("depth", &self.spec.depth)
            .field("nchannels", &self.spec.nchannels)
            .field("format", &self.spec.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn rgba(w: u32, h: u32) -> ImageSpec {
        ImageSpec::new(w, h, 4, DataFormat::F32)
    }

    #[test]
    fn test_imagebuf_new() {
        let buf = ImageBuf::new(rgba(100, 100), InitializePixels::Yes);

        assert_eq!(buf.width(), 100);
        assert_eq!(buf.height(), 100);
        assert_eq!(buf.nchannels(), 4);
        assert_eq!(buf.storage(), IBStorage::LocalBuffer);
        assert!(buf.initialized());
        assert!(!ImageBuf::new_uninit().initialized());
    }

    #[test]
    fn test_imagebuf_pixel_access() {
        let mut buf = ImageBuf::new(rgba(10, 10), InitializePixels::Yes);

        assert!(buf.setpixel(5, 5, 0, &[1.0, 0.5, 0.25, 1.0]));
        assert!(!buf.setpixel(10, 5, 0, &[1.0; 4]));

        let mut pixel = [0.0f32; 4];
        buf.getpixel(5, 5, 0, &mut pixel, WrapMode::Black);
        assert_eq!(pixel, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(buf.getchannel(5, 5, 0, 1, WrapMode::Black), 0.5);
        assert_eq!(buf.getchannel(5, 5, 0, 7, WrapMode::Black), 0.0);
    }

    #[test]
    fn test_imagebuf_wrap_modes() {
        let mut buf = ImageBuf::new(rgba(10, 10), InitializePixels::Yes);
        buf.setpixel(0, 0, 0, &[1.0, 0.0, 0.0, 1.0]);

        let mut pixel = [0.0f32; 4];
        buf.getpixel(-1, -1, 0, &mut pixel, WrapMode::Black);
        assert_eq!(pixel[0], 0.0);

        buf.getpixel(-1, -1, 0, &mut pixel, WrapMode::Clamp);
        assert_eq!(pixel[0], 1.0);

        buf.getpixel(10, 0, 0, &mut pixel, WrapMode::Periodic);
        assert_eq!(pixel[0], 1.0);

        buf.getpixel(-1, 0, 0, &mut pixel, WrapMode::Mirror);
        assert_eq!(pixel[0], 1.0);
    }

    #[test]
    fn test_wrap_resolve() {
        assert_eq!(WrapMode::Black.resolve(5, 2, 3), None);
        assert_eq!(WrapMode::Clamp.resolve(5, 2, 3), Some(4));
        assert_eq!(WrapMode::Periodic.resolve(1, 2, 3), Some(4));
        assert_eq!(WrapMode::Mirror.resolve(1, 2, 3), Some(2));
        assert_eq!(WrapMode::Clamp.resolve(0, 0, 0), None);
    }

    #[test]
    fn test_imagebuf_interp() {
        let mut buf = ImageBuf::new(rgba(10, 10), InitializePixels::Yes);
        buf.setpixel(0, 0, 0, &[0.0, 0.0, 0.0, 1.0]);
        buf.setpixel(1, 0, 0, &[1.0, 0.0, 0.0, 1.0]);

        // Halfway between the centres of (0,0) and (1,0)
        let mut pixel = [0.0f32; 4];
        buf.interppixel(1.0, 0.5, &mut pixel, WrapMode::Clamp);
        assert!((pixel[0] - 0.5).abs() < 1e-6);
        assert!((pixel[3] - 1.0).abs() < 1e-6);

        buf.interppixel(1.5, 0.5, &mut pixel, WrapMode::Clamp);
        assert!((pixel[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixeladdr() {
        let mut spec = ImageSpec::new(4, 3, 2, DataFormat::U8);
        spec.x = 10;
        spec.y = 20;
        let buf = ImageBuf::new(spec, InitializePixels::Yes);
        assert_eq!(buf.pixeladdr(10, 20, 0), Some(0));
        assert_eq!(buf.pixeladdr(11, 21, 0), Some((4 + 1) * 2));
        assert_eq!(buf.pixeladdr(0, 0, 0), None);
    }

    #[test]
    fn test_imagebuf_errors() {
        let mut buf = ImageBuf::new_uninit();
        assert!(!buf.has_error());
        buf.error("first");
        buf.error(Error::SingularMatrix);
        assert!(buf.has_error());
        assert_eq!(buf.geterror(), "first\nsingular transformation matrix");
        assert!(!buf.has_error());
        assert_eq!(buf.geterror(), "");
    }

    #[test]
    fn test_imagebuf_clone() {
        let mut buf = ImageBuf::new(rgba(10, 10), InitializePixels::Yes);
        buf.setpixel(5, 5, 0, &[1.0, 0.0, 0.0, 1.0]);

        let buf2 = buf.clone();
        assert_eq!(buf2.getchannel(5, 5, 0, 0, WrapMode::Black), 1.0);
    }

    #[test]
    fn test_app_buffer() {
        let spec = ImageSpec::new(2, 1, 1, DataFormat::F32);
        let data = PixelData::from_f32_slice(DataFormat::F32, &[0.25, 0.75]);
        let mut buf = ImageBuf::from_app_buffer(spec.clone(), data).unwrap();
        assert_eq!(buf.storage(), IBStorage::AppBuffer);
        assert!(buf.setpixel(0, 0, 0, &[1.0]));
        assert_eq!(buf.clone().storage(), IBStorage::LocalBuffer);

        let short = PixelData::from_f32_slice(DataFormat::F32, &[0.25]);
        assert!(ImageBuf::from_app_buffer(spec.clone(), short).is_err());
        let wrong = PixelData::allocate(DataFormat::U8, 2);
        assert!(ImageBuf::from_app_buffer(spec, wrong).is_err());
    }

    #[test]
    fn test_cache_backed_is_read_only() {
        let cache = Arc::new(MemoryCache::new());
        let mut src = ImageBuf::new(ImageSpec::new(2, 2, 1, DataFormat::F32), InitializePixels::Yes);
        src.setpixel(1, 1, 0, &[0.5]);
        assert!(cache.insert_image("img", &src));

        let mut buf = ImageBuf::from_cache("img", cache);
        assert_eq!(buf.storage(), IBStorage::ImageCache);
        assert_eq!(buf.getchannel(1, 1, 0, 0, WrapMode::Black), 0.5);
        assert!(!buf.setpixel(0, 0, 0, &[1.0]));
        assert_eq!(buf.clone().storage(), IBStorage::LocalBuffer);

        assert!(buf.read(0, 0, true));
        assert_eq!(buf.storage(), IBStorage::LocalBuffer);
        assert!(buf.setpixel(0, 0, 0, &[1.0]));
    }

    #[test]
    fn test_from_cache_missing() {
        let cache = Arc::new(MemoryCache::new());
        let mut buf = ImageBuf::from_cache("nope", cache);
        assert!(!buf.initialized());
        assert!(buf.geterror().contains("nope"));
    }

    #[test]
    fn test_copy_converts_format() {
        let mut src = ImageBuf::new(ImageSpec::new(2, 1, 1, DataFormat::U8), InitializePixels::Yes);
        src.setpixel(1, 0, 0, &[1.0]);
        let mut dst = ImageBuf::new_uninit();
        assert!(dst.copy(&src, Some(DataFormat::F32)));
        assert_eq!(dst.format(), DataFormat::F32);
        assert_eq!(dst.pixels().format(), Some(DataFormat::F32));
        assert_eq!(dst.getchannel(1, 0, 0, 0, WrapMode::Black), 1.0);
    }

    #[test]
    fn test_tile_roundtrip() {
        let mut buf = ImageBuf::new(ImageSpec::new(4, 4, 1, DataFormat::F32), InitializePixels::Yes);
        let roi = Roi3D::new(1, 3, 2, 4, 0, 1, 0, 1);
        let mut tile = buf.tile(&roi);
        assert_eq!(tile.roi().xbegin, 1);
        assert_eq!(tile.roi_full(), buf.roi_full());
        tile.setpixel(2, 3, 0, &[0.5]);
        tile.error("tile failed");
        assert!(buf.store_tile(&mut tile));
        assert_eq!(buf.getchannel(2, 3, 0, 0, WrapMode::Black), 0.5);
        assert_eq!(buf.geterror(), "tile failed");
    }
}
