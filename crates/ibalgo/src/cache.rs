//! Image cache collaborator.
//!
//! An [`ImageBuf`](crate::imagebuf::ImageBuf) can be backed by an
//! [`ImageCache`] instead of owning its pixels. Such a buffer is read-only
//! until it is materialized with `read(subimage, miplevel, true)`.
//!
//! [`MemoryCache`] is a thread-safe in-memory implementation, keyed by
//! image name, subimage and MIP level.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ibalgo::cache::{ImageCache, MemoryCache};
//! use ibalgo::imagebuf::{ImageBuf, IBStorage, InitializePixels};
//! use ibalgo_core::{DataFormat, ImageSpec};
//!
//! let cache = Arc::new(MemoryCache::new());
//! let img = ImageBuf::new(ImageSpec::new(4, 4, 3, DataFormat::F32), InitializePixels::Yes);
//! cache.insert_image("plate", &img);
//!
//! let buf = ImageBuf::from_cache("plate", cache.clone());
//! assert_eq!(buf.storage(), IBStorage::ImageCache);
//! assert_eq!(cache.stats().hits, 2);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use ibalgo_core::{Error, ImageSpec, Result, Roi3D};

use crate::imagebuf::{ImageBuf, PixelData};

/// Source of image specs and pixels for cache-backed buffers.
pub trait ImageCache: Send + Sync + fmt::Debug {
    /// Returns the spec of one subimage/MIP level.
    fn spec(&self, name: &str, subimage: i32, miplevel: i32) -> Result<ImageSpec>;

    /// Returns the pixels of `roi` (all channels, native format), laid out
    /// with `roi` as the pixel window.
    fn get_pixels(&self, name: &str, subimage: i32, miplevel: i32, roi: &Roi3D) -> Result<PixelData>;
}

/// Key for cached images.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    /// Image name.
    pub name: String,
    /// Subimage index.
    pub subimage: i32,
    /// MIP level (0 = full resolution).
    pub miplevel: i32,
}

impl ImageKey {
    /// Creates a new image key.
    pub fn new(name: impl Into<String>, subimage: i32, miplevel: i32) -> Self {
        Self {
            name: name.into(),
            subimage,
            miplevel,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedImage {
    spec: ImageSpec,
    pixels: PixelData,
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of successful lookups.
    pub hits: u64,
    /// Number of lookups for unknown images.
    pub misses: u64,
    /// Number of images currently cached.
    pub image_count: u64,
}

impl CacheStats {
    /// Hit rate as percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory [`ImageCache`].
#[derive(Default)]
pub struct MemoryCache {
    images: RwLock<HashMap<ImageKey, CachedImage>>,
    stats: RwLock<CacheStats>,
}

fn poisoned<T>(_: T) -> Error {
    Error::Cache("lock poisoned".into())
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores pixels under `key`.
    ///
    /// Fails if the pixel count or format does not match `spec`.
    pub fn insert(&self, key: ImageKey, spec: ImageSpec, pixels: PixelData) -> Result<()> {
        if pixels.len() != spec.image_values() || pixels.format() != Some(spec.format) {
            return Err(Error::Cache(format!(
                "pixels for \"{}\" do not match its spec",
                key.name
            )));
        }
        let mut images = self.images.write().map_err(poisoned)?;
        images.insert(key, CachedImage { spec, pixels });
        let count = images.len() as u64;
        drop(images);
        self.stats.write().map_err(poisoned)?.image_count = count;
        Ok(())
    }

    /// Stores a copy of an initialized buffer as subimage 0, MIP level 0.
    ///
    /// Returns false for an uninitialized buffer.
    pub fn insert_image(&self, name: &str, buf: &ImageBuf) -> bool {
        if !buf.initialized() {
            return false;
        }
        let mut spec = buf.spec().clone();
        spec.channelformats.clear();
        self.insert(ImageKey::new(name, 0, 0), spec, buf.pixels().clone())
            .is_ok()
    }

    /// Drops every subimage and MIP level of `name`.
    pub fn invalidate(&self, name: &str) {
        if let Ok(mut images) = self.images.write() {
            images.retain(|k, _| k.name != name);
            if let Ok(mut stats) = self.stats.write() {
                stats.image_count = images.len() as u64;
            }
        }
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.images.read().map_or(0, |images| images.len())
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn lookup<R>(
        &self,
        name: &str,
        subimage: i32,
        miplevel: i32,
        f: impl FnOnce(&CachedImage) -> Result<R>,
    ) -> Result<R> {
        let key = ImageKey::new(name, subimage, miplevel);
        let images = self.images.read().map_err(poisoned)?;
        let found = images.get(&key);
        {
            let mut stats = self.stats.write().map_err(poisoned)?;
            if found.is_some() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
        match found {
            Some(img) => f(img),
            None => Err(Error::Cache(format!(
                "no image \"{name}\" (subimage {subimage}, miplevel {miplevel})"
            ))),
        }
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("images", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ImageCache for MemoryCache {
    fn spec(&self, name: &str, subimage: i32, miplevel: i32) -> Result<ImageSpec> {
        self.lookup(name, subimage, miplevel, |img| Ok(img.spec.clone()))
    }

    fn get_pixels(&self, name: &str, subimage: i32, miplevel: i32, roi: &Roi3D) -> Result<PixelData> {
        self.lookup(name, subimage, miplevel, |img| {
            let window = img.spec.roi();
            if *roi == window {
                return Ok(img.pixels.clone());
            }
            if !window.contains_roi(&roi.with_channels(0, window.chend)) || roi.npixels() == 0 {
                return Err(Error::InvalidRegion(format!("{roi} outside {window}")));
            }
            extract(&img.pixels, &window, roi)
        })
    }
}

/// Copies the rows of `roi` out of pixels laid out over `window`.
fn extract(pixels: &PixelData, window: &Roi3D, roi: &Roi3D) -> Result<PixelData> {
    let format = pixels
        .format()
        .ok_or_else(|| Error::Cache("empty pixel storage".into()))?;
    let nch = window.nchannels() as usize;
    let row = roi.width() as usize * nch;
    let mut out = PixelData::allocate(format, roi.npixels() as usize * nch);
    let mut dst_off = 0;
    for z in roi.zbegin..roi.zend {
        for y in roi.ybegin..roi.yend {
            let src_off = (((z - window.zbegin) as usize * window.height() as usize
                + (y - window.ybegin) as usize)
                * window.width() as usize
                + (roi.xbegin - window.xbegin) as usize)
                * nch;
            if !out.copy_span(dst_off, pixels, src_off, row) {
                return Err(Error::Cache("pixel span out of range".into()));
            }
            dst_off += row;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibalgo_core::DataFormat;

    fn ramp_spec() -> (ImageSpec, PixelData) {
        let spec = ImageSpec::new(3, 2, 1, DataFormat::F32);
        let pixels = PixelData::from_f32_slice(DataFormat::F32, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        (spec, pixels)
    }

    #[test]
    fn cache_stats() {
        let cache = MemoryCache::new();
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn insert_and_lookup() {
        let cache = MemoryCache::new();
        let (spec, pixels) = ramp_spec();
        cache.insert(ImageKey::new("ramp", 0, 0), spec.clone(), pixels).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.spec("ramp", 0, 0).unwrap(), spec);
        assert!(cache.spec("ramp", 1, 0).is_err());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn insert_rejects_bad_pixels() {
        let cache = MemoryCache::new();
        let (spec, _) = ramp_spec();
        let short = PixelData::allocate(DataFormat::F32, 2);
        assert!(cache.insert(ImageKey::new("bad", 0, 0), spec, short).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn get_pixels_subregion() {
        let cache = MemoryCache::new();
        let (spec, pixels) = ramp_spec();
        cache.insert(ImageKey::new("ramp", 0, 0), spec, pixels).unwrap();
        let roi = Roi3D::new(1, 3, 0, 2, 0, 1, 0, 1);
        let sub = cache.get_pixels("ramp", 0, 0, &roi).unwrap();
        assert_eq!(sub.to_f32_vec(), vec![1.0, 2.0, 4.0, 5.0]);
        let outside = Roi3D::new(2, 5, 0, 1, 0, 1, 0, 1);
        assert!(cache.get_pixels("ramp", 0, 0, &outside).is_err());
    }

    #[test]
    fn invalidate_drops_all_levels() {
        let cache = MemoryCache::new();
        let (spec, pixels) = ramp_spec();
        cache.insert(ImageKey::new("ramp", 0, 0), spec.clone(), pixels.clone()).unwrap();
        cache.insert(ImageKey::new("ramp", 0, 1), spec, pixels).unwrap();
        assert_eq!(cache.stats().image_count, 2);
        cache.invalidate("ramp");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().image_count, 0);
    }
}
