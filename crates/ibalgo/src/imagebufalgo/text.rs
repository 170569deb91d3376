//! Text rendering into an existing image.
//!
//! Glyphs are rasterized with cosmic-text (behind the `text` feature) and
//! blended into the destination by their coverage `b`:
//!
//! ```text
//! R[c] = b * textcolor[c] + (1 - b) * R[c]
//! ```
//!
//! `(x, y)` is the start of the baseline of the first line. Fonts are
//! looked up as files: either the given path, or the name with one of the
//! extensions `"" .ttf .pfa .pfb` under the usual system font directories.
//!
//! # Example
//!
//! ```ignore
//! use ibalgo::imagebufalgo::{render_text, TextOptions};
//!
//! let opts = TextOptions::new().fontsize(24.0).textcolor(&[1.0, 0.0, 0.0]);
//! render_text(&mut img, 10, 40, "Hello", &opts);
//! ```

use std::path::{Path, PathBuf};

use ibalgo_core::{Error, Result};

use super::finish;
use crate::imagebuf::ImageBuf;

/// Font file extensions tried after the bare name.
const FONT_EXTENSIONS: [&str; 4] = ["", ".ttf", ".pfa", ".pfb"];

/// Fonts tried in order when no font name is given.
const DEFAULT_FONTS: [&str; 3] = ["cour", "Courier New", "FreeMono"];

/// How deep below each font directory to look.
const MAX_SEARCH_DEPTH: usize = 4;

/// Text rendering options.
#[derive(Debug, Clone)]
pub struct TextOptions {
    /// Font size in pixels.
    pub fontsize: f32,
    /// Font file path or name. Empty selects a default font.
    pub fontname: String,
    /// Per-channel colour; missing channels are 1.
    pub textcolor: Option<Vec<f32>>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            fontsize: 16.0,
            fontname: String::new(),
            textcolor: None,
        }
    }
}

impl TextOptions {
    /// Default options: 16 pixels, default font, white.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the font size in pixels.
    pub fn fontsize(mut self, size: f32) -> Self {
        self.fontsize = size;
        self
    }

    /// Sets the font by path or name.
    pub fn fontname(mut self, name: impl Into<String>) -> Self {
        self.fontname = name.into();
        self
    }

    /// Sets the text colour.
    pub fn textcolor(mut self, color: &[f32]) -> Self {
        self.textcolor = Some(color.to_vec());
        self
    }
}

/// Renders `text` into `dst` with its baseline starting at `(x, y)`.
///
/// Pixels outside the pixel window are skipped. Returns false (with the
/// message in `dst`) for volumes, a non-positive size, a font that cannot
/// be found, or a build without the `text` feature.
pub fn render_text(dst: &mut ImageBuf, x: i32, y: i32, text: &str, opts: &TextOptions) -> bool {
    let result = render_text_impl(dst, x, y, text, opts);
    finish(dst, "render_text", result)
}

fn render_text_impl(dst: &mut ImageBuf, x: i32, y: i32, text: &str, opts: &TextOptions) -> Result<()> {
    if !dst.initialized() {
        return Err(Error::UninitializedInput);
    }
    if dst.spec().depth > 1 {
        return Err(Error::volume_not_supported_by("ImageBufAlgo::render_text"));
    }
    if !(opts.fontsize > 0.0) {
        return Err(Error::other(format!("Could not set font size to {}", opts.fontsize)));
    }

    #[cfg(not(feature = "text"))]
    {
        let _ = (x, y, text);
        Err(Error::TextNotSupported)
    }

    #[cfg(feature = "text")]
    {
        let font = resolve_font(&opts.fontname)?;
        let nch = dst.nchannels() as usize;
        let color: Vec<f32> = (0..nch)
            .map(|c| opts.textcolor.as_ref().and_then(|t| t.get(c).copied()).unwrap_or(1.0))
            .collect();
        tracing::debug!(font = %font.display(), size = opts.fontsize, x, y, "render_text");

        let window = dst.roi();
        let z = window.zbegin;
        let mut px = vec![0.0f32; nch];
        raster::rasterize(&font, opts.fontsize, text, |gx, gy, b| {
            let (rx, ry) = (x + gx, y + gy);
            if b <= 0.0 || !window.contains(rx, ry, z) {
                return;
            }
            dst.getpixel(rx, ry, z, &mut px, crate::imagebuf::WrapMode::Black);
            for (v, &tc) in px.iter_mut().zip(&color) {
                *v = b * tc + (1.0 - b) * *v;
            }
            dst.setpixel(rx, ry, z, &px);
        })
    }
}

/// Picks the font file for `name`, or one of the defaults when empty.
#[cfg_attr(not(feature = "text"), allow(dead_code))]
fn resolve_font(name: &str) -> Result<PathBuf> {
    let dirs = font_search_dirs();
    if name.is_empty() {
        DEFAULT_FONTS
            .iter()
            .find_map(|f| find_font_in(f, &dirs))
            .ok_or(Error::DefaultFontNotFound)
    } else {
        find_font_in(name, &dirs).ok_or_else(|| Error::FontNotFound(name.to_string()))
    }
}

/// System font directories, most personal first.
fn font_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        for sub in ["fonts", "Fonts", "Library/Fonts"] {
            dirs.push(home.join(sub));
        }
    }
    if let Some(root) = std::env::var_os("SystemRoot") {
        dirs.push(PathBuf::from(root).join("Fonts"));
    }
    for dir in ["/usr/share/fonts", "/Library/Fonts", "C:/Windows/Fonts", "/opt/local/share/fonts"] {
        dirs.push(PathBuf::from(dir));
    }
    dirs
}

/// Finds a font file: `name` itself if it is a regular file, else
/// `name + ext` anywhere below one of `dirs`.
fn find_font_in(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    FONT_EXTENSIONS.iter().find_map(|ext| {
        let file = format!("{name}{ext}");
        dirs.iter().find_map(|d| search_dir(d, &file, MAX_SEARCH_DEPTH))
    })
}

fn search_dir(dir: &Path, file: &str, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(file);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs.iter().find_map(|d| search_dir(d, file, depth - 1))
}

#[cfg(feature = "text")]
mod raster {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use cosmic_text::{
        fontdb, Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache,
    };
    use ibalgo_core::{Error, Result};

    struct Rasterizer {
        fonts: FontSystem,
        swash: SwashCache,
        /// Family name of every font file loaded so far.
        families: HashMap<PathBuf, String>,
    }

    impl Rasterizer {
        fn new() -> Self {
            Self {
                fonts: FontSystem::new_with_locale_and_db("en-US".to_string(), fontdb::Database::new()),
                swash: SwashCache::new(),
                families: HashMap::new(),
            }
        }

        fn family(&mut self, path: &Path) -> Result<String> {
            if let Some(f) = self.families.get(path) {
                return Ok(f.clone());
            }
            let not_found = || Error::FontNotFound(path.display().to_string());
            let data = std::fs::read(path).map_err(|_| not_found())?;
            let db = self.fonts.db_mut();
            let ids = db.load_font_source(fontdb::Source::Binary(Arc::new(data)));
            let family = ids
                .iter()
                .filter_map(|id| db.face(*id))
                .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
                .ok_or_else(not_found)?;
            self.families.insert(path.to_path_buf(), family.clone());
            Ok(family)
        }
    }

    lazy_static::lazy_static! {
        // Font loading is slow; one rasterizer serves every call.
        static ref RASTERIZER: Mutex<Option<Rasterizer>> = Mutex::new(None);
    }

    /// Lays out `text` with the font at `path` and calls `put(x, y, coverage)`
    /// for every covered pixel, relative to the first baseline.
    pub(super) fn rasterize(path: &Path, size: f32, text: &str, mut put: impl FnMut(i32, i32, f32)) -> Result<()> {
        // A panic while holding the lock leaves it poisoned: stay broken.
        let mut guard = RASTERIZER.lock().map_err(|_| Error::TextRendererBroken)?;
        let r = guard.get_or_insert_with(Rasterizer::new);
        let family = r.family(path)?;

        let mut buffer = Buffer::new(&mut r.fonts, Metrics::new(size, size * 1.2));
        buffer.set_size(&mut r.fonts, None, None);
        let attrs = Attrs::new().family(Family::Name(&family));
        buffer.set_text(&mut r.fonts, text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut r.fonts, false);

        let baseline = buffer.layout_runs().next().map_or(0.0, |run| run.line_y).round() as i32;
        buffer.draw(&mut r.fonts, &mut r.swash, Color::rgb(255, 255, 255), |x, y, w, h, color| {
            let b = color.a() as f32 / 255.0;
            for dy in 0..h as i32 {
                for dx in 0..w as i32 {
                    put(x + dx, y + dy - baseline, b);
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::InitializePixels;
    use ibalgo_core::{DataFormat, ImageSpec};

    fn black(w: u32, h: u32) -> ImageBuf {
        ImageBuf::new(ImageSpec::new(w, h, 3, DataFormat::F32), InitializePixels::Yes)
    }

    #[test]
    fn options_builder() {
        let opts = TextOptions::new().fontsize(32.0).fontname("FreeMono").textcolor(&[1.0, 0.5]);
        assert_eq!(opts.fontsize, 32.0);
        assert_eq!(opts.fontname, "FreeMono");
        assert_eq!(opts.textcolor.as_deref(), Some(&[1.0, 0.5][..]));
        assert!(TextOptions::default().textcolor.is_none());
    }

    #[test]
    fn font_found_by_path_and_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("truetype/mono");
        std::fs::create_dir_all(&nested).unwrap();
        let font = nested.join("Mono.ttf");
        std::fs::write(&font, b"not really a font").unwrap();

        let by_path = find_font_in(font.to_str().unwrap(), &[]);
        assert_eq!(by_path.as_deref(), Some(font.as_path()));

        let dirs = vec![tmp.path().join("missing"), tmp.path().to_path_buf()];
        assert_eq!(find_font_in("Mono", &dirs).as_deref(), Some(font.as_path()));
        assert_eq!(find_font_in("Other", &dirs), None);
    }

    #[test]
    fn bad_font_size() {
        let mut img = black(8, 8);
        assert!(!render_text(&mut img, 0, 4, "x", &TextOptions::new().fontsize(0.0)));
        assert_eq!(img.geterror(), "Could not set font size to 0");
    }

    #[test]
    fn volumes_rejected() {
        let mut spec = ImageSpec::new(8, 8, 3, DataFormat::F32);
        spec.depth = 2;
        spec.full_depth = 2;
        let mut img = ImageBuf::new(spec, InitializePixels::Yes);
        assert!(!render_text(&mut img, 0, 4, "x", &TextOptions::new()));
        assert_eq!(img.geterror(), "ImageBufAlgo::render_text does not support volume images");
    }

    #[cfg(not(feature = "text"))]
    #[test]
    fn reports_missing_feature() {
        let mut img = black(8, 8);
        assert!(!render_text(&mut img, 0, 4, "x", &TextOptions::new()));
        assert_eq!(img.geterror(), "not compiled with text rendering support");
    }

    #[cfg(feature = "text")]
    #[test]
    fn unknown_font() {
        let mut img = black(8, 8);
        let opts = TextOptions::new().fontname("no-such-font-anywhere");
        assert!(!render_text(&mut img, 0, 4, "x", &opts));
        assert_eq!(img.geterror(), "Could not set font face to \"no-such-font-anywhere\"");
    }

    #[cfg(feature = "text")]
    #[test]
    fn blends_text_colour() {
        if resolve_font("").is_err() {
            return;
        }
        let mut img = black(64, 32);
        let opts = TextOptions::new().fontsize(20.0).textcolor(&[1.0, 0.0, 0.0]);
        assert!(render_text(&mut img, 4, 24, "HI", &opts));
        let mut px = [0.0; 3];
        let mut lit = 0;
        for y in 0..32 {
            for x in 0..64 {
                img.getpixel(x, y, 0, &mut px, crate::imagebuf::WrapMode::Black);
                assert!((0.0..=1.0).contains(&px[0]));
                assert_eq!(px[1], 0.0);
                if px[0] > 0.5 {
                    lit += 1;
                }
            }
        }
        assert!(lit > 0);
    }
}
