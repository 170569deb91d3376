//! Iterator support for ImageBuf.
//!
//! [`ConstIter`] and [`IterMut`] visit the pixels of a range in z, y, x
//! order over typed storage. Positions outside the pixel window read the
//! value selected by the iterator's [`WrapMode`]; writes there are dropped.
//! Both support random access through `pos`.
//!
//! [`PixelIterator`] yields bare coordinates when no storage access is
//! needed.

use super::pixels::Pixel;
use super::{ImageBuf, WrapMode};
use ibalgo_core::Roi3D;

/// Iterator over pixel coordinates of a ROI, in z, y, x order.
pub struct PixelIterator {
    roi: Roi3D,
    x: i32,
    y: i32,
    z: i32,
}

impl PixelIterator {
    /// Creates a new iterator over the specified ROI.
    pub fn new(roi: Roi3D) -> Self {
        let z = if roi.npixels() == 0 { roi.zend } else { roi.zbegin };
        Self {
            x: roi.xbegin,
            y: roi.ybegin,
            z,
            roi,
        }
    }

    /// Creates an iterator over the entire image.
    pub fn all(buf: &ImageBuf) -> Self {
        Self::new(buf.roi())
    }
}

impl Iterator for PixelIterator {
    type Item = (i32, i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.z >= self.roi.zend {
            return None;
        }

        let result = (self.x, self.y, self.z);

        self.x += 1;
        if self.x >= self.roi.xend {
            self.x = self.roi.xbegin;
            self.y += 1;
            if self.y >= self.roi.yend {
                self.y = self.roi.ybegin;
                self.z += 1;
            }
        }

        Some(result)
    }
}

/// Position bookkeeping shared by the typed iterators.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    window: Roi3D,
    nchannels: usize,
    range: Roi3D,
    wrap: WrapMode,
    x: i32,
    y: i32,
    z: i32,
    offset: Option<usize>,
    exists: bool,
}

impl Cursor {
    fn new(buf: &ImageBuf, range: Roi3D, wrap: WrapMode) -> Self {
        let range = if range.defined() { range } else { buf.roi() };
        let mut cur = Self {
            window: buf.roi(),
            nchannels: buf.nchannels() as usize,
            range,
            wrap,
            x: range.xbegin,
            y: range.ybegin,
            z: if range.npixels() == 0 { range.zend } else { range.zbegin },
            offset: None,
            exists: false,
        };
        cur.resolve();
        cur
    }

    #[inline]
    fn index(&self, x: i32, y: i32, z: i32) -> usize {
        let w = &self.window;
        let xo = (x - w.xbegin) as usize;
        let yo = (y - w.ybegin) as usize;
        let zo = (z - w.zbegin) as usize;
        ((zo * w.height() as usize + yo) * w.width() as usize + xo) * self.nchannels
    }

    fn resolve(&mut self) {
        if self.window.contains(self.x, self.y, self.z) {
            self.exists = true;
            self.offset = Some(self.index(self.x, self.y, self.z));
            return;
        }
        self.exists = false;
        self.offset = self.wrapped().map(|(x, y, z)| self.index(x, y, z));
    }

    fn wrapped(&self) -> Option<(i32, i32, i32)> {
        let w = &self.window;
        let x = self.wrap.resolve(self.x, w.xbegin, w.width())?;
        let y = self.wrap.resolve(self.y, w.ybegin, w.height())?;
        let z = self.wrap.resolve(self.z, w.zbegin, w.depth())?;
        Some((x, y, z))
    }

    #[inline]
    fn done(&self) -> bool {
        self.z >= self.range.zend
    }

    #[inline]
    fn advance(&mut self) {
        self.x += 1;
        if self.x < self.range.xend {
            if self.exists && self.x < self.window.xend {
                self.offset = self.offset.map(|o| o + self.nchannels);
            } else {
                self.resolve();
            }
            return;
        }
        self.x = self.range.xbegin;
        self.y += 1;
        if self.y >= self.range.yend {
            self.y = self.range.ybegin;
            self.z += 1;
        }
        if !self.done() {
            self.resolve();
        }
    }

    #[inline]
    fn pos(&mut self, x: i32, y: i32, z: i32) {
        self.x = x;
        self.y = y;
        self.z = z;
        self.resolve();
    }

    #[inline]
    fn channel(&self, c: usize) -> Option<usize> {
        if c < self.nchannels {
            self.offset.map(|o| o + c)
        } else {
            None
        }
    }

    #[inline]
    fn valid(&self) -> bool {
        self.range.contains(self.x, self.y, self.z)
    }
}

/// Read-only typed iterator over an ImageBuf.
///
/// `T` must match the buffer's pixel format; a mismatched iterator reads
/// zeros everywhere.
pub struct ConstIter<'a, T: Pixel> {
    data: &'a [T],
    cur: Cursor,
}

impl<'a, T: Pixel> ConstIter<'a, T> {
    /// Iterates `range` (undefined means the pixel window).
    pub fn new(buf: &'a ImageBuf, range: Roi3D, wrap: WrapMode) -> Self {
        Self {
            data: T::slice(buf.pixels()).unwrap_or(&[]),
            cur: Cursor::new(buf, range, wrap),
        }
    }

    /// Value of channel `c` at the current position.
    #[inline]
    pub fn get(&self, c: usize) -> f32 {
        self.cur
            .channel(c)
            .and_then(|i| self.data.get(i))
            .map_or(0.0, |v| v.to_f32())
    }

    /// Steps to the next pixel of the range.
    #[inline]
    pub fn advance(&mut self) {
        self.cur.advance();
    }

    /// Returns true once every pixel of the range has been visited.
    #[inline]
    pub fn done(&self) -> bool {
        self.cur.done()
    }

    /// Jumps to an arbitrary position, inside the range or not.
    #[inline]
    pub fn pos(&mut self, x: i32, y: i32, z: i32) {
        self.cur.pos(x, y, z);
    }

    /// Current x.
    #[inline]
    pub fn x(&self) -> i32 {
        self.cur.x
    }

    /// Current y.
    #[inline]
    pub fn y(&self) -> i32 {
        self.cur.y
    }

    /// Current z.
    #[inline]
    pub fn z(&self) -> i32 {
        self.cur.z
    }

    /// Whether the position lies in the iteration range.
    #[inline]
    pub fn valid(&self) -> bool {
        self.cur.valid()
    }

    /// Whether the position lies in the pixel window.
    #[inline]
    pub fn exists(&self) -> bool {
        self.cur.exists
    }
}

/// Writable typed iterator over an ImageBuf.
pub struct IterMut<'a, T: Pixel> {
    data: &'a mut [T],
    cur: Cursor,
}

impl<'a, T: Pixel> IterMut<'a, T> {
    /// Iterates `range` (undefined means the pixel window). Reads outside
    /// the window are black.
    pub fn new(buf: &'a mut ImageBuf, range: Roi3D) -> Self {
        let cur = Cursor::new(buf, range, WrapMode::Black);
        let data = if buf.is_writable() {
            T::slice_mut(buf.pixels_mut_unchecked()).unwrap_or(&mut [])
        } else {
            &mut []
        };
        Self { data, cur }
    }

    /// Value of channel `c` at the current position.
    #[inline]
    pub fn get(&self, c: usize) -> f32 {
        self.cur
            .channel(c)
            .and_then(|i| self.data.get(i))
            .map_or(0.0, |v| v.to_f32())
    }

    /// Stores `value` into channel `c`; ignored outside the pixel window.
    #[inline]
    pub fn set(&mut self, c: usize, value: f32) {
        if !self.cur.exists {
            return;
        }
        if let Some(p) = self.cur.channel(c).and_then(|i| self.data.get_mut(i)) {
            *p = T::from_f32(value);
        }
    }

    /// Steps to the next pixel of the range.
    #[inline]
    pub fn advance(&mut self) {
        self.cur.advance();
    }

    /// Returns true once every pixel of the range has been visited.
    #[inline]
    pub fn done(&self) -> bool {
        self.cur.done()
    }

    /// Jumps to an arbitrary position.
    #[inline]
    pub fn pos(&mut self, x: i32, y: i32, z: i32) {
        self.cur.pos(x, y, z);
    }

    /// Current x.
    #[inline]
    pub fn x(&self) -> i32 {
        self.cur.x
    }

    /// Current y.
    #[inline]
    pub fn y(&self) -> i32 {
        self.cur.y
    }

    /// Current z.
    #[inline]
    pub fn z(&self) -> i32 {
        self.cur.z
    }

    /// Whether the position lies in the pixel window.
    #[inline]
    pub fn exists(&self) -> bool {
        self.cur.exists
    }
}
