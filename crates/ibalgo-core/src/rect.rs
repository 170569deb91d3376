//! Region of interest.
//!
//! A [`Roi3D`] is a half-open box `[begin, end)` on each of x, y, z and
//! channel. Pixel coordinates may be negative since data windows can start
//! anywhere. [`Roi3D::all`] is the undefined sentinel that algorithms read
//! as "the whole pixel window of the image".
//!
//! ```rust
//! use ibalgo_core::{roi_intersection, roi_union, Roi3D};
//!
//! let a = Roi3D::new_2d(0, 100, 0, 100);
//! let b = Roi3D::new_2d(50, 150, 50, 150);
//!
//! assert_eq!(roi_union(&a, &b).width(), 150);
//! assert_eq!(roi_intersection(&a, &b).npixels(), 50 * 50);
//! ```

use std::fmt;

/// Half-open region over `(x, y, z, channel)`.
///
/// ```rust
/// use ibalgo_core::Roi3D;
///
/// let roi = Roi3D::new(100, 200, 50, 150, 0, 1, 0, 4);
/// assert_eq!((roi.width(), roi.height(), roi.nchannels()), (100, 100, 4));
/// assert!(roi.contains(150, 100, 0));
/// assert!(!roi.contains(200, 100, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Roi3D {
    /// First column.
    pub xbegin: i32,
    /// One past the last column.
    pub xend: i32,
    /// First row.
    pub ybegin: i32,
    /// One past the last row.
    pub yend: i32,
    /// First slice.
    pub zbegin: i32,
    /// One past the last slice.
    pub zend: i32,
    /// First channel.
    pub chbegin: i32,
    /// One past the last channel.
    pub chend: i32,
}

impl Default for Roi3D {
    fn default() -> Self {
        Self::all()
    }
}

impl Roi3D {
    /// A region with every bound given.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        xbegin: i32,
        xend: i32,
        ybegin: i32,
        yend: i32,
        zbegin: i32,
        zend: i32,
        chbegin: i32,
        chend: i32,
    ) -> Self {
        Self { xbegin, xend, ybegin, yend, zbegin, zend, chbegin, chend }
    }

    /// A single-slice region over every channel.
    pub const fn new_2d(xbegin: i32, xend: i32, ybegin: i32, yend: i32) -> Self {
        Self::new(xbegin, xend, ybegin, yend, 0, 1, 0, i32::MAX)
    }

    /// The undefined sentinel.
    pub const fn all() -> Self {
        Self::new(i32::MIN, i32::MAX, i32::MIN, i32::MAX, i32::MIN, i32::MAX, 0, i32::MAX)
    }

    /// True for the undefined sentinel.
    #[inline]
    pub const fn is_all(&self) -> bool {
        self.xbegin == i32::MIN && self.xend == i32::MAX
    }

    /// True unless this is the undefined sentinel.
    #[inline]
    pub const fn defined(&self) -> bool {
        !self.is_all()
    }

    /// Number of columns.
    #[inline]
    pub const fn width(&self) -> i32 {
        self.xend - self.xbegin
    }

    /// Number of rows.
    #[inline]
    pub const fn height(&self) -> i32 {
        self.yend - self.ybegin
    }

    /// Number of slices.
    #[inline]
    pub const fn depth(&self) -> i32 {
        self.zend - self.zbegin
    }

    /// Number of channels.
    #[inline]
    pub const fn nchannels(&self) -> i32 {
        self.chend - self.chbegin
    }

    /// Pixel count; inverted ranges and the sentinel count as empty.
    pub fn npixels(&self) -> u64 {
        if self.is_all() {
            return 0;
        }
        [self.width(), self.height(), self.depth()]
            .iter()
            .map(|&n| n.max(0) as u64)
            .product()
    }

    /// True for a defined region without pixels.
    pub fn is_empty(&self) -> bool {
        self.defined() && self.npixels() == 0
    }

    /// True if pixel `(x, y, z)` lies inside (channels are not checked).
    #[inline]
    pub const fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        self.xbegin <= x && x < self.xend
            && self.ybegin <= y && y < self.yend
            && self.zbegin <= z && z < self.zend
    }

    /// True if `other` lies entirely inside, channels included.
    pub const fn contains_roi(&self, other: &Roi3D) -> bool {
        self.xbegin <= other.xbegin && other.xend <= self.xend
            && self.ybegin <= other.ybegin && other.yend <= self.yend
            && self.zbegin <= other.zbegin && other.zend <= self.zend
            && self.chbegin <= other.chbegin && other.chend <= self.chend
    }

    /// Bounding box of both regions. The sentinel is neutral.
    pub fn union(&self, other: &Roi3D) -> Roi3D {
        match (self.is_all(), other.is_all()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Roi3D::new(
                self.xbegin.min(other.xbegin),
                self.xend.max(other.xend),
                self.ybegin.min(other.ybegin),
                self.yend.max(other.yend),
                self.zbegin.min(other.zbegin),
                self.zend.max(other.zend),
                self.chbegin.min(other.chbegin),
                self.chend.max(other.chend),
            ),
        }
    }

    /// Overlap of both regions, or `None` when they are disjoint.
    pub fn intersection(&self, other: &Roi3D) -> Option<Roi3D> {
        let r = self.clip(other);
        let nonempty = r.width() > 0 && r.height() > 0 && r.depth() > 0 && r.nchannels() > 0;
        nonempty.then_some(r)
    }

    fn clip(&self, other: &Roi3D) -> Roi3D {
        Roi3D::new(
            self.xbegin.max(other.xbegin),
            self.xend.min(other.xend),
            self.ybegin.max(other.ybegin),
            self.yend.min(other.yend),
            self.zbegin.max(other.zbegin),
            self.zend.min(other.zend),
            self.chbegin.max(other.chbegin),
            self.chend.min(other.chend),
        )
    }

    /// The same box over channels `[chbegin, chend)`.
    #[inline]
    pub const fn with_channels(mut self, chbegin: i32, chend: i32) -> Self {
        self.chbegin = chbegin;
        self.chend = chend;
        self
    }
}

impl fmt::Display for Roi3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        write!(
            f,
            "x[{},{}) y[{},{}) z[{},{}) ch[{},{})",
            self.xbegin, self.xend, self.ybegin, self.yend, self.zbegin, self.zend, self.chbegin, self.chend
        )
    }
}

/// Bounding box of `a` and `b`.
#[inline]
pub fn roi_union(a: &Roi3D, b: &Roi3D) -> Roi3D {
    a.union(b)
}

/// Overlap of `a` and `b`, always as a box: disjoint inputs give one with
/// no pixels.
#[inline]
pub fn roi_intersection(a: &Roi3D, b: &Roi3D) -> Roi3D {
    a.clip(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents() {
        let roi = Roi3D::new(-4, 100, 0, 50, 2, 5, 1, 3);
        assert_eq!((roi.width(), roi.height(), roi.depth(), roi.nchannels()), (104, 50, 3, 2));
        assert_eq!(roi.npixels(), 104 * 50 * 3);
        assert_eq!(Roi3D::new(5, 0, 0, 10, 0, 1, 0, 1).npixels(), 0);
    }

    #[test]
    fn sentinel() {
        let roi = Roi3D::all();
        assert!(roi.is_all() && !roi.defined());
        assert_eq!(roi.npixels(), 0);
        assert!(!roi.is_empty());
        assert_eq!(Roi3D::default(), roi);
        assert_eq!(roi.to_string(), "all");
    }

    #[test]
    fn containment() {
        let roi = Roi3D::new_2d(-10, 10, 0, 5);
        assert!(roi.contains(-10, 0, 0));
        assert!(!roi.contains(10, 0, 0));
        assert!(!roi.contains(0, 0, 1));
        assert!(roi.contains_roi(&Roi3D::new(-2, 2, 1, 3, 0, 1, 0, 4)));
        assert!(!roi.contains_roi(&Roi3D::new(-2, 11, 1, 3, 0, 1, 0, 4)));
    }

    #[test]
    fn union_ignores_sentinel() {
        let a = Roi3D::new_2d(0, 100, 0, 100);
        let b = Roi3D::new_2d(50, 150, 50, 150);
        assert_eq!(roi_union(&a, &b), Roi3D::new_2d(0, 150, 0, 150));
        assert_eq!(roi_union(&a, &Roi3D::all()), a);
        assert_eq!(roi_union(&Roi3D::all(), &b), b);
    }

    #[test]
    fn intersection_and_clip() {
        let a = Roi3D::new_2d(0, 100, 0, 100);
        let b = Roi3D::new_2d(50, 150, 50, 150);
        assert_eq!(a.intersection(&b), Some(Roi3D::new_2d(50, 100, 50, 100)));

        let far = Roi3D::new_2d(200, 250, 0, 50);
        assert!(a.intersection(&far).is_none());
        let clipped = roi_intersection(&a, &far);
        assert!(clipped.is_empty());

        let rgb = Roi3D::new(0, 4, 0, 4, 0, 1, 0, 3);
        assert_eq!(roi_intersection(&Roi3D::all(), &rgb), rgb);
    }

    #[test]
    fn display() {
        let roi = Roi3D::new(0, 4, -1, 3, 0, 1, 0, 2);
        assert_eq!(roi.to_string(), "x[0,4) y[-1,3) z[0,1) ch[0,2)");
    }
}
