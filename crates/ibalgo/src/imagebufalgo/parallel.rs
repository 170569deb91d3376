//! Fork-join driver for the image algorithms.
//!
//! The destination region is cut into contiguous tiles along one axis.
//! Each tile gets its own buffer holding a copy of the destination pixels
//! under it; tiles run on the rayon pool and are written back once all of
//! them have finished. Tiles never overlap, so every destination pixel is
//! produced by exactly one task and the result does not depend on the
//! thread count.

use ibalgo_core::{Result, Roi3D};
use rayon::prelude::*;

use crate::config;
use crate::imagebuf::ImageBuf;

/// Axis along which a region is split into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    /// Columns.
    X,
    /// Scanlines.
    Y,
    /// Slices.
    Z,
}

/// Runs `task` over `roi` of `dst`, in parallel when worthwhile.
///
/// `nthreads == 0` uses the `threads` setting (or the rayon pool size).
/// With a single thread, or fewer pixels than `parallel_min_pixels`,
/// `task` runs once on the whole region.
pub fn parallel_image<F>(dst: &mut ImageBuf, roi: Roi3D, nthreads: usize, task: F) -> Result<()>
where
    F: Fn(&mut ImageBuf, Roi3D) -> Result<()> + Sync,
{
    parallel_image_split(dst, roi, nthreads, None, task)
}

/// Like [`parallel_image`], but splits along `axis` instead of the
/// longest one.
///
/// The first tile error is returned after every tile has been stored.
pub fn parallel_image_split<F>(
    dst: &mut ImageBuf,
    roi: Roi3D,
    nthreads: usize,
    axis: Option<SplitAxis>,
    task: F,
) -> Result<()>
where
    F: Fn(&mut ImageBuf, Roi3D) -> Result<()> + Sync,
{
    let n = config::resolve_nthreads(nthreads);
    if n <= 1 || roi.npixels() < config::parallel_min_pixels() {
        return task(dst, roi);
    }
    let tiles = split_roi(&roi, n, axis);
    if tiles.len() <= 1 {
        return task(dst, roi);
    }
    tracing::trace!(roi = %roi, tiles = tiles.len(), "parallel split");

    let whole: &ImageBuf = dst;
    let done: Vec<(ImageBuf, Result<()>)> = tiles
        .into_par_iter()
        .map(|tile_roi| {
            let mut tile = whole.tile(&tile_roi);
            let result = task(&mut tile, tile_roi);
            (tile, result)
        })
        .collect();

    let mut first_err = None;
    for (mut tile, result) in done {
        dst.store_tile(&mut tile);
        if let Err(e) = result {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Cuts `roi` into at most `n` contiguous, non-empty pieces along `axis`
/// (default: the longest axis).
pub fn split_roi(roi: &Roi3D, n: usize, axis: Option<SplitAxis>) -> Vec<Roi3D> {
    let axis = axis.unwrap_or_else(|| {
        let (w, h, d) = (roi.width(), roi.height(), roi.depth());
        if d > w && d > h {
            SplitAxis::Z
        } else if h >= w {
            SplitAxis::Y
        } else {
            SplitAxis::X
        }
    });
    let (begin, end) = match axis {
        SplitAxis::X => (roi.xbegin, roi.xend),
        SplitAxis::Y => (roi.ybegin, roi.yend),
        SplitAxis::Z => (roi.zbegin, roi.zend),
    };
    let len = (end - begin).max(0) as usize;
    let n = n.clamp(1, len.max(1));
    let chunk = len / n;
    let extra = len % n;

    let mut tiles = Vec::with_capacity(n);
    let mut start = begin;
    for i in 0..n {
        let size = (chunk + usize::from(i < extra)) as i32;
        if size == 0 {
            continue;
        }
        let mut tile = *roi;
        match axis {
            SplitAxis::X => (tile.xbegin, tile.xend) = (start, start + size),
            SplitAxis::Y => (tile.ybegin, tile.yend) = (start, start + size),
            SplitAxis::Z => (tile.zbegin, tile.zend) = (start, start + size),
        }
        tiles.push(tile);
        start += size;
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::{InitializePixels, WrapMode};
    use ibalgo_core::{DataFormat, Error, ImageSpec};

    #[test]
    fn split_covers_roi() {
        let roi = Roi3D::new(0, 10, 0, 3, 0, 1, 0, 4);
        let tiles = split_roi(&roi, 4, None);
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0].xbegin, 0);
        assert_eq!(tiles[0].xend, 3);
        assert_eq!(tiles[3].xend, 10);
        assert!(tiles.windows(2).all(|w| w[0].xend == w[1].xbegin));
        assert!(tiles.iter().all(|t| t.height() == 3 && t.chend == 4));
    }

    #[test]
    fn split_forced_axis() {
        let roi = Roi3D::new(0, 100, 0, 2, 0, 1, 0, 1);
        let tiles = split_roi(&roi, 8, Some(SplitAxis::Y));
        assert_eq!(tiles.len(), 2);
        assert!(tiles.iter().all(|t| t.width() == 100 && t.height() == 1));
    }

    #[test]
    fn split_empty_roi() {
        let roi = Roi3D::new(0, 0, 0, 0, 0, 1, 0, 1);
        assert!(split_roi(&roi, 4, None).is_empty());
    }

    #[test]
    fn parallel_writes_every_pixel_once() {
        let mut buf = ImageBuf::new(ImageSpec::new(64, 64, 1, DataFormat::F32), InitializePixels::Yes);
        let roi = buf.roi();
        parallel_image(&mut buf, roi, 4, |tile, r| {
            for y in r.ybegin..r.yend {
                for x in r.xbegin..r.xend {
                    let v = tile.getchannel(x, y, 0, 0, WrapMode::Black) + (y * 64 + x) as f32;
                    tile.setpixel(x, y, 0, &[v]);
                }
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(buf.getchannel(0, 0, 0, 0, WrapMode::Black), 0.0);
        assert_eq!(buf.getchannel(63, 63, 0, 0, WrapMode::Black), 4095.0);
        assert_eq!(buf.getchannel(5, 40, 0, 0, WrapMode::Black), 2565.0);
    }

    #[test]
    fn parallel_reports_tile_error() {
        let mut buf = ImageBuf::new(ImageSpec::new(64, 64, 1, DataFormat::F32), InitializePixels::Yes);
        let roi = buf.roi();
        let result = parallel_image(&mut buf, roi, 4, |_, r| {
            if r.xbegin == 0 && r.ybegin == 0 {
                Err(Error::other("tile failed"))
            } else {
                Ok(())
            }
        });
        assert_eq!(result.unwrap_err().to_string(), "tile failed");
    }
}
