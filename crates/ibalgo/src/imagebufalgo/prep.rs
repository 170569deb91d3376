//! Destination preparation shared by every algorithm.
//!
//! [`prep`] reconciles the region of interest, the destination buffer and
//! up to two sources before any pixel is touched: it validates inputs,
//! shrink-wraps or derives the ROI, allocates an uninitialized destination
//! from the sources' specs, applies the metadata policy and checks the
//! channel requirements given by [`PrepFlags`].

use std::ops::{BitOr, BitOrAssign};

use ibalgo_core::{AttrValue, DataFormat, Error, ImageSpec, Result, Roi3D, roi_intersection};

use crate::imagebuf::{IBStorage, ImageBuf};

/// Options for [`prep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrepFlags(u32);

impl PrepFlags {
    /// No options.
    pub const NONE: Self = Self(0);
    /// Destination and sources must all have an alpha channel.
    pub const REQUIRE_ALPHA: Self = Self(1);
    /// Destination and sources must all have a depth channel.
    pub const REQUIRE_Z: Self = Self(1 << 1);
    /// Sources must have as many channels as the destination.
    pub const REQUIRE_SAME_NCHANNELS: Self = Self(1 << 2);
    /// Reject images with depth > 1.
    pub const NO_SUPPORT_VOLUME: Self = Self(1 << 3);
    /// Do not take the display window from the first source.
    pub const NO_COPY_ROI_FULL: Self = Self(1 << 4);
    /// Start the destination with no metadata at all.
    pub const NO_COPY_METADATA: Self = Self(1 << 5);
    /// Keep pixel hashes in the copied metadata.
    pub const COPY_ALL_METADATA: Self = Self(1 << 6);

    /// Returns true if every flag of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Both sets of flags; usable in constants.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for PrepFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PrepFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Prepares `dst` and `roi` for an algorithm reading `a` and `b`.
///
/// On return `roi` is defined and lies within `dst`'s pixel window, and
/// `dst` is an initialized, writable buffer.
pub fn prep(
    roi: &mut Roi3D,
    dst: &mut ImageBuf,
    a: Option<&ImageBuf>,
    b: Option<&ImageBuf>,
    force_spec: Option<&ImageSpec>,
    flags: PrepFlags,
) -> Result<()> {
    if a.is_some_and(|a| !a.initialized()) || b.is_some_and(|b| !b.initialized()) {
        return Err(Error::UninitializedInput);
    }

    if dst.initialized() {
        *roi = if roi.defined() {
            roi_intersection(roi, &dst.roi())
        } else {
            dst.roi()
        };
        if dst.storage() == IBStorage::ImageCache && !dst.read(dst.subimage(), dst.miplevel(), true) {
            return Err(Error::Cache(dst.geterror()));
        }
    } else {
        let full_roi;
        if !roi.defined() {
            let Some(a) = a else {
                return Err(Error::InvalidRegion(
                    "no region of interest and no source image".into(),
                ));
            };
            *roi = a.roi();
            let mut full = a.roi_full();
            if let Some(b) = b {
                *roi = roi.union(&b.roi());
                full = full.union(&b.roi_full());
            }
            full_roi = Some(full);
        } else if let Some(a) = a {
            roi.chend = roi.chend.min(a.nchannels() as i32);
            full_roi = (!flags.contains(PrepFlags::NO_COPY_ROI_FULL)).then(|| a.roi_full());
        } else {
            full_roi = Some(*roi);
        }

        let mut spec = match (a, force_spec) {
            (Some(a), force) => {
                let mut spec = force.unwrap_or(a.spec()).clone();
                if b.is_some_and(|b| b.format() != a.format()) {
                    spec.set_format(DataFormat::F32);
                }
                spec.tile_width = 0;
                spec.tile_height = 0;
                spec.tile_depth = 0;
                spec
            }
            (None, Some(force)) => force.clone(),
            (None, None) => {
                if roi.chend == i32::MAX || roi.chend <= 0 {
                    return Err(Error::InvalidRegion(format!(
                        "{roi} does not give a channel count"
                    )));
                }
                ImageSpec::new(0, 0, roi.chend as u32, DataFormat::F32)
            }
        };
        spec.set_roi(roi);
        match full_roi {
            Some(full) if full.defined() => spec.set_roi_full(&full),
            _ => spec.set_roi_full(roi),
        }

        apply_metadata_policy(&mut spec, flags);

        tracing::trace!(roi = %roi, format = %spec.format, nchannels = spec.nchannels, "allocating destination");
        dst.alloc(&spec);
    }

    let specs = || [a, b].into_iter().flatten().map(ImageBuf::spec);
    let d = dst.spec();
    if flags.contains(PrepFlags::REQUIRE_ALPHA)
        && (d.alpha_channel < 0 || specs().any(|s| s.alpha_channel < 0))
    {
        return Err(Error::RequireAlpha);
    }
    if flags.contains(PrepFlags::REQUIRE_Z) && (d.z_channel < 0 || specs().any(|s| s.z_channel < 0)) {
        return Err(Error::RequireZ);
    }
    if flags.contains(PrepFlags::REQUIRE_SAME_NCHANNELS) && specs().any(|s| s.nchannels != d.nchannels) {
        return Err(Error::RequireSameChannels);
    }
    if flags.contains(PrepFlags::NO_SUPPORT_VOLUME) && (d.depth > 1 || specs().any(|s| s.depth > 1)) {
        return Err(Error::VolumeNotSupported);
    }
    Ok(())
}

/// Trims the attributes copied from a source: pixel hashes go unless
/// `COPY_ALL_METADATA` is set, everything goes with `NO_COPY_METADATA`.
pub(crate) fn apply_metadata_policy(spec: &mut ImageSpec, flags: PrepFlags) {
    if flags.contains(PrepFlags::NO_COPY_METADATA) {
        spec.attributes.clear();
    } else if !flags.contains(PrepFlags::COPY_ALL_METADATA) {
        spec.erase_attr("oiio:SHA-1");
        let stripped = spec
            .get_string("ImageDescription")
            .filter(|desc| !desc.is_empty())
            .map(strip_sha1);
        if let Some(desc) = stripped {
            spec.set_attr("ImageDescription", AttrValue::String(desc));
        }
    }
}

/// Removes every `SHA-1=<hex digits><spaces>` run from an image
/// description.
fn strip_sha1(desc: &str) -> String {
    const TAG: &str = "SHA-1=";
    let mut out = String::with_capacity(desc.len());
    let mut rest = desc;
    while let Some(pos) = rest.find(TAG) {
        out.push_str(&rest[..pos]);
        rest = rest[pos + TAG.len()..]
            .trim_start_matches(|c: char| c.is_ascii_hexdigit())
            .trim_start_matches(' ');
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagebuf::InitializePixels;

    fn image(w: u32, h: u32, nch: u32, format: DataFormat) -> ImageBuf {
        ImageBuf::new(ImageSpec::new(w, h, nch, format), InitializePixels::Yes)
    }

    #[test]
    fn flags_combine() {
        let f = PrepFlags::REQUIRE_ALPHA | PrepFlags::NO_SUPPORT_VOLUME;
        assert!(f.contains(PrepFlags::REQUIRE_ALPHA));
        assert!(!f.contains(PrepFlags::REQUIRE_Z));
        assert!(f.contains(PrepFlags::NONE));
    }

    #[test]
    fn rejects_uninitialized_input() {
        let mut dst = ImageBuf::new_uninit();
        let src = ImageBuf::new_uninit();
        let mut roi = Roi3D::all();
        let err = prep(&mut roi, &mut dst, Some(&src), None, None, PrepFlags::NONE).unwrap_err();
        assert_eq!(err.to_string(), "Uninitialized input image");
    }

    #[test]
    fn initialized_dst_clips_roi() {
        let mut dst = image(10, 10, 3, DataFormat::F32);
        let mut roi = Roi3D::new(5, 20, -3, 4, 0, 1, 1, 8);
        prep(&mut roi, &mut dst, None, None, None, PrepFlags::NONE).unwrap();
        assert_eq!(roi, Roi3D::new(5, 10, 0, 4, 0, 1, 1, 3));

        let mut all = Roi3D::all();
        prep(&mut all, &mut dst, None, None, None, PrepFlags::NONE).unwrap();
        assert_eq!(all, dst.roi());
    }

    #[test]
    fn allocates_from_source() {
        let mut src = image(8, 6, 4, DataFormat::U16);
        src.spec_mut().tile_width = 64;
        src.spec_mut().tile_height = 64;
        src.spec_mut().full_width = 16;
        let mut dst = ImageBuf::new_uninit();
        let mut roi = Roi3D::all();
        prep(&mut roi, &mut dst, Some(&src), None, None, PrepFlags::NONE).unwrap();
        assert!(dst.initialized());
        assert_eq!(dst.format(), DataFormat::U16);
        assert_eq!(dst.roi(), src.roi());
        assert_eq!(dst.spec().full_width, 16);
        assert_eq!(dst.spec().tile_width, 0);
        assert_eq!(dst.spec().alpha_channel, 3);
    }

    #[test]
    fn mixed_formats_promote_to_float() {
        let a = image(4, 4, 3, DataFormat::U8);
        let b = image(6, 2, 3, DataFormat::F16);
        let mut dst = ImageBuf::new_uninit();
        let mut roi = Roi3D::all();
        prep(&mut roi, &mut dst, Some(&a), Some(&b), None, PrepFlags::NONE).unwrap();
        assert_eq!(dst.format(), DataFormat::F32);
        assert_eq!(dst.roi(), Roi3D::new(0, 6, 0, 4, 0, 1, 0, 3));
    }

    #[test]
    fn explicit_roi_clips_channels_and_keeps_full_window() {
        let mut src = image(8, 8, 3, DataFormat::F32);
        src.spec_mut().full_width = 32;
        let mut roi = Roi3D::new(2, 4, 2, 4, 0, 1, 0, 10);

        let mut dst = ImageBuf::new_uninit();
        let mut r = roi;
        prep(&mut r, &mut dst, Some(&src), None, None, PrepFlags::NONE).unwrap();
        assert_eq!(r.chend, 3);
        assert_eq!(dst.spec().full_width, 32);

        let mut dst = ImageBuf::new_uninit();
        prep(&mut roi, &mut dst, Some(&src), None, None, PrepFlags::NO_COPY_ROI_FULL).unwrap();
        assert_eq!(dst.roi_full(), Roi3D::new(2, 4, 2, 4, 0, 1, 0, 3));
    }

    #[test]
    fn no_source_uses_float_and_roi_channels() {
        let mut dst = ImageBuf::new_uninit();
        let mut roi = Roi3D::new(0, 4, 0, 2, 0, 1, 0, 2);
        prep(&mut roi, &mut dst, None, None, None, PrepFlags::NONE).unwrap();
        assert_eq!(dst.format(), DataFormat::F32);
        assert_eq!(dst.nchannels(), 2);
        assert_eq!(dst.spec().channelnames, ["R", "G"]);

        let mut dst = ImageBuf::new_uninit();
        let mut open = Roi3D::new_2d(0, 4, 0, 2);
        assert!(prep(&mut open, &mut dst, None, None, None, PrepFlags::NONE).is_err());
        let mut none = Roi3D::all();
        assert!(prep(&mut none, &mut dst, None, None, None, PrepFlags::NONE).is_err());
    }

    #[test]
    fn metadata_policy() {
        let mut src = image(2, 2, 3, DataFormat::F32);
        src.spec_mut().set_attr("oiio:SHA-1", "abc123");
        src.spec_mut().set_attr("ImageDescription", "plate SHA-1=0123abcdef  shot 10");
        src.spec_mut().set_attr("Artist", "someone");

        let mut dst = ImageBuf::new_uninit();
        prep(&mut Roi3D::all(), &mut dst, Some(&src), None, None, PrepFlags::NONE).unwrap();
        assert!(dst.spec().get_attr("oiio:SHA-1").is_none());
        assert_eq!(dst.spec().get_string("ImageDescription"), Some("plate shot 10"));
        assert_eq!(dst.spec().get_string("Artist"), Some("someone"));

        let mut dst = ImageBuf::new_uninit();
        prep(&mut Roi3D::all(), &mut dst, Some(&src), None, None, PrepFlags::COPY_ALL_METADATA).unwrap();
        assert_eq!(dst.spec().get_string("oiio:SHA-1"), Some("abc123"));

        let mut dst = ImageBuf::new_uninit();
        prep(&mut Roi3D::all(), &mut dst, Some(&src), None, None, PrepFlags::NO_COPY_METADATA).unwrap();
        assert!(dst.spec().attributes.is_empty());
    }

    #[test]
    fn post_checks() {
        let rgb = image(4, 4, 3, DataFormat::F32);
        let rgba = image(4, 4, 4, DataFormat::F32);

        let mut dst = ImageBuf::new_uninit();
        let err = prep(&mut Roi3D::all(), &mut dst, Some(&rgb), None, None, PrepFlags::REQUIRE_ALPHA).unwrap_err();
        assert_eq!(err.to_string(), "images must have alpha channels");

        let mut dst = ImageBuf::new_uninit();
        let err = prep(&mut Roi3D::all(), &mut dst, Some(&rgba), None, None, PrepFlags::REQUIRE_Z).unwrap_err();
        assert_eq!(err.to_string(), "images must have depth channels");

        let mut dst = image(4, 4, 4, DataFormat::F32);
        let err = prep(
            &mut Roi3D::all(),
            &mut dst,
            Some(&rgb),
            None,
            None,
            PrepFlags::REQUIRE_SAME_NCHANNELS,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "images must have the same number of channels");

        let mut vol_spec = ImageSpec::new(4, 4, 1, DataFormat::F32);
        vol_spec.depth = 3;
        let vol = ImageBuf::new(vol_spec, InitializePixels::Yes);
        let mut dst = ImageBuf::new_uninit();
        let err = prep(&mut Roi3D::all(), &mut dst, Some(&vol), None, None, PrepFlags::NO_SUPPORT_VOLUME).unwrap_err();
        assert_eq!(err.to_string(), "volumes not supported");
    }

    #[test]
    fn strips_sha_runs() {
        assert_eq!(strip_sha1("SHA-1=ff00 rest"), "rest");
        assert_eq!(strip_sha1("a SHA-1=12 b SHA-1=  c"), "a b c");
        assert_eq!(strip_sha1("nothing here"), "nothing here");
    }
}
