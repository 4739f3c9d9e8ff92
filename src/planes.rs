//! Planar (YUV) color data.
//!
//! Some sources decode most cheaply as separate luma/chroma planes that
//! the GPU recombines at draw time. [`PlaneLayout`] describes per-plane
//! geometry, the Y/U/V/A component mapping, the source orientation, and
//! the YUV matrix in use. [`YuvPlanes`] is the acquired result: one
//! contiguous refcounted buffer plus the offset table locating each
//! plane inside it.
//!
//! Plane data is intrinsic to the decoder — color-type and color-space
//! overrides on an image handle do not change it — so the plane cache
//! is keyed by the *decoder's* identity, not the handle's.

use std::sync::Arc;

use tracing::debug;

use crate::image::LazyImage;

/// Maximum number of planes a layout can carry (Y, U, V, A).
pub const MAX_PLANES: usize = 4;

/// Geometry of a single plane.
///
/// A plane with any zero field is empty: it occupies no bytes and is
/// skipped when computing the offsets of later planes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaneInfo {
    /// Plane width in samples.
    pub width: u32,
    /// Plane height in rows.
    pub height: u32,
    /// Row stride in bytes.
    pub row_bytes: usize,
}

impl PlaneInfo {
    /// Whether this plane occupies no bytes.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.row_bytes == 0
    }

    /// Bytes this plane occupies in the contiguous buffer.
    pub const fn byte_size(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.row_bytes * self.height as usize
        }
    }
}

/// YUV matrix/range used to recombine planes into RGB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum YuvColorSpace {
    /// BT.601 limited range. JPEG/video legacy default.
    #[default]
    Rec601Limited,
    /// BT.709 limited range. HD video.
    Rec709Limited,
    /// BT.2020 limited range. UHD video.
    Rec2020Limited,
    /// No matrix; planes are already RGB-like.
    Identity,
}

/// Source orientation of the planar data.
///
/// EXIF tag-274 values; the composition pass applies the matching
/// transform when drawing the recombined planes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// No rotation or flip needed.
    #[default]
    Normal,
    /// Flip horizontally (mirror left-right).
    FlipHorizontal,
    /// Rotate 180 degrees.
    Rotate180,
    /// Flip vertically (mirror top-bottom).
    FlipVertical,
    /// Rotate 90 CW then flip horizontally.
    Transpose,
    /// Rotate 90 degrees clockwise.
    Rotate90,
    /// Rotate 90 CCW then flip horizontally.
    Transverse,
    /// Rotate 270 degrees clockwise.
    Rotate270,
}

impl Orientation {
    /// Whether this orientation swaps width and height.
    pub const fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }
}

/// Which plane and channel a Y/U/V/A component is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneChannel {
    /// Index into [`PlaneLayout::planes`].
    pub plane: u8,
    /// Channel within that plane (0 for single-channel planes).
    pub channel: u8,
}

/// Complete planar layout reported by a decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Per-plane geometry, in buffer order. Empty slots allowed anywhere.
    pub planes: [PlaneInfo; MAX_PLANES],
    /// Source orientation tag.
    pub origin: Orientation,
    /// Matrix/range for plane recombination.
    pub color_space: YuvColorSpace,
    /// Component mapping, indexed Y=0, U=1, V=2, A=3. `None` for
    /// components the source does not carry (typically alpha).
    pub components: [Option<PlaneChannel>; 4],
}

impl PlaneLayout {
    /// Total bytes of a contiguous buffer holding every non-empty
    /// plane. `None` on overflow.
    pub fn total_byte_size(&self) -> Option<usize> {
        self.planes
            .iter()
            .try_fold(0usize, |acc, p| acc.checked_add(p.byte_size()))
    }

    /// Byte offset of each plane within the contiguous buffer.
    ///
    /// Each non-empty plane starts where the previous non-empty plane
    /// ends; empty planes get `None` and contribute nothing to later
    /// offsets. This is the single offset walk shared by the cache hit
    /// and miss paths, so the two tables are identical by construction.
    pub fn plane_offsets(&self) -> [Option<usize>; MAX_PLANES] {
        let mut offsets = [None; MAX_PLANES];
        let mut acc = 0usize;
        for (slot, plane) in offsets.iter_mut().zip(&self.planes) {
            if plane.is_empty() {
                continue;
            }
            *slot = Some(acc);
            acc += plane.byte_size();
        }
        offsets
    }

    /// Whether any plane holds data.
    pub fn has_data(&self) -> bool {
        self.planes.iter().any(|p| !p.is_empty())
    }
}

/// A cached planar decode: layout plus the contiguous buffer.
#[derive(Clone, Debug)]
pub struct CachedPlanes {
    /// The layout the buffer was filled under.
    pub layout: PlaneLayout,
    /// The contiguous plane buffer.
    pub data: Arc<[u8]>,
}

/// Process-wide planar cache, keyed by decoder identity.
///
/// Consumed, never implemented, by this crate: storage and eviction
/// policy belong to the host. Lookup and insert are expected to be
/// internally synchronized and effectively atomic per key.
pub trait PlaneCache: Send + Sync {
    /// Look up and retain the planes for a decoder.
    fn find_and_retain(&self, decoder_id: u64) -> Option<CachedPlanes>;

    /// Publish decoded planes for a decoder. Last writer wins.
    fn add(&self, decoder_id: u64, planes: CachedPlanes);
}

/// Acquired planar data: the layout, the shared buffer, and the offset
/// table locating each plane.
#[derive(Clone, Debug)]
pub struct YuvPlanes {
    layout: PlaneLayout,
    data: Arc<[u8]>,
    offsets: [Option<usize>; MAX_PLANES],
}

impl YuvPlanes {
    /// Assemble from a layout and its contiguous buffer.
    ///
    /// `None` if the buffer is smaller than the layout requires or the
    /// layout holds no data.
    pub fn new(layout: PlaneLayout, data: Arc<[u8]>) -> Option<Self> {
        if !layout.has_data() || data.len() < layout.total_byte_size()? {
            return None;
        }
        let offsets = layout.plane_offsets();
        Some(Self {
            layout,
            data,
            offsets,
        })
    }

    /// The plane layout.
    pub fn layout(&self) -> &PlaneLayout {
        &self.layout
    }

    /// The contiguous buffer holding every plane.
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Byte offsets of each plane. Empty planes are `None`.
    pub fn offsets(&self) -> &[Option<usize>; MAX_PLANES] {
        &self.offsets
    }

    /// The bytes of one plane. `None` for empty slots.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let offset = self.offsets.get(index).copied().flatten()?;
        let len = self.layout.planes[index].byte_size();
        self.data.get(offset..offset + len)
    }
}

/// Split a contiguous buffer into per-plane windows, in layout order.
///
/// Empty planes get empty slices so indices line up with the layout.
pub(crate) fn split_planes<'a>(
    buf: &'a mut [u8],
    layout: &PlaneLayout,
) -> Vec<&'a mut [u8]> {
    let mut rest = buf;
    let mut out = Vec::with_capacity(MAX_PLANES);
    for plane in &layout.planes {
        if plane.is_empty() {
            out.push(&mut [] as &mut [u8]);
            continue;
        }
        let (chunk, tail) = rest.split_at_mut(plane.byte_size());
        out.push(chunk);
        rest = tail;
    }
    out
}

impl LazyImage {
    /// Acquire the planar color data for this image's decoder.
    ///
    /// Consults `cache` under the **decoder's** identity first; on a
    /// miss, queries the layout and fills all planes in one decoder
    /// call under scoped access, then publishes the result. Returns
    /// `None` when the source has no planar form or the decode fails;
    /// nothing is inserted on failure.
    pub fn planes(&self, cache: &dyn PlaneCache) -> Option<YuvPlanes> {
        let decoder_id = self.shared().unique_id();
        let mut decoder = self.shared().scoped();

        if let Some(cached) = cache.find_and_retain(decoder_id) {
            return YuvPlanes::new(cached.layout, cached.data);
        }

        let layout = decoder.plane_layout()?;
        if !layout.has_data() {
            return None;
        }
        let total = layout.total_byte_size()?;
        let mut buf = vec![0u8; total];
        {
            let mut windows = split_planes(&mut buf, &layout);
            decoder.decode_planes(&layout, &mut windows).ok()?;
        }
        let data: Arc<[u8]> = buf.into();
        debug!(decoder_id, bytes = data.len(), "planes added to cache");
        cache.add(
            decoder_id,
            CachedPlanes {
                layout: layout.clone(),
                data: Arc::clone(&data),
            },
        );
        YuvPlanes::new(layout, data)
    }
}
