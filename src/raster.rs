//! Rasters and raster acquisition.
//!
//! [`Bitmap`] is an immutable, refcounted decoded raster. The
//! process-wide [`RasterCache`] is consumed through a three-phase
//! find/reserve/commit protocol so a failed decode can only ever
//! discard its reservation — a partially filled buffer is
//! unobservable by other threads.

use std::sync::Arc;

use imgref::ImgRef;
use rgb::{FromSlice, Rgba};
use tracing::debug;

use crate::color::{ColorSpace, ColorType};
use crate::decoder::PixmapMut;
use crate::error::LazyImageError;
use crate::image::LazyImage;
use crate::info::{ImageInfo, IntRect};

/// Whether a read operation may populate the shared raster cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachingHint {
    /// Cache the decoded raster for future lookups.
    Allow,
    /// Decode into a private buffer; never touch the shared cache.
    Disallow,
}

/// An immutable decoded raster.
///
/// The pixel buffer is shared; clones are cheap and all views see the
/// same frozen bytes.
#[derive(Clone, Debug)]
pub struct Bitmap {
    info: ImageInfo,
    row_bytes: usize,
    data: Arc<[u8]>,
}

impl Bitmap {
    /// Wrap a filled buffer. `None` if it is too small for the
    /// descriptor at the given stride.
    pub fn new(info: ImageInfo, row_bytes: usize, data: Arc<[u8]>) -> Option<Self> {
        let needed = info.compute_byte_size(row_bytes)?;
        if data.len() < needed {
            return None;
        }
        Some(Self {
            info,
            row_bytes,
            data,
        })
    }

    /// The descriptor these pixels were produced under.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Row stride in bytes.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// The raw pixel bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The shared buffer.
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// One row's worth of meaningful bytes (stride padding excluded).
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.info.height {
            return None;
        }
        let start = y as usize * self.row_bytes;
        self.data.get(start..start + self.info.min_row_bytes())
    }

    /// Typed RGBA8888 view, if the layout and stride allow one.
    pub fn as_rgba8(&self) -> Option<ImgRef<'_, Rgba<u8>>> {
        if self.info.color_type != ColorType::Rgba8888 || !self.row_bytes.is_multiple_of(4) {
            return None;
        }
        let (w, h) = (self.info.width as usize, self.info.height as usize);
        Some(ImgRef::new_stride(
            self.data.as_rgba(),
            w,
            h,
            self.row_bytes / 4,
        ))
    }

    /// Copy out a sub-rectangle as a new tight bitmap.
    ///
    /// Pure row copies; pixel values are untouched. `None` if `rect`
    /// does not lie inside this bitmap.
    pub fn crop(&self, rect: IntRect) -> Option<Bitmap> {
        if !self.info.bounds().contains(&rect) {
            return None;
        }
        let bpp = self.info.color_type.bytes_per_pixel();
        let out_info = ImageInfo {
            width: rect.width,
            height: rect.height,
            ..self.info.clone()
        };
        let out_row = out_info.min_row_bytes();
        let mut out = vec![0u8; out_info.compute_byte_size(out_row)?];
        for y in 0..rect.height {
            let src_start =
                (rect.y as usize + y as usize) * self.row_bytes + rect.x as usize * bpp;
            let dst_start = y as usize * out_row;
            out[dst_start..dst_start + out_row]
                .copy_from_slice(&self.data[src_start..src_start + out_row]);
        }
        Bitmap::new(out_info, out_row, out.into())
    }

    /// The same bytes under a different color-space tag.
    pub fn with_color_space(&self, color_space: ColorSpace) -> Bitmap {
        Bitmap {
            info: self.info.clone().with_color_space(color_space),
            row_bytes: self.row_bytes,
            data: Arc::clone(&self.data),
        }
    }
}

/// Deterministic cache key for a raster: image identity plus bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterCacheKey {
    /// The owning image's identity.
    pub image_id: u64,
    /// Bounds the raster covers.
    pub bounds: IntRect,
}

impl RasterCacheKey {
    /// Key for an image's full bounds.
    pub fn new(image_id: u64, bounds: IntRect) -> Self {
        Self { image_id, bounds }
    }
}

/// A writable cache-owned slot handed out by [`RasterCache::reserve`].
///
/// Dropping a reservation without committing leaves the cache
/// unchanged; only [`commit`](RasterReservation::commit) publishes the
/// entry.
pub trait RasterReservation: Send {
    /// Descriptor the slot was sized for.
    fn info(&self) -> &ImageInfo;

    /// Row stride the cache allocated.
    fn row_bytes(&self) -> usize;

    /// The writable pixel bytes.
    fn pixels(&mut self) -> &mut [u8];

    /// Publish the filled slot and return the frozen raster.
    fn commit(self: Box<Self>) -> Bitmap;
}

/// Process-wide raster cache, keyed by image identity.
///
/// Consumed, never implemented, by this crate; storage and eviction
/// policy belong to the host. Lookup and insert are expected to be
/// internally synchronized and effectively atomic per key.
pub trait RasterCache: Send + Sync {
    /// Look up a previously committed raster.
    fn find(&self, key: &RasterCacheKey) -> Option<Bitmap>;

    /// Reserve a cache-owned buffer for the given descriptor.
    ///
    /// `None` when the reservation cannot be satisfied (allocation
    /// pressure, budget).
    fn reserve(&self, key: RasterCacheKey, info: &ImageInfo)
    -> Option<Box<dyn RasterReservation>>;
}

impl LazyImage {
    /// Acquire this image's pixels as an immutable raster.
    ///
    /// Consults `cache` under this image's identity; a hit returns the
    /// cached raster unchanged. On a miss with [`CachingHint::Allow`],
    /// the decode lands in a cache-owned slot that is committed only on
    /// success. With [`CachingHint::Disallow`] the decode lands in a
    /// private buffer and the shared cache is never touched.
    ///
    /// The cache is re-checked after the decoder lock is taken, so
    /// concurrent callers racing on the same key produce one fill —
    /// the losers find the winner's commit when they get the lock.
    pub fn raster(
        &self,
        cache: &dyn RasterCache,
        hint: CachingHint,
    ) -> Result<Bitmap, LazyImageError> {
        let key = RasterCacheKey::new(self.unique_id(), self.info().bounds());
        if let Some(hit) = cache.find(&key) {
            return Ok(hit);
        }

        match hint {
            CachingHint::Allow => {
                let mut slot = cache
                    .reserve(key, self.info())
                    .ok_or(LazyImageError::AllocationFailed)?;
                let mut decoder = self.shared().scoped();
                if let Some(hit) = cache.find(&key) {
                    // Lost the race; the winner committed while we
                    // waited for the lock. Drop the reservation.
                    return Ok(hit);
                }
                let row_bytes = slot.row_bytes();
                let pixmap = PixmapMut::new(self.info().clone(), row_bytes, slot.pixels())
                    .ok_or(LazyImageError::AllocationFailed)?;
                decoder.decode_pixels(pixmap)?;
                let bitmap = slot.commit();
                debug!(image_id = self.unique_id(), "raster added to cache");
                Ok(bitmap)
            }
            CachingHint::Disallow => {
                let row_bytes = self.info().min_row_bytes();
                let size = self
                    .info()
                    .compute_byte_size(row_bytes)
                    .ok_or(LazyImageError::AllocationFailed)?;
                let mut buf = vec![0u8; size];
                let pixmap = PixmapMut::new(self.info().clone(), row_bytes, &mut buf)
                    .ok_or(LazyImageError::AllocationFailed)?;
                self.shared().scoped().decode_pixels(pixmap)?;
                Bitmap::new(self.info().clone(), row_bytes, buf.into())
                    .ok_or(LazyImageError::AllocationFailed)
            }
        }
    }
}
