//! The lazy image handle.
//!
//! A [`LazyImage`] is an image identity whose pixels do not exist yet:
//! it owns a reference to a [`SharedDecoder`] and produces rasters,
//! planes, and textures on demand, caching each through the injected
//! collaborator stores. Derived handles — recolored variants, subsets —
//! share the same decoder, so one source is never decoded by two
//! handles at once.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::color::{ColorSpace, ColorType};
use crate::decoder::{ImageDecoder, PixmapMut};
use crate::error::{DecodeError, LazyImageError};
use crate::identity::Validator;
use crate::info::{ImageInfo, IntRect};
use crate::planes::PlaneCache;
use crate::raster::{Bitmap, CachingHint, RasterCache};
use crate::shared::SharedDecoder;
use crate::texture::{GpuContext, Mipmapped, TextureHandle, TexturePolicy};

/// A fully materialized image: either a CPU raster or a GPU texture.
///
/// Returned by [`LazyImage::make_subset`], which realizes the lazy
/// image before delegating the subset operation to the realized form.
#[derive(Clone)]
pub enum RealizedImage {
    /// An immutable raster.
    Raster(Bitmap),
    /// A GPU texture.
    Texture(TextureHandle),
}

/// An image handle that defers decoding to a shared decoder.
///
/// Handles are held as `Arc<LazyImage>`; the single-slot variant memo
/// stores one and clones of the handle are how derived images share
/// the decoder.
pub struct LazyImage {
    info: ImageInfo,
    unique_id: u64,
    shared: Arc<SharedDecoder>,
    variant_memo: Mutex<Option<Arc<LazyImage>>>,
    invalidation_listeners: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl LazyImage {
    /// Build an image over a decoder.
    ///
    /// Fails with [`LazyImageError::InvalidSource`] if the decoder
    /// reports an empty descriptor.
    pub fn from_decoder(decoder: Box<dyn ImageDecoder>) -> Result<Arc<Self>, LazyImageError> {
        let shared = SharedDecoder::new(decoder);
        let validator = Validator::resolve(&shared, None, None)?;
        Ok(Self::from_validator(validator))
    }

    pub(crate) fn from_validator(validator: Validator) -> Arc<Self> {
        Arc::new(Self {
            info: validator.info,
            unique_id: validator.unique_id,
            shared: validator.shared,
            variant_memo: Mutex::new(None),
            invalidation_listeners: Mutex::new(Vec::new()),
        })
    }

    /// This image's format descriptor.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// This image's cache identity.
    ///
    /// Equal to the decoder's id unless color overrides were applied
    /// at construction, in which case it is a fresh process-unique
    /// value. Raster and texture cache entries are keyed by this.
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub(crate) fn shared(&self) -> &Arc<SharedDecoder> {
        &self.shared
    }

    /// Derive a handle with a different color type and/or color space.
    ///
    /// A single-slot memo caches the most recent variant: a repeated
    /// request for the same color type and a structurally equal color
    /// space returns the memoized handle without re-resolving. Any
    /// other request replaces the slot. The dominant caller pattern is
    /// many requests for one target configuration per rendering pass,
    /// so one slot is all the history kept.
    ///
    /// `None` when resolution fails (degenerate descriptor); the slot
    /// is left untouched in that case.
    pub fn derive_variant(
        &self,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Option<Arc<LazyImage>> {
        // An absent target space means "keep mine" for the memo compare.
        let target_space = color_space
            .clone()
            .unwrap_or_else(|| self.info.color_space.clone());

        let mut memo = self.variant_memo.lock();
        if let Some(existing) = memo.as_ref()
            && existing.info.color_type == color_type
            && existing.info.color_space == target_space
        {
            return Some(Arc::clone(existing));
        }

        // Resolution only reads the lock-free descriptor, so holding
        // the memo lock across it is allowed.
        let validator = Validator::resolve(&self.shared, Some(color_type), color_space).ok()?;
        let image = Self::from_validator(validator);
        *memo = Some(Arc::clone(&image));
        Some(image)
    }

    /// Realize a sub-rectangle of this image.
    ///
    /// Materializes the full image first — as a texture when a GPU
    /// context is supplied, as a cached raster otherwise — and
    /// delegates the subset to the realized form. No partial decode is
    /// attempted.
    pub fn make_subset(
        &self,
        subset: IntRect,
        raster_cache: &dyn RasterCache,
        gpu: Option<(&GpuContext, &dyn PlaneCache)>,
    ) -> Option<RealizedImage> {
        if !self.info.bounds().contains(&subset) {
            return None;
        }
        match gpu {
            Some((ctx, plane_cache)) => {
                let full = self
                    .texture(
                        ctx,
                        raster_cache,
                        plane_cache,
                        TexturePolicy::Draw,
                        Mipmapped::No,
                    )
                    .ok()?;
                let cropped = ctx.backend().crop_texture(&full, subset)?;
                Some(RealizedImage::Texture(cropped))
            }
            None => {
                let full = self.raster(raster_cache, CachingHint::Allow).ok()?;
                Some(RealizedImage::Raster(full.crop(subset)?))
            }
        }
    }

    /// Reinterpret this image's bytes under a different color space.
    ///
    /// The decode window keeps this image's own color-space tag so the
    /// decoder performs no conversion; the returned raster carries
    /// `color_space` over bytes identical to a plain decode. `None` if
    /// the decode fails.
    pub fn reinterpret_color_space(&self, color_space: ColorSpace) -> Option<Bitmap> {
        let row_bytes = self.info.min_row_bytes();
        let size = self.info.compute_byte_size(row_bytes)?;
        let mut buf = vec![0u8; size];
        let pixmap = PixmapMut::new(self.info.clone(), row_bytes, &mut buf)?;
        self.shared.scoped().decode_pixels(pixmap).ok()?;
        Bitmap::new(
            self.info.clone().with_color_space(color_space),
            row_bytes,
            buf.into(),
        )
    }

    /// The original encoded stream, if available.
    ///
    /// Only a handle whose identity equals the decoder's may forward
    /// this: a recolored variant is not the original stream, and
    /// handing out its bytes under a rewritten descriptor would
    /// misrepresent them.
    pub fn encoded_bytes(&self) -> Option<Arc<[u8]>> {
        if self.shared.unique_id() != self.unique_id {
            return None;
        }
        self.shared.scoped().encoded_bytes()
    }

    /// Copy a window of this image's pixels into `dst`.
    ///
    /// The destination must share this image's color type and lie
    /// within bounds; rows are byte-copied from the realized raster.
    pub fn read_pixels(
        &self,
        cache: &dyn RasterCache,
        mut dst: PixmapMut<'_>,
        src_x: u32,
        src_y: u32,
        hint: CachingHint,
    ) -> Result<(), LazyImageError> {
        let window = IntRect::new(
            src_x as i32,
            src_y as i32,
            dst.info().width,
            dst.info().height,
        );
        if dst.info().color_type != self.info.color_type || !self.info.bounds().contains(&window) {
            return Err(DecodeError::new("destination window does not match source").into());
        }
        let bitmap = self.raster(cache, hint)?;
        let bpp = self.info.color_type.bytes_per_pixel();
        let (x0, width_bytes) = (src_x as usize * bpp, window.width as usize * bpp);
        let dst_row_bytes = dst.row_bytes();
        for y in 0..window.height {
            let src_row = bitmap
                .row(src_y + y)
                .ok_or_else(|| DecodeError::new("source row out of range"))?;
            let dst_start = y as usize * dst_row_bytes;
            dst.bytes_mut()[dst_start..dst_start + width_bytes]
                .copy_from_slice(&src_row[x0..x0 + width_bytes]);
        }
        Ok(())
    }

    /// Whether the decoder can still produce pixels.
    pub fn is_valid(&self, ctx: Option<&GpuContext>) -> bool {
        self.shared.scoped().is_valid(ctx)
    }

    /// Register a callback fired once when this handle is dropped.
    ///
    /// The texture chain uses this to unbind resource keys when the
    /// identity they were registered under stops existing.
    pub fn add_invalidation_listener(&self, listener: Box<dyn FnOnce() + Send>) {
        self.invalidation_listeners.lock().push(listener);
    }
}

impl Drop for LazyImage {
    fn drop(&mut self) {
        for listener in self.invalidation_listeners.get_mut().drain(..) {
            listener();
        }
    }
}

impl std::fmt::Debug for LazyImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyImage")
            .field("unique_id", &self.unique_id)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
