//! GPU texture acquisition.
//!
//! The GPU side of the crate is a set of consumed-only seams: a
//! [`TextureBackend`] that uploads and composes textures, and a
//! [`ResourceRegistry`] that maps stable [`ResourceKey`]s to previously
//! created textures. Over them, [`LazyImage::texture`] runs a strictly
//! ordered four-strategy chain, trying progressively more expensive
//! acquisition paths:
//!
//! 1. a texture already registered under this image's key;
//! 2. a texture the decoder can generate natively;
//! 3. decoded YUV planes uploaded and recombined on the GPU;
//! 4. a CPU raster uploaded as a texture.
//!
//! Each strategy absorbs its own failure and hands off to the next;
//! only exhaustion of all four surfaces as an error.

use std::sync::Arc;

use tracing::debug;

use crate::color::ColorSpace;
use crate::error::LazyImageError;
use crate::image::LazyImage;
use crate::info::{ImageInfo, IntRect};
use crate::planes::{PlaneCache, PlaneInfo, PlaneLayout};
use crate::raster::{Bitmap, CachingHint, RasterCache};

/// An opaque GPU texture created by the backend.
pub trait GpuTexture: Send + Sync {
    /// Texture dimensions in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Whether a full mip chain is present.
    fn has_mips(&self) -> bool;
}

/// Shared handle to a backend texture.
pub type TextureHandle = Arc<dyn GpuTexture>;

/// Whether the acquired texture must carry a full mip chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mipmapped {
    /// Base level only is acceptable.
    No,
    /// A full mip chain is required.
    Yes,
}

/// Whether a new texture counts against the GPU memory budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Budgeted {
    /// Outside the budget.
    No,
    /// Inside the budget.
    Yes,
}

/// What the acquired texture is for.
///
/// Only draw-time requests participate in the keyed registry; the
/// uncached policies never compute or register a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexturePolicy {
    /// Draw-time request; the result is registered for reuse.
    Draw,
    /// Fresh budgeted texture, not registered.
    NewUncachedBudgeted,
    /// Fresh unbudgeted texture, not registered.
    NewUncachedUnbudgeted,
}

/// Stable registry key: image identity plus the requested subset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// The owning image's identity.
    pub image_id: u64,
    /// Subset the texture covers.
    pub subset: IntRect,
}

/// Keyed registry of previously created textures.
///
/// Consumed, never implemented, by this crate. Internally synchronized;
/// find/assign/remove are effectively atomic per key.
pub trait ResourceRegistry: Send + Sync {
    /// Look up a texture registered under `key`.
    fn find(&self, key: &ResourceKey) -> Option<TextureHandle>;

    /// Register `texture` under `key`, replacing any prior binding.
    fn assign(&self, key: &ResourceKey, texture: &TextureHandle);

    /// Drop the binding for `key`, if any.
    fn remove(&self, key: &ResourceKey);
}

/// Texture upload and composition operations.
///
/// The conversion passes (YUV recombination, color-space transforms,
/// mip generation) are shader work owned by the draw pipeline; this
/// crate only sequences them.
pub trait TextureBackend: Send + Sync {
    /// Upload a raster as a texture.
    fn upload_bitmap(
        &self,
        bitmap: &Bitmap,
        mips: Mipmapped,
        budgeted: Budgeted,
    ) -> Option<TextureHandle>;

    /// Upload one plane's bytes as a single-channel texture.
    fn upload_plane(&self, pixels: &[u8], plane: &PlaneInfo) -> Option<TextureHandle>;

    /// Recombine plane textures into an RGB render target.
    ///
    /// Applies the layout's YUV matrix and origin, plus a color-space
    /// transform when `src_color_space` differs from the target
    /// descriptor's space.
    fn convert_planes(
        &self,
        planes: &[TextureHandle],
        layout: &PlaneLayout,
        src_color_space: &ColorSpace,
        dst_info: &ImageInfo,
        budgeted: Budgeted,
    ) -> Option<TextureHandle>;

    /// Copy a texture's base level into a fresh mipped texture and let
    /// the GPU generate the remaining levels.
    fn copy_base_mip(&self, texture: &TextureHandle) -> Option<TextureHandle>;

    /// Copy a sub-rectangle into a fresh texture.
    fn crop_texture(&self, texture: &TextureHandle, rect: IntRect) -> Option<TextureHandle>;
}

/// The GPU collaborators bundled with per-context configuration.
#[derive(Clone)]
pub struct GpuContext {
    backend: Arc<dyn TextureBackend>,
    registry: Arc<dyn ResourceRegistry>,
    context_id: u32,
    disable_yuv_conversion: bool,
}

impl GpuContext {
    /// Bundle a backend and registry under a context id.
    pub fn new(
        backend: Arc<dyn TextureBackend>,
        registry: Arc<dyn ResourceRegistry>,
        context_id: u32,
    ) -> Self {
        Self {
            backend,
            registry,
            context_id,
            disable_yuv_conversion: false,
        }
    }

    /// Disable the planar acquisition strategy for this context.
    pub fn with_yuv_conversion_disabled(mut self) -> Self {
        self.disable_yuv_conversion = true;
        self
    }

    /// The texture backend.
    pub fn backend(&self) -> &Arc<dyn TextureBackend> {
        &self.backend
    }

    /// The resource-key registry.
    pub fn registry(&self) -> &Arc<dyn ResourceRegistry> {
        &self.registry
    }

    /// Identifies this context in invalidation bookkeeping.
    pub fn context_id(&self) -> u32 {
        self.context_id
    }

    /// Whether the planar strategy is disabled here.
    pub fn yuv_conversion_disabled(&self) -> bool {
        self.disable_yuv_conversion
    }
}

/// Which strategy produced a texture. Logged per acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TexturePath {
    PreExisting,
    Native,
    Planar,
    Raster,
}

impl LazyImage {
    /// Acquire a GPU texture for this image.
    ///
    /// Runs the four-strategy chain described at the module level.
    /// A key is computed only for [`TexturePolicy::Draw`]; every
    /// registration pairs the key with an invalidation listener that
    /// unbinds it when this handle is dropped.
    pub fn texture(
        &self,
        ctx: &GpuContext,
        raster_cache: &dyn RasterCache,
        plane_cache: &dyn PlaneCache,
        policy: TexturePolicy,
        mips: Mipmapped,
    ) -> Result<TextureHandle, LazyImageError> {
        let key = (policy == TexturePolicy::Draw).then(|| ResourceKey {
            image_id: self.unique_id(),
            subset: self.info().bounds(),
        });

        // 1. A texture already registered under our key.
        if let Some(key) = key
            && let Some(existing) = ctx.registry().find(&key)
        {
            if mips == Mipmapped::Yes && !existing.has_mips() {
                // Cached texture lacks the required mips: synthesize a
                // mipped copy and re-register it. If synthesis fails,
                // the non-mipped original is still usable.
                if let Some(mipped) = ctx.backend().copy_base_mip(&existing) {
                    ctx.registry().remove(&key);
                    self.install_key(ctx, key, &mipped);
                    self.log_path(TexturePath::PreExisting);
                    return Ok(mipped);
                }
            }
            self.log_path(TexturePath::PreExisting);
            return Ok(existing);
        }

        // 2. A texture the decoder can generate natively.
        {
            let mut decoder = self.shared().scoped();
            if let Some(native) = decoder.generate_texture(ctx, self.info(), mips, policy) {
                drop(decoder);
                if let Some(key) = key {
                    self.install_key(ctx, key, &native);
                }
                self.log_path(TexturePath::Native);
                return Ok(native);
            }
        }

        // 3. Decoded planes recombined on the GPU. Skipped when mips
        // are required: the conversion pass cannot emit intermediate
        // levels, so the raster path handles mipped requests.
        if mips == Mipmapped::No && !ctx.yuv_conversion_disabled() {
            let budgeted = match policy {
                TexturePolicy::NewUncachedUnbudgeted => Budgeted::No,
                _ => Budgeted::Yes,
            };
            if let Some(composed) = self.texture_from_planes(ctx, plane_cache, budgeted) {
                if let Some(key) = key {
                    self.install_key(ctx, key, &composed);
                }
                self.log_path(TexturePath::Planar);
                return Ok(composed);
            }
        }

        // 4. A CPU raster uploaded as a texture.
        let hint = match policy {
            TexturePolicy::Draw => CachingHint::Allow,
            _ => CachingHint::Disallow,
        };
        if let Ok(bitmap) = self.raster(raster_cache, hint) {
            let budgeted = match policy {
                TexturePolicy::NewUncachedUnbudgeted => Budgeted::No,
                _ => Budgeted::Yes,
            };
            if let Some(uploaded) = ctx.backend().upload_bitmap(&bitmap, mips, budgeted) {
                if let Some(key) = key {
                    self.install_key(ctx, key, &uploaded);
                }
                self.log_path(TexturePath::Raster);
                return Ok(uploaded);
            }
        }

        debug!(image_id = self.unique_id(), "texture acquisition exhausted");
        Err(LazyImageError::TextureUnavailable)
    }

    /// Strategy 3: acquire planes, upload each as a single-channel
    /// texture, and run the recombination pass.
    fn texture_from_planes(
        &self,
        ctx: &GpuContext,
        plane_cache: &dyn PlaneCache,
        budgeted: Budgeted,
    ) -> Option<TextureHandle> {
        let planes = self.planes(plane_cache)?;

        let mut plane_textures = Vec::new();
        for (index, plane) in planes.layout().planes.iter().enumerate() {
            if plane.is_empty() {
                continue;
            }
            plane_textures.push(ctx.backend().upload_plane(planes.plane(index)?, plane)?);
        }

        // The recombined pixels come out in the decoder's native space;
        // if this handle was recolored, the pass also transforms into
        // the handle's space.
        let src_color_space = self.shared().info().color_space.clone();
        let layout = planes.layout().clone();
        ctx.backend()
            .convert_planes(&plane_textures, &layout, &src_color_space, self.info(), budgeted)
    }

    fn install_key(&self, ctx: &GpuContext, key: ResourceKey, texture: &TextureHandle) {
        let registry = Arc::clone(ctx.registry());
        self.add_invalidation_listener(Box::new(move || {
            registry.remove(&key);
        }));
        ctx.registry().assign(&key, texture);
    }

    fn log_path(&self, path: TexturePath) {
        debug!(image_id = self.unique_id(), path = ?path, "texture acquired");
    }
}
