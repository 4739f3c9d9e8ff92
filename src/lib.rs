//! Lazy image handles over deferred decoders.
//!
//! This crate defines an image abstraction whose pixels are produced on
//! demand by a wrapped decoder and cached through injected stores:
//!
//! - [`LazyImage`] — the handle: identity, descriptor, and the
//!   raster/plane/texture acquisition operations
//! - [`ImageDecoder`] / [`PixmapMut`] — the decoder seam a zen* codec
//!   implements to become a lazy source
//! - [`SharedDecoder`] / [`ScopedDecoder`] — one decoder, one exclusive
//!   lock, shared by every derived handle
//! - [`RasterCache`] / [`PlaneCache`] — host-owned pixel caches with a
//!   reserve/commit insertion protocol
//! - [`TextureBackend`] / [`ResourceRegistry`] / [`GpuContext`] — the
//!   GPU seam behind the ordered texture acquisition chain
//! - [`ImageInfo`] / [`ColorSpace`] / [`ColorType`] — the immutable
//!   format descriptor and its color vocabulary
//!
//! Decoding is exclusive: recolored variants and subsets derived from
//! one source share a single decoder behind a single lock, so no source
//! is ever decoded concurrently with itself. Caches and GPU services
//! are consumed through traits, never owned, so hosts keep their own
//! storage and eviction policy.

#![forbid(unsafe_code)]

mod color;
mod decoder;
mod error;
mod identity;
mod image;
mod info;
mod planes;
mod raster;
mod shared;
mod texture;

#[cfg(test)]
mod testutil;

pub use color::{AlphaType, Cicp, ColorSpace, ColorType, NamedProfile};
pub use decoder::{ImageDecoder, PixmapMut, next_image_id};
pub use error::{DecodeError, LazyImageError};
pub use image::{LazyImage, RealizedImage};
pub use info::{ImageInfo, IntRect};
pub use planes::{
    CachedPlanes, MAX_PLANES, Orientation, PlaneCache, PlaneChannel, PlaneInfo, PlaneLayout,
    YuvColorSpace, YuvPlanes,
};
pub use raster::{Bitmap, CachingHint, RasterCache, RasterCacheKey, RasterReservation};
pub use shared::{ScopedDecoder, SharedDecoder};
pub use texture::{
    Budgeted, GpuContext, GpuTexture, Mipmapped, ResourceKey, ResourceRegistry, TextureBackend,
    TextureHandle, TexturePolicy,
};

// Re-exports for decoder implementors and users.
pub use imgref::{Img, ImgRef, ImgRefMut, ImgVec};
pub use rgb;
pub use rgb::{Gray, Rgb, Rgba};
