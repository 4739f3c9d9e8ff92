//! The decoder capability.
//!
//! [`ImageDecoder`] is the external seam this crate is built around: a
//! format-specific pixel producer (zenjpeg, zenwebp, zenavif, ...) that
//! reports an immutable descriptor and identity at construction and
//! fills caller-supplied buffers on demand. Decoders are neither
//! reentrant nor thread-safe; every call that can touch decode state
//! must go through [`SharedDecoder::scoped`](crate::SharedDecoder::scoped).
//!
//! Only [`info()`](ImageDecoder::info) and
//! [`unique_id()`](ImageDecoder::unique_id) are safe to read without the
//! lock — both are fixed at construction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use imgref::ImgRefMut;
use rgb::{FromSlice, Rgba};

use crate::color::ColorType;
use crate::error::DecodeError;
use crate::info::ImageInfo;
use crate::planes::PlaneLayout;
use crate::texture::{GpuContext, Mipmapped, TextureHandle, TexturePolicy};

/// A writable pixel window handed to a decoder.
///
/// Pairs a descriptor with a caller-owned byte buffer and row stride.
/// The descriptor's color space is the tag the decoder should produce
/// pixels for; color-space reinterpretation works by tagging the window
/// with the source space so the decoder performs no conversion.
pub struct PixmapMut<'a> {
    info: ImageInfo,
    row_bytes: usize,
    data: &'a mut [u8],
}

impl<'a> PixmapMut<'a> {
    /// Wrap a buffer. `None` if the buffer is too small for the
    /// descriptor at the given stride.
    pub fn new(info: ImageInfo, row_bytes: usize, data: &'a mut [u8]) -> Option<Self> {
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

    /// The descriptor this window should be filled under.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Row stride in bytes.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Raw bytes of the window.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Typed RGBA8888 view, if the descriptor has that layout and a
    /// pixel-aligned stride.
    pub fn as_rgba8_mut(&mut self) -> Option<ImgRefMut<'_, Rgba<u8>>> {
        if self.info.color_type != ColorType::Rgba8888 || !self.row_bytes.is_multiple_of(4) {
            return None;
        }
        let (w, h) = (self.info.width as usize, self.info.height as usize);
        Some(ImgRefMut::new_stride(
            self.data.as_rgba_mut(),
            w,
            h,
            self.row_bytes / 4,
        ))
    }
}

/// A format-specific pixel producer.
///
/// The descriptor and unique id are fixed at construction. Everything
/// else may mutate decode state and must run under the shared lock.
/// Optional capabilities (encoded bytes, planar data, native textures)
/// default to "unsupported" so simple decoders implement only
/// [`info`](ImageDecoder::info), [`unique_id`](ImageDecoder::unique_id),
/// and [`decode_pixels`](ImageDecoder::decode_pixels).
pub trait ImageDecoder: Send {
    /// The immutable format descriptor.
    fn info(&self) -> &ImageInfo;

    /// Process-unique identity of this decoder, fixed at construction.
    ///
    /// Allocate with [`next_image_id`].
    fn unique_id(&self) -> u64;

    /// Fill the window with decoded pixels.
    ///
    /// The window's descriptor may differ from [`info()`](ImageDecoder::info)
    /// in color type or color space; the decoder converts as needed,
    /// except that a window tagged with the decoder's own color space
    /// receives unconverted pixels.
    fn decode_pixels(&mut self, dst: PixmapMut<'_>) -> Result<(), DecodeError>;

    /// The original encoded stream, if the decoder still holds it.
    fn encoded_bytes(&mut self) -> Option<Arc<[u8]>> {
        None
    }

    /// Planar (YUV) layout of the source, if it has one.
    fn plane_layout(&mut self) -> Option<PlaneLayout> {
        None
    }

    /// Fill every non-empty plane in one call.
    ///
    /// `planes` has one slice per layout slot, in layout order; empty
    /// slots get empty slices. Slice lengths are exactly
    /// `row_bytes × height` per plane.
    fn decode_planes(
        &mut self,
        layout: &PlaneLayout,
        planes: &mut [&mut [u8]],
    ) -> Result<(), DecodeError> {
        let _ = (layout, planes);
        Err(DecodeError::unsupported("decode_planes"))
    }

    /// Produce a GPU texture directly, bypassing CPU rasterization.
    ///
    /// Decoders backed by hardware sources (video frames, platform
    /// surfaces) can implement this; others leave the default.
    fn generate_texture(
        &mut self,
        ctx: &GpuContext,
        info: &ImageInfo,
        mips: Mipmapped,
        policy: TexturePolicy,
    ) -> Option<TextureHandle> {
        let _ = (ctx, info, mips, policy);
        None
    }

    /// Whether this decoder can still produce pixels, optionally for
    /// the given GPU context.
    fn is_valid(&mut self, ctx: Option<&GpuContext>) -> bool {
        let _ = ctx;
        true
    }
}

/// Allocate a fresh process-unique image identity.
///
/// Monotonically increasing, never zero, never reused. Decoder
/// implementations call this once at construction; the identity
/// resolver calls it when color overrides force a derived handle onto
/// its own cache key.
pub fn next_image_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
