//! Shared test doubles: a scriptable decoder, in-memory caches, and a
//! fake GPU backend/registry pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::color::{ColorSpace, ColorType};
use crate::decoder::{ImageDecoder, PixmapMut, next_image_id};
use crate::error::DecodeError;
use crate::info::{ImageInfo, IntRect};
use crate::planes::{
    CachedPlanes, Orientation, PlaneCache, PlaneChannel, PlaneInfo, PlaneLayout, YuvColorSpace,
};
use crate::raster::{Bitmap, RasterCache, RasterCacheKey, RasterReservation};
use crate::texture::{
    Budgeted, GpuContext, GpuTexture, Mipmapped, ResourceKey, ResourceRegistry, TextureBackend,
    TextureHandle, TexturePolicy,
};

/// Deterministic byte for position `(y, i)` of a raster fill.
fn raster_byte(y: u32, i: usize) -> u8 {
    (y as usize)
        .wrapping_mul(31)
        .wrapping_add(i)
        .wrapping_mul(7) as u8
}

/// A decoder with scripted capabilities and observable counters.
///
/// Lock discipline is observable through `overlap_flag`: every decode
/// entry point marks itself busy and trips the flag if a second caller
/// arrives while one is inside.
pub(crate) struct TestDecoder {
    info: ImageInfo,
    unique_id: u64,
    layout: Option<PlaneLayout>,
    encoded: Option<Arc<[u8]>>,
    fail_decode: bool,
    native_texture: bool,
    fills: Arc<AtomicUsize>,
    plane_fills: Arc<AtomicUsize>,
    busy: AtomicBool,
    overlaps: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
}

impl TestDecoder {
    fn new(info: ImageInfo, layout: Option<PlaneLayout>) -> Self {
        Self {
            info,
            unique_id: next_image_id(),
            layout,
            encoded: None,
            fail_decode: false,
            native_texture: false,
            fills: Arc::new(AtomicUsize::new(0)),
            plane_fills: Arc::new(AtomicUsize::new(0)),
            busy: AtomicBool::new(false),
            overlaps: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A plain RGBA8888 source with no planar form.
    pub(crate) fn rgba(width: u32, height: u32) -> Self {
        Self::new(ImageInfo::new(width, height, ColorType::Rgba8888), None)
    }

    /// An RGBA8888 source that also reports a three-plane 4:2:0 layout.
    pub(crate) fn yuv(width: u32, height: u32) -> Self {
        let chroma_w = width.div_ceil(2);
        let chroma_h = height.div_ceil(2);
        let layout = PlaneLayout {
            planes: [
                PlaneInfo {
                    width,
                    height,
                    row_bytes: width as usize,
                },
                PlaneInfo {
                    width: chroma_w,
                    height: chroma_h,
                    row_bytes: chroma_w as usize,
                },
                PlaneInfo {
                    width: chroma_w,
                    height: chroma_h,
                    row_bytes: chroma_w as usize,
                },
                PlaneInfo::default(),
            ],
            origin: Orientation::Normal,
            color_space: YuvColorSpace::Rec601Limited,
            components: [
                Some(PlaneChannel {
                    plane: 0,
                    channel: 0,
                }),
                Some(PlaneChannel {
                    plane: 1,
                    channel: 0,
                }),
                Some(PlaneChannel {
                    plane: 2,
                    channel: 0,
                }),
                None,
            ],
        };
        Self::new(
            ImageInfo::new(width, height, ColorType::Rgba8888),
            Some(layout),
        )
    }

    /// Make every pixel decode fail.
    pub(crate) fn failing(mut self) -> Self {
        self.fail_decode = true;
        self
    }

    /// Attach an encoded stream.
    pub(crate) fn with_encoded(mut self, encoded: Arc<[u8]>) -> Self {
        self.encoded = Some(encoded);
        self
    }

    /// Make `generate_texture` succeed.
    pub(crate) fn with_native_texture(mut self) -> Self {
        self.native_texture = true;
        self
    }

    /// Number of completed pixel decodes.
    pub(crate) fn fill_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fills)
    }

    /// Number of completed planar decodes.
    pub(crate) fn plane_fill_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.plane_fills)
    }

    /// Set if two callers were ever inside the decoder at once.
    pub(crate) fn overlap_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.overlaps)
    }

    /// Set when the decoder is dropped.
    pub(crate) fn drop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dropped)
    }

    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.store(true, Ordering::SeqCst);
        }
        std::thread::yield_now();
    }

    fn exit(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl ImageDecoder for TestDecoder {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn unique_id(&self) -> u64 {
        self.unique_id
    }

    fn decode_pixels(&mut self, mut dst: PixmapMut<'_>) -> Result<(), DecodeError> {
        self.enter();
        let result = if self.fail_decode {
            Err(DecodeError::new("scripted failure"))
        } else {
            let width_bytes =
                dst.info().width as usize * dst.info().color_type.bytes_per_pixel();
            let height = dst.info().height;
            let row_bytes = dst.row_bytes();
            for y in 0..height {
                let start = y as usize * row_bytes;
                let row = &mut dst.bytes_mut()[start..start + width_bytes];
                for (i, byte) in row.iter_mut().enumerate() {
                    *byte = raster_byte(y, i);
                }
            }
            self.fills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        self.exit();
        result
    }

    fn encoded_bytes(&mut self) -> Option<Arc<[u8]>> {
        self.encoded.clone()
    }

    fn plane_layout(&mut self) -> Option<PlaneLayout> {
        self.layout.clone()
    }

    fn decode_planes(
        &mut self,
        layout: &PlaneLayout,
        planes: &mut [&mut [u8]],
    ) -> Result<(), DecodeError> {
        if self.layout.is_none() {
            return Err(DecodeError::unsupported("decode_planes"));
        }
        self.enter();
        for (index, window) in planes.iter_mut().enumerate() {
            debug_assert_eq!(window.len(), layout.planes[index].byte_size());
            for (j, byte) in window.iter_mut().enumerate() {
                *byte = (index.wrapping_mul(17).wrapping_add(j)) as u8;
            }
        }
        self.plane_fills.fetch_add(1, Ordering::SeqCst);
        self.exit();
        Ok(())
    }

    fn generate_texture(
        &mut self,
        _ctx: &GpuContext,
        info: &ImageInfo,
        mips: Mipmapped,
        _policy: TexturePolicy,
    ) -> Option<TextureHandle> {
        if !self.native_texture {
            return None;
        }
        Some(Arc::new(FakeTexture::new(
            info.width,
            info.height,
            mips == Mipmapped::Yes,
        )))
    }

    fn is_valid(&mut self, _ctx: Option<&GpuContext>) -> bool {
        self.enter();
        self.exit();
        true
    }
}

impl Drop for TestDecoder {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

type RasterEntries = Arc<Mutex<HashMap<RasterCacheKey, Bitmap>>>;

/// In-memory raster cache with a working reserve/commit protocol.
#[derive(Default)]
pub(crate) struct MemoryRasterCache {
    entries: RasterEntries,
}

impl MemoryRasterCache {
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

struct MemoryReservation {
    key: RasterCacheKey,
    info: ImageInfo,
    row_bytes: usize,
    buf: Vec<u8>,
    entries: RasterEntries,
}

impl RasterReservation for MemoryReservation {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    fn pixels(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn commit(self: Box<Self>) -> Bitmap {
        let bitmap = Bitmap::new(self.info, self.row_bytes, self.buf.into())
            .expect("reservation sized its own buffer");
        self.entries.lock().insert(self.key, bitmap.clone());
        bitmap
    }
}

impl RasterCache for MemoryRasterCache {
    fn find(&self, key: &RasterCacheKey) -> Option<Bitmap> {
        self.entries.lock().get(key).cloned()
    }

    fn reserve(
        &self,
        key: RasterCacheKey,
        info: &ImageInfo,
    ) -> Option<Box<dyn RasterReservation>> {
        let row_bytes = info.min_row_bytes();
        let size = info.compute_byte_size(row_bytes)?;
        Some(Box::new(MemoryReservation {
            key,
            info: info.clone(),
            row_bytes,
            buf: vec![0u8; size],
            entries: Arc::clone(&self.entries),
        }))
    }
}

/// In-memory plane cache keyed by decoder identity.
#[derive(Default)]
pub(crate) struct MemoryPlaneCache {
    entries: Mutex<HashMap<u64, CachedPlanes>>,
}

impl MemoryPlaneCache {
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl PlaneCache for MemoryPlaneCache {
    fn find_and_retain(&self, decoder_id: u64) -> Option<CachedPlanes> {
        self.entries.lock().get(&decoder_id).cloned()
    }

    fn add(&self, decoder_id: u64, planes: CachedPlanes) {
        self.entries.lock().insert(decoder_id, planes);
    }
}

/// A texture that only remembers its dimensions and mip state.
pub(crate) struct FakeTexture {
    width: u32,
    height: u32,
    mips: bool,
}

impl FakeTexture {
    pub(crate) fn new(width: u32, height: u32, mips: bool) -> Self {
        Self {
            width,
            height,
            mips,
        }
    }
}

impl GpuTexture for FakeTexture {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn has_mips(&self) -> bool {
        self.mips
    }
}

/// Counting backend whose operations can be scripted to fail.
#[derive(Default)]
pub(crate) struct FakeBackend {
    plane_uploads: AtomicUsize,
    bitmap_uploads: AtomicUsize,
    conversions: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_mips: AtomicBool,
    last_budgeted: Mutex<Option<Budgeted>>,
    last_spaces: Mutex<Option<(ColorSpace, ColorSpace)>>,
}

impl FakeBackend {
    pub(crate) fn plane_uploads(&self) -> usize {
        self.plane_uploads.load(Ordering::SeqCst)
    }

    pub(crate) fn bitmap_uploads(&self) -> usize {
        self.bitmap_uploads.load(Ordering::SeqCst)
    }

    pub(crate) fn conversions(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }

    pub(crate) fn last_budgeted(&self) -> Option<Budgeted> {
        *self.last_budgeted.lock()
    }

    pub(crate) fn last_conversion_spaces(&self) -> Option<(ColorSpace, ColorSpace)> {
        self.last_spaces.lock().clone()
    }

    pub(crate) fn fail_mip_synthesis(&self) {
        self.fail_mips.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_all_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }
}

impl TextureBackend for FakeBackend {
    fn upload_bitmap(
        &self,
        bitmap: &Bitmap,
        mips: Mipmapped,
        budgeted: Budgeted,
    ) -> Option<TextureHandle> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return None;
        }
        self.bitmap_uploads.fetch_add(1, Ordering::SeqCst);
        *self.last_budgeted.lock() = Some(budgeted);
        Some(Arc::new(FakeTexture::new(
            bitmap.info().width,
            bitmap.info().height,
            mips == Mipmapped::Yes,
        )))
    }

    fn upload_plane(&self, pixels: &[u8], plane: &PlaneInfo) -> Option<TextureHandle> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return None;
        }
        debug_assert_eq!(pixels.len(), plane.byte_size());
        self.plane_uploads.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(FakeTexture::new(plane.width, plane.height, false)))
    }

    fn convert_planes(
        &self,
        planes: &[TextureHandle],
        _layout: &PlaneLayout,
        src_color_space: &ColorSpace,
        dst_info: &ImageInfo,
        budgeted: Budgeted,
    ) -> Option<TextureHandle> {
        if self.fail_uploads.load(Ordering::SeqCst) || planes.is_empty() {
            return None;
        }
        self.conversions.fetch_add(1, Ordering::SeqCst);
        *self.last_budgeted.lock() = Some(budgeted);
        *self.last_spaces.lock() =
            Some((src_color_space.clone(), dst_info.color_space.clone()));
        Some(Arc::new(FakeTexture::new(
            dst_info.width,
            dst_info.height,
            false,
        )))
    }

    fn copy_base_mip(&self, texture: &TextureHandle) -> Option<TextureHandle> {
        if self.fail_mips.load(Ordering::SeqCst) {
            return None;
        }
        let (w, h) = texture.dimensions();
        Some(Arc::new(FakeTexture::new(w, h, true)))
    }

    fn crop_texture(&self, _texture: &TextureHandle, rect: IntRect) -> Option<TextureHandle> {
        Some(Arc::new(FakeTexture::new(
            rect.width,
            rect.height,
            false,
        )))
    }
}

/// Registry backed by a hash map.
#[derive(Default)]
pub(crate) struct FakeRegistry {
    bindings: Mutex<HashMap<ResourceKey, TextureHandle>>,
}

impl FakeRegistry {
    pub(crate) fn len(&self) -> usize {
        self.bindings.lock().len()
    }
}

impl ResourceRegistry for FakeRegistry {
    fn find(&self, key: &ResourceKey) -> Option<TextureHandle> {
        self.bindings.lock().get(key).cloned()
    }

    fn assign(&self, key: &ResourceKey, texture: &TextureHandle) {
        self.bindings.lock().insert(*key, Arc::clone(texture));
    }

    fn remove(&self, key: &ResourceKey) {
        self.bindings.lock().remove(key);
    }
}
