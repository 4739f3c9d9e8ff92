//! The image format descriptor.
//!
//! [`ImageInfo`] is the immutable description a decoder reports at
//! construction: dimensions, pixel layout, alpha interpretation, and
//! color space. Every buffer-size computation in the crate goes through
//! it, and the identity resolver rewrites it when color overrides are
//! applied to a derived handle.

use crate::color::{AlphaType, ColorSpace, ColorType};

/// An integer rectangle: origin plus size.
///
/// Used for subset requests and as part of GPU resource keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl IntRect {
    /// Create a rectangle from origin and size.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle at the origin with the given size.
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether either dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Right edge (exclusive).
    pub const fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge (exclusive).
    pub const fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &IntRect) -> bool {
        !other.is_empty()
            && other.x as i64 >= self.x as i64
            && other.y as i64 >= self.y as i64
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Immutable format descriptor for an image.
///
/// Fixed at decoder construction and treated as read-only thereafter;
/// reading it never requires the decoder lock. Built with `with_*`
/// methods:
///
/// ```
/// use zenlazy::{AlphaType, ColorSpace, ColorType, ImageInfo};
///
/// let info = ImageInfo::new(640, 480, ColorType::Rgba8888)
///     .with_alpha_type(AlphaType::Premul)
///     .with_color_space(ColorSpace::Srgb);
/// assert!(!info.is_empty());
/// assert_eq!(info.min_row_bytes(), 640 * 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel memory layout.
    pub color_type: ColorType,
    /// Alpha interpretation.
    pub alpha_type: AlphaType,
    /// Color space the pixels are tagged with.
    pub color_space: ColorSpace,
}

impl ImageInfo {
    /// Create a descriptor with the given dimensions and color type.
    ///
    /// Alpha defaults to opaque and the color space to sRGB.
    pub fn new(width: u32, height: u32, color_type: ColorType) -> Self {
        Self {
            width,
            height,
            color_type,
            alpha_type: AlphaType::Opaque,
            color_space: ColorSpace::Srgb,
        }
    }

    /// Set the alpha interpretation.
    pub fn with_alpha_type(mut self, alpha_type: AlphaType) -> Self {
        self.alpha_type = alpha_type;
        self
    }

    /// Set the color space.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    /// Set the pixel layout.
    pub fn with_color_type(mut self, color_type: ColorType) -> Self {
        self.color_type = color_type;
        self
    }

    /// Whether this descriptor is degenerate.
    ///
    /// A zero dimension or unknown color type means no pixels can be
    /// produced under it; handle construction from such a descriptor
    /// must fail.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.color_type == ColorType::Unknown
    }

    /// Full-image bounds at the origin.
    pub const fn bounds(&self) -> IntRect {
        IntRect::from_size(self.width, self.height)
    }

    /// Tightest row stride for this layout.
    pub fn min_row_bytes(&self) -> usize {
        self.width as usize * self.color_type.bytes_per_pixel()
    }

    /// Total byte size of a buffer with the given row stride.
    ///
    /// `None` if the stride is tighter than the layout allows or the
    /// size overflows.
    pub fn compute_byte_size(&self, row_bytes: usize) -> Option<usize> {
        if row_bytes < self.min_row_bytes() {
            return None;
        }
        if self.height == 0 {
            return Some(0);
        }
        // Last row only needs min_row_bytes, not the full stride.
        let full_rows = (self.height as usize - 1).checked_mul(row_bytes)?;
        full_rows.checked_add(self.min_row_bytes())
    }
}
