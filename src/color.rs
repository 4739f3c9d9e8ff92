//! Color interpretation types.
//!
//! [`ColorType`] and [`AlphaType`] describe how pixel memory is laid out
//! and how its alpha channel should be read. [`ColorSpace`] is an owned,
//! structurally comparable description of the space pixels live in —
//! a well-known named profile, CICP parameters, or raw ICC bytes.
//!
//! Structural equality on [`ColorSpace`] matters: the derived-variant
//! memo compares requested and memoized spaces by value, so two
//! independently constructed sRGB descriptions must compare equal.

use std::sync::Arc;

/// CICP color description (ITU-T H.273).
///
/// Coding-Independent Code Points describe a color space without
/// requiring an ICC profile. Used by AVIF, HEIF, JPEG XL, and video
/// codecs (H.264, H.265, AV1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cicp {
    /// Color primaries (ColourPrimaries). Common values:
    /// 1 = BT.709/sRGB, 9 = BT.2020, 12 = Display P3.
    pub color_primaries: u8,
    /// Transfer characteristics (TransferCharacteristics). Common values:
    /// 1 = BT.709, 13 = sRGB, 16 = PQ (HDR), 18 = HLG (HDR).
    pub transfer_characteristics: u8,
    /// Matrix coefficients (MatrixCoefficients). Common values:
    /// 0 = Identity/RGB, 1 = BT.709, 6 = BT.601, 9 = BT.2020.
    pub matrix_coefficients: u8,
    /// Whether pixel values use the full range (0-255 for 8-bit)
    /// or video/limited range (16-235 for 8-bit luma).
    pub full_range: bool,
}

impl Cicp {
    /// sRGB color space: BT.709 primaries, sRGB transfer, BT.601 matrix, full range.
    pub const SRGB: Self = Self {
        color_primaries: 1,
        transfer_characteristics: 13,
        matrix_coefficients: 6,
        full_range: true,
    };

    /// Display P3: P3 primaries, sRGB transfer, full range.
    pub const DISPLAY_P3: Self = Self {
        color_primaries: 12,
        transfer_characteristics: 13,
        matrix_coefficients: 6,
        full_range: true,
    };

    /// BT.2100 PQ (HDR10): BT.2020 primaries, PQ transfer, BT.2020 matrix, full range.
    pub const BT2100_PQ: Self = Self {
        color_primaries: 9,
        transfer_characteristics: 16,
        matrix_coefficients: 9,
        full_range: true,
    };
}

/// Well-known color profiles that any CMS should recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum NamedProfile {
    /// sRGB (IEC 61966-2-1). The web and desktop default.
    #[default]
    Srgb,
    /// Display P3 with sRGB transfer curve. Used by Apple displays, wide-gamut web content.
    DisplayP3,
    /// BT.2020 with PQ transfer (HDR10, SMPTE ST 2084).
    Bt2020Pq,
    /// Adobe RGB (1998). Used in print workflows.
    AdobeRgb,
    /// Linear sRGB (sRGB primaries, gamma 1.0).
    LinearSrgb,
}

impl NamedProfile {
    /// Convert to CICP parameters, if a standard mapping exists.
    ///
    /// Returns `None` for profiles without standard CICP codes (e.g., Adobe RGB).
    pub const fn to_cicp(self) -> Option<Cicp> {
        match self {
            Self::Srgb => Some(Cicp::SRGB),
            Self::DisplayP3 => Some(Cicp::DISPLAY_P3),
            Self::Bt2020Pq => Some(Cicp::BT2100_PQ),
            Self::LinearSrgb => Some(Cicp {
                color_primaries: 1,
                transfer_characteristics: 8,
                matrix_coefficients: 0,
                full_range: true,
            }),
            Self::AdobeRgb => None,
        }
    }
}

/// How pixel memory is laid out.
///
/// This is the storage format of a raster, independent of color space.
/// [`Unknown`](ColorType::Unknown) marks a descriptor the decoder could
/// not classify; such descriptors are treated as empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorType {
    /// Uninterpretable layout. Descriptors with this type are degenerate.
    #[default]
    Unknown,
    /// 8-bit grayscale, one channel.
    Gray8,
    /// 8-bit RGBA, red first in memory.
    Rgba8888,
    /// 8-bit BGRA, blue first in memory. Native for Windows/DirectX surfaces.
    Bgra8888,
    /// 10-bit RGB plus 2-bit alpha packed in 32 bits.
    Rgba1010102,
    /// Half-float RGBA.
    RgbaF16,
    /// Full-float RGBA.
    RgbaF32,
}

impl ColorType {
    /// Bytes used per pixel. Zero for [`Unknown`](ColorType::Unknown).
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::Gray8 => 1,
            Self::Rgba8888 | Self::Bgra8888 | Self::Rgba1010102 => 4,
            Self::RgbaF16 => 8,
            Self::RgbaF32 => 16,
        }
    }
}

/// How the alpha channel should be interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaType {
    /// All pixels are fully opaque; alpha bytes, if present, are ignored.
    #[default]
    Opaque,
    /// Color channels are premultiplied by alpha.
    Premul,
    /// Color channels are independent of alpha.
    Unpremul,
}

/// An owned color-space description.
///
/// Compared structurally: two [`Srgb`](ColorSpace::Srgb) values are
/// equal, and two [`Icc`](ColorSpace::Icc) values are equal when their
/// profile bytes are. ICC bytes are shared via `Arc` so cloning a
/// descriptor never copies profile data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColorSpace {
    /// sRGB. The default interpretation when a source declares nothing.
    #[default]
    Srgb,
    /// A well-known named profile.
    Named(NamedProfile),
    /// CICP parameters (a CMS can synthesize an equivalent profile).
    Cicp(Cicp),
    /// Raw ICC profile bytes.
    Icc(Arc<[u8]>),
}

impl ColorSpace {
    /// Create from ICC profile bytes.
    pub fn from_icc(icc: impl Into<Arc<[u8]>>) -> Self {
        Self::Icc(icc.into())
    }

    /// True if this describes sRGB.
    ///
    /// Checks the named and CICP forms; ICC profiles are not parsed.
    pub fn is_srgb(&self) -> bool {
        match self {
            Self::Srgb => true,
            Self::Named(p) => *p == NamedProfile::Srgb,
            Self::Cicp(c) => *c == Cicp::SRGB,
            Self::Icc(_) => false,
        }
    }
}
