//! Identity resolution for new image handles.
//!
//! A handle's identity is what keys every raster and texture cache
//! entry, so two handles that would interpret the same decoded bytes
//! differently must never share one. [`Validator`] computes the
//! descriptor/identity pair for a handle derived from a shared decoder
//! plus optional color overrides:
//!
//! - no effective override → the decoder's own identity (cache entries
//!   are shared with every other plain handle over that decoder);
//! - any effective override → a freshly allocated identity, distinct
//!   from the decoder's and from every other override combination's.
//!
//! A color-type override equal to the current type is dropped before
//! this decision. A supplied color space is *not* structurally
//! compared — it always counts as an override and always forces a new
//! identity, even when equal to the current space. Checking equality
//! here would save an id at the cost of conflating handles whose
//! spaces compare equal but are semantically distinct to the caller.

use std::sync::Arc;

use crate::color::{ColorSpace, ColorType};
use crate::decoder::next_image_id;
use crate::error::LazyImageError;
use crate::info::ImageInfo;
use crate::shared::SharedDecoder;

/// Resolved descriptor and identity for a handle under construction.
#[derive(Debug)]
pub(crate) struct Validator {
    pub(crate) shared: Arc<SharedDecoder>,
    pub(crate) info: ImageInfo,
    pub(crate) unique_id: u64,
}

impl Validator {
    /// Resolve a descriptor and identity, applying color overrides.
    ///
    /// Fails with [`LazyImageError::InvalidSource`] when the decoder's
    /// descriptor is empty; a handle must not be built over it.
    pub(crate) fn resolve(
        shared: &Arc<SharedDecoder>,
        color_type: Option<ColorType>,
        color_space: Option<ColorSpace>,
    ) -> Result<Validator, LazyImageError> {
        // Descriptor and id reads are lock-free; see SharedDecoder.
        let mut info = shared.info().clone();
        if info.is_empty() {
            return Err(LazyImageError::InvalidSource);
        }

        let mut unique_id = shared.unique_id();

        let color_type = color_type.filter(|ct| *ct != info.color_type);

        if color_type.is_some() || color_space.is_some() {
            if let Some(ct) = color_type {
                info = info.with_color_type(ct);
            }
            if let Some(cs) = color_space {
                info = info.with_color_space(cs);
            }
            unique_id = next_image_id();
        }

        Ok(Validator {
            shared: Arc::clone(shared),
            info,
            unique_id,
        })
    }
}
