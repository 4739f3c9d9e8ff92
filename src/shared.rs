//! Shared ownership of one decoder behind one lock.
//!
//! A [`SharedDecoder`] pairs exactly one [`ImageDecoder`] with exactly
//! one exclusive mutex. Every image handle derived from the same source
//! — recolored variants, subsets — holds an `Arc` to the same
//! `SharedDecoder`, so at most one of them can be decoding at any
//! moment. The decoder is dropped when the last handle releases its
//! reference.
//!
//! The descriptor and unique id are hoisted out of the lock at
//! construction; reading them never blocks on an in-flight decode.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::decoder::ImageDecoder;
use crate::info::ImageInfo;

/// One decoder, one lock, shared by many image handles.
pub struct SharedDecoder {
    info: ImageInfo,
    unique_id: u64,
    decoder: Mutex<Box<dyn ImageDecoder>>,
}

impl SharedDecoder {
    /// Wrap a decoder for sharing.
    ///
    /// The descriptor and id are read once here and cached for
    /// lock-free access.
    pub fn new(decoder: Box<dyn ImageDecoder>) -> Arc<Self> {
        let info = decoder.info().clone();
        let unique_id = decoder.unique_id();
        Arc::new(Self {
            info,
            unique_id,
            decoder: Mutex::new(decoder),
        })
    }

    /// The decoder's format descriptor. Lock-free.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// The decoder's process-unique identity. Lock-free.
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    /// Acquire exclusive access to the wrapped decoder.
    ///
    /// The returned guard is the only route to the decoder; the lock is
    /// released when the guard drops, on every exit path. Callers must
    /// not hold a guard across cache I/O or another decode.
    pub fn scoped(&self) -> ScopedDecoder<'_> {
        ScopedDecoder {
            guard: self.decoder.lock(),
        }
    }
}

impl fmt::Debug for SharedDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDecoder")
            .field("unique_id", &self.unique_id)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a shared decoder for one operation's duration.
pub struct ScopedDecoder<'a> {
    guard: MutexGuard<'a, Box<dyn ImageDecoder>>,
}

impl std::ops::Deref for ScopedDecoder<'_> {
    type Target = dyn ImageDecoder;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl std::ops::DerefMut for ScopedDecoder<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.guard
    }
}
