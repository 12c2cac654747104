//! Zero-copy frame path from provider notification to [`FrameSink`].
//!
//! ```text
//! provider ── on_frame_available(shm) ──► gate open? ──no──► drop
//!                                            │yes
//!                                   mapping lock held
//!                                            │
//!                    cached id == shm.id? ───┼── no ──► unmap old, map shm
//!                                            ▼
//!                                 sink.push_frame(&bytes)
//! ```
//!
//! The sink runs while the mapping lock is held, so `release()` can never
//! unmap a region that is being read.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use screenlink_core::{CaptureGate, FrameSink, FrameStats, MappingError, SinkError};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::endpoint::{CaptureProvider, FrameCallback, MappedRegion, SharedMemory};

#[derive(Error, Debug)]
enum RelayError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

struct CachedMapping {
    id:     u64,
    region: Box<dyn MappedRegion>,
}

pub struct FrameRelay {
    sink:    Arc<dyn FrameSink>,
    gate:    CaptureGate,
    stats:   FrameStats,
    mapping: Mutex<Option<CachedMapping>>,
}

impl FrameRelay {
    pub fn new(sink: Arc<dyn FrameSink>, gate: CaptureGate, stats: FrameStats) -> Self {
        Self { sink, gate, stats, mapping: Mutex::new(None) }
    }

    pub fn gate(&self) -> &CaptureGate {
        &self.gate
    }

    /// Whether a region is currently mapped.
    pub fn is_mapped(&self) -> bool {
        self.lock().is_some()
    }

    /// Deliver one provider frame. Never fails: errors are logged and the
    /// frame is dropped.
    pub fn on_frame_available(&self, memory: &dyn SharedMemory) {
        if !self.gate.is_open() {
            debug!("Frame available but not capturing, ignoring");
            self.stats.record_dropped();
            return;
        }

        let mut cache = self.lock();
        match self.deliver(&mut cache, memory) {
            Ok(()) => self.stats.record_relayed(),
            Err(e) => {
                warn!("Error processing provider frame: {e}");
                self.stats.record_dropped();
            }
        }
    }

    fn deliver(&self, cache: &mut Option<CachedMapping>, memory: &dyn SharedMemory) -> Result<(), RelayError> {
        let id = memory.id();
        if cache.as_ref().is_some_and(|cached| cached.id != id) {
            if let Some(stale) = cache.take() {
                debug!("Shared memory handle changed ({} → {id}), remapping", stale.id);
                unmap(stale);
            }
        }
        if cache.is_none() {
            *cache = Some(CachedMapping { id, region: memory.map_read_only()? });
        }
        if let Some(cached) = cache.as_ref() {
            self.sink.push_frame(cached.region.bytes())?;
        }
        Ok(())
    }

    /// Unmap the cached region, then ask the provider to drop its callback.
    /// Must run before the provider is unbound.
    pub fn release(&self, provider: Option<&dyn CaptureProvider>) {
        if let Some(cached) = self.lock().take() {
            unmap(cached);
        }
        if let Some(provider) = provider {
            if let Err(e) = provider.unregister_frame_callback() {
                warn!("Error unregistering provider frame callback: {e}");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedMapping>> {
        self.mapping.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unmap(cached: CachedMapping) {
    if let Err(e) = cached.region.unmap() {
        error!("Error unmapping provider buffer {}: {e}", cached.id);
    }
}

impl FrameCallback for FrameRelay {
    fn on_frame_available(&self, memory: &dyn SharedMemory) {
        FrameRelay::on_frame_available(self, memory);
    }

    fn on_capture_error(&self, error: &str) {
        error!("Provider capture error: {error}");
    }
}

impl Drop for FrameRelay {
    fn drop(&mut self) {
        let cached = self.mapping.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(cached) = cached {
            unmap(cached);
        }
    }
}
