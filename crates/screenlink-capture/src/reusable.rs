//! `Reusable<T>` — a display handle that can outlive the surfaces attached
//! to it.
//!
//! ```text
//!            attach(surface)                      detach()
//!  empty ──────────────────► held ─────────────────────────► held (paused)   reuse
//!    ▲        create                 └──────────────────────► empty          no reuse
//!    │                                     release
//!    └───────────────────────── destroy() ◄──── any
//! ```
//!
//! Re-attaching a held handle resizes it first. Pausing instead of releasing
//! avoids a fresh consent prompt on the next start.

use screenlink_core::{PlatformError, ScreenInfo};
use tracing::{debug, warn};

use crate::platform::{Surface, VirtualDisplay};

/// How [`Reusable::attach`] obtained its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    Created,
    Reused,
}

pub struct Reusable<T: ?Sized + VirtualDisplay = dyn VirtualDisplay> {
    handle: Option<Box<T>>,
    reuse:  bool,
}

impl<T: ?Sized + VirtualDisplay> Reusable<T> {
    pub fn new(reuse: bool) -> Self {
        Self { handle: None, reuse }
    }

    pub fn reuse(&self) -> bool {
        self.reuse
    }

    pub fn is_held(&self) -> bool {
        self.handle.is_some()
    }

    /// Attach `surface`: resize-then-attach on a held handle, otherwise
    /// `create` a new one.
    pub fn attach(
        &mut self,
        screen: ScreenInfo,
        surface: &dyn Surface,
        create: impl FnOnce(&dyn Surface) -> Result<Box<T>, PlatformError>,
    ) -> Result<Attached, PlatformError> {
        if let Some(handle) = self.handle.as_mut() {
            debug!("Reusing virtual display at {screen}");
            handle.resize(screen)?;
            handle.set_surface(Some(surface))?;
            return Ok(Attached::Reused);
        }

        debug!("Creating virtual display at {screen}");
        self.handle = Some(create(surface)?);
        Ok(Attached::Created)
    }

    /// Pause the held handle when reusing, release it otherwise.
    pub fn detach(&mut self) {
        if !self.reuse {
            self.destroy();
            return;
        }
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.set_surface(None) {
                warn!("Pausing virtual display failed, releasing it: {e}");
                self.destroy();
            }
        }
    }

    /// Release the handle regardless of the reuse policy.
    pub fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }
}
