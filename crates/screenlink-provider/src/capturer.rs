//! `ProviderCapturer` — typed façade over the binding and the relay.
//!
//! Every remote failure stops here: init problems become [`InitError`],
//! injection problems become a logged [`InjectionFailure`], and callback
//! teardown errors are logged and dropped.

use std::sync::{Arc, Weak};

use screenlink_core::{BindError, InitError, InjectionFailure, PointerInput, RemoteError};
use tracing::{debug, error, info, warn};

use crate::binding::ProviderBinding;
use crate::endpoint::CaptureProvider;
use crate::relay::FrameRelay;

pub struct ProviderCapturer {
    binding: ProviderBinding,
    relay:   Arc<FrameRelay>,
}

impl ProviderCapturer {
    /// Build the capturer and arm the rebind hook: when a lost provider comes
    /// back while capture is running, the frame callback is re-registered.
    pub fn new(binding: ProviderBinding, relay: Arc<FrameRelay>) -> Arc<Self> {
        let capturer = Arc::new(Self { binding, relay });
        let weak: Weak<Self> = Arc::downgrade(&capturer);
        capturer.binding.set_rebind_hook(move || {
            if let Some(capturer) = weak.upgrade() {
                capturer.resume_after_rebind();
            }
        });
        capturer
    }

    pub fn binding(&self) -> &ProviderBinding {
        &self.binding
    }

    pub fn relay(&self) -> &Arc<FrameRelay> {
        &self.relay
    }

    pub fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }

    pub fn bind(&self) -> Result<(), BindError> {
        self.binding.bind()
    }

    /// Initialise remote capture and register the frame callback.
    ///
    /// Returns the provider's screen dimensions.
    pub fn init_capture(&self) -> Result<(u32, u32), InitError> {
        let provider = self.binding.provider().ok_or(InitError::NotBound)?;

        provider.init_capture()?;
        let width = provider.screen_width()?;
        let height = provider.screen_height()?;
        if width <= 0 || height <= 0 {
            error!("Invalid provider screen dimensions: {width}x{height}");
            return Err(InitError::InvalidDimensions { width, height });
        }

        provider.register_frame_callback(self.relay.clone())?;
        info!("Provider capture initialised at {width}x{height}");
        Ok((width as u32, height as u32))
    }

    /// Drop the cached frame mapping and unregister the callback.
    pub fn release_capture(&self) {
        let provider = self.binding.provider();
        self.relay.release(provider.as_deref());
    }

    pub fn inject_pointer(&self, input: PointerInput, wake: bool) -> Result<(), InjectionFailure> {
        self.best_effort("injectPointer", |p| {
            p.inject_pointer(input.kind.as_raw(), input.mask, input.x, input.y, wake)
        })
    }

    pub fn inject_key_event(&self, key_code: i32, modifiers: i32, down: bool, up: bool) -> Result<(), InjectionFailure> {
        debug!("Provider injectKeyEvent: keyCode={key_code}, modifiers={modifiers}, down={down}, up={up}");
        self.best_effort("injectKeyEvent", |p| p.inject_key_event(key_code, modifiers, down, up))
    }

    pub fn unbind(&self) {
        self.binding.unbind();
    }

    fn best_effort(
        &self,
        what: &str,
        call: impl FnOnce(&dyn CaptureProvider) -> Result<(), RemoteError>,
    ) -> Result<(), InjectionFailure> {
        let result = match self.binding.provider() {
            Some(provider) => call(provider.as_ref()).map_err(InjectionFailure::from),
            None => Err(InjectionFailure::NotBound),
        };
        if let Err(e) = &result {
            debug!("Provider {what} failed: {e}");
        }
        result
    }

    fn resume_after_rebind(&self) {
        if !self.relay.gate().is_open() {
            return;
        }
        info!("Capture provider returned while capturing, re-initialising");
        // The old mapping belongs to the previous provider instance.
        self.relay.release(None);
        if let Err(e) = self.init_capture() {
            warn!("Re-initialising provider capture failed: {e}");
            return;
        }
        // A stop that landed during init has already unregistered; take back
        // the callback registered after it.
        if !self.relay.gate().is_open() {
            debug!("Capture stopped while re-initialising, releasing again");
            self.release_capture();
        }
    }
}
