//! `CaptureSessionController` — owns the capture geometry and drives capture
//! resources through their lifecycle.
//!
//! ```text
//!            start_capture                    stop_capture
//!  Idle ──────► Starting ──────► Active ──────► Stopping ──────► Idle
//!   │                              │ geometry changed:
//!   │                              └── stop + start in one sequence
//!   └──────────── destroy() from any state ──────────► Destroyed
//! ```
//!
//! Two locks:
//!
//! | Lock | Held for | Taken by |
//! |------|----------|----------|
//! | `sequence` | a whole start / stop / restart / destroy | lifecycle and geometry calls |
//! | `inner` | reading or committing state, never across a remote call | everything, queries included |
//!
//! At most one start/stop sequence runs at a time, while queries stay
//! answerable during a slow provider bind. The provider binding and the frame
//! mapping cache each have their own locks; frames are only checked against
//! the [`CaptureGate`] and may race a stop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use screenlink_core::{
    BindError, CaptureError, CaptureGate, DisplayMetrics, FrameSink, FrameStats, Orientation,
    PlatformError, ScreenGeometryResolver, ScreenInfo, ServiceConfig,
};
use screenlink_provider::{FrameRelay, ProviderBinding, ProviderCapturer, ProviderEndpoint};
use tracing::{debug, error, info, warn};

use crate::platform::{CaptureConsent, CapturePlatform};
use crate::reusable::Reusable;
use crate::session::{discard_target, CaptureSession, GatedSink};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
    Destroyed,
}

/// Successful answers to [`CaptureSessionController::start_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
    /// Permission was revoked; consent has been requested again and the
    /// start is retried once it is granted.
    ConsentRequested,
}

/// Where frames come from.
pub enum CaptureBackend {
    /// Virtual display mirrored into a local image buffer pool.
    Local(Arc<dyn CapturePlatform>),
    /// Out-of-process capture provider.
    Provider(Arc<ProviderCapturer>),
}

// ── Controller ────────────────────────────────────────────────────────────────

struct ControllerState {
    state:           SessionState,
    metrics:         DisplayMetrics,
    orientation:     Orientation,
    half_scale:      bool,
    /// Last non-degenerate resolver output.
    resolved:        ScreenInfo,
    /// Geometry handed to the frame sink.
    applied:         ScreenInfo,
    consent:         Option<Arc<dyn CaptureConsent>>,
    consent_pending: bool,
    display:         Reusable,
    session:         Option<CaptureSession>,
}

pub struct CaptureSessionController {
    backend:  CaptureBackend,
    sink:     Arc<dyn FrameSink>,
    gate:     CaptureGate,
    stats:    FrameStats,
    resolver: ScreenGeometryResolver,
    config:   ServiceConfig,
    sequence: Mutex<()>,
    inner:    Mutex<ControllerState>,
}

impl CaptureSessionController {
    /// Controller capturing through a local virtual display.
    pub fn local(platform: Arc<dyn CapturePlatform>, sink: Arc<dyn FrameSink>, config: &ServiceConfig) -> Self {
        Self::build(CaptureBackend::Local(platform), sink, CaptureGate::new(), FrameStats::new(), config)
    }

    /// Controller capturing through an external provider.
    pub fn with_provider(endpoint: Arc<dyn ProviderEndpoint>, sink: Arc<dyn FrameSink>, config: &ServiceConfig) -> Self {
        let gate = CaptureGate::new();
        let stats = FrameStats::new();
        let relay = Arc::new(FrameRelay::new(sink.clone(), gate.clone(), stats.clone()));
        let binding = ProviderBinding::new(endpoint, config.bind_timeout());
        let capturer = ProviderCapturer::new(binding, relay);
        Self::build(CaptureBackend::Provider(capturer), sink, gate, stats, config)
    }

    /// Use the provider when it is installed, local capture otherwise.
    pub fn with_fallback(
        endpoint: Arc<dyn ProviderEndpoint>,
        platform: Arc<dyn CapturePlatform>,
        sink: Arc<dyn FrameSink>,
        config: &ServiceConfig,
    ) -> Self {
        if endpoint.is_available() {
            info!("Capture provider available, using provider-backed capture");
            Self::with_provider(endpoint, sink, config)
        } else {
            info!("Capture provider not available, using local capture");
            Self::local(platform, sink, config)
        }
    }

    fn build(
        backend: CaptureBackend,
        sink: Arc<dyn FrameSink>,
        gate: CaptureGate,
        stats: FrameStats,
        config: &ServiceConfig,
    ) -> Self {
        let state = ControllerState {
            state:           SessionState::Idle,
            metrics:         DisplayMetrics::default(),
            orientation:     Orientation::default(),
            half_scale:      config.half_scale,
            resolved:        ScreenInfo::EMPTY,
            applied:         ScreenInfo::EMPTY,
            consent:         None,
            consent_pending: false,
            display:         Reusable::new(config.reuse_virtual_display),
            session:         None,
        };
        Self {
            backend,
            sink,
            gate,
            stats,
            resolver: ScreenGeometryResolver::new(config.max_screen_size),
            config: config.clone(),
            sequence: Mutex::new(()),
            inner: Mutex::new(state),
        }
    }

    // MARK: - Queries

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Currently applied capture geometry.
    pub fn screen_info(&self) -> ScreenInfo {
        self.lock().applied
    }

    pub fn half_scale(&self) -> bool {
        self.lock().half_scale
    }

    pub fn is_capturing(&self) -> bool {
        self.gate.is_open()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats.clone()
    }

    pub fn provider(&self) -> Option<&Arc<ProviderCapturer>> {
        match &self.backend {
            CaptureBackend::Provider(capturer) => Some(capturer),
            CaptureBackend::Local(_) => None,
        }
    }

    pub fn is_provider_backed(&self) -> bool {
        self.provider().is_some()
    }

    // MARK: - Lifecycle

    /// Start capturing. A no-op when already active.
    ///
    /// In provider mode this may block for up to `bind_attempts` bind
    /// timeouts; call it off latency-sensitive paths. Queries keep answering
    /// meanwhile.
    pub fn start_capture(&self) -> Result<StartOutcome, CaptureError> {
        let _sequence = self.sequence();
        self.start()
    }

    pub fn stop_capture(&self) {
        let _sequence = self.sequence();
        self.stop();
    }

    /// Stop capture, release the reusable display and drop the consent.
    /// Later calls are no-ops.
    pub fn destroy(&self) {
        let _sequence = self.sequence();
        if self.state() == SessionState::Destroyed {
            return;
        }
        info!("Destroying capture session controller");
        self.stop();
        self.lock().display.destroy();
        if let CaptureBackend::Provider(capturer) = &self.backend {
            capturer.unbind();
        }
        let mut st = self.lock();
        st.consent = None;
        st.consent_pending = false;
        st.state = SessionState::Destroyed;
    }

    /// Supply capture consent. If a previous start was answered with a
    /// consent request, it is retried now.
    pub fn grant_consent(&self, consent: Arc<dyn CaptureConsent>) -> Result<Option<StartOutcome>, CaptureError> {
        let _sequence = self.sequence();
        let retry = {
            let mut st = self.lock();
            if st.state == SessionState::Destroyed {
                return Err(CaptureError::Destroyed);
            }
            info!("Capture consent granted");
            if st.state != SessionState::Active {
                // A held display belongs to the previous authorization.
                st.display.destroy();
            }
            st.consent = Some(consent);
            std::mem::take(&mut st.consent_pending)
        };
        if retry {
            info!("Retrying capture start after consent");
            return self.start().map(Some);
        }
        Ok(None)
    }

    // MARK: - Geometry

    /// Host display metrics or orientation changed.
    pub fn update_geometry(&self, metrics: DisplayMetrics, orientation: Orientation) -> Result<(), CaptureError> {
        let _sequence = self.sequence();
        {
            let mut st = self.lock();
            if st.state == SessionState::Destroyed {
                return Ok(());
            }
            st.metrics = metrics;
            st.orientation = orientation;
        }
        self.reapply()
    }

    /// Change the half-scale policy. Returns `false` when it was already set
    /// to `enabled`.
    pub fn set_half_scale(&self, enabled: bool) -> Result<bool, CaptureError> {
        let _sequence = self.sequence();
        {
            let mut st = self.lock();
            if st.state == SessionState::Destroyed || st.half_scale == enabled {
                return Ok(false);
            }
            info!("Half-scale policy → {enabled}");
            st.half_scale = enabled;
        }
        self.reapply()?;
        Ok(true)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn sequence(&self) -> MutexGuard<'_, ()> {
        self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, st: &ControllerState) -> ScreenInfo {
        self.resolver.resolve(st.metrics, st.orientation, st.half_scale)
    }

    /// Re-resolve geometry. While active, a change is applied by exactly one
    /// stop/start cycle; capture resources are never resized in place.
    fn reapply(&self) -> Result<(), CaptureError> {
        let (screen, active) = {
            let mut st = self.lock();
            let screen = self.resolve(&st);
            if screen.is_degenerate() {
                debug!("Ignoring degenerate screen geometry");
                return Ok(());
            }
            if screen == st.resolved {
                return Ok(());
            }
            debug!("Screen geometry resolved: {} → {screen}", st.resolved);
            st.resolved = screen;
            (screen, st.state == SessionState::Active)
        };

        if !active {
            self.apply(screen);
            return Ok(());
        }
        info!("Screen geometry changed to {screen}, restarting capture");
        self.stop();
        let restarted = self.start();
        if !matches!(restarted, Ok(StartOutcome::Started)) {
            // Capture did not come back; the host geometry still changed.
            warn!("Capture not restarted after geometry change, applying {screen} anyway");
            self.apply(screen);
        }
        restarted.map(|_| ())
    }

    fn apply(&self, screen: ScreenInfo) {
        self.lock().applied = screen;
        self.sink.refresh_screen(screen);
    }

    fn start(&self) -> Result<StartOutcome, CaptureError> {
        match self.state() {
            SessionState::Destroyed => return Err(CaptureError::Destroyed),
            SessionState::Active => return Ok(StartOutcome::AlreadyActive),
            _ => {}
        }
        match &self.backend {
            CaptureBackend::Local(platform) => self.start_local(platform.as_ref()),
            CaptureBackend::Provider(capturer) => self.start_provider(capturer),
        }
    }

    fn start_local(&self, platform: &dyn CapturePlatform) -> Result<StartOutcome, CaptureError> {
        let mut st = self.lock();
        let Some(consent) = st.consent.clone() else {
            warn!("startCapture failed: no capture consent");
            return Err(CaptureError::ConsentMissing);
        };
        let screen = self.resolve(&st);
        if screen.is_degenerate() {
            warn!("startCapture failed: degenerate geometry {screen}");
            return Err(CaptureError::InvalidGeometry(screen));
        }
        st.resolved = screen;

        info!("Starting local capture at {screen}");
        st.state = SessionState::Starting;
        match self.acquire_local(&mut st, platform, consent.as_ref(), screen) {
            Ok(session) => {
                st.session = Some(session);
                drop(st);
                Ok(self.activate(screen))
            }
            Err(e) if e.is_permission_denied() => {
                warn!("Capture permission denied ({e}), requesting consent again");
                st.state = SessionState::Idle;
                st.display.destroy();
                st.consent = None;
                st.consent_pending = true;
                drop(st);
                platform.request_consent();
                Ok(StartOutcome::ConsentRequested)
            }
            Err(e) => {
                error!("Acquiring capture resources failed: {e}");
                st.state = SessionState::Idle;
                Err(e.into())
            }
        }
    }

    fn acquire_local(
        &self,
        st: &mut ControllerState,
        platform: &dyn CapturePlatform,
        consent: &dyn CaptureConsent,
        screen: ScreenInfo,
    ) -> Result<CaptureSession, PlatformError> {
        let sink: Arc<dyn FrameSink> =
            Arc::new(GatedSink::new(self.gate.clone(), self.sink.clone(), self.stats.clone()));
        let target = platform.create_buffer_target(screen, sink)?;

        let name = self.config.virtual_display_name.as_str();
        let attached = st.display.attach(screen, target.surface.as_ref(), |surface| {
            consent.create_virtual_display(name, screen, surface)
        });
        match attached {
            Ok(how) => {
                debug!("Virtual display {how:?} for {screen}");
                Ok(CaptureSession::local(screen, target))
            }
            Err(e) => {
                discard_target(target);
                Err(e)
            }
        }
    }

    /// Bind and initialise without holding the state lock; only the outcome
    /// is committed under it.
    fn start_provider(&self, capturer: &ProviderCapturer) -> Result<StartOutcome, CaptureError> {
        info!("Starting provider-backed capture");
        let resolved = {
            let mut st = self.lock();
            st.state = SessionState::Starting;
            st.resolved
        };

        let initialised = self
            .bind_provider(capturer)
            .map_err(CaptureError::from)
            .and_then(|()| capturer.init_capture().map_err(CaptureError::from));
        let (width, height) = match initialised {
            Ok(dims) => dims,
            Err(e) => {
                error!("Capture provider start failed: {e}");
                self.lock().state = SessionState::Idle;
                return Err(e);
            }
        };

        // The provider dictates pixel dimensions; density comes from what the
        // host last reported, before any half-scaling.
        let dpi = match resolved.dpi {
            0 => self.config.provider_fallback_dpi,
            _ => resolved.unscaled_dpi(),
        };
        let screen = ScreenInfo::new(width, height, dpi, 1);
        self.lock().session = Some(CaptureSession::provider(screen));
        Ok(self.activate(screen))
    }

    /// Bind, tolerating up to `bind_attempts` consecutive timeouts.
    fn bind_provider(&self, capturer: &ProviderCapturer) -> Result<(), BindError> {
        let attempts = self.config.bind_attempts.max(1);
        let mut attempt = 1;
        loop {
            match capturer.bind() {
                Ok(()) => return Ok(()),
                Err(BindError::Timeout { ms }) if attempt < attempts => {
                    warn!("Provider bind timed out after {ms} ms (attempt {attempt}/{attempts}), retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn activate(&self, screen: ScreenInfo) -> StartOutcome {
        let changed = {
            let mut st = self.lock();
            let changed = st.applied != screen;
            st.applied = screen;
            st.state = SessionState::Active;
            changed
        };
        self.gate.open();
        self.sink.set_capturing(true);
        if changed {
            self.sink.refresh_screen(screen);
        }
        info!("Capture active at {screen}");
        StartOutcome::Started
    }

    /// Local resources are released under the state lock; the provider
    /// teardown is a remote call and runs outside it.
    fn stop(&self) {
        {
            let mut st = self.lock();
            if st.state != SessionState::Active {
                return;
            }
            info!("Stopping capture");
            st.state = SessionState::Stopping;
            self.gate.close();
            self.sink.set_capturing(false);
            if let Some(session) = st.session.take() {
                session.release(&mut st.display);
            }
        }
        if let CaptureBackend::Provider(capturer) = &self.backend {
            capturer.release_capture();
        }
        self.lock().state = SessionState::Idle;
    }
}
