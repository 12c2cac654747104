//! `CaptureService` — one tokio task that totally orders every command sent
//! to the capture session.
//!
//! ```text
//! host bridge / platform events ──► ServiceHandle ──► mpsc<Command>
//!                                                          │
//!                                         run_service (select! loop)
//!                                          │ spawn_blocking        │ interval tick
//!                                          ▼                       ▼
//!                           CaptureSessionController      mpsc<ServiceStatus>
//! ```
//!
//! Controller calls may block (provider bind waits up to its timeout), so
//! they run on the blocking pool. The loop ends after `Destroy` or when every
//! handle has been dropped; either way the controller is destroyed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use screenlink_capture::{CaptureConsent, CaptureSessionController, SessionState};
use screenlink_core::{DisplayMetrics, KeyInput, Orientation, PointerInput, ScreenInfo, ServiceConfig};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bridge;
use crate::input::{InputRouter, LocalInput};

// ── Commands ──────────────────────────────────────────────────────────────────

pub enum Command {
    StartCapture,
    StopCapture,
    SetHalfScale(bool),
    ConfigurationChanged { metrics: DisplayMetrics, orientation: Orientation },
    ConsentGranted(Arc<dyn CaptureConsent>),
    Pointer(PointerInput),
    Key(KeyInput),
    Destroy,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartCapture => f.write_str("StartCapture"),
            Self::StopCapture => f.write_str("StopCapture"),
            Self::SetHalfScale(enabled) => f.debug_tuple("SetHalfScale").field(enabled).finish(),
            Self::ConfigurationChanged { metrics, orientation } => f
                .debug_struct("ConfigurationChanged")
                .field("metrics", metrics)
                .field("orientation", orientation)
                .finish(),
            Self::ConsentGranted(_) => f.write_str("ConsentGranted(..)"),
            Self::Pointer(input) => f.debug_tuple("Pointer").field(input).finish(),
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Destroy => f.write_str("Destroy"),
        }
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Periodic snapshot sent to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub state:          SessionState,
    pub screen:         ScreenInfo,
    /// Total frames handed to the sink.
    pub frames_relayed: u64,
    /// Frames dropped while stopped or on mapping / sink errors.
    pub frames_dropped: u64,
}

impl ServiceStatus {
    pub fn snapshot(controller: &CaptureSessionController) -> Self {
        let stats = controller.stats();
        Self {
            state:          controller.state(),
            screen:         controller.screen_info(),
            frames_relayed: stats.relayed(),
            frames_dropped: stats.dropped(),
        }
    }
}

// ── ServiceHandle ─────────────────────────────────────────────────────────────

/// Cheap-to-clone handle to a running [`CaptureService`].
#[derive(Clone)]
pub struct ServiceHandle {
    cmd_tx:     mpsc::Sender<Command>,
    controller: Arc<CaptureSessionController>,
}

impl ServiceHandle {
    /// Queue a command. Fails once the service has stopped.
    pub async fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("capture service has stopped"))
    }

    pub async fn start_capture(&self) -> Result<()> {
        self.send(Command::StartCapture).await
    }

    pub async fn stop_capture(&self) -> Result<()> {
        self.send(Command::StopCapture).await
    }

    pub async fn destroy(&self) -> Result<()> {
        self.send(Command::Destroy).await
    }

    /// Answer a host-bridge read. Served directly from the controller.
    pub fn get_by_name(&self, name: &str) -> String {
        bridge::get_by_name(&self.controller, name)
    }

    /// Apply a host-bridge write by queuing the command it implies.
    pub async fn set_by_name(&self, name: &str, arg: &str) -> Result<()> {
        let cmd = bridge::command_for(&self.controller, name, arg)
            .with_context(|| format!("set_by_name({name})"))?;
        match cmd {
            Some(cmd) => self.send(cmd).await,
            None => Ok(()),
        }
    }

    pub fn controller(&self) -> &Arc<CaptureSessionController> {
        &self.controller
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::snapshot(&self.controller)
    }
}

// ── CaptureService ────────────────────────────────────────────────────────────

pub struct CaptureService;

impl CaptureService {
    /// Spawn the service task on the current tokio runtime.
    ///
    /// Returns the command handle and the status channel the host polls.
    pub fn spawn(
        controller: Arc<CaptureSessionController>,
        input: Arc<dyn LocalInput>,
        config: &ServiceConfig,
    ) -> (ServiceHandle, mpsc::Receiver<ServiceStatus>) {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
        let (status_tx, status_rx) = mpsc::channel::<ServiceStatus>(16);
        let router = Arc::new(InputRouter::new(input));

        tokio::spawn(run_service(
            Arc::clone(&controller),
            router,
            cmd_rx,
            status_tx,
            config.status_interval(),
        ));

        (ServiceHandle { cmd_tx, controller }, status_rx)
    }
}

// ── Service task ──────────────────────────────────────────────────────────────

async fn run_service(
    controller: Arc<CaptureSessionController>,
    router: Arc<InputRouter>,
    mut cmd_rx: mpsc::Receiver<Command>,
    status_tx: mpsc::Sender<ServiceStatus>,
    status_interval: Duration,
) {
    info!("Capture service started");
    let mut tick = tokio::time::interval(status_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    info!("All service handles dropped");
                    break;
                };
                debug!("Service command: {cmd:?}");
                let destroy = matches!(cmd, Command::Destroy);
                if let Err(e) = handle_command(&controller, &router, cmd).await {
                    error!("Service command failed: {e:#}");
                }
                if destroy {
                    break;
                }
            }
            _ = tick.tick() => {
                let _ = status_tx.try_send(ServiceStatus::snapshot(&controller));
            }
        }
    }

    if let Err(e) = blocking(&controller, |c| c.destroy()).await {
        error!("Destroying capture session failed: {e:#}");
    }
    let _ = status_tx.try_send(ServiceStatus::snapshot(&controller));
    info!("Capture service stopped");
}

async fn handle_command(
    controller: &Arc<CaptureSessionController>,
    router: &Arc<InputRouter>,
    cmd: Command,
) -> Result<()> {
    match cmd {
        Command::StartCapture => match blocking(controller, |c| c.start_capture()).await? {
            Ok(outcome) => info!("Start capture: {outcome:?}"),
            Err(e) => warn!("Start capture failed: {e}"),
        },
        Command::StopCapture => blocking(controller, |c| c.stop_capture()).await?,
        Command::SetHalfScale(enabled) => {
            if let Err(e) = blocking(controller, move |c| c.set_half_scale(enabled)).await? {
                warn!("Applying half-scale policy failed: {e}");
            }
        }
        Command::ConfigurationChanged { metrics, orientation } => {
            if let Err(e) = blocking(controller, move |c| c.update_geometry(metrics, orientation)).await? {
                warn!("Applying new screen geometry failed: {e}");
            }
        }
        Command::ConsentGranted(consent) => match blocking(controller, move |c| c.grant_consent(consent)).await? {
            Ok(Some(outcome)) => info!("Deferred start capture: {outcome:?}"),
            Ok(None) => {}
            Err(e) => warn!("Consent not applied: {e}"),
        },
        Command::Pointer(input) => {
            let router = Arc::clone(router);
            let routed = blocking(controller, move |c| router.pointer(c, input)).await?;
            debug!("Pointer input → {routed:?}");
        }
        Command::Key(key) => {
            let router = Arc::clone(router);
            let routed = blocking(controller, move |c| router.key(c, key)).await?;
            debug!("Key input → {routed:?}");
        }
        Command::Destroy => {}
    }
    Ok(())
}

/// Run a controller call on the blocking pool.
async fn blocking<T, F>(controller: &Arc<CaptureSessionController>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CaptureSessionController) -> T + Send + 'static,
{
    let controller = Arc::clone(controller);
    tokio::task::spawn_blocking(move || f(&controller))
        .await
        .context("Capture controller task panicked")
}
