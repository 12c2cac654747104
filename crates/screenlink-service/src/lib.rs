//! screenlink-service — host integration for ScreenLink capture.
//!
//! # Architecture
//!
//! ```text
//! peer engine ── get_by_name / set_by_name ──┐
//! host events ── configuration / consent ────┼──► ServiceHandle ──► CaptureService task
//! peer input  ── pointer / key ──────────────┘                          │
//!                                                                       ▼
//!                                      CaptureSessionController + InputRouter
//!                                                                       │
//!                                               ServiceStatus ◄── status tick
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use screenlink_capture::CaptureSessionController;
//! # use screenlink_service::{CaptureService, LocalInput};
//! # async fn example(controller: Arc<CaptureSessionController>, input: Arc<dyn LocalInput>) -> anyhow::Result<()> {
//! let config = screenlink_core::ServiceConfig::default();
//! let (handle, mut status) = CaptureService::spawn(controller, input, &config);
//! handle.set_by_name("half_scale", "true").await?;
//! handle.start_capture().await?;
//! while let Some(s) = status.recv().await {
//!     println!("{:?} {} relayed={}", s.state, s.screen, s.frames_relayed);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod input;
pub mod service;

pub use bridge::ConnectionInfo;
pub use input::{InputRouter, LocalInput, Routed};
pub use service::{CaptureService, Command, ServiceHandle, ServiceStatus};
