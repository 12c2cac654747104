//! Host bridge — the string-keyed get/set calls the peer engine makes.
//!
//! | Call | Argument | Effect |
//! |------|----------|--------|
//! | `get_by_name("screen_size")` | | `{"width":..,"height":..,"scale":..}` |
//! | `get_by_name("is_start")` | | `"true"` / `"false"` |
//! | `set_by_name("add_connection")` | connection JSON | start capture for an authorized screen-share peer |
//! | `set_by_name("stop_capture")` | | stop capture |
//! | `set_by_name("half_scale")` | `"true"` / `"false"` | change the half-scale policy |
//!
//! Unknown names read as an empty string and set as a no-op.

use anyhow::{bail, Context, Result};
use screenlink_capture::CaptureSessionController;
use serde::Deserialize;
use tracing::{debug, info};

use crate::service::Command;

/// A peer connection as announced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionInfo {
    pub id:               i32,
    pub name:             String,
    pub peer_id:          String,
    pub authorized:       bool,
    pub is_file_transfer: bool,
}

pub fn get_by_name(controller: &CaptureSessionController, name: &str) -> String {
    match name {
        "screen_size" => {
            let screen = controller.screen_info();
            serde_json::json!({
                "width":  screen.width,
                "height": screen.height,
                "scale":  screen.scale,
            })
            .to_string()
        }
        "is_start" => controller.is_capturing().to_string(),
        other => {
            debug!("get_by_name: unknown name {other:?}");
            String::new()
        }
    }
}

/// Translate a set call into the service command it implies, if any.
pub fn command_for(controller: &CaptureSessionController, name: &str, arg: &str) -> Result<Option<Command>> {
    match name {
        "add_connection" => {
            let conn: ConnectionInfo =
                serde_json::from_str(arg).context("Parsing add_connection payload")?;
            Ok(on_connection(controller, &conn))
        }
        "stop_capture" => Ok(Some(Command::StopCapture)),
        "half_scale" => {
            let enabled = match arg {
                "true" => true,
                "false" => false,
                other => bail!("half_scale expects \"true\" or \"false\", got {other:?}"),
            };
            if controller.half_scale() == enabled {
                return Ok(None);
            }
            Ok(Some(Command::SetHalfScale(enabled)))
        }
        other => {
            debug!("set_by_name: unknown name {other:?}");
            Ok(None)
        }
    }
}

fn on_connection(controller: &CaptureSessionController, conn: &ConnectionInfo) -> Option<Command> {
    let kind = if conn.is_file_transfer { "file transfer" } else { "screen share" };
    if !conn.authorized {
        info!("Login request #{} from {} ({}) for {kind}", conn.id, conn.name, conn.peer_id);
        return None;
    }
    info!("Client #{} {} ({}) authorized for {kind}", conn.id, conn.name, conn.peer_id);
    if conn.is_file_transfer || controller.is_capturing() {
        return None;
    }
    Some(Command::StartCapture)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use screenlink_capture::testing::{CallLog, RecordingConsent, RecordingPlatform};
    use screenlink_core::{DisplayMetrics, Orientation, ServiceConfig};
    use screenlink_provider::testing::RecordingSink;

    use super::*;

    fn controller() -> CaptureSessionController {
        let log = CallLog::new();
        let platform = Arc::new(RecordingPlatform::new(log.clone()));
        let c = CaptureSessionController::local(platform, Arc::new(RecordingSink::new()), &ServiceConfig::default());
        c.grant_consent(Arc::new(RecordingConsent::new(log))).unwrap();
        c.update_geometry(DisplayMetrics::new(1080, 2400, 420), Orientation::Portrait).unwrap();
        c
    }

    fn connection(authorized: bool, is_file_transfer: bool) -> String {
        serde_json::json!({
            "id": 3,
            "name": "alice",
            "peer_id": "123456789",
            "authorized": authorized,
            "is_file_transfer": is_file_transfer,
        })
        .to_string()
    }

    #[test]
    fn screen_size_is_json() {
        let c = controller();
        let v: serde_json::Value = serde_json::from_str(&get_by_name(&c, "screen_size")).unwrap();
        assert_eq!(v, serde_json::json!({ "width": 1080, "height": 2400, "scale": 1 }));
    }

    #[test]
    fn is_start_tracks_capture() {
        let c = controller();
        assert_eq!(get_by_name(&c, "is_start"), "false");
        c.start_capture().unwrap();
        assert_eq!(get_by_name(&c, "is_start"), "true");
        assert_eq!(get_by_name(&c, "nope"), "");
    }

    #[test]
    fn only_authorized_screen_share_starts_capture() {
        let c = controller();
        let start = |authorized, transfer| command_for(&c, "add_connection", &connection(authorized, transfer)).unwrap();
        assert!(matches!(start(true, false), Some(Command::StartCapture)));
        assert!(start(false, false).is_none());
        assert!(start(true, true).is_none());

        c.start_capture().unwrap();
        assert!(command_for(&c, "add_connection", &connection(true, false)).unwrap().is_none());
    }

    #[test]
    fn malformed_connection_is_an_error() {
        let c = controller();
        let err = command_for(&c, "add_connection", "{\"id\": 1}").unwrap_err();
        assert!(err.to_string().contains("add_connection"));
    }

    #[test]
    fn half_scale_only_on_change() {
        let c = controller();
        assert!(command_for(&c, "half_scale", "false").unwrap().is_none());
        assert!(matches!(command_for(&c, "half_scale", "true").unwrap(), Some(Command::SetHalfScale(true))));
        assert!(command_for(&c, "half_scale", "maybe").is_err());
    }

    #[test]
    fn stop_and_unknown_names() {
        let c = controller();
        assert!(matches!(command_for(&c, "stop_capture", "").unwrap(), Some(Command::StopCapture)));
        assert!(command_for(&c, "update_voice_call_state", "{}").unwrap().is_none());
    }
}
