//! `input` — route peer input to the capture provider or the local injector.
//!
//! # Routing
//!
//! | Capture backend | Screen dark + wake gesture | Otherwise |
//! |-----------------|----------------------------|-----------|
//! | Provider | `inject_pointer(.., wake = true)` | `inject_pointer(.., wake = false)` |
//! | Local | [`LocalInput::wake_screen`] | touch / mouse injector |
//!
//! Injection is best effort: failures are logged where they happen and never
//! reach the capture session.

use std::sync::Arc;

use screenlink_capture::CaptureSessionController;
use screenlink_core::{KeyInput, PointerInput, PointerKind};
use tracing::debug;

/// Host-side input injection used when no capture provider is bound.
pub trait LocalInput: Send + Sync {
    /// Whether the screen is currently on.
    fn is_interactive(&self) -> bool;

    fn wake_screen(&self);

    fn touch(&self, mask: i32, x: i32, y: i32);

    fn mouse(&self, mask: i32, x: i32, y: i32);

    fn key_event(&self, key: KeyInput);
}

/// Where an input event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Provider,
    Local,
    WokeScreen,
    Dropped,
}

pub struct InputRouter {
    local: Arc<dyn LocalInput>,
}

impl InputRouter {
    pub fn new(local: Arc<dyn LocalInput>) -> Self {
        Self { local }
    }

    pub fn pointer(&self, controller: &CaptureSessionController, input: PointerInput) -> Routed {
        let wake = !self.local.is_interactive() && input.is_wake_gesture();

        if let Some(provider) = controller.provider() {
            return match provider.inject_pointer(input, wake) {
                Ok(()) => Routed::Provider,
                Err(_) => Routed::Dropped,
            };
        }

        if wake {
            debug!("Screen is off, waking it instead of injecting");
            self.local.wake_screen();
            return Routed::WokeScreen;
        }
        match input.kind {
            PointerKind::Touch => self.local.touch(input.mask, input.x, input.y),
            PointerKind::Mouse => self.local.mouse(input.mask, input.x, input.y),
            PointerKind::Other(kind) => {
                debug!("Ignoring pointer input of unknown kind {kind}");
                return Routed::Dropped;
            }
        }
        Routed::Local
    }

    pub fn key(&self, controller: &CaptureSessionController, key: KeyInput) -> Routed {
        if let Some(provider) = controller.provider() {
            let (send_down, send_up) = key.actions();
            return match provider.inject_key_event(key.key_code, key.modifiers, send_down, send_up) {
                Ok(()) => Routed::Provider,
                Err(_) => Routed::Dropped,
            };
        }
        self.local.key_event(key);
        Routed::Local
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use screenlink_capture::testing::{CallLog, RecordingPlatform};
    use screenlink_core::input::{LEFT_DOWN, LEFT_MOVE, LEFT_UP};
    use screenlink_core::ServiceConfig;
    use screenlink_provider::testing::{ConnectBehaviour, RecordingSink, ScriptedEndpoint};

    use super::*;

    /// Local injector double.
    pub(crate) struct RecordingInput {
        interactive: AtomicBool,
        events:      Mutex<Vec<String>>,
    }

    impl RecordingInput {
        pub(crate) fn new(interactive: bool) -> Self {
            Self { interactive: AtomicBool::new(interactive), events: Mutex::new(Vec::new()) }
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl LocalInput for RecordingInput {
        fn is_interactive(&self) -> bool {
            self.interactive.load(Ordering::SeqCst)
        }

        fn wake_screen(&self) {
            self.push("wake".into());
        }

        fn touch(&self, mask: i32, x: i32, y: i32) {
            self.push(format!("touch {mask} {x} {y}"));
        }

        fn mouse(&self, mask: i32, x: i32, y: i32) {
            self.push(format!("mouse {mask} {x} {y}"));
        }

        fn key_event(&self, key: KeyInput) {
            self.push(format!("key {} {} {}", key.key_code, key.down, key.press));
        }
    }

    fn local_controller() -> CaptureSessionController {
        let platform = Arc::new(RecordingPlatform::new(CallLog::new()));
        CaptureSessionController::local(platform, Arc::new(RecordingSink::new()), &ServiceConfig::default())
    }

    fn provider_controller() -> (CaptureSessionController, Arc<ScriptedEndpoint>) {
        let endpoint = Arc::new(ScriptedEndpoint::new(ConnectBehaviour::Immediate));
        let controller =
            CaptureSessionController::with_provider(endpoint.clone(), Arc::new(RecordingSink::new()), &ServiceConfig::default());
        (controller, endpoint)
    }

    #[test]
    fn local_pointer_goes_to_injector() {
        let input = Arc::new(RecordingInput::new(true));
        let router = InputRouter::new(input.clone());
        let controller = local_controller();

        assert_eq!(router.pointer(&controller, PointerInput::new(PointerKind::Touch, LEFT_DOWN, 5, 6)), Routed::Local);
        assert_eq!(router.pointer(&controller, PointerInput::new(PointerKind::Mouse, LEFT_UP, 7, 8)), Routed::Local);
        assert_eq!(router.pointer(&controller, PointerInput::new(PointerKind::Other(4), 0, 0, 0)), Routed::Dropped);
        assert_eq!(input.events(), vec!["touch 9 5 6", "mouse 10 7 8"]);
    }

    #[test]
    fn dark_screen_wakes_on_gesture_only() {
        let input = Arc::new(RecordingInput::new(false));
        let router = InputRouter::new(input.clone());
        let controller = local_controller();

        assert_eq!(router.pointer(&controller, PointerInput::new(PointerKind::Mouse, LEFT_DOWN, 1, 1)), Routed::WokeScreen);
        assert_eq!(router.pointer(&controller, PointerInput::new(PointerKind::Touch, LEFT_MOVE, 1, 1)), Routed::WokeScreen);
        assert_eq!(router.pointer(&controller, PointerInput::new(PointerKind::Mouse, LEFT_MOVE, 2, 3)), Routed::Local);
        assert_eq!(input.events(), vec!["wake", "wake", "mouse 8 2 3"]);
    }

    #[test]
    fn provider_pointer_carries_wake_flag() {
        let input = Arc::new(RecordingInput::new(false));
        let router = InputRouter::new(input.clone());
        let (controller, endpoint) = provider_controller();

        // Not bound yet: dropped, never fatal.
        let touch = PointerInput::new(PointerKind::Touch, LEFT_DOWN, 10, 20);
        assert_eq!(router.pointer(&controller, touch), Routed::Dropped);

        controller.start_capture().unwrap();
        assert_eq!(router.pointer(&controller, touch), Routed::Provider);
        let mouse = PointerInput::new(PointerKind::Mouse, LEFT_MOVE, 3, 4);
        assert_eq!(router.pointer(&controller, mouse), Routed::Provider);

        let calls = endpoint.scripted_provider().calls();
        assert!(calls.contains(&"inject_pointer 0 9 10 20 true".to_string()));
        assert!(calls.contains(&"inject_pointer 1 8 3 4 false".to_string()));
        assert!(input.events().is_empty());
    }

    #[test]
    fn provider_key_uses_down_up_actions() {
        let input = Arc::new(RecordingInput::new(true));
        let router = InputRouter::new(input.clone());
        let (controller, endpoint) = provider_controller();
        controller.start_capture().unwrap();

        let press = KeyInput { key_code: 66, modifiers: 1, down: false, press: true };
        let release = KeyInput { key_code: 66, modifiers: 0, down: false, press: false };
        assert_eq!(router.key(&controller, press), Routed::Provider);
        assert_eq!(router.key(&controller, release), Routed::Provider);

        let scripted = endpoint.scripted_provider();
        let calls = scripted.calls();
        assert!(calls.contains(&"inject_key_event 66 1 true true".to_string()));
        assert!(calls.contains(&"inject_key_event 66 0 false true".to_string()));

        scripted.set_failing(true);
        assert_eq!(router.key(&controller, press), Routed::Dropped);
    }

    #[test]
    fn local_key_goes_to_injector() {
        let input = Arc::new(RecordingInput::new(true));
        let router = InputRouter::new(input.clone());
        let controller = local_controller();
        let key = KeyInput { key_code: 29, modifiers: 0, down: true, press: false };
        assert_eq!(router.key(&controller, key), Routed::Local);
        assert_eq!(input.events(), vec!["key 29 true false"]);
    }
}
