//! Scripted doubles for the provider seams. Enabled for this crate's tests and
//! for dependents through the `test-util` feature.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use screenlink_core::{BindError, FrameSink, MappingError, RemoteError, ScreenInfo, SinkError};

use crate::endpoint::{
    CaptureProvider, ConnectionEvents, FrameCallback, MappedRegion, ProviderEndpoint, SharedMemory,
};

/// Poll `cond` until it holds or `limit` elapses.
pub fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ── ScriptedEndpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum ConnectBehaviour {
    /// `on_connected` fires before `connect` returns.
    Immediate,
    /// `on_connected` fires from another thread after the delay.
    After(Duration),
    /// The provider never answers.
    Never,
    /// `connect` is refused outright.
    Reject,
}

pub struct ScriptedEndpoint {
    behaviour:   ConnectBehaviour,
    available:   AtomicBool,
    provider:    Arc<ScriptedProvider>,
    listener:    Mutex<Option<Arc<dyn ConnectionEvents>>>,
    connects:    AtomicUsize,
    disconnects: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn new(behaviour: ConnectBehaviour) -> Self {
        Self::with_provider(behaviour, Arc::new(ScriptedProvider::new(1080, 2400)))
    }

    pub fn with_provider(behaviour: ConnectBehaviour, provider: Arc<ScriptedProvider>) -> Self {
        Self {
            behaviour,
            available: AtomicBool::new(true),
            provider,
            listener: Mutex::new(None),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn listener(&self) -> Option<Arc<dyn ConnectionEvents>> {
        self.listener.lock().unwrap().clone()
    }

    pub fn provider(&self) -> Arc<dyn CaptureProvider> {
        self.provider.clone()
    }

    pub fn scripted_provider(&self) -> Arc<ScriptedProvider> {
        self.provider.clone()
    }
}

impl ProviderEndpoint for ScriptedEndpoint {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn connect(&self, events: Arc<dyn ConnectionEvents>) -> Result<(), BindError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let ConnectBehaviour::Reject = self.behaviour {
            return Err(BindError::Unavailable { reason: "bind refused".into() });
        }
        *self.listener.lock().unwrap() = Some(events.clone());
        let provider: Arc<dyn CaptureProvider> = self.provider.clone();
        match self.behaviour {
            ConnectBehaviour::Immediate => events.on_connected(provider),
            ConnectBehaviour::After(delay) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    events.on_connected(provider);
                });
            }
            ConnectBehaviour::Never | ConnectBehaviour::Reject => {}
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ── ScriptedProvider ──────────────────────────────────────────────────────────

type InitHook = Box<dyn FnOnce() + Send>;

/// Remote provider double. Records calls; can be told to fail.
pub struct ScriptedProvider {
    width:      AtomicI32,
    height:     AtomicI32,
    fail_calls: AtomicBool,
    callback:   Mutex<Option<Arc<dyn FrameCallback>>>,
    calls:      Mutex<Vec<String>>,
    on_init:    Mutex<Option<InitHook>>,
}

impl ScriptedProvider {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: AtomicI32::new(width),
            height: AtomicI32::new(height),
            fail_calls: AtomicBool::new(false),
            callback: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            on_init: Mutex::new(None),
        }
    }

    /// Run `hook` once, inside the next `init_capture` call.
    pub fn set_on_init(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_init.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn set_dimensions(&self, width: i32, height: i32) {
        self.width.store(width, Ordering::SeqCst);
        self.height.store(height, Ordering::SeqCst);
    }

    /// Make every subsequent remote call fail with `DeadObject`.
    pub fn set_failing(&self, failing: bool) {
        self.fail_calls.store(failing, Ordering::SeqCst);
    }

    pub fn callback(&self) -> Option<Arc<dyn FrameCallback>> {
        self.callback.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.starts_with(name)).count()
    }

    fn record(&self, call: String) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_calls.load(Ordering::SeqCst) {
            Err(RemoteError::DeadObject)
        } else {
            Ok(())
        }
    }
}

impl CaptureProvider for ScriptedProvider {
    fn init_capture(&self) -> Result<(), RemoteError> {
        let hook = self.on_init.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.record("init_capture".into())
    }

    fn screen_width(&self) -> Result<i32, RemoteError> {
        self.record("screen_width".into())?;
        Ok(self.width.load(Ordering::SeqCst))
    }

    fn screen_height(&self) -> Result<i32, RemoteError> {
        self.record("screen_height".into())?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    fn register_frame_callback(&self, callback: Arc<dyn FrameCallback>) -> Result<(), RemoteError> {
        self.record("register_frame_callback".into())?;
        *self.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn unregister_frame_callback(&self) -> Result<(), RemoteError> {
        self.record("unregister_frame_callback".into())?;
        *self.callback.lock().unwrap() = None;
        Ok(())
    }

    fn inject_pointer(&self, kind: i32, mask: i32, x: i32, y: i32, wake: bool) -> Result<(), RemoteError> {
        self.record(format!("inject_pointer {kind} {mask} {x} {y} {wake}"))
    }

    fn inject_key_event(&self, key_code: i32, modifiers: i32, down: bool, up: bool) -> Result<(), RemoteError> {
        self.record(format!("inject_key_event {key_code} {modifiers} {down} {up}"))
    }
}

// ── CountingMemory ────────────────────────────────────────────────────────────

/// Shared-memory double that counts map / unmap calls across all handles
/// sharing the same counters.
pub struct CountingMemory {
    id:         u64,
    data:       Vec<u8>,
    fail_map:   bool,
    fail_unmap: bool,
    pub maps:   Arc<AtomicUsize>,
    pub unmaps: Arc<AtomicUsize>,
}

impl CountingMemory {
    pub fn new(id: u64, data: Vec<u8>) -> Self {
        Self {
            id,
            data,
            fail_map: false,
            fail_unmap: false,
            maps: Arc::new(AtomicUsize::new(0)),
            unmaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Another handle to a (possibly different) region sharing these counters.
    pub fn sibling(&self, id: u64, data: Vec<u8>) -> Self {
        Self {
            id,
            data,
            fail_map: false,
            fail_unmap: false,
            maps: self.maps.clone(),
            unmaps: self.unmaps.clone(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_map = true;
        self
    }

    /// Regions mapped from this handle refuse to unmap (still counted).
    pub fn failing_unmap(mut self) -> Self {
        self.fail_unmap = true;
        self
    }

    pub fn maps(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn unmaps(&self) -> usize {
        self.unmaps.load(Ordering::SeqCst)
    }
}

impl SharedMemory for CountingMemory {
    fn id(&self) -> u64 {
        self.id
    }

    fn map_read_only(&self) -> Result<Box<dyn MappedRegion>, MappingError> {
        if self.fail_map {
            return Err(MappingError::Failed { reason: "mmap refused".into() });
        }
        self.maps.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingRegion {
            data:       self.data.clone(),
            unmaps:     self.unmaps.clone(),
            fail_unmap: self.fail_unmap,
        }))
    }
}

struct CountingRegion {
    data:       Vec<u8>,
    unmaps:     Arc<AtomicUsize>,
    fail_unmap: bool,
}

impl MappedRegion for CountingRegion {
    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn unmap(self: Box<Self>) -> Result<(), MappingError> {
        self.unmaps.fetch_add(1, Ordering::SeqCst);
        if self.fail_unmap {
            return Err(MappingError::UnmapFailed { reason: "munmap refused".into() });
        }
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────────────────────

/// Frame sink double: keeps a copy of the last frame and every geometry
/// refresh it was told about.
#[derive(Default)]
pub struct RecordingSink {
    frames:    AtomicUsize,
    last:      Mutex<Vec<u8>>,
    refreshes: Mutex<Vec<ScreenInfo>>,
    capturing: Mutex<Vec<bool>>,
    reject:    AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Vec<u8> {
        self.last.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> Vec<ScreenInfo> {
        self.refreshes.lock().unwrap().clone()
    }

    pub fn capturing_changes(&self) -> Vec<bool> {
        self.capturing.lock().unwrap().clone()
    }
}

impl FrameSink for RecordingSink {
    fn push_frame(&self, frame: &[u8]) -> Result<(), SinkError> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = frame.to_vec();
        if self.reject.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected { reason: "encoder busy".into() });
        }
        Ok(())
    }

    fn refresh_screen(&self, screen: ScreenInfo) {
        self.refreshes.lock().unwrap().push(screen);
    }

    fn set_capturing(&self, capturing: bool) {
        self.capturing.lock().unwrap().push(capturing);
    }
}
