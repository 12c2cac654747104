//! Connection state machine for the capture provider.
//!
//! ```text
//!            bind()                on_connected
//! Unbound ───────────► Binding ─────────────────► Bound
//!    ▲                    │ timeout / reject         │ on_disconnected
//!    │◄───────────────────┘                          ▼
//!    │           unbind()                       Disconnected
//!    └──────────────────────────────────────────────┘
//!                 on_binding_died / on_null_binding → automatic bind()
//! ```
//!
//! All transitions happen under one mutex. `bind()` parks on a condvar that
//! the connection callback and `unbind()` signal, re-checking the state after
//! every wakeup until the deadline passes or the bind is cancelled.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use screenlink_core::BindError;
use tracing::{debug, error, info, warn};

use crate::endpoint::{CaptureProvider, ConnectionEvents, ProviderEndpoint};

/// Default upper bound for one `bind()` wait.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Binding,
    Bound,
    Disconnected,
}

type RebindHook = Arc<dyn Fn() + Send + Sync>;

// ── ProviderBinding ───────────────────────────────────────────────────────────

/// Handle to the provider connection. Cheap to clone; clones share the
/// connection.
#[derive(Clone)]
pub struct ProviderBinding {
    inner: Arc<BindingInner>,
}

struct BindingInner {
    endpoint:  Arc<dyn ProviderEndpoint>,
    timeout:   Duration,
    slot:      Mutex<Slot>,
    connected: Condvar,
    on_rebound: Mutex<Option<RebindHook>>,
}

struct Slot {
    state:    BindingState,
    provider: Option<Arc<dyn CaptureProvider>>,
    /// Set by `bind()`, cleared by `unbind()`. Automatic rebinds only happen
    /// while the owner still wants a connection.
    wanted:   bool,
    /// The next `on_connected` re-establishes a lost connection.
    reconnecting: bool,
}

impl ProviderBinding {
    pub fn new(endpoint: Arc<dyn ProviderEndpoint>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BindingInner {
                endpoint,
                timeout,
                slot: Mutex::new(Slot {
                    state: BindingState::Unbound,
                    provider: None,
                    wanted: false,
                    reconnecting: false,
                }),
                connected: Condvar::new(),
                on_rebound: Mutex::new(None),
            }),
        }
    }

    /// Probe whether the provider exists on this host.
    pub fn is_available(&self) -> bool {
        self.inner.endpoint.is_available()
    }

    /// Bind with the configured timeout. Blocks the calling thread.
    pub fn bind(&self) -> Result<(), BindError> {
        self.inner.bind(self.inner.timeout)
    }

    pub fn bind_with_timeout(&self, timeout: Duration) -> Result<(), BindError> {
        self.inner.bind(timeout)
    }

    /// Drop the connection. Safe to call in any state, any number of times.
    pub fn unbind(&self) {
        self.inner.unbind();
    }

    pub fn state(&self) -> BindingState {
        self.inner.lock().state
    }

    pub fn is_bound(&self) -> bool {
        let slot = self.inner.lock();
        slot.state == BindingState::Bound && slot.provider.is_some()
    }

    /// The live provider, if bound. Callers make remote calls on the returned
    /// handle without holding any binding lock.
    pub fn provider(&self) -> Option<Arc<dyn CaptureProvider>> {
        self.inner.lock().provider.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Run `hook` every time a lost connection comes back (after a provider
    /// crash or an automatic rebind).
    pub fn set_rebind_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.inner.on_rebound.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }
}

// ── Inner state machine ───────────────────────────────────────────────────────

impl BindingInner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind(self: &Arc<Self>, timeout: Duration) -> Result<(), BindError> {
        {
            let mut slot = self.lock();
            slot.wanted = true;
            if slot.state == BindingState::Bound && slot.provider.is_some() {
                return Ok(());
            }
            slot.state = BindingState::Binding;
        }

        let listener: Arc<dyn ConnectionEvents> = Arc::new(Listener { inner: Arc::downgrade(self) });
        if let Err(e) = self.endpoint.connect(listener) {
            error!("Failed to bind capture provider: {e}");
            let mut slot = self.lock();
            slot.state = BindingState::Unbound;
            slot.wanted = false;
            return Err(e);
        }

        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        while slot.wanted && slot.state != BindingState::Bound {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .connected
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }

        if slot.state == BindingState::Bound && slot.provider.is_some() {
            return Ok(());
        }
        if !slot.wanted {
            info!("Capture provider bind cancelled");
            return Err(BindError::Cancelled);
        }
        drop(slot);

        let ms = timeout.as_millis() as u64;
        error!("Capture provider binding timeout ({ms}ms)");
        self.unbind();
        Err(BindError::Timeout { ms })
    }

    fn unbind(&self) {
        let previous = {
            let mut slot = self.lock();
            slot.wanted = false;
            slot.reconnecting = false;
            slot.provider = None;
            self.connected.notify_all();
            std::mem::replace(&mut slot.state, BindingState::Unbound)
        };
        if previous != BindingState::Unbound {
            self.endpoint.disconnect();
            info!("Capture provider unbound (was {previous:?})");
        }
    }

    fn connected(&self, provider: Arc<dyn CaptureProvider>) {
        let rebound = {
            let mut slot = self.lock();
            if !slot.wanted {
                debug!("Capture provider connected after unbind, dropping connection");
                drop(slot);
                self.endpoint.disconnect();
                return;
            }
            slot.provider = Some(provider);
            slot.state = BindingState::Bound;
            self.connected.notify_all();
            std::mem::take(&mut slot.reconnecting)
        };
        info!("Capture provider connected");

        if rebound {
            let hook = self.on_rebound.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(hook) = hook {
                hook();
            }
        }
    }

    fn disconnected(&self) {
        let mut slot = self.lock();
        slot.provider = None;
        if slot.state != BindingState::Unbound {
            slot.state = BindingState::Disconnected;
            slot.reconnecting = true;
        }
    }

    /// The platform gave up on this connection; issue a fresh `bind()` on a
    /// worker thread so the callback thread is never blocked.
    fn rebind(self: &Arc<Self>) {
        {
            let mut slot = self.lock();
            slot.provider = None;
            if !slot.wanted {
                slot.state = BindingState::Unbound;
                return;
            }
            slot.state = BindingState::Disconnected;
            slot.reconnecting = true;
        }
        self.endpoint.disconnect();

        let inner = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("provider-rebind".into())
            .spawn(move || {
                if let Err(e) = inner.bind(inner.timeout) {
                    warn!("Capture provider rebind failed: {e}");
                }
            });
        if let Err(e) = spawned {
            warn!("Could not spawn provider rebind thread: {e}");
        }
    }
}

// ── Connection listener ───────────────────────────────────────────────────────

/// Handed to the platform. Holds the binding weakly so a leaked platform
/// registration cannot keep the binding alive.
struct Listener {
    inner: Weak<BindingInner>,
}

impl ConnectionEvents for Listener {
    fn on_connected(&self, provider: Arc<dyn CaptureProvider>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.connected(provider);
        }
    }

    fn on_disconnected(&self) {
        warn!("Capture provider disconnected");
        if let Some(inner) = self.inner.upgrade() {
            inner.disconnected();
        }
    }

    fn on_binding_died(&self) {
        warn!("Capture provider binding died, attempting to rebind");
        if let Some(inner) = self.inner.upgrade() {
            inner.rebind();
        }
    }

    fn on_null_binding(&self) {
        warn!("Capture provider returned a null binding, attempting to rebind");
        if let Some(inner) = self.inner.upgrade() {
            inner.rebind();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::{wait_until, ConnectBehaviour, ScriptedEndpoint};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }

    fn binding(behaviour: ConnectBehaviour, timeout_ms: u64) -> (ProviderBinding, Arc<ScriptedEndpoint>) {
        init_tracing();
        let endpoint = Arc::new(ScriptedEndpoint::new(behaviour));
        let binding = ProviderBinding::new(endpoint.clone(), Duration::from_millis(timeout_ms));
        (binding, endpoint)
    }

    #[test]
    fn binds_when_connection_completes_synchronously() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        binding.bind().expect("bind");
        assert_eq!(binding.state(), BindingState::Bound);
        assert!(binding.provider().is_some());
        assert_eq!(endpoint.connects(), 1);
    }

    #[test]
    fn binds_when_connection_completes_later() {
        let (binding, _endpoint) = binding(ConnectBehaviour::After(Duration::from_millis(50)), 2000);
        binding.bind().expect("bind");
        assert!(binding.is_bound());
    }

    #[test]
    fn second_bind_is_a_no_op() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        binding.bind().unwrap();
        binding.bind().unwrap();
        assert_eq!(endpoint.connects(), 1);
    }

    #[test]
    fn unreachable_provider_times_out_within_bound() {
        let (binding, endpoint) = binding(ConnectBehaviour::Never, 100);
        let started = Instant::now();
        let err = binding.bind().unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err, BindError::Timeout { ms: 100 });
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(100 + 400), "took {elapsed:?}");
        assert_eq!(binding.state(), BindingState::Unbound);
        assert_eq!(endpoint.disconnects(), 1, "partial connection must be released");
    }

    #[test]
    fn unbind_cancels_pending_bind() {
        let (binding, endpoint) = binding(ConnectBehaviour::Never, 5_000);
        let waiter = {
            let binding = binding.clone();
            std::thread::spawn(move || binding.bind())
        };
        assert!(wait_until(Duration::from_secs(2), || binding.state() == BindingState::Binding));

        let started = Instant::now();
        binding.unbind();
        let result = waiter.join().unwrap();

        assert_eq!(result, Err(BindError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
        assert_eq!(binding.state(), BindingState::Unbound);
        assert_eq!(endpoint.disconnects(), 1);
    }

    #[test]
    fn rejection_is_unavailable() {
        let (binding, endpoint) = binding(ConnectBehaviour::Reject, 600);
        let err = binding.bind().unwrap_err();
        assert!(matches!(err, BindError::Unavailable { .. }));
        assert_eq!(binding.state(), BindingState::Unbound);
        assert_eq!(endpoint.disconnects(), 0);
    }

    #[test]
    fn unbind_is_idempotent() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        binding.unbind();
        assert_eq!(endpoint.disconnects(), 0);

        binding.bind().unwrap();
        binding.unbind();
        binding.unbind();
        assert_eq!(endpoint.disconnects(), 1);
        assert_eq!(binding.state(), BindingState::Unbound);
        assert!(binding.provider().is_none());
    }

    #[test]
    fn disconnect_enters_disconnected_and_reconnect_fires_hook() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        let hooks = Arc::new(AtomicUsize::new(0));
        let h = hooks.clone();
        binding.set_rebind_hook(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        binding.bind().unwrap();
        assert_eq!(hooks.load(Ordering::SeqCst), 0);

        let listener = endpoint.listener().expect("listener registered");
        listener.on_disconnected();
        assert_eq!(binding.state(), BindingState::Disconnected);
        assert!(binding.provider().is_none());

        listener.on_connected(endpoint.provider());
        assert!(binding.is_bound());
        assert_eq!(hooks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn binding_death_rebinds_automatically() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        let hooks = Arc::new(AtomicUsize::new(0));
        let h = hooks.clone();
        binding.set_rebind_hook(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        binding.bind().unwrap();

        endpoint.listener().unwrap().on_binding_died();
        assert!(wait_until(Duration::from_secs(2), || endpoint.connects() == 2 && binding.is_bound()));
        assert_eq!(hooks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn null_binding_rebinds_automatically() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        binding.bind().unwrap();

        endpoint.listener().unwrap().on_null_binding();
        assert!(wait_until(Duration::from_secs(2), || endpoint.connects() == 2 && binding.is_bound()));
    }

    #[test]
    fn no_rebind_after_unbind() {
        let (binding, endpoint) = binding(ConnectBehaviour::Immediate, 600);
        binding.bind().unwrap();
        let listener = endpoint.listener().unwrap();
        binding.unbind();

        listener.on_binding_died();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(endpoint.connects(), 1);
        assert_eq!(binding.state(), BindingState::Unbound);
    }

    #[test]
    fn late_connection_after_unbind_is_dropped() {
        let (binding, endpoint) = binding(ConnectBehaviour::Never, 50);
        let _ = binding.bind();
        let listener = endpoint.listener().unwrap();

        listener.on_connected(endpoint.provider());
        assert_eq!(binding.state(), BindingState::Unbound);
        assert_eq!(endpoint.disconnects(), 2);
    }
}
