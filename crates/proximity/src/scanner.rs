//! Proximity Scanner
//!
//! One supervisor task polls discovery and spawns one session task per newly
//! seen address. Every task lives under a child of the caller's cancellation
//! token and is tracked, so `stop()` can cancel and then wait for all of them
//! to release their links.

use crate::adapter::{
    AdapterState, DeviceAddress, Discovery, RadioAdapter, RadioLink, IDENTITY_CHARACTERISTIC_UUID,
    SERVICE_UUID,
};
use crate::aggregator::SaveContactWorker;
use crate::error::{ProximityError, ProximityResult};
use crate::events::BleEventEmitter;
use crate::session::SessionState;
use dashmap::{DashMap, DashSet};
use identity::BroadcastIdentifier;
use shared::config::ScannerConfig;
use shared::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// How often the supervisor polls the adapter for visible devices
const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Link-layer overhead on top of the identifier payload
const MTU_OVERHEAD: usize = 2;

pub struct Scanner {
    inner: Arc<ScannerInner>,
    run: Mutex<Option<ScanRun>>,
}

struct ScanRun {
    token: CancellationToken,
    tracker: TaskTracker,
}

struct ScannerInner {
    adapter: Arc<dyn RadioAdapter>,
    worker: SaveContactWorker,
    emitter: Arc<dyn BleEventEmitter>,
    clock: Arc<dyn Clock>,
    config: ScannerConfig,

    /// Identifier read from each physical address, kept for the process lifetime
    identities: DashMap<DeviceAddress, BroadcastIdentifier>,
    active: DashSet<DeviceAddress>,
    last_attempt: DashMap<DeviceAddress, Instant>,
    states: DashMap<DeviceAddress, SessionState>,
}

impl Scanner {
    pub fn new(
        adapter: Arc<dyn RadioAdapter>,
        worker: SaveContactWorker,
        emitter: Arc<dyn BleEventEmitter>,
        clock: Arc<dyn Clock>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ScannerInner {
                adapter,
                worker,
                emitter,
                clock,
                config,
                identities: DashMap::new(),
                active: DashSet::new(),
                last_attempt: DashMap::new(),
                states: DashMap::new(),
            }),
            run: Mutex::new(None),
        }
    }

    /// Begin discovery under `scope`. Calling this while running is a no-op.
    pub async fn start(&self, scope: &CancellationToken) {
        let mut run = self.run.lock().await;

        if let Some(existing) = run.as_ref() {
            if !existing.token.is_cancelled() {
                debug!("Scanner already running");
                return;
            }
        }

        // A previous run whose scope was cancelled from outside.
        if let Some(stale) = run.take() {
            stale.tracker.close();
            stale.tracker.wait().await;
        }

        let token = scope.child_token();
        let tracker = TaskTracker::new();
        tracker.spawn(supervise(self.inner.clone(), token.clone(), tracker.clone()));

        *run = Some(ScanRun { token, tracker });
        info!("Scanner started");
    }

    /// Cancel discovery and every live session, returning once all links are released
    pub async fn stop(&self) {
        let Some(run) = self.run.lock().await.take() else {
            return;
        };

        info!("Stopping scanner");
        run.token.cancel();
        run.tracker.close();
        run.tracker.wait().await;
        info!("Scanner stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .map(|run| !run.token.is_cancelled())
            .unwrap_or(false)
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.active.len()
    }

    /// Last known session state for `address`
    pub fn session_state(&self, address: &str) -> Option<SessionState> {
        self.inner.states.get(address).map(|state| *state)
    }

    pub fn session_states(&self) -> Vec<(DeviceAddress, SessionState)> {
        self.inner
            .states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn cached_identity(&self, address: &str) -> Option<BroadcastIdentifier> {
        self.inner.identities.get(address).map(|id| id.clone())
    }
}

async fn supervise(inner: Arc<ScannerInner>, token: CancellationToken, tracker: TaskTracker) {
    let mut adapter_state = inner.adapter.state_changes();
    let mut state_open = true;
    let mut sessions = token.child_token();
    let mut discovering = false;

    let mut ticker = tokio::time::interval(DISCOVERY_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,

            changed = adapter_state.changed(), if state_open => {
                if changed.is_err() {
                    state_open = false;
                    continue;
                }

                let state = *adapter_state.borrow_and_update();
                match state {
                    AdapterState::PoweredOff => {
                        warn!("Radio adapter powered off, suspending discovery");
                        sessions.cancel();
                        sessions = token.child_token();
                        if discovering {
                            inner.stop_discovery().await;
                            discovering = false;
                        }
                    }
                    AdapterState::PoweredOn => {
                        info!("Radio adapter powered on, resuming discovery");
                    }
                }
            }

            _ = ticker.tick() => {
                if !discovering {
                    match inner.adapter.start_discovery().await {
                        Ok(()) => {
                            info!("Discovery started");
                            discovering = true;
                        }
                        Err(e) => {
                            debug!("Discovery unavailable: {}", e);
                            continue;
                        }
                    }
                }

                match inner.adapter.discovered().await {
                    Ok(found) => {
                        for discovery in found {
                            inner.begin_session(discovery, &sessions, &tracker);
                        }
                    }
                    Err(e) => warn!("Discovery poll failed: {}", e),
                }
            }
        }
    }

    if discovering {
        inner.stop_discovery().await;
    }
    debug!("Scanner supervisor exited");
}

impl ScannerInner {
    async fn stop_discovery(&self) {
        if let Err(e) = self.adapter.stop_discovery().await {
            debug!("Failed to stop discovery: {}", e);
        }
    }

    /// Forget addresses that are idle and past their rate limit. Rotating
    /// addresses would otherwise accumulate for the process lifetime.
    fn prune(&self, keep: &str) {
        let now = Instant::now();
        let min_interval = Duration::from_secs(self.config.min_connection_interval_secs);

        self.last_attempt.retain(|address, last| {
            address == keep || self.active.contains(address) || now.duration_since(*last) < min_interval
        });
        self.states.retain(|address, state| {
            address == keep || !state.is_terminal() || self.last_attempt.contains_key(address)
        });
    }

    fn begin_session(self: &Arc<Self>, discovery: Discovery, sessions: &CancellationToken, tracker: &TaskTracker) {
        let address = discovery.address;
        if self.active.contains(&address) {
            return;
        }

        let now = Instant::now();
        let min_interval = Duration::from_secs(self.config.min_connection_interval_secs);
        let rate_limited = self
            .last_attempt
            .get(&address)
            .map(|last| now.duration_since(*last) < min_interval)
            .unwrap_or(false);
        if rate_limited {
            debug!("Skipping {}: attempted within the last {:?}", address, min_interval);
            return;
        }

        if !self.active.insert(address.clone()) {
            return;
        }
        self.last_attempt.insert(address.clone(), now);
        self.states.insert(address.clone(), SessionState::Discovering);

        debug!("Starting session with {}", address);
        let session = RadioSession {
            inner: self.clone(),
            address,
            tx_power_advertised: discovery.tx_power_advertised,
        };
        tracker.spawn(session.run(sessions.child_token()));
    }
}

enum Interrupt {
    Cancelled,
    Failed(ProximityError),
}

impl From<ProximityError> for Interrupt {
    fn from(error: ProximityError) -> Self {
        Interrupt::Failed(error)
    }
}

struct RadioSession {
    inner: Arc<ScannerInner>,
    address: DeviceAddress,
    tx_power_advertised: Option<i16>,
}

impl RadioSession {
    async fn run(self, token: CancellationToken) {
        match self.connect_and_exchange(&token).await {
            Ok(()) | Err(Interrupt::Cancelled) => self.disconnected(),
            Err(Interrupt::Failed(e)) if e.is_link_drop() => self.disconnected(),
            Err(Interrupt::Failed(e)) => {
                self.advance(SessionState::Errored);
                self.inner.emitter.error_event(&self.address, &e);
            }
        }
        self.inner.active.remove(&self.address);
        self.inner.prune(&self.address);
    }

    fn disconnected(&self) {
        self.advance(SessionState::Disconnected);
        self.inner.emitter.disconnect_event(&self.address);
    }

    async fn connect_and_exchange(&self, token: &CancellationToken) -> Result<(), Interrupt> {
        self.advance(SessionState::Connecting);
        let link = self
            .step(token, "connect", self.connect_timeout(), self.inner.adapter.connect(&self.address))
            .await?;

        let outcome = self.exchange(token, link.as_ref()).await;

        if let Err(e) = link.disconnect().await {
            debug!("Disconnect from {} failed: {}", self.address, e);
        }
        outcome
    }

    async fn exchange(&self, token: &CancellationToken, link: &dyn RadioLink) -> Result<(), Interrupt> {
        self.advance(SessionState::NegotiatingLink);
        let mtu = self
            .step(
                token,
                "MTU negotiation",
                self.read_timeout(),
                link.request_mtu(BroadcastIdentifier::SIZE + MTU_OVERHEAD),
            )
            .await?;
        debug!("MTU for {} is {}", self.address, mtu);

        self.advance(SessionState::ReadingIdentity);
        let identifier = self.identity(token, link).await?;

        self.advance(SessionState::Sampling);
        self.sample(token, link, &identifier).await
    }

    async fn identity(&self, token: &CancellationToken, link: &dyn RadioLink) -> Result<BroadcastIdentifier, Interrupt> {
        if let Some(cached) = self.inner.identities.get(&self.address) {
            debug!("Using cached identity for {}", self.address);
            return Ok(cached.clone());
        }

        let bytes = self
            .step(
                token,
                "identity read",
                self.read_timeout(),
                link.read_characteristic(SERVICE_UUID, IDENTITY_CHARACTERISTIC_UUID),
            )
            .await?;

        let identifier = BroadcastIdentifier::from_bytes(&bytes).map_err(ProximityError::from)?;
        debug!(
            "Read identity {} from {}",
            identifier.cryptogram.fingerprint(),
            self.address
        );
        self.inner
            .identities
            .insert(self.address.clone(), identifier.clone());
        Ok(identifier)
    }

    /// Read RSSI on a fixed interval until the scan interval elapses
    async fn sample(
        &self,
        token: &CancellationToken,
        link: &dyn RadioLink,
        identifier: &BroadcastIdentifier,
    ) -> Result<(), Interrupt> {
        let deadline = Instant::now() + Duration::from_secs(self.inner.config.scan_interval_secs);
        let sample_interval = Duration::from_millis(self.inner.config.rssi_sample_interval_ms);
        let tx_power_advertised = self
            .tx_power_advertised
            .map(|p| p.clamp(-128, 127) as i8)
            .unwrap_or(0);

        loop {
            let rssi = self
                .step(token, "RSSI read", self.read_timeout(), link.read_rssi())
                .await?;

            self.inner
                .worker
                .record(identifier.clone(), rssi, self.inner.clock.now(), tx_power_advertised);
            self.inner
                .emitter
                .success_event(&self.address, identifier, rssi, self.tx_power_advertised);

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Interrupt::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Ok(()),
                _ = tokio::time::sleep(sample_interval) => {}
            }
        }
    }

    /// Run one protocol step, bounded by `limit` and abandoned on cancellation
    async fn step<T>(
        &self,
        token: &CancellationToken,
        operation: &'static str,
        limit: Duration,
        action: impl Future<Output = ProximityResult<T>>,
    ) -> Result<T, Interrupt> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupt::Cancelled),
            outcome = tokio::time::timeout(limit, action) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(Interrupt::Failed(e)),
                Err(_) => Err(Interrupt::Failed(ProximityError::Timeout {
                    address: self.address.clone(),
                    operation,
                })),
            },
        }
    }

    fn advance(&self, next: SessionState) {
        let mut state = self
            .inner
            .states
            .entry(self.address.clone())
            .or_insert(SessionState::Idle);

        match state.transition(next) {
            Some(advanced) => {
                debug!("Session {}: {} -> {}", self.address, *state, advanced);
                *state = advanced;
            }
            None => warn!(
                "Session {}: ignoring transition {} -> {}",
                self.address, *state, next
            ),
        }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config.connect_timeout_ms)
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config.read_timeout_ms)
    }
}
