// ── Refresh coordinator ──
//
// Owns the authoritative sensor set and drives its refresh. At most one
// pass is in flight: the `Idle -> Refreshing` transition is a
// compare-and-set on the state channel, and a trigger that loses the race
// is dropped rather than queued. Every completed pass publishes exactly
// one `StatusSnapshot`, so sensors and overall status always change
// together.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use plantwatch_api::HubClient;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::{DeviceFailure, SensorBatch, fetch_sensors};
use crate::error::CoreError;
use crate::model::{DeviceId, MoistureSensor, MoistureStatus};
use crate::settings::{Settings, SettingsStore};

// ── Published state ─────────────────────────────────────────────────

/// Refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Everything one completed pass publishes.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Fresh on success; the previous set, untouched, on failure.
    pub sensors: Arc<Vec<MoistureSensor>>,
    pub overall: MoistureStatus,
    /// Why the pass failed, if it did.
    pub error: Option<CoreError>,
    /// Devices whose attribute fetch failed in an otherwise successful pass.
    pub device_failures: Vec<DeviceFailure>,
    /// `None` until the first pass completes.
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    fn empty() -> Self {
        Self {
            sensors: Arc::new(Vec::new()),
            overall: MoistureStatus::Unknown,
            error: None,
            device_failures: Vec::new(),
            completed_at: None,
        }
    }
}

/// Result of a refresh request that did not fail.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A pass ran and published this snapshot.
    Updated(Arc<StatusSnapshot>),
    /// Another pass was already in flight; nothing was done.
    AlreadyRefreshing,
}

type UpdateCallback = Box<dyn Fn(&StatusSnapshot) + Send + Sync>;

// ── Coordinator ─────────────────────────────────────────────────────

/// Polling engine facade for a presentation layer.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Holds an unconfigured
/// [`HubClient`] template and the [`SettingsStore`]; both settings and the
/// access token are re-read at the start of every operation.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    hub: HubClient,
    store: Arc<dyn SettingsStore>,
    state: watch::Sender<RefreshState>,
    snapshot: watch::Sender<Arc<StatusSnapshot>>,
    callbacks: RwLock<Vec<UpdateCallback>>,
    /// Current timer period; the timer task restarts on every change.
    interval: watch::Sender<Duration>,
    cancel: CancellationToken,
    /// Child token for the running timer, replaced on every `start()`.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator. Does not refresh or start the timer; call
    /// [`start()`](Self::start) for that.
    pub fn new(hub: HubClient, store: Arc<dyn SettingsStore>) -> Self {
        let (state, _) = watch::channel(RefreshState::Idle);
        let (snapshot, _) = watch::channel(Arc::new(StatusSnapshot::empty()));
        let (interval, _) = watch::channel(store.load_settings().refresh_interval());
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(CoordinatorInner {
                hub,
                store,
                state,
                snapshot,
                callbacks: RwLock::new(Vec::new()),
                interval,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the periodic timer, then run an initial refresh.
    ///
    /// The timer keeps running when the initial pass fails; the next tick
    /// is the retry. Calling `start()` again replaces the running timer.
    pub async fn start(&self) -> Result<RefreshOutcome, CoreError> {
        let child = self.inner.cancel.child_token();
        {
            let mut current = self.inner.cancel_child.lock().await;
            current.cancel();
            *current = child.clone();
        }

        self.reschedule();
        let interval_rx = self.inner.interval.subscribe();
        let handle = tokio::spawn(refresh_timer_task(self.clone(), interval_rx, child));
        self.inner.task_handles.lock().await.push(handle);
        info!(
            interval_secs = self.refresh_interval().as_secs(),
            "coordinator started"
        );

        self.refresh().await
    }

    /// Stop the timer and wait for it to exit, including any pass the
    /// timer is running.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("coordinator stopped");
    }

    // ── Observer surface ─────────────────────────────────────────────

    pub fn current_snapshot(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.inner.snapshot.borrow())
    }

    pub fn current_sensors(&self) -> Arc<Vec<MoistureSensor>> {
        Arc::clone(&self.inner.snapshot.borrow().sensors)
    }

    pub fn current_overall_status(&self) -> MoistureStatus {
        self.inner.snapshot.borrow().overall
    }

    pub fn is_refreshing(&self) -> bool {
        *self.inner.state.borrow() == RefreshState::Refreshing
    }

    /// Receiver yielding one snapshot per completed pass.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<RefreshState> {
        self.inner.state.subscribe()
    }

    /// Register a callback fired after every completed pass, success or
    /// failure. Callbacks run on the refreshing task once the state is
    /// back to idle, so they may trigger another refresh.
    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// `true` iff a hub address and a non-empty token are stored.
    pub fn is_configured(&self) -> bool {
        let settings = self.inner.store.load_settings();
        if settings.hub_address.trim().is_empty() {
            return false;
        }
        self.inner
            .store
            .load_secret_token()
            .is_ok_and(|token| !token.expose_secret().is_empty())
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Run one refresh pass now, unless one is already in flight.
    ///
    /// On failure the previous sensor set is kept, the overall status is
    /// published as unknown, and the error is both published and returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome, CoreError> {
        let Some(guard) = RefreshGuard::acquire(&self.inner.state) else {
            debug!("refresh already in flight, ignoring trigger");
            return Ok(RefreshOutcome::AlreadyRefreshing);
        };

        let result = self.run_refresh_pass().await;
        let completed_at = Some(Utc::now());

        let (snapshot, error) = match result {
            Ok(batch) => {
                let overall = MoistureStatus::overall(batch.sensors.iter().map(|s| s.status));
                debug!(
                    sensors = batch.sensors.len(),
                    failures = batch.failures.len(),
                    overall = %overall,
                    "refresh complete"
                );
                let snapshot = StatusSnapshot {
                    sensors: Arc::new(batch.sensors),
                    overall,
                    error: None,
                    device_failures: batch.failures,
                    completed_at,
                };
                (snapshot, None)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous sensors");
                let snapshot = StatusSnapshot {
                    sensors: self.current_sensors(),
                    overall: MoistureStatus::Unknown,
                    error: Some(e.clone()),
                    device_failures: Vec::new(),
                    completed_at,
                };
                (snapshot, Some(e))
            }
        };

        let snapshot = Arc::new(snapshot);
        self.inner.snapshot.send_replace(Arc::clone(&snapshot));
        drop(guard);
        self.notify(&snapshot);

        match error {
            Some(e) => Err(e),
            None => Ok(RefreshOutcome::Updated(snapshot)),
        }
    }

    /// Spawn [`refresh()`](Self::refresh) on the runtime.
    pub fn trigger_refresh(&self) -> JoinHandle<Result<RefreshOutcome, CoreError>> {
        let this = self.clone();
        tokio::spawn(async move { this.refresh().await })
    }

    /// Hook for a presentation layer about to show the sensor list:
    /// triggers a refresh when idle and configured. Returns whether one
    /// was triggered.
    pub fn about_to_display(&self) -> bool {
        if self.is_refreshing() || !self.is_configured() {
            return false;
        }
        drop(self.trigger_refresh());
        true
    }

    async fn run_refresh_pass(&self) -> Result<SensorBatch, CoreError> {
        let (client, settings) = self.configured_client()?;
        fetch_sensors(&client, &settings).await
    }

    /// Hub client built from the settings and token as stored right now.
    fn configured_client(&self) -> Result<(HubClient, Settings), CoreError> {
        let settings = self.inner.store.load_settings();
        let token = self.inner.store.load_secret_token()?;
        let client = self
            .inner
            .hub
            .with_credentials(settings.hub_address.trim(), token);
        if !client.is_configured() {
            return Err(CoreError::InvalidConfiguration);
        }
        Ok((client, settings))
    }

    fn notify(&self, snapshot: &StatusSnapshot) {
        let callbacks = self
            .inner
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback(snapshot);
        }
    }

    // ── Mutating actions ─────────────────────────────────────────────

    /// Record a watering now, then trigger a refresh.
    pub fn mark_just_watered(
        &self,
        id: DeviceId,
    ) -> Result<JoinHandle<Result<RefreshOutcome, CoreError>>, CoreError> {
        self.update_settings(|settings| settings.mark_watered(id, Utc::now()))?;
        info!(device_id = %id, "marked as just watered");
        Ok(self.trigger_refresh())
    }

    /// Remove a watering mark, then trigger a refresh.
    pub fn clear_just_watered(
        &self,
        id: DeviceId,
    ) -> Result<JoinHandle<Result<RefreshOutcome, CoreError>>, CoreError> {
        self.update_settings(|settings| settings.clear_watered(id))?;
        info!(device_id = %id, "cleared just watered mark");
        Ok(self.trigger_refresh())
    }

    /// Set or remove (with `None` or a blank name) a sensor's custom
    /// name, then trigger a refresh.
    pub fn set_custom_name(
        &self,
        id: DeviceId,
        name: Option<String>,
    ) -> Result<JoinHandle<Result<RefreshOutcome, CoreError>>, CoreError> {
        self.update_settings(|settings| settings.set_custom_name(id, name))?;
        debug!(device_id = %id, "custom name updated");
        Ok(self.trigger_refresh())
    }

    fn update_settings(&self, apply: impl FnOnce(&mut Settings)) -> Result<(), CoreError> {
        let mut settings = self.inner.store.load_settings();
        apply(&mut settings);
        self.inner.store.save_settings(&settings)
    }

    // ── Scheduling ───────────────────────────────────────────────────

    pub fn refresh_interval(&self) -> Duration {
        *self.inner.interval.borrow()
    }

    /// Persist a new polling period and restart the timer with it.
    /// Zero means the default period.
    pub fn set_refresh_interval(&self, secs: u64) -> Result<(), CoreError> {
        self.update_settings(|settings| settings.refresh_interval_secs = secs)?;
        self.reschedule();
        Ok(())
    }

    /// Re-read the polling period from settings. When it changed, the
    /// timer restarts with a full new period; no refresh runs now.
    pub fn reschedule(&self) {
        let period = self.inner.store.load_settings().refresh_interval();
        let changed = self.inner.interval.send_if_modified(|current| {
            if *current == period {
                false
            } else {
                *current = period;
                true
            }
        });
        if changed {
            info!(interval_secs = period.as_secs(), "refresh timer rescheduled");
        }
    }

    // ── Credentials ──────────────────────────────────────────────────

    /// Probe the hub with the stored address and token.
    pub async fn test_connection(&self) -> Result<bool, CoreError> {
        let (client, _) = self.configured_client()?;
        Ok(client.test_connection().await?)
    }

    /// Store a new hub address and access token.
    pub fn update_credentials(
        &self,
        hub_address: &str,
        token: &SecretString,
    ) -> Result<(), CoreError> {
        let address = hub_address.trim().to_owned();
        self.update_settings(|settings| settings.hub_address = address)?;
        self.inner.store.save_secret_token(token)?;
        info!("hub credentials updated");
        Ok(())
    }
}

// ── Overlap guard ───────────────────────────────────────────────────

/// Holds the `Refreshing` state; returns it to `Idle` on drop, including
/// when the pass panics or its future is dropped.
struct RefreshGuard<'a> {
    state: &'a watch::Sender<RefreshState>,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(state: &'a watch::Sender<RefreshState>) -> Option<Self> {
        let acquired = state.send_if_modified(|current| {
            if *current == RefreshState::Idle {
                *current = RefreshState::Refreshing;
                true
            } else {
                false
            }
        });
        acquired.then_some(Self { state })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(RefreshState::Idle);
    }
}

// ── Background task ─────────────────────────────────────────────────

/// Fire a refresh every period. A period change restarts the ticker so
/// the next refresh is one full new period away.
async fn refresh_timer_task(
    coordinator: Coordinator,
    mut interval_rx: watch::Receiver<Duration>,
    cancel: CancellationToken,
) {
    loop {
        let period = *interval_rx.borrow_and_update();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = coordinator.refresh().await {
                        debug!(error = %e, "periodic refresh failed");
                    }
                }
            }
        }
    }
}
