#![allow(clippy::unwrap_used)]
// Integration tests for `Coordinator` against a wiremock hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use plantwatch_core::{
    Coordinator, CoreError, DeviceId, HubClient, MemorySettingsStore, MoistureStatus,
    RefreshOutcome, RefreshState, Settings, SettingsStore, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

const DEVICES: &str = "/apps/api/242/devices";

fn store_for(address: &str) -> Arc<MemorySettingsStore> {
    let settings = Settings {
        hub_address: address.to_owned(),
        ..Settings::default()
    };
    Arc::new(MemorySettingsStore::new(
        settings,
        Some(SecretString::from("test-token".to_owned())),
    ))
}

fn coordinator(store: Arc<MemorySettingsStore>) -> Coordinator {
    let hub = HubClient::new(&TransportConfig::default()).unwrap();
    Coordinator::new(hub, store)
}

async fn setup() -> (MockServer, Arc<MemorySettingsStore>, Coordinator) {
    let server = MockServer::start().await;
    let store = store_for(&server.uri());
    let coordinator = coordinator(Arc::clone(&store));
    (server, store, coordinator)
}

fn soil_sensor() -> Value {
    json!([
        {"id": "5", "name": "Soil Sensor", "type": "soilMoisture"},
        {"id": "6", "name": "Porch Light", "type": "Generic Zigbee Bulb"}
    ])
}

async fn mount_devices(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(DEVICES))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_reading(server: &MockServer, id: i64, moisture: &str, battery: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{DEVICES}/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id.to_string(),
            "attributes": [
                {"name": "moisture", "currentValue": moisture},
                {"name": "battery", "currentValue": battery}
            ]
        })))
        .mount(server)
        .await;
}

fn updated(outcome: RefreshOutcome) -> Arc<plantwatch_core::StatusSnapshot> {
    match outcome {
        RefreshOutcome::Updated(snapshot) => snapshot,
        RefreshOutcome::AlreadyRefreshing => panic!("expected a completed pass"),
    }
}

// ── Classification end to end ───────────────────────────────────────

#[tokio::test]
async fn test_dry_sensor_is_critical() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "15", "80").await;

    let snapshot = updated(coordinator.refresh().await.unwrap());

    assert_eq!(snapshot.sensors.len(), 1);
    let sensor = &snapshot.sensors[0];
    assert_eq!(sensor.id, DeviceId(5));
    assert_eq!(sensor.moisture_level, Some(15.0));
    assert_eq!(sensor.battery_level, Some(80));
    assert_eq!(sensor.status, MoistureStatus::Critical);
    assert!(sensor.last_activity.is_some());
    assert_eq!(snapshot.overall, MoistureStatus::Critical);
    assert_eq!(coordinator.current_overall_status(), MoistureStatus::Critical);
    assert!(!coordinator.is_refreshing());
}

#[tokio::test]
async fn test_moist_sensor_is_healthy() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "50", "80").await;

    coordinator.refresh().await.unwrap();

    let sensors = coordinator.current_sensors();
    assert_eq!(sensors[0].status, MoistureStatus::Healthy);
    assert_eq!(coordinator.current_overall_status(), MoistureStatus::Healthy);
}

#[tokio::test]
async fn test_attribute_failure_degrades_only_that_sensor() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(
        &server,
        json!([
            {"id": 5, "name": "Soil Sensor", "type": "soilMoisture"},
            {"id": 7, "name": "Fern Moisture", "type": "Generic"}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("{DEVICES}/5")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_reading(&server, 7, "55", "90").await;

    let snapshot = updated(coordinator.refresh().await.unwrap());

    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.sensors.len(), 2);

    let failed = &snapshot.sensors[0];
    assert_eq!(failed.id, DeviceId(5));
    assert_eq!(failed.status, MoistureStatus::Unknown);
    assert_eq!(failed.moisture_level, None);
    assert_eq!(failed.battery_level, None);
    assert_eq!(failed.last_activity, None);

    assert_eq!(snapshot.sensors[1].status, MoistureStatus::Healthy);
    assert_eq!(snapshot.overall, MoistureStatus::Unknown);

    assert_eq!(snapshot.device_failures.len(), 1);
    assert_eq!(snapshot.device_failures[0].device_id, DeviceId(5));
    assert!(matches!(
        snapshot.device_failures[0].error,
        CoreError::Api { status: Some(500), .. }
    ));
}

#[tokio::test]
async fn test_last_activity_is_each_devices_own_fetch_time() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(
        &server,
        json!([
            {"id": 5, "name": "Soil Sensor", "type": "soilMoisture"},
            {"id": 7, "name": "Fern Moisture", "type": "Generic"}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("{DEVICES}/5")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "id": "5",
                    "attributes": [{"name": "moisture", "currentValue": "30"}]
                }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    mount_reading(&server, 7, "55", "90").await;

    let snapshot = updated(coordinator.refresh().await.unwrap());

    let slow = snapshot.sensors[0].last_activity.unwrap();
    let fast = snapshot.sensors[1].last_activity.unwrap();
    assert_eq!(snapshot.sensors[0].id, DeviceId(5));
    assert!(
        slow - fast >= chrono::TimeDelta::milliseconds(300),
        "slow fetch at {slow}, fast fetch at {fast}"
    );
}

#[tokio::test]
async fn test_no_candidates_is_unknown_overall() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(
        &server,
        json!([{"id": 6, "name": "Porch Light", "type": "Generic Zigbee Bulb"}]),
    )
    .await;

    let snapshot = updated(coordinator.refresh().await.unwrap());
    assert!(snapshot.sensors.is_empty());
    assert_eq!(snapshot.overall, MoistureStatus::Unknown);
}

// ── Failure handling ────────────────────────────────────────────────

#[tokio::test]
async fn test_auth_failure_keeps_previous_sensors() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "15", "80").await;
    coordinator.refresh().await.unwrap();
    let before = coordinator.current_sensors();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(DEVICES))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = coordinator.refresh().await.unwrap_err();
    assert_eq!(err, CoreError::Authentication);

    let snapshot = coordinator.current_snapshot();
    assert_eq!(snapshot.sensors, before);
    assert_eq!(snapshot.overall, MoistureStatus::Unknown);
    assert_eq!(snapshot.error, Some(CoreError::Authentication));
    assert!(!coordinator.is_refreshing());
}

#[tokio::test]
async fn test_unconfigured_refresh_fails_without_request() {
    let server = MockServer::start().await;
    let store = Arc::new(MemorySettingsStore::new(
        Settings {
            hub_address: server.uri(),
            ..Settings::default()
        },
        None,
    ));
    let coordinator = coordinator(store);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(!coordinator.is_configured());
    assert!(!coordinator.about_to_display());
    let err = coordinator.refresh().await.unwrap_err();
    assert_eq!(err, CoreError::InvalidConfiguration);
    assert!(coordinator.current_snapshot().error.as_ref().unwrap().needs_setup());
}

// ── Overlap prevention ──────────────────────────────────────────────

#[tokio::test]
async fn test_second_trigger_while_refreshing_is_dropped() {
    let (server, _store, coordinator) = setup().await;
    Mock::given(method("GET"))
        .and(path(DEVICES))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(soil_sensor())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_reading(&server, 5, "30", "80").await;

    let first = coordinator.trigger_refresh();
    coordinator
        .state()
        .wait_for(|s| *s == RefreshState::Refreshing)
        .await
        .unwrap();

    assert!(coordinator.is_refreshing());
    assert!(!coordinator.about_to_display());
    let second = coordinator.refresh().await.unwrap();
    assert!(matches!(second, RefreshOutcome::AlreadyRefreshing));
    assert!(coordinator.current_snapshot().completed_at.is_none());

    let snapshot = updated(first.await.unwrap().unwrap());
    assert_eq!(snapshot.overall, MoistureStatus::NeedsAttention);
    assert!(!coordinator.is_refreshing());
}

#[tokio::test]
async fn test_about_to_display_refreshes_when_idle() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "15", "80").await;

    let mut updates = coordinator.subscribe();
    assert!(coordinator.about_to_display());
    updates.changed().await.unwrap();

    assert_eq!(updates.borrow().overall, MoistureStatus::Critical);
    assert_eq!(coordinator.current_sensors().len(), 1);
}

// ── Mutating actions and observers ──────────────────────────────────

#[tokio::test]
async fn test_mark_and_clear_just_watered() {
    let (server, store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "15", "80").await;

    let handle = coordinator.mark_just_watered(DeviceId(5)).unwrap();
    assert!(store.load_settings().just_watered_sensors.contains(&DeviceId(5)));

    let snapshot = updated(handle.await.unwrap().unwrap());
    assert_eq!(snapshot.sensors[0].status, MoistureStatus::JustWatered);
    assert!(snapshot.sensors[0].is_just_watered);
    assert_eq!(snapshot.overall, MoistureStatus::Healthy);

    let handle = coordinator.clear_just_watered(DeviceId(5)).unwrap();
    let snapshot = updated(handle.await.unwrap().unwrap());
    assert_eq!(snapshot.sensors[0].status, MoistureStatus::Critical);
    assert!(!snapshot.sensors[0].is_just_watered);
    assert!(store.load_settings().just_watered_timestamps.is_empty());
}

#[tokio::test]
async fn test_custom_name_applies_on_next_pass() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "50", "80").await;

    let handle = coordinator
        .set_custom_name(DeviceId(5), Some("Basil".into()))
        .unwrap();
    let snapshot = updated(handle.await.unwrap().unwrap());
    assert_eq!(snapshot.sensors[0].display_name(), "Basil");
}

#[tokio::test]
async fn test_on_update_fires_for_success_and_failure() {
    let (server, _store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;
    mount_reading(&server, 5, "50", "80").await;

    let calls = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    {
        let calls = Arc::clone(&calls);
        let errors = Arc::clone(&errors);
        coordinator.on_update(move |snapshot| {
            calls.fetch_add(1, Ordering::SeqCst);
            if snapshot.error.is_some() {
                errors.fetch_add(1, Ordering::SeqCst);
            }
        });
    }
    let mut rx = coordinator.subscribe();

    coordinator.refresh().await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().overall, MoistureStatus::Healthy);

    server.reset().await;
    let _ = coordinator.refresh().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_and_credentials() {
    let (server, store, coordinator) = setup().await;
    mount_devices(&server, soil_sensor()).await;

    assert!(coordinator.test_connection().await.unwrap());

    coordinator
        .update_credentials("  ", &SecretString::from(String::new()))
        .unwrap();
    assert!(store.load_settings().hub_address.is_empty());
    assert_eq!(
        coordinator.test_connection().await.unwrap_err(),
        CoreError::InvalidConfiguration
    );
}

// ── Scheduling ──────────────────────────────────────────────────────

fn counting(coordinator: &Coordinator) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    coordinator.on_update(move |_| {
        inner.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_every_period() {
    // No address: every pass fails immediately without touching the network.
    let coordinator = coordinator(store_for(""));
    let count = counting(&coordinator);

    let _ = coordinator.start().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(1799)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);

    coordinator.shutdown().await;
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_reschedules_without_refreshing() {
    let store = store_for("");
    let coordinator = coordinator(Arc::clone(&store));
    let count = counting(&coordinator);

    let _ = coordinator.start().await;
    tokio::time::sleep(Duration::from_secs(1700)).await;

    coordinator.set_refresh_interval(300).unwrap();
    assert_eq!(store.load_settings().refresh_interval_secs, 300);
    assert_eq!(coordinator.refresh_interval(), Duration::from_secs(300));
    tokio::task::yield_now().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // The old 1800 s deadline passes without a refresh.
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);

    coordinator.shutdown().await;
}
