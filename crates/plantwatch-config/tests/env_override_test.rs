#![allow(clippy::unwrap_used)]
// `PLANTWATCH_*` overrides must shape what is read but never what is
// saved. Kept in its own binary so the jailed env vars cannot leak into
// the other settings tests.

use chrono::Utc;
use figment::Jail;
use pretty_assertions::assert_eq;

use plantwatch_config::{FileSettingsStore, load_file};
use plantwatch_core::{DeviceId, SettingsStore};

const FILE: &str = r#"
hub_address = "file.hub"
refresh_interval = 900
healthy_threshold = 45.0
"#;

#[test]
fn env_overrides_are_not_written_back() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", FILE).unwrap();
        jail.set_env("PLANTWATCH_HUB_ADDRESS", "env.hub");
        jail.set_env("PLANTWATCH_REFRESH_INTERVAL", "600");
        jail.set_env("PLANTWATCH_HEALTHY_THRESHOLD", "60");
        let store = FileSettingsStore::new(jail.directory().join("config.toml"));

        let mut settings = store.load_settings();
        assert_eq!(settings.hub_address, "env.hub");
        assert_eq!(settings.refresh_interval_secs, 600);
        settings.mark_watered(DeviceId(5), Utc::now());
        store.save_settings(&settings).unwrap();

        let on_disk = load_file(store.path()).unwrap();
        assert_eq!(on_disk.hub_address, "file.hub");
        assert_eq!(on_disk.refresh_interval, 900);
        assert!((on_disk.healthy_threshold - 45.0).abs() < f64::EPSILON);
        assert_eq!(on_disk.just_watered_sensors, vec![5]);

        // The env view is unchanged after the save.
        assert_eq!(store.load_settings().hub_address, "env.hub");
        Ok(())
    });
}

#[test]
fn explicit_changes_are_saved_despite_env() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", FILE).unwrap();
        jail.set_env("PLANTWATCH_HUB_ADDRESS", "env.hub");
        jail.set_env("PLANTWATCH_REFRESH_INTERVAL", "600");
        let store = FileSettingsStore::new(jail.directory().join("config.toml"));

        let mut settings = store.load_settings();
        settings.hub_address = "new.hub".into();
        settings.refresh_interval_secs = 1200;
        store.save_settings(&settings).unwrap();

        let on_disk = load_file(store.path()).unwrap();
        assert_eq!(on_disk.hub_address, "new.hub");
        assert_eq!(on_disk.refresh_interval, 1200);
        Ok(())
    });
}
