use std::sync::Arc;
use std::time::Duration;

use etcd_settings::register_custom_metrics;
use etcd_settings::ConfigManager;
use etcd_settings::ConfigValue;
use etcd_settings::KvStore;
use etcd_settings::MemoryStore;
use etcd_settings::NoRequestContext;
use etcd_settings::SettingsProxy;
use prometheus::Registry;
use serde_json::json;

use crate::common::header;
use crate::common::map;
use crate::common::seeded_store;
use crate::common::static_defaults;
use crate::common::wait_for_value;
use crate::common::ENV;
use crate::common::PREFIX;

async fn monitored_proxy(
    store: Arc<MemoryStore>,
    reload_signal_file: &std::path::Path,
) -> SettingsProxy<MemoryStore> {
    let manager = ConfigManager::builder(store)
        .prefix(PREFIX)
        .long_polling_timeout(Duration::from_millis(200))
        .long_polling_safety_delay(Duration::from_millis(10))
        .reload_signal_file(reload_signal_file)
        .build()
        .unwrap();
    SettingsProxy::with_manager(ENV, manager, static_defaults(), NoRequestContext)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_store_changes_reach_the_proxy() {
    let temp_dir = tempfile::tempdir().unwrap();
    let reload_file = temp_dir.path().join("reload");
    let store = seeded_store().await;
    let proxy = monitored_proxy(store.clone(), &reload_file).await;
    let monitors = proxy.start_monitors().unwrap();
    assert!(!reload_file.exists());

    store.write("/config/service/production/api/timeout", "45").await.unwrap();
    wait_for_value(&proxy, "API_TIMEOUT", None, ConfigValue::from(45)).await;
    assert!(reload_file.exists());

    // Partial update: the other keys of the set stay
    store
        .write("/config/service/extensions/beta/api/timeout", "60")
        .await
        .unwrap();
    let beta = header("beta");
    wait_for_value(&proxy, "API_TIMEOUT", Some(&beta), ConfigValue::from(60)).await;
    assert_eq!(
        Some(ConfigValue::from(json!({"search": true, "checkout": true}))),
        proxy.resolve_for("FEATURE_FLAGS", Some(&beta))
    );

    // A brand new set becomes selectable
    store
        .write("/config/service/extensions/night/maintenance", "true")
        .await
        .unwrap();
    wait_for_value(&proxy, "MAINTENANCE", Some(&header("night")), ConfigValue::from(true)).await;
    assert_eq!(Some(ConfigValue::from(false)), proxy.resolve_for("MAINTENANCE", None));

    for monitor in monitors {
        monitor.abort();
    }
}

#[tokio::test]
async fn test_invalid_value_is_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store().await;
    let proxy = monitored_proxy(store.clone(), &temp_dir.path().join("reload")).await;
    let monitors = proxy.start_monitors().unwrap();

    store
        .write("/config/service/production/maintenance", "{not json")
        .await
        .unwrap();
    store.write("/config/service/production/api/timeout", "31").await.unwrap();

    wait_for_value(&proxy, "API_TIMEOUT", None, ConfigValue::from(31)).await;
    assert_eq!(Some(ConfigValue::from(false)), proxy.resolve_for("MAINTENANCE", None));

    for monitor in monitors {
        monitor.abort();
    }
}

#[tokio::test]
async fn test_cleared_history_triggers_full_resync() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new().with_history_limit(1));
    store.write("/config/service/production/api/timeout", "30").await.unwrap();
    store.mkdir("/config/service/extensions").unwrap();
    let proxy = monitored_proxy(store.clone(), &temp_dir.path().join("reload")).await;

    // Written before the monitors start and evicted from the history
    for (key, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
        store
            .write(&format!("/config/service/production/{key}"), value)
            .await
            .unwrap();
    }

    let monitors = proxy.start_monitors().unwrap();
    wait_for_value(&proxy, "A", None, ConfigValue::from(1)).await;
    wait_for_value(&proxy, "B", None, ConfigValue::from(2)).await;
    wait_for_value(&proxy, "C", None, ConfigValue::from(3)).await;
    assert_eq!(Some(ConfigValue::from(30)), proxy.resolve_for("API_TIMEOUT", None));

    for monitor in monitors {
        monitor.abort();
    }
}

#[tokio::test]
async fn test_write_back_and_metrics() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store().await;
    let proxy = monitored_proxy(store.clone(), &temp_dir.path().join("reload")).await;
    let registry = Registry::new();
    register_custom_metrics(&registry).unwrap();
    let monitors = proxy.start_monitors().unwrap();
    let manager = proxy.manager().unwrap();

    let errors = manager
        .write_env_defaults(ENV, &map(json!({"RETRIES": 3, "lowercase": 1})))
        .await;
    assert!(errors.is_empty());
    wait_for_value(&proxy, "RETRIES", None, ConfigValue::from(3)).await;
    assert!(store.read("/config/service/production/lowercase", false).await.is_err());

    let families: Vec<String> = registry.gather().iter().map(|f| f.get_name().to_string()).collect();
    assert!(families.contains(&"watch_events_total".to_string()), "{families:?}");
    assert!(families.contains(&"cluster_index".to_string()), "{families:?}");

    for monitor in monitors {
        monitor.abort();
    }
}
