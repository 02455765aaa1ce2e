use etcd_settings::get_overwrites;
use etcd_settings::ConfigManager;
use etcd_settings::ConfigValue;
use etcd_settings::DevParams;
use etcd_settings::EtcdSettingsConfig;
use etcd_settings::NoRequestContext;
use etcd_settings::SettingsProxy;
use serde_json::json;

use crate::common::map;
use crate::common::seeded_store;
use crate::common::static_defaults;
use crate::common::ENV;
use crate::common::PREFIX;

#[tokio::test]
async fn test_initial_load_reads_both_trees() {
    let store = seeded_store().await;
    let manager = ConfigManager::builder(store.clone()).prefix(PREFIX).build().unwrap();

    let proxy = SettingsProxy::with_manager(ENV, manager, static_defaults(), NoRequestContext)
        .await
        .unwrap();

    let env_defaults = proxy.env_defaults();
    assert_eq!(4, env_defaults.len());
    assert_eq!(Some(&ConfigValue::from(30)), env_defaults.get("API_TIMEOUT"));
    assert!(env_defaults.get("RELEASED_AT").unwrap().as_timestamp().is_some());

    let sets = proxy.extension_sets();
    assert_eq!(vec!["beta", "slow.clients"], sets.keys().map(String::as_str).collect::<Vec<_>>());

    // Every read moved the shared index up to the store's
    let manager = proxy.manager().unwrap();
    assert_eq!(store.current_index(), manager.cluster_index().current());
}

#[tokio::test]
async fn test_dev_params_win_over_store() {
    let store = seeded_store().await;
    let manager = ConfigManager::builder(store)
        .prefix(PREFIX)
        .dev_params(DevParams::from(map(json!({"MAINTENANCE": true}))))
        .build()
        .unwrap();

    let proxy = SettingsProxy::with_manager(ENV, manager, static_defaults(), NoRequestContext)
        .await
        .unwrap();
    assert_eq!(ConfigValue::from(true), proxy.resolve("MAINTENANCE").unwrap());
}

#[tokio::test]
async fn test_missing_environment_fails_startup() {
    let store = seeded_store().await;
    let manager = ConfigManager::builder(store).prefix(PREFIX).build().unwrap();

    let result = SettingsProxy::with_manager("qa", manager, static_defaults(), NoRequestContext).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_as_mapping_exports_uppercase_settings() {
    let store = seeded_store().await;
    let manager = ConfigManager::builder(store).prefix(PREFIX).build().unwrap();
    let proxy = SettingsProxy::with_manager(ENV, manager, static_defaults(), NoRequestContext)
        .await
        .unwrap();

    let mapping = proxy.as_mapping();
    let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
    assert_eq!(
        vec!["API_TIMEOUT", "FEATURE_FLAGS", "MAINTENANCE", "RELEASED_AT", "SERVICE_NAME"],
        keys
    );
    assert_eq!(Some(&ConfigValue::from(30)), mapping.get("API_TIMEOUT"));
}

#[tokio::test]
async fn test_store_disabled_falls_back_to_dev_params() {
    let config = EtcdSettingsConfig::default();
    let dev_params = DevParams::from(map(json!({"API_TIMEOUT": 1, "lower": 2})));

    let overwrites = get_overwrites(ENV, &dev_params, Some(&config)).await.unwrap();
    assert_eq!(map(json!({"API_TIMEOUT": 1})), overwrites);

    let proxy = SettingsProxy::from_config(&config, static_defaults(), NoRequestContext)
        .await
        .unwrap();
    assert_eq!(
        map(json!({"API_TIMEOUT": 10, "SERVICE_NAME": "checkout"})),
        proxy.as_mapping()
    );
    assert!(proxy.start_monitors().unwrap().is_empty());
}
