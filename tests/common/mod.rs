use std::sync::Arc;
use std::time::Duration;

use etcd_settings::ConfigMap;
use etcd_settings::ConfigValue;
use etcd_settings::KvStore;
use etcd_settings::MemoryStore;
use etcd_settings::RequestMetadata;
use etcd_settings::SettingsProxy;
use serde_json::json;

pub const PREFIX: &str = "/config/service";
pub const ENV: &str = "production";

pub fn map(value: serde_json::Value) -> ConfigMap {
    match ConfigValue::from(value) {
        ConfigValue::Object(map) => map,
        other => panic!("not an object: {other:?}"),
    }
}

/// Store seeded through raw keys, the way an operator would with etcdctl
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let raw = [
        ("/config/service/production/api/timeout", "30"),
        ("/config/service/production/feature/flags", r#"{"search": true}"#),
        ("/config/service/production/maintenance", "false"),
        (
            "/config/service/production/released/at",
            r#"{"_custom_type": "datetime", "value": "2024-03-01T12:00:00+00:00"}"#,
        ),
        ("/config/service/staging/api/timeout", "5"),
        ("/config/service/extensions/beta/feature/flags", r#"{"checkout": true}"#),
        ("/config/service/extensions/slow.clients/api/timeout", "120"),
    ];
    for (key, value) in raw {
        store.write(key, value).await.unwrap();
    }
    store
}

pub fn static_defaults() -> ConfigMap {
    map(json!({
        "API_TIMEOUT": 10,
        "SERVICE_NAME": "checkout",
        "internal_helper": "not a setting"
    }))
}

pub fn header(value: &str) -> RequestMetadata {
    RequestMetadata::from_header_value(value)
}

/// Polls until `identifier` resolves to `expected` for `request`.
pub async fn wait_for_value(
    proxy: &SettingsProxy<MemoryStore>,
    identifier: &str,
    request: Option<&RequestMetadata>,
    expected: ConfigValue,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = proxy.resolve_for(identifier, request);
        if current.as_ref() == Some(&expected) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{identifier} never became {expected:?}, last {current:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
