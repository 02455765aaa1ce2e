use chrono::DateTime;
use chrono::Utc;
use etcd_settings::with_request;
use etcd_settings::ConfigManager;
use etcd_settings::ConfigValue;
use etcd_settings::Error;
use etcd_settings::MemoryStore;
use etcd_settings::SettingsProxy;
use etcd_settings::TaskLocalRequestContext;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::json;

use crate::common::header;
use crate::common::seeded_store;
use crate::common::static_defaults;
use crate::common::ENV;
use crate::common::PREFIX;

async fn proxy() -> SettingsProxy<MemoryStore> {
    let manager = ConfigManager::builder(seeded_store().await)
        .prefix(PREFIX)
        .build()
        .unwrap();
    SettingsProxy::with_manager(ENV, manager, static_defaults(), TaskLocalRequestContext)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_request_header_selects_override_sets() {
    let proxy = proxy().await;
    let mut headers = HeaderMap::new();
    headers.insert("x-dynamic-setting", HeaderValue::from_static("beta slow.clients"));
    let request = proxy.request_from_headers(&headers);

    let (timeout, flags) = with_request(request, async {
        (
            proxy.resolve_as::<u64>("API_TIMEOUT").unwrap(),
            proxy.resolve("FEATURE_FLAGS").unwrap(),
        )
    })
    .await;

    assert_eq!(120, timeout);
    assert_eq!(ConfigValue::from(json!({"search": true, "checkout": true})), flags);
}

#[tokio::test]
async fn test_outside_request_uses_env_defaults() {
    let proxy = proxy().await;
    assert_eq!(30u64, proxy.resolve_as::<u64>("API_TIMEOUT").unwrap());
    assert_eq!(
        ConfigValue::from(json!({"search": true})),
        proxy.resolve("FEATURE_FLAGS").unwrap()
    );
}

#[tokio::test]
async fn test_concurrent_requests_see_their_own_sets() {
    let proxy = proxy().await;

    let beta = with_request(header("beta"), async { proxy.resolve_as::<u64>("API_TIMEOUT") });
    let slow = with_request(header("slow.clients"), async { proxy.resolve_as::<u64>("API_TIMEOUT") });
    let (beta, slow) = tokio::join!(beta, slow);

    assert_eq!(30, beta.unwrap());
    assert_eq!(120, slow.unwrap());
}

#[tokio::test]
async fn test_typed_resolution() {
    let proxy = proxy().await;

    let released: DateTime<Utc> = proxy.resolve_as("RELEASED_AT").unwrap();
    assert_eq!("2024-03-01T12:00:00+00:00", released.to_rfc3339());
    assert_eq!("checkout", proxy.resolve_as::<String>("SERVICE_NAME").unwrap());
    assert!(!proxy.resolve_as::<bool>("MAINTENANCE").unwrap());

    assert!(matches!(
        proxy.resolve_as::<bool>("SERVICE_NAME"),
        Err(Error::Conversion { .. })
    ));
    assert!(matches!(proxy.resolve("UNKNOWN"), Err(Error::NotFound(_))));
}
