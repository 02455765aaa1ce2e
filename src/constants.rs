// -
// Store layout

/// Directory under the prefix holding the named override sets
pub(crate) const EXTENSIONS_DIR: &str = "extensions";

/// Path prefix of the etcd v2 keys API
pub(crate) const ETCD_KEYS_API: &str = "v2/keys";

/// Response header carrying the store's current index
pub(crate) const ETCD_INDEX_HEADER: &str = "X-Etcd-Index";

/// etcd v2 error codes
pub(crate) const ETCD_ERROR_KEY_NOT_FOUND: u32 = 100;
pub(crate) const ETCD_ERROR_EVENT_INDEX_CLEARED: u32 = 401;

/// Events kept for watch replay, matching etcd's v2 event history
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

// -
// Value wire format

/// Reserved tag marking a typed value object
pub const CUSTOM_TYPE_KEY: &str = "_custom_type";
pub const CUSTOM_TYPE_VALUE_KEY: &str = "value";
pub const CUSTOM_TYPE_DATETIME: &str = "datetime";

// -
// Config

/// Header naming the override sets of a request
pub(crate) const DEFAULT_REQUEST_HEADER: &str = "x-dynamic-setting";

/// Environment variable prefix for crate configuration
pub(crate) const CONFIG_ENV_PREFIX: &str = "ETCD_SETTINGS";
