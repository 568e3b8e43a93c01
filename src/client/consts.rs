use std::time::Duration;

pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CLIENT_VERSION_KEY: &str = "rtvi_client_version";

pub const RTVI_BASE_URL: &str = "RTVI_BASE_URL";
pub const RTVI_CONNECT_ENDPOINT: &str = "RTVI_CONNECT_ENDPOINT";
pub const RTVI_ACTION_ENDPOINT: &str = "RTVI_ACTION_ENDPOINT";
pub const RTVI_API_KEY: &str = "RTVI_API_KEY";
pub const RTVI_ENABLE_MIC: &str = "RTVI_ENABLE_MIC";
pub const RTVI_ENABLE_CAM: &str = "RTVI_ENABLE_CAM";
pub const RTVI_RESPONSE_TIMEOUT_SECS: &str = "RTVI_RESPONSE_TIMEOUT_SECS";

pub const DEFAULT_CONNECT_ENDPOINT: &str = "/connect";
pub const DEFAULT_ACTION_ENDPOINT: &str = "/action";
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(1);

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";
pub const CONNECTION_HEADER: &str = "Connection";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
