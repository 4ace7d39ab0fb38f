//! Built-in defaults for the repository and install pipeline

pub const APP_DIR_NAME: &str = "appset";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_BASE_URL: &str = "https://apps.grapheneos.org/";
pub const DEFAULT_PUBLIC_KEY: &str = "RWQtZwEu1br1lMh911L3yPOs97cQb9LOks/ALBbqGl21ul695ocWR/ir";
pub const DEFAULT_CHANNEL: &str = "stable";

pub const MANIFEST_FILE: &str = "metadata.json";
pub const SIGNATURE_FILE: &str = "metadata.json.0.sig";

pub const DEFAULT_MAX_USER_ACTIONS: u32 = 5;
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const ENV_BASE_URL: &str = "APPSET_BASE_URL";
pub const ENV_PUBLIC_KEY: &str = "APPSET_PUBLIC_KEY";
pub const ENV_CAPABILITY: &str = "APPSET_CAPABILITY";
pub const ENV_OUTPUT: &str = "APPSET_OUTPUT";
pub const ENV_DEVICE_ROOT: &str = "APPSET_DEVICE_ROOT";
