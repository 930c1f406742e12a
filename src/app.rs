pub const APP_NAME: &str = env!("APP_NAME");
pub const APP_VERSION: &str = env!("APP_VERSION");
pub const APP_ID: &str = env!("APP_ID");

pub const SUPERVISOR_BINARY: &str = "pm2";
pub const PREFERENCES_FILE: &str = "preferences.json";
