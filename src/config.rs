use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    // Local HTTP surface for the display client
    pub bind_address: String,
    pub port: u16,

    // Realtime channel to the companion scanner
    pub scanner_ws_url: String,
    pub use_realtime: bool,
    pub reconnect_delay_secs: u64,

    // Fallback listing API
    pub listing_base_url: String,
    pub app_id: u32,
    pub http_timeout_secs: u64,

    // Map code that means "round ended / not joinable"
    pub unavailable_map: String,

    pub settings_path: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8001,
            scanner_ws_url: "ws://localhost:8765".to_string(),
            use_realtime: true,
            reconnect_delay_secs: 5,
            listing_base_url: "https://api.steampowered.com".to_string(),
            app_id: 730,
            http_timeout_secs: 10,
            unavailable_map: "graphics_settings".to_string(),
            settings_path: "gswatch_settings.json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),

            scanner_ws_url: env::var("SCANNER_WS_URL").unwrap_or(defaults.scanner_ws_url),

            use_realtime: env::var("USE_REALTIME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.use_realtime),

            reconnect_delay_secs: env::var("RECONNECT_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reconnect_delay_secs),

            listing_base_url: env::var("LISTING_BASE_URL").unwrap_or(defaults.listing_base_url),

            app_id: env::var("APP_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.app_id),

            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),

            unavailable_map: env::var("UNAVAILABLE_MAP").unwrap_or(defaults.unavailable_map),

            settings_path: env::var("SETTINGS_PATH").unwrap_or(defaults.settings_path),

            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scanner_contract() {
        let config = Config::default();
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.unavailable_map, "graphics_settings");
        assert_eq!(config.bind(), "127.0.0.1:8001");
    }
}
