// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::time::Duration;

use chrono::NaiveTime;

use crate::constants::{
    ARM_TIMEOUT, COMMAND_TIMEOUT, DEFAULT_IDLE_SCREEN_TEXT, DISARM_TIMEOUT, FORCED_LOGOUT_GRACE,
    LOGIN_INTERVAL, MAX_LOGIN_ATTEMPTS, MAX_RETRIES, PIN_ENTRY_DELAY, PROMPT_DELAY,
    MAX_ZONE_COUNT, QUERY_SESSION_TIMEOUT, STALE_MESSAGE_TIMEOUT, TIME_TOLERANCE_SECS,
    TRIGGER_ZONE_SYNC_DELAY, ZONE_SYNC_INTERVAL,
};
use crate::error::{BridgeError, Result};

/// Arm sub-type for keypad arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmType {
    /// Full arm: confirm the first "Arm System?" prompt.
    Full,
    /// Night arm: navigate from the full-arm prompt via part-arm to night-arm.
    Night,
}

/// Configuration for a gateway instance.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Panel zone number mapped to local index 0
    pub first_zone: u8,
    /// Number of contiguous zones tracked
    pub zone_count: u8,
    /// Idle screen banner (without the leading quote)
    pub idle_screen_text: String,
    /// Names for user indices reported by login lines; used only for logging
    pub user_names: Vec<String>,
    /// Six character UDL code used for the query/response login
    pub udl_code: String,
    /// Suppress the final confirmation keypress of arm/disarm
    pub debug: bool,
    pub arm_timeout: Duration,
    pub disarm_timeout: Duration,
    /// Inter-attempt timeout for arm-state/screen requests
    pub command_timeout: Duration,
    /// Attempts allowed for arm-state/screen requests
    pub max_retries: u8,
    pub pin_entry_delay: Duration,
    /// Delay before checking the screen for an expected prompt
    pub prompt_delay: Duration,
    pub stale_message_timeout: Duration,
    /// Cadence of repeated login frames
    pub login_interval: Duration,
    pub max_login_attempts: u32,
    /// Longest time the panel may stay in query/response mode
    pub query_session_timeout: Duration,
    /// Extra time allowed for a safety logout before the mode is forced back
    pub forced_logout_grace: Duration,
    pub zone_sync_interval: Duration,
    pub trigger_zone_sync_delay: Duration,
    /// Local time of day for the daily clock check
    pub time_sync_at: NaiveTime,
    /// Largest drift in seconds still considered in sync (inclusive)
    pub time_tolerance_secs: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            first_zone: 1,
            zone_count: 8,
            idle_screen_text: DEFAULT_IDLE_SCREEN_TEXT.to_string(),
            user_names: Vec::new(),
            udl_code: String::new(),
            debug: false,
            arm_timeout: ARM_TIMEOUT,
            disarm_timeout: DISARM_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
            max_retries: MAX_RETRIES,
            pin_entry_delay: PIN_ENTRY_DELAY,
            prompt_delay: PROMPT_DELAY,
            stale_message_timeout: STALE_MESSAGE_TIMEOUT,
            login_interval: LOGIN_INTERVAL,
            max_login_attempts: MAX_LOGIN_ATTEMPTS,
            query_session_timeout: QUERY_SESSION_TIMEOUT,
            forced_logout_grace: FORCED_LOGOUT_GRACE,
            zone_sync_interval: ZONE_SYNC_INTERVAL,
            trigger_zone_sync_delay: TRIGGER_ZONE_SYNC_DELAY,
            time_sync_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
            time_tolerance_secs: TIME_TOLERANCE_SECS,
        }
    }
}

impl GatewayConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Name for a user index, falling back to the index itself.
    pub fn user_name(&self, index: u8) -> String {
        self.user_names
            .get(usize::from(index))
            .cloned()
            .unwrap_or_else(|| format!("user {index}"))
    }
}

/// Builder for `GatewayConfig`.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn first_zone(mut self, zone: u8) -> Self {
        self.config.first_zone = zone;
        self
    }

    pub fn zone_count(mut self, count: u8) -> Self {
        self.config.zone_count = count;
        self
    }

    pub fn idle_screen_text(mut self, text: impl Into<String>) -> Self {
        self.config.idle_screen_text = text.into();
        self
    }

    pub fn user_names(mut self, names: Vec<String>) -> Self {
        self.config.user_names = names;
        self
    }

    pub fn udl_code(mut self, code: impl Into<String>) -> Self {
        self.config.udl_code = code.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn arm_timeout(mut self, timeout: Duration) -> Self {
        self.config.arm_timeout = timeout;
        self
    }

    pub fn disarm_timeout(mut self, timeout: Duration) -> Self {
        self.config.disarm_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u8) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn pin_entry_delay(mut self, delay: Duration) -> Self {
        self.config.pin_entry_delay = delay;
        self
    }

    pub fn prompt_delay(mut self, delay: Duration) -> Self {
        self.config.prompt_delay = delay;
        self
    }

    pub fn stale_message_timeout(mut self, timeout: Duration) -> Self {
        self.config.stale_message_timeout = timeout;
        self
    }

    pub fn login_interval(mut self, interval: Duration) -> Self {
        self.config.login_interval = interval;
        self
    }

    pub fn max_login_attempts(mut self, attempts: u32) -> Self {
        self.config.max_login_attempts = attempts;
        self
    }

    pub fn query_session_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_session_timeout = timeout;
        self
    }

    pub fn forced_logout_grace(mut self, grace: Duration) -> Self {
        self.config.forced_logout_grace = grace;
        self
    }

    pub fn zone_sync_interval(mut self, interval: Duration) -> Self {
        self.config.zone_sync_interval = interval;
        self
    }

    pub fn trigger_zone_sync_delay(mut self, delay: Duration) -> Self {
        self.config.trigger_zone_sync_delay = delay;
        self
    }

    pub fn time_sync_at(mut self, at: NaiveTime) -> Self {
        self.config.time_sync_at = at;
        self
    }

    pub fn time_tolerance_secs(mut self, secs: i64) -> Self {
        self.config.time_tolerance_secs = secs;
        self
    }

    /// Finish the config, rejecting a zone range the panel's reply can't carry.
    pub fn build(self) -> Result<GatewayConfig> {
        let count = self.config.zone_count;
        if count == 0 || count > MAX_ZONE_COUNT {
            return Err(BridgeError::InvalidZoneCount { count, max: MAX_ZONE_COUNT });
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::builder().build().unwrap();
        assert_eq!(config.first_zone, 1);
        assert_eq!(config.zone_count, 8);
        assert_eq!(config.arm_timeout, Duration::from_secs(15));
        assert_eq!(config.disarm_timeout, Duration::from_secs(10));
        assert_eq!(config.query_session_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.time_sync_at, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert!(!config.debug);
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::builder()
            .first_zone(8)
            .zone_count(11)
            .udl_code("123456")
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.first_zone, 8);
        assert_eq!(config.zone_count, 11);
        assert_eq!(config.udl_code, "123456");
        assert!(config.debug);
    }

    #[test]
    fn test_zone_count_bounds() {
        assert!(GatewayConfig::builder().zone_count(MAX_ZONE_COUNT).build().is_ok());
        assert!(matches!(
            GatewayConfig::builder().zone_count(MAX_ZONE_COUNT + 1).build(),
            Err(BridgeError::InvalidZoneCount { count: 49, max: 48 })
        ));
        assert!(GatewayConfig::builder().zone_count(0).build().is_err());
    }

    #[test]
    fn test_user_name_fallback() {
        let config = GatewayConfig::builder()
            .user_names(vec!["root".to_string(), "Alice".to_string()])
            .build()
            .unwrap();
        assert_eq!(config.user_name(1), "Alice");
        assert_eq!(config.user_name(5), "user 5");
    }
}
