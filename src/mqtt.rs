// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

//! JSON payloads carried on the MQTT topics.
//!
//! Flags are sent as 0/1 for compatibility with existing automations.

use serde::{Deserialize, Serialize};

use crate::devices::alarm::{AlarmFlags, AlarmState};
use crate::devices::zone::ZoneFlags;

/// Retained on `<prefix>/alarm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttAlarmState {
    pub state: String,
    pub ready: u8,
    pub fault: u8,
    pub arm_failed: u8,
}

impl MqttAlarmState {
    pub fn new(state: AlarmState, flags: AlarmFlags) -> Self {
        Self {
            state: state.as_str().to_string(),
            ready: u8::from(flags.contains(AlarmFlags::READY)),
            fault: u8::from(flags.contains(AlarmFlags::FAULT)),
            arm_failed: u8::from(flags.contains(AlarmFlags::ARM_FAILED)),
        }
    }
}

/// Retained on `<prefix>/zone/NNN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttZoneState {
    pub active: u8,
    pub tamper: u8,
    pub fault: u8,
    pub alarmed: u8,
}

impl From<ZoneFlags> for MqttZoneState {
    fn from(flags: ZoneFlags) -> Self {
        Self {
            active: u8::from(flags.contains(ZoneFlags::ACTIVE)),
            tamper: u8::from(flags.contains(ZoneFlags::TAMPER)),
            fault: u8::from(flags.contains(ZoneFlags::FAULT)),
            alarmed: u8::from(flags.contains(ZoneFlags::ALARMED)),
        }
    }
}

/// Whether the state echoed back by the hub on `<prefix>/alarm/state`
/// agrees with the panel.
pub fn state_confirmed(reported: &str, state: AlarmState) -> bool {
    reported.trim() == state.as_str()
}
