// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::fmt;

use bitflags::bitflags;
use tracing::{error, info};

use super::inputs::DigitalInputs;

/// Overall alarm state as reported by the panel's digital outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmState {
    Disarmed,
    ArmedHome,
    ArmedAway,
    /// Entry timer running
    Entry,
    /// Exit timer running
    Exit,
    Triggered,
}

impl AlarmState {
    /// Home-automation state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::Entry => "pending",
            Self::Exit => "arming",
            Self::Triggered => "triggered",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Alarm flags, independent of `AlarmState`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AlarmFlags: u8 {
        /// Area ready to arm
        const READY      = 1 << 0;
        /// Panel reports a fault
        const FAULT      = 1 << 1;
        /// Last arm attempt failed
        const ARM_FAILED = 1 << 2;
    }
}

pub const MSG_FAULT_PRESENT: &str = "Alarm is reporting a fault";
pub const MSG_FAULT_RESOLVED: &str = "Alarm fault resolved";
pub const MSG_ARM_FAILED: &str = "Alarm failed to arm";

/// What happened during one pass over the digital inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputPass {
    /// At least one line changed (or this is the first pass); publish state once
    pub publish: bool,
    /// Triggered was entered during this pass
    pub entered_triggered: bool,
    /// Latched zone to report as the trigger cause
    pub triggered_zone: Option<u16>,
    /// Operator-facing messages
    pub notifications: Vec<&'static str>,
}

/// Alarm state, flags and the triggered-zone latch.
#[derive(Debug, Clone)]
pub struct AlarmModel {
    state: AlarmState,
    flags: AlarmFlags,
    triggered_zone: Option<u16>,
    last_inputs: DigitalInputs,
    first_pass: bool,
}

impl Default for AlarmModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmModel {
    pub fn new() -> Self {
        Self {
            state: AlarmState::Disarmed,
            flags: AlarmFlags::READY,
            triggered_zone: None,
            last_inputs: DigitalInputs::power_on(),
            first_pass: true,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn flags(&self) -> AlarmFlags {
        self.flags
    }

    pub fn is_ready(&self) -> bool {
        self.flags.contains(AlarmFlags::READY)
    }

    pub fn triggered_zone(&self) -> Option<u16> {
        self.triggered_zone
    }

    /// Release the triggered-zone latch.
    pub fn clear_triggered_zone(&mut self) {
        self.triggered_zone = None;
    }

    /// Record a zone that went active; latches it while in Entry or Triggered.
    ///
    /// Returns the zone if a trigger notification is due.
    pub fn observe_zone_activity(&mut self, zone: u16) -> Option<u16> {
        if matches!(self.state, AlarmState::Entry | AlarmState::Triggered)
            && self.triggered_zone.is_none()
        {
            self.triggered_zone = Some(zone);
            info!("Triggered zone latched: {zone}");
            if self.state == AlarmState::Triggered {
                return Some(zone);
            }
        }
        None
    }

    fn set_state(&mut self, state: AlarmState, pass: &mut InputPass) {
        if self.state == state {
            return;
        }
        if state == AlarmState::Disarmed {
            self.triggered_zone = None;
        }
        if state == AlarmState::Triggered {
            pass.entered_triggered = true;
            pass.triggered_zone = self.triggered_zone;
        }
        info!("Alarm state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Apply one sample of the digital inputs, acting on edges only.
    pub fn apply_inputs(&mut self, inputs: DigitalInputs) -> InputPass {
        let mut pass = InputPass {
            publish: self.first_pass,
            ..InputPass::default()
        };
        self.first_pass = false;
        let last = self.last_inputs;

        if inputs.full_armed != last.full_armed {
            pass.publish = true;
            let next = if inputs.full_armed { AlarmState::ArmedAway } else { AlarmState::Disarmed };
            self.set_state(next, &mut pass);
        }

        if inputs.part_armed != last.part_armed {
            pass.publish = true;
            let next = if inputs.part_armed { AlarmState::ArmedHome } else { AlarmState::Disarmed };
            self.set_state(next, &mut pass);
        }

        if inputs.entry != last.entry {
            pass.publish = true;
            if inputs.entry {
                self.set_state(AlarmState::Entry, &mut pass);
            }
        }

        if inputs.exiting != last.exiting {
            pass.publish = true;
            if inputs.exiting {
                self.set_state(AlarmState::Exit, &mut pass);
            }
        }

        if inputs.triggered != last.triggered {
            pass.publish = true;
            if inputs.triggered {
                self.set_state(AlarmState::Triggered, &mut pass);
            }
        }

        if inputs.area_ready != last.area_ready {
            pass.publish = true;
            self.flags.set(AlarmFlags::READY, inputs.area_ready);
        }

        if inputs.fault_present != last.fault_present {
            pass.publish = true;
            self.flags.set(AlarmFlags::FAULT, inputs.fault_present);
            if inputs.fault_present {
                error!("{MSG_FAULT_PRESENT}");
                pass.notifications.push(MSG_FAULT_PRESENT);
            } else {
                info!("{MSG_FAULT_RESOLVED}");
                pass.notifications.push(MSG_FAULT_RESOLVED);
            }
        }

        if inputs.arm_failed != last.arm_failed {
            pass.publish = true;
            self.flags.set(AlarmFlags::ARM_FAILED, inputs.arm_failed);
            if inputs.arm_failed {
                error!("{MSG_ARM_FAILED}");
                pass.notifications.push(MSG_ARM_FAILED);
            }
        }

        self.last_inputs = inputs;
        pass
    }
}
