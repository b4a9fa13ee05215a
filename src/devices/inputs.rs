// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Levels of the panel's digital outputs, as seen by the gateway.
///
/// `true` means the line is asserted (the panel pulls its output low).
///
/// ```text
/// Output  Panel function
/// 1       Full Armed
/// 2       Part Armed
/// 3       Exiting
/// 4       Entry
/// 5       Alarm
/// 6       Arm Failed
/// 7       Fault Present
/// 8       Area Ready
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitalInputs {
    pub full_armed: bool,
    pub part_armed: bool,
    pub exiting: bool,
    pub entry: bool,
    pub triggered: bool,
    pub arm_failed: bool,
    pub fault_present: bool,
    pub area_ready: bool,
}

impl DigitalInputs {
    /// Levels assumed before the first sample: everything released, area ready.
    pub fn power_on() -> Self {
        Self {
            area_ready: true,
            ..Self::default()
        }
    }
}

/// Source of digital-input samples, polled once per tick.
pub trait InputSource: Send {
    fn sample(&mut self) -> DigitalInputs;
}

/// Input levels written by another task (e.g. an MQTT subscriber) and sampled by the gateway.
#[derive(Debug, Clone)]
pub struct SharedInputs {
    inner: Arc<Mutex<DigitalInputs>>,
}

impl SharedInputs {
    pub fn new(initial: DigitalInputs) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Replace the current levels.
    pub fn set(&self, inputs: DigitalInputs) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = inputs,
            Err(poisoned) => *poisoned.into_inner() = inputs,
        }
    }

    /// Modify the current levels in place.
    pub fn update(&self, f: impl FnOnce(&mut DigitalInputs)) {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn get(&self) -> DigitalInputs {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for SharedInputs {
    fn default() -> Self {
        Self::new(DigitalInputs::power_on())
    }
}

impl InputSource for SharedInputs {
    fn sample(&mut self) -> DigitalInputs {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_levels() {
        let inputs = DigitalInputs::power_on();
        assert!(inputs.area_ready);
        assert!(!inputs.full_armed);
        assert!(!inputs.triggered);
    }

    #[test]
    fn test_shared_inputs_visible_to_clone() {
        let writer = SharedInputs::default();
        let mut reader = writer.clone();
        writer.update(|i| i.full_armed = true);
        assert!(reader.sample().full_armed);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let inputs: DigitalInputs =
            serde_json::from_str(r#"{"full_armed":true,"area_ready":true}"#).unwrap();
        assert!(inputs.full_armed);
        assert!(inputs.area_ready);
        assert!(!inputs.entry);
    }
}
