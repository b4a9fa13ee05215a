// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge
//
//! # texecom-bridge
//!
//! Drives a Texecom intruder alarm panel through its RS-232 virtual keypad.
//!
//! The panel speaks two protocols on the same line. In screen emulation it
//! prints what a keypad would show and accepts keypresses; this is how the
//! gateway arms and disarms. In query/response mode, entered with the UDL
//! code, it answers checksummed queries; this is how the gateway reads zone
//! state in bulk and keeps the panel clock right.
//!
//! Alarm state itself comes from the panel's digital outputs, sampled through
//! an [`InputSource`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use texecom_bridge::{ArmType, Gateway, GatewayConfig, SharedInputs, SystemClock};
//! use texecom_bridge::transport::serial;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::builder()
//!         .first_zone(1)
//!         .zone_count(8)
//!         .udl_code("123456")
//!         .build()?;
//!
//!     let (transport, _reader, _writer) = serial::spawn_bridge(serial::open("/dev/ttyUSB0")?);
//!     let inputs = SharedInputs::default();
//!     let mut gateway = Gateway::new(
//!         config,
//!         Box::new(transport),
//!         Box::new(SystemClock),
//!         Box::new(inputs.clone()),
//!     );
//!
//!     let mut events = gateway.subscribe();
//!     gateway.request_disarm("1234")?;
//!
//!     loop {
//!         gateway.tick()?;
//!         while let Ok(event) = events.try_recv() {
//!             println!("Event: {:?}", event);
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!     }
//! }
//! ```

pub mod classifier;
pub mod clock;
pub mod codec;
pub mod config;
pub mod constants;
pub mod devices;
pub mod error;
pub mod event;
pub mod framer;
pub mod gateway;
pub mod mqtt;
pub mod negotiator;
pub mod protocol;
pub mod settings;
pub mod task;
pub mod transport;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ArmType, GatewayConfig, GatewayConfigBuilder};
pub use devices::alarm::{AlarmFlags, AlarmState};
pub use devices::inputs::{DigitalInputs, InputSource, SharedInputs};
pub use devices::zone::{Zone, ZoneFlags, ZoneTable};
pub use error::{BridgeError, Result};
pub use event::{EventReceiver, GatewayEvent};
pub use gateway::Gateway;
pub use mqtt::{MqttAlarmState, MqttZoneState};
pub use negotiator::ProtocolMode;
pub use settings::{FileSettingsStore, Settings, SettingsStore};
pub use task::{Task, TaskStep};
pub use transport::{ChannelTransport, PanelLink, Transport};
