// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use crate::devices::{
    alarm::{AlarmFlags, AlarmState},
    zone::ZoneFlags,
};
use crate::task::Task;

/// All events that can be emitted by the gateway.
///
/// Users subscribe via `gateway.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<GatewayEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Zone flags updated, either from a screen update line or a bulk zone sync
    ZoneChanged { zone: u16, flags: ZoneFlags },
    /// Alarm state or flags changed; fired at most once per tick
    AlarmStateChanged { state: AlarmState, flags: AlarmFlags },
    /// The zone that caused the current alarm
    AlarmTriggered { zone: u16 },
    /// Operator-facing free text
    Notification(String),
    /// A task returned to idle
    TaskFinished { task: Task, success: bool },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<GatewayEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<GatewayEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel_delivers_to_every_receiver() {
        let (tx, mut rx1) = event_channel(8);
        let mut rx2 = tx.subscribe();
        tx.send(GatewayEvent::AlarmTriggered { zone: 4 }).unwrap();

        assert_eq!(rx1.try_recv().unwrap(), GatewayEvent::AlarmTriggered { zone: 4 });
        assert_eq!(rx2.try_recv().unwrap(), GatewayEvent::AlarmTriggered { zone: 4 });
    }
}
