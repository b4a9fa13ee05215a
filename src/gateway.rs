// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

//! The gateway: one owned context holding everything the bridge knows about
//! the panel, driven by repeated calls to [`Gateway::tick`].
//!
//! A tick never blocks. It reads whatever bytes are already buffered, handles
//! at most one complete message, types the next digit of a pending user code,
//! fires due timers, schedules background syncs and samples the digital
//! inputs. Everything the outside world needs to know goes out as a
//! [`GatewayEvent`].

use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ScreenMessage};
use crate::clock::Clock;
use crate::codec::{decode_time, time_in_sync, zone_low_bytes};
use crate::config::{ArmType, GatewayConfig};
use crate::constants::{REPLY_ERROR, REPLY_OK, TIME_REPLY_LEN, UDL_CODE_LEN, ZONE_REPLY_STRIDE};
use crate::devices::alarm::{AlarmFlags, AlarmModel, AlarmState};
use crate::devices::inputs::InputSource;
use crate::devices::zone::{ZoneFlags, ZoneTable};
use crate::error::{BridgeError, Result};
use crate::event::{event_channel, EventReceiver, EventSender, GatewayEvent};
use crate::framer::{Frame, FrameEnd, Framer};
use crate::negotiator::ProtocolMode;
use crate::task::{Output, StepContext, StepResult, Task, TaskMachine, TaskStep};
use crate::transport::Transport;

/// What a received message asks of the task machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reaction {
    Advance(StepResult),
    Incomplete,
    WelcomeBack,
    Nothing,
}

fn context<'a>(
    config: &'a GatewayConfig,
    alarm: &AlarmModel,
    now: Instant,
    local_now: NaiveDateTime,
) -> StepContext<'a> {
    StepContext {
        now,
        local_now,
        alarm_state: alarm.state(),
        config,
    }
}

/// Render a panel line for the log: text if printable, hex otherwise.
fn describe(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
    }
}

/// A virtual keypad attached to one panel.
///
/// # Example
///
/// ```no_run
/// use texecom_bridge::{ArmType, Gateway, GatewayConfig, SharedInputs, SystemClock};
/// use texecom_bridge::transport::serial;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = GatewayConfig::builder().first_zone(1).zone_count(8).build()?;
///     let port = serial::open("/dev/ttyUSB0")?;
///     let (transport, _reader, _writer) = serial::spawn_bridge(port);
///
///     let mut gateway = Gateway::new(
///         config,
///         Box::new(transport),
///         Box::new(SystemClock),
///         Box::new(SharedInputs::default()),
///     );
///     let mut events = gateway.subscribe();
///
///     gateway.request_arm("1234", ArmType::Full)?;
///     loop {
///         gateway.tick()?;
///         while let Ok(event) = events.try_recv() {
///             println!("Event: {event:?}");
///         }
///         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
///     }
/// }
/// ```
pub struct Gateway {
    config: GatewayConfig,
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    inputs: Box<dyn InputSource>,
    framer: Framer,
    classifier: Classifier,
    machine: TaskMachine,
    alarm: AlarmModel,
    zones: ZoneTable,
    event_tx: EventSender,
    next_zone_sync: Instant,
    trigger_sync_at: Option<Instant>,
    last_time_sync: Option<NaiveDate>,
    pending_zone_sync: bool,
    pending_time_sync: bool,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
        inputs: Box<dyn InputSource>,
    ) -> Self {
        let (event_tx, _event_rx) = event_channel(256);
        let now = clock.now();
        let local = clock.local_now();
        // A daily sync time already passed today waits for tomorrow
        let last_time_sync = (local.time() >= config.time_sync_at).then(|| local.date());

        info!(
            "Gateway ready: zones {}..{}, debug {}",
            config.first_zone,
            u16::from(config.first_zone) + u16::from(config.zone_count),
            config.debug
        );

        Self {
            framer: Framer::new(config.stale_message_timeout),
            classifier: Classifier::new(&config.idle_screen_text),
            machine: TaskMachine::new(),
            alarm: AlarmModel::new(),
            zones: ZoneTable::new(config.first_zone, config.zone_count),
            next_zone_sync: now + config.zone_sync_interval,
            trigger_sync_at: None,
            last_time_sync,
            pending_zone_sync: false,
            pending_time_sync: false,
            event_tx,
            config,
            transport,
            clock,
            inputs,
        }
    }

    /// Subscribe to gateway events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: GatewayEvent) {
        let _ = self.event_tx.send(event);
    }

    // -----------------------------------------------------------------------
    // Command surface
    // -----------------------------------------------------------------------

    pub fn request_arm(&mut self, code: &str, arm_type: ArmType) -> Result<()> {
        let (now, local) = (self.clock.now(), self.clock.local_now());
        let ctx = context(&self.config, &self.alarm, now, local);
        self.machine.request_arm(code, arm_type, &ctx)?;
        self.flush()
    }

    pub fn request_disarm(&mut self, code: &str) -> Result<()> {
        let (now, local) = (self.clock.now(), self.clock.local_now());
        let ctx = context(&self.config, &self.alarm, now, local);
        self.machine.request_disarm(code, &ctx)?;
        self.flush()
    }

    pub fn request_time_sync(&mut self) -> Result<()> {
        self.request_query(Task::TimeSync)
    }

    pub fn request_zone_sync(&mut self) -> Result<()> {
        self.request_query(Task::ZoneSync)
    }

    fn request_query(&mut self, task: Task) -> Result<()> {
        let (now, local) = (self.clock.now(), self.clock.local_now());
        let ctx = context(&self.config, &self.alarm, now, local);
        self.machine.request_query(task, &ctx)?;
        self.flush()
    }

    /// Set the six character UDL code used to log in for queries.
    pub fn set_udl_code(&mut self, code: &str) -> Result<()> {
        if code.len() != UDL_CODE_LEN {
            return Err(BridgeError::InvalidUdlCode);
        }
        self.config.udl_code = code.to_string();
        info!("UDL code updated");
        Ok(())
    }

    /// In debug mode the final arm/disarm confirmation keypress is not sent.
    pub fn set_debug(&mut self, enabled: bool) {
        if self.config.debug != enabled {
            info!("Debug mode {}", if enabled { "enabled" } else { "disabled" });
        }
        self.config.debug = enabled;
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.alarm.is_ready()
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn alarm_flags(&self) -> AlarmFlags {
        self.alarm.flags()
    }

    pub fn triggered_zone(&self) -> Option<u16> {
        self.alarm.triggered_zone()
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub fn task(&self) -> Task {
        self.machine.task()
    }

    pub fn step(&self) -> TaskStep {
        self.machine.step()
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.machine.protocol_mode()
    }

    pub fn has_pending_code(&self) -> bool {
        self.machine.has_pending_code()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Run one pass of the gateway loop.
    ///
    /// Only host-side failures are returned (the transport has gone away);
    /// everything the panel does wrong is handled inside the tick.
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now();
        let local = self.clock.local_now();

        if let Some(frame) = self.next_frame(now) {
            self.handle_frame(&frame, now, local);
            self.flush()?;
        }

        let ctx = context(&self.config, &self.alarm, now, local);
        self.machine.poll_code_entry(&ctx);
        self.machine.poll_timers(&ctx);
        self.flush()?;

        self.start_pending(now, local);
        self.flush()?;
        self.schedule(now, local);

        self.sample_inputs(now);
        Ok(())
    }

    /// Read until one message completes or the transport runs dry.
    fn next_frame(&mut self, now: Instant) -> Option<Frame> {
        while let Some(byte) = self.transport.read_byte() {
            if let Some(frame) = self.framer.push(byte, self.machine.frame_rule(), now) {
                return Some(frame);
            }
        }
        self.framer.poll_stale(now)
    }

    fn handle_frame(&mut self, frame: &Frame, now: Instant, local: NaiveDateTime) {
        debug!("RX [{:?}] {}", frame.end, describe(&frame.bytes));
        self.machine.message_received(frame.end == FrameEnd::Terminated);

        let reaction = if self.machine.expects_query_reply() {
            self.query_reply(frame, local)
        } else {
            self.screen_message(frame)
        };

        let ctx = context(&self.config, &self.alarm, now, local);
        match reaction {
            Reaction::Advance(result) => self.machine.advance(result, &ctx),
            Reaction::Incomplete => self.machine.incomplete_message(&ctx),
            Reaction::WelcomeBack => self.machine.welcome_back(&ctx),
            Reaction::Nothing => {}
        }
    }

    fn query_reply(&mut self, frame: &Frame, local: NaiveDateTime) -> Reaction {
        if !frame.is_complete() {
            warn!("Discarding incomplete reply: {}", describe(&frame.bytes));
            return Reaction::Nothing;
        }
        let reply = frame.bytes.as_slice();
        let step = self.machine.step();

        if step == TaskStep::ReadZoneState && reply.len() == ZONE_REPLY_STRIDE * self.zones.len() {
            self.apply_zone_reply(reply);
            return Reaction::Advance(StepResult::Ok);
        }
        if reply == REPLY_OK {
            return Reaction::Advance(StepResult::Ok);
        }
        if reply == REPLY_ERROR {
            return Reaction::Advance(StepResult::Error);
        }
        if step == TaskStep::RequestTime && reply.len() == TIME_REPLY_LEN {
            let result = match decode_time(reply) {
                Some(panel) if time_in_sync(panel, local, self.config.time_tolerance_secs) => {
                    StepResult::TimeCheckOk
                }
                Some(_) => StepResult::TimeCheckOut,
                None => {
                    warn!("Panel reported an invalid date: {}", describe(reply));
                    StepResult::TimeCheckOut
                }
            };
            return Reaction::Advance(result);
        }

        info!("Unknown reply: {}", describe(reply));
        Reaction::Advance(StepResult::UnknownMessage)
    }

    fn apply_zone_reply(&mut self, reply: &[u8]) {
        let mut updates = Vec::with_capacity(self.zones.len());
        let mut newly_active = Vec::new();
        for (index, low) in zone_low_bytes(reply).enumerate() {
            if let Some(zone) = self.zones.get_index_mut(index) {
                let changed = zone.apply_query_byte(low);
                if changed.contains(ZoneFlags::ACTIVE) && zone.is_active() {
                    newly_active.push(zone.number);
                }
                updates.push((zone.number, zone.flags));
            }
        }
        debug!("Zone reply applied to {} zones", updates.len());
        for &(zone, flags) in &updates {
            self.emit(GatewayEvent::ZoneChanged { zone, flags });
        }

        // Zones that just opened are the likeliest cause, then anything still open
        let candidates = newly_active.into_iter().chain(
            updates
                .iter()
                .filter(|(_, flags)| flags.contains(ZoneFlags::ACTIVE))
                .map(|&(zone, _)| zone),
        );
        for zone in candidates {
            if self.alarm.triggered_zone().is_some() {
                break;
            }
            if let Some(zone) = self.alarm.observe_zone_activity(zone) {
                self.emit(GatewayEvent::AlarmTriggered { zone });
            }
        }
    }

    fn screen_message(&mut self, frame: &Frame) -> Reaction {
        let message = self.classifier.classify(&frame.bytes);
        match message {
            ScreenMessage::ZoneUpdate { zone, state } => {
                self.zone_update(zone, state);
                Reaction::Nothing
            }
            ScreenMessage::SystemArmed => {
                info!("Panel reports system armed");
                Reaction::Nothing
            }
            ScreenMessage::EntryWhileArmed => {
                info!("Panel reports entry while armed");
                Reaction::Nothing
            }
            ScreenMessage::Intruder => {
                info!("Panel reports intruder");
                Reaction::Nothing
            }
            ScreenMessage::SystemDisarmed | ScreenMessage::ReplyDisarmed => {
                Reaction::Advance(StepResult::IsDisarmed)
            }
            ScreenMessage::SystemArming => Reaction::Advance(StepResult::IsArming),
            ScreenMessage::ReplyArmed => Reaction::Advance(StepResult::IsArmed),
            ScreenMessage::UserLogin { user, by_tag } => {
                info!(
                    "User {} logged in by {}",
                    self.config.user_name(user),
                    if by_tag { "tag" } else { "code" }
                );
                Reaction::Advance(StepResult::LoginConfirmed)
            }
            ScreenMessage::ScreenPartArmed => Reaction::Advance(StepResult::ScreenPartArmed),
            ScreenMessage::ScreenFullArmed => Reaction::Advance(StepResult::ScreenFullArmed),
            ScreenMessage::ScreenIdle => Reaction::Advance(StepResult::ScreenIdle),
            ScreenMessage::WelcomeBack => Reaction::WelcomeBack,
            ScreenMessage::FullArmPrompt => Reaction::Advance(StepResult::FullArmPrompt),
            ScreenMessage::PartArmPrompt => Reaction::Advance(StepResult::PartArmPrompt),
            ScreenMessage::NightArmPrompt => Reaction::Advance(StepResult::NightArmPrompt),
            ScreenMessage::DisarmPrompt => Reaction::Advance(StepResult::DisarmPrompt),
            ScreenMessage::AreaEntry => Reaction::Advance(StepResult::ScreenAreaEntry),
            ScreenMessage::AreaExit => Reaction::Advance(StepResult::ScreenAreaExit),
            ScreenMessage::Unknown if frame.is_complete() => {
                info!("Unknown message: {}", describe(&frame.bytes));
                Reaction::Advance(StepResult::UnknownMessage)
            }
            ScreenMessage::Unknown => {
                debug!("Incomplete message: {}", describe(&frame.bytes));
                Reaction::Incomplete
            }
        }
    }

    fn zone_update(&mut self, number: u16, state: u8) {
        let Some(value) = ZoneFlags::from_screen_digit(state) else {
            warn!("Zone {number}: unknown state digit {state}");
            return;
        };
        let Some(zone) = self.zones.get_mut(number) else {
            debug!("Zone {number} is outside the tracked range");
            return;
        };
        zone.update_masked(ZoneFlags::SCREEN_MASK, value);
        let flags = zone.flags;
        debug!("Zone {number}: {flags:?}");
        self.emit(GatewayEvent::ZoneChanged { zone: number, flags });

        if !value.is_empty() {
            if let Some(zone) = self.alarm.observe_zone_activity(number) {
                self.emit(GatewayEvent::AlarmTriggered { zone });
            }
        }
    }

    /// Send queued commands and report finished tasks.
    fn flush(&mut self) -> Result<()> {
        for output in self.machine.take_outputs() {
            match output {
                Output::Send(command) => self.transport.write(&command.to_wire())?,
                Output::Finished { task, success } => {
                    if success && matches!(task, Task::Arm | Task::Disarm) {
                        self.alarm.clear_triggered_zone();
                    }
                    self.emit(GatewayEvent::TaskFinished { task, success });
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Background work
    // -----------------------------------------------------------------------

    /// Start a sync flagged on an earlier tick, if nothing else is running.
    fn start_pending(&mut self, now: Instant, local: NaiveDateTime) {
        if !self.machine.is_idle() {
            return;
        }
        let task = if self.pending_time_sync {
            self.pending_time_sync = false;
            Task::TimeSync
        } else if self.pending_zone_sync {
            self.pending_zone_sync = false;
            Task::ZoneSync
        } else {
            return;
        };
        let ctx = context(&self.config, &self.alarm, now, local);
        if let Err(e) = self.machine.request_query(task, &ctx) {
            warn!("Scheduled {task:?} not started: {e}");
        }
    }

    fn schedule(&mut self, now: Instant, local: NaiveDateTime) {
        if now >= self.next_zone_sync {
            debug!("Periodic zone sync due");
            self.pending_zone_sync = true;
            self.next_zone_sync = now + self.config.zone_sync_interval;
        }
        if self.trigger_sync_at.is_some_and(|at| now >= at) {
            info!("Syncing zones to find the trigger");
            self.trigger_sync_at = None;
            self.pending_zone_sync = true;
        }
        let today = local.date();
        if local.time() >= self.config.time_sync_at && self.last_time_sync != Some(today) {
            debug!("Daily time sync due");
            self.last_time_sync = Some(today);
            self.pending_time_sync = true;
        }
    }

    fn sample_inputs(&mut self, now: Instant) {
        let pass = self.alarm.apply_inputs(self.inputs.sample());
        for message in &pass.notifications {
            self.emit(GatewayEvent::Notification((*message).to_string()));
        }
        if pass.publish {
            self.emit(GatewayEvent::AlarmStateChanged {
                state: self.alarm.state(),
                flags: self.alarm.flags(),
            });
        }
        if pass.entered_triggered {
            if let Some(zone) = pass.triggered_zone {
                self.emit(GatewayEvent::AlarmTriggered { zone });
            }
            self.trigger_sync_at = Some(now + self.config.trigger_zone_sync_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codec::encode_frame;
    use crate::devices::inputs::{DigitalInputs, SharedInputs};
    use crate::transport::{ChannelTransport, PanelLink};
    use chrono::NaiveTime;
    use std::time::Duration;

    struct Rig {
        gateway: Gateway,
        panel: PanelLink,
        clock: ManualClock,
        inputs: SharedInputs,
        events: EventReceiver,
    }

    fn rig_with(config: GatewayConfig, local: NaiveDateTime) -> Rig {
        let (transport, panel) = ChannelTransport::pair();
        let clock = ManualClock::new(local);
        let inputs = SharedInputs::default();
        let gateway = Gateway::new(
            config,
            Box::new(transport),
            Box::new(clock.clone()),
            Box::new(inputs.clone()),
        );
        let events = gateway.subscribe();
        Rig { gateway, panel, clock, inputs, events }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn rig() -> Rig {
        rig_with(GatewayConfig::builder().udl_code("123456").build().unwrap(), noon())
    }

    impl Rig {
        fn tick(&mut self, by: Duration) {
            self.clock.advance(by);
            self.gateway.tick().unwrap();
        }

        fn line(&mut self, text: &[u8]) {
            let mut bytes = text.to_vec();
            bytes.extend_from_slice(b"\r\n");
            self.panel.send(&bytes).unwrap();
            self.tick(Duration::from_millis(10));
        }

        fn reply(&mut self, payload: &[u8]) {
            let mut bytes = encode_frame(payload);
            bytes.extend_from_slice(b"\r\n");
            self.panel.send(&bytes).unwrap();
            self.tick(Duration::from_millis(10));
        }

        fn events(&mut self) -> Vec<GatewayEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    #[test]
    fn test_first_tick_publishes_alarm_state() {
        let mut rig = rig();
        rig.tick(Duration::from_millis(10));
        assert_eq!(
            rig.events(),
            vec![GatewayEvent::AlarmStateChanged {
                state: AlarmState::Disarmed,
                flags: AlarmFlags::READY,
            }]
        );
        rig.tick(Duration::from_millis(10));
        assert!(rig.events().is_empty());
    }

    #[test]
    fn test_screen_zone_update_sets_flags() {
        let mut rig = rig();
        rig.tick(Duration::from_millis(10));
        rig.events();

        rig.line(b"\"Z0032");
        assert_eq!(
            rig.events(),
            vec![GatewayEvent::ZoneChanged { zone: 3, flags: ZoneFlags::TAMPER }]
        );
        assert!(rig.gateway.zones().get(3).unwrap().is_tamper());

        // Outside the tracked range
        rig.line(b"\"Z0501");
        assert!(rig.events().is_empty());
    }

    #[test]
    fn test_zone_activity_during_alarm_latches_trigger() {
        let mut rig = rig();
        rig.inputs.update(|i| i.triggered = true);
        rig.tick(Duration::from_millis(10));
        rig.events();
        assert_eq!(rig.gateway.alarm_state(), AlarmState::Triggered);

        rig.line(b"\"Z0051");
        assert!(rig.events().contains(&GatewayEvent::AlarmTriggered { zone: 5 }));
        assert_eq!(rig.gateway.triggered_zone(), Some(5));

        // Only the first zone is latched
        rig.line(b"\"Z0061");
        assert!(!rig.events().contains(&GatewayEvent::AlarmTriggered { zone: 6 }));
        assert_eq!(rig.gateway.triggered_zone(), Some(5));
    }

    #[test]
    fn test_trigger_schedules_zone_sync() {
        let mut rig = rig();
        rig.tick(Duration::from_millis(10));
        rig.inputs.update(|i| i.triggered = true);
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::Idle);

        rig.tick(Duration::from_secs(5));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::ZoneSync);
        assert_eq!(rig.gateway.step(), TaskStep::QueryLogin);
    }

    #[test]
    fn test_periodic_zone_sync() {
        let mut rig = rig();
        rig.tick(Duration::from_secs(179));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::Idle);

        rig.tick(Duration::from_secs(1));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::ZoneSync);
    }

    #[test]
    fn test_daily_time_sync() {
        let config = GatewayConfig::builder()
            .udl_code("123456")
            .time_sync_at(NaiveTime::from_hms_opt(12, 1, 0).unwrap())
            .build()
            .unwrap();
        let mut rig = rig_with(config, noon());
        rig.tick(Duration::from_secs(30));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::Idle);

        rig.tick(Duration::from_secs(30));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::TimeSync);
    }

    #[test]
    fn test_time_already_passed_waits_for_tomorrow() {
        let config = GatewayConfig::builder()
            .udl_code("123456")
            .time_sync_at(NaiveTime::from_hms_opt(3, 0, 0).unwrap())
            .build()
            .unwrap();
        let mut rig = rig_with(config, noon());
        rig.tick(Duration::from_millis(10));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::Idle);
    }

    #[test]
    fn test_scheduled_sync_without_udl_code_is_dropped() {
        let mut rig = rig_with(GatewayConfig::builder().build().unwrap(), noon());
        rig.tick(Duration::from_secs(180));
        rig.tick(Duration::from_millis(10));
        assert_eq!(rig.gateway.task(), Task::Idle);
        assert!(rig.panel.drain().is_empty());
    }

    #[test]
    fn test_time_reply_in_sync() {
        let mut rig = rig();
        rig.gateway.request_time_sync().unwrap();
        rig.tick(Duration::from_millis(10));
        rig.reply(b"OK");
        assert_eq!(rig.gateway.step(), TaskStep::RequestTime);
        rig.panel.drain();

        // 14/03/26 12:01, about a minute ahead of local
        rig.reply(&[14, 3, 26, 12, 1]);
        assert_eq!(rig.gateway.step(), TaskStep::Logout);
        let writes = rig.panel.drain();
        assert_eq!(writes, vec![crate::protocol::Command::Logout.to_wire()]);
    }

    #[test]
    fn test_udl_code_length_checked() {
        let mut rig = rig();
        assert!(matches!(rig.gateway.set_udl_code("12345"), Err(BridgeError::InvalidUdlCode)));
        assert_eq!(rig.gateway.config().udl_code, "123456");
        rig.gateway.set_udl_code("654321").unwrap();
        assert_eq!(rig.gateway.config().udl_code, "654321");
    }

    #[test]
    fn test_fault_notification() {
        let mut rig = rig();
        rig.tick(Duration::from_millis(10));
        rig.events();
        rig.inputs.set(DigitalInputs { fault_present: true, ..DigitalInputs::power_on() });
        rig.tick(Duration::from_millis(10));
        assert_eq!(
            rig.events(),
            vec![
                GatewayEvent::Notification("Alarm is reporting a fault".to_string()),
                GatewayEvent::AlarmStateChanged {
                    state: AlarmState::Disarmed,
                    flags: AlarmFlags::READY | AlarmFlags::FAULT,
                },
            ]
        );
    }

    #[test]
    fn test_describe_binary() {
        assert_eq!(describe(b"\"Area FULL ARMED"), "\"Area FULL ARMED");
        assert_eq!(describe(&[0x01, 0xFF]), "01 FF");
    }
}
