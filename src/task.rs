// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

//! The task state machine.
//!
//! Arm and disarm drive the screen-emulation keypad: check the armed state,
//! check the screen, type the user code one digit at a time, then confirm the
//! prompts. Time sync and zone sync log in to the query-response protocol,
//! run one query, and log out again.
//!
//! Every step expects one particular [`StepResult`]. Anything else aborts the
//! task, except for the bounded retry of arm-state and screen requests.

use std::fmt;
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::config::{ArmType, GatewayConfig};
use crate::constants::{MAX_USER_CODE_LEN, UDL_CODE_LEN};
use crate::devices::alarm::AlarmState;
use crate::error::{BridgeError, Result};
use crate::framer::FrameRule;
use crate::negotiator::{LoginPoll, Negotiator, ProtocolMode, SafetyAction};
use crate::protocol::Command;

/// Top-level workflow. At most one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Task {
    #[default]
    Idle,
    Disarm,
    Arm,
    TimeSync,
    ZoneSync,
}

impl Task {
    fn log_prefix(self) -> &'static str {
        match self {
            Task::Idle => "IDLE:",
            Task::Disarm => "DISARMING:",
            Task::Arm => "ARMING:",
            Task::TimeSync => "TIME SYNC:",
            Task::ZoneSync => "ZONE SYNC:",
        }
    }

    pub fn is_query(self) -> bool {
        matches!(self, Task::TimeSync | Task::ZoneSync)
    }
}

/// Current step of the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStep {
    #[default]
    Start,
    ConfirmArmed,
    ConfirmDisarmed,
    ConfirmIdleScreen,
    /// Typing the user code
    Login,
    LoginWait,
    WaitForDisarmPrompt,
    WaitForArmPrompt,
    WaitForPartArmPrompt,
    WaitForNightArmPrompt,
    ArmRequested,
    DisarmRequested,
    LoginRequired,
    /// Sending the UDL login frame until the panel answers OK
    QueryLogin,
    QueryStart,
    RequestTime,
    SendTime,
    ReadZoneState,
    Logout,
}

impl TaskStep {
    /// Steps that wait on an arm-state or screen request.
    fn awaits_request(self) -> bool {
        matches!(
            self,
            TaskStep::ConfirmArmed
                | TaskStep::ConfirmDisarmed
                | TaskStep::ConfirmIdleScreen
                | TaskStep::WaitForArmPrompt
                | TaskStep::WaitForDisarmPrompt
                | TaskStep::WaitForPartArmPrompt
                | TaskStep::WaitForNightArmPrompt
        )
    }
}

/// Everything that can move a task forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    None,
    Timeout,
    IsArmed,
    IsDisarmed,
    ScreenIdle,
    ScreenPartArmed,
    ScreenFullArmed,
    ScreenAreaEntry,
    ScreenAreaExit,
    LoginComplete,
    LoginConfirmed,
    FullArmPrompt,
    PartArmPrompt,
    NightArmPrompt,
    DisarmPrompt,
    IsArming,
    UnknownMessage,
    Ok,
    Error,
    TimeCheckOk,
    TimeCheckOut,
}

/// Check a keypad user code: 1 to 8 ASCII digits.
pub fn validate_user_code(code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(BridgeError::InvalidCode { reason: "empty" });
    }
    if code.len() > MAX_USER_CODE_LEN {
        return Err(BridgeError::InvalidCode { reason: "longer than 8 digits" });
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BridgeError::InvalidCode { reason: "digits only" });
    }
    Ok(())
}

/// The user code and arm type captured by a request.
///
/// Held in a fixed buffer that is zeroed when the task ends.
#[derive(Clone, Default)]
pub struct PendingRequest {
    code: [u8; MAX_USER_CODE_LEN],
    len: usize,
    arm_type: Option<ArmType>,
}

impl PendingRequest {
    pub fn new(code: &str, arm_type: Option<ArmType>) -> Result<Self> {
        validate_user_code(code)?;
        let mut pending = Self {
            arm_type,
            len: code.len(),
            ..Self::default()
        };
        pending.code[..code.len()].copy_from_slice(code.as_bytes());
        Ok(pending)
    }

    pub fn digits(&self) -> &[u8] {
        &self.code[..self.len]
    }

    pub fn arm_type(&self) -> Option<ArmType> {
        self.arm_type
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.code.fill(0);
        self.len = 0;
        self.arm_type = None;
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("code", &"<redacted>")
            .field("arm_type", &self.arm_type)
            .finish()
    }
}

/// What the machine wants done after a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Send(Command),
    Finished { task: Task, success: bool },
}

/// Read-only view of the world for one machine call.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub now: Instant,
    pub local_now: NaiveDateTime,
    pub alarm_state: AlarmState,
    pub config: &'a GatewayConfig,
}

#[derive(Debug, Default)]
pub struct TaskMachine {
    task: Task,
    step: TaskStep,
    pending: PendingRequest,
    negotiator: Negotiator,
    delayed: Option<(Command, Instant)>,
    pin_position: usize,
    next_pin_at: Option<Instant>,
    started_at: Option<Instant>,
    retries: u8,
    awaiting_since: Option<Instant>,
    query_failed: bool,
    outputs: Vec<Output>,
}

impl TaskMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn step(&self) -> TaskStep {
        self.step
    }

    pub fn is_idle(&self) -> bool {
        self.task == Task::Idle
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.negotiator.mode()
    }

    pub fn frame_rule(&self) -> FrameRule {
        self.negotiator.frame_rule()
    }

    /// Whether a query-response reply is expected for the next message.
    pub fn expects_query_reply(&self) -> bool {
        self.frame_rule() == FrameRule::Checksummed
    }

    pub fn has_pending_code(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Drain everything queued since the last call.
    pub fn take_outputs(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.outputs)
    }

    fn prefix(&self) -> &'static str {
        self.task.log_prefix()
    }

    fn send(&mut self, command: Command, now: Instant) {
        debug!("TX {command:?}");
        if self.task != Task::Idle && matches!(command, Command::ArmState | Command::Screen) {
            self.awaiting_since = Some(now);
        }
        self.outputs.push(Output::Send(command));
    }

    fn delay(&mut self, command: Command, ctx: &StepContext<'_>) {
        self.delayed = Some((command, ctx.now + ctx.config.prompt_delay));
    }

    fn ensure_idle(&self, requested: Task) -> Result<()> {
        if self.task == Task::Idle {
            return Ok(());
        }
        info!("{} Request already in progress", requested.log_prefix());
        Err(BridgeError::Busy { active: self.task })
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    pub fn request_disarm(&mut self, code: &str, ctx: &StepContext<'_>) -> Result<()> {
        self.ensure_idle(Task::Disarm)?;
        self.pending = PendingRequest::new(code, None)?;
        self.task = Task::Disarm;
        self.step = TaskStep::Start;
        self.advance(StepResult::None, ctx);
        Ok(())
    }

    pub fn request_arm(&mut self, code: &str, arm_type: ArmType, ctx: &StepContext<'_>) -> Result<()> {
        self.ensure_idle(Task::Arm)?;
        self.pending = PendingRequest::new(code, Some(arm_type))?;
        self.task = Task::Arm;
        self.step = TaskStep::Start;
        self.advance(StepResult::None, ctx);
        Ok(())
    }

    /// Start a time sync or zone sync.
    pub fn request_query(&mut self, task: Task, ctx: &StepContext<'_>) -> Result<()> {
        debug_assert!(task.is_query());
        self.ensure_idle(task)?;
        if ctx.config.udl_code.len() != UDL_CODE_LEN {
            warn!("{} No valid UDL code configured", task.log_prefix());
            return Err(BridgeError::InvalidUdlCode);
        }
        self.task = task;
        self.step = TaskStep::LoginRequired;
        self.query_failed = false;
        self.negotiator.require_login();
        self.advance(StepResult::None, ctx);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Incoming messages
    // -----------------------------------------------------------------------

    /// Any message arrived. Only CRLF-terminated ones reset the retry budget.
    ///
    /// The reply timer keeps running until a message reaches [`Self::advance`];
    /// unsolicited lines the gateway handles itself do not stop it.
    pub fn message_received(&mut self, terminated: bool) {
        if terminated {
            self.retries = 0;
        }
    }

    /// An unrecognised message that was force-emitted before it completed.
    pub fn incomplete_message(&mut self, ctx: &StepContext<'_>) {
        if self.task == Task::Idle || self.task.is_query() {
            self.advance(StepResult::UnknownMessage, ctx);
            return;
        }
        self.retry_request(ctx);
    }

    /// "Welcome back" is shown before the prompt; look again shortly.
    pub fn welcome_back(&mut self, ctx: &StepContext<'_>) {
        if matches!(self.step, TaskStep::WaitForDisarmPrompt | TaskStep::WaitForArmPrompt)
            && !self.is_idle()
        {
            self.delay(Command::Screen, ctx);
        }
    }

    fn retry_request(&mut self, ctx: &StepContext<'_>) {
        let p = self.prefix();
        let command = match self.step {
            TaskStep::ConfirmArmed | TaskStep::ConfirmDisarmed => Command::ArmState,
            step if step.awaits_request() => Command::Screen,
            step => {
                debug!("{p} Nothing to retry at {step:?}");
                return;
            }
        };
        if self.retries >= ctx.config.max_retries {
            warn!("{p} Retry count exceeded. Aborting");
            self.abort(ctx);
            return;
        }
        self.retries += 1;
        info!(
            "{p} Retrying {} request ({}/{})",
            if command == Command::ArmState { "arm state" } else { "screen" },
            self.retries,
            ctx.config.max_retries
        );
        self.send(command, ctx.now);
    }

    // -----------------------------------------------------------------------
    // Step dispatch
    // -----------------------------------------------------------------------

    pub fn advance(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        match result {
            StepResult::Timeout => info!("{} Task timed out", self.prefix()),
            StepResult::None | StepResult::LoginComplete => {}
            _ => self.awaiting_since = None,
        }
        match self.task {
            Task::Idle => {}
            Task::Disarm => self.disarm(result, ctx),
            Task::Arm => self.arm(result, ctx),
            Task::TimeSync | Task::ZoneSync => match self.step {
                TaskStep::LoginRequired | TaskStep::QueryLogin => self.query_login(result, ctx),
                TaskStep::Logout => self.logout_reply(result),
                _ if self.task == Task::TimeSync => self.time_sync(result, ctx),
                _ => self.zone_sync(result, ctx),
            },
        }
    }

    fn unexpected(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        info!(
            "{} Unexpected result {result:?} at {:?}. Aborting",
            self.prefix(),
            self.step
        );
        self.abort(ctx);
    }

    fn begin_code_entry(&mut self) {
        self.step = TaskStep::Login;
        self.pin_position = 0;
        self.next_pin_at = None;
    }

    fn confirm(&mut self, ctx: &StepContext<'_>) {
        if ctx.config.debug {
            info!("{} Debug mode, final confirmation not sent", self.prefix());
        } else {
            self.send(Command::KeyYes, ctx.now);
        }
    }

    fn disarm(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        let p = self.prefix();
        match (self.step, result) {
            (TaskStep::Start, _) => {
                info!("{p} Starting disarm process");
                self.started_at = Some(ctx.now);
                self.step = TaskStep::ConfirmArmed;
                self.send(Command::ArmState, ctx.now);
            }
            (TaskStep::ConfirmArmed, StepResult::IsArmed) => {
                info!("{p} Confirmed armed. Confirming idle screen");
                self.step = TaskStep::ConfirmIdleScreen;
                self.send(Command::Screen, ctx.now);
            }
            (TaskStep::ConfirmArmed, StepResult::IsDisarmed) => {
                info!("{p} System already disarmed. Aborting");
                self.abort(ctx);
            }
            (
                TaskStep::ConfirmIdleScreen,
                StepResult::ScreenIdle
                | StepResult::ScreenPartArmed
                | StepResult::ScreenFullArmed
                | StepResult::ScreenAreaEntry,
            ) => {
                info!("{p} Idle screen confirmed. Starting login process");
                self.begin_code_entry();
            }
            (TaskStep::ConfirmIdleScreen, _) => {
                info!("{p} Screen is not idle. Aborting");
                self.abort(ctx);
            }
            (TaskStep::Login, StepResult::LoginComplete) => {
                info!("{p} Login complete. Awaiting confirmed login");
                self.step = TaskStep::LoginWait;
            }
            (TaskStep::LoginWait, StepResult::LoginConfirmed) => {
                if ctx.alarm_state == AlarmState::Entry {
                    info!("{p} Login confirmed. Waiting for disarm confirmation");
                    self.step = TaskStep::DisarmRequested;
                } else {
                    info!("{p} Login confirmed. Waiting for disarm prompt");
                    self.step = TaskStep::WaitForDisarmPrompt;
                    self.delay(Command::Screen, ctx);
                }
            }
            (TaskStep::WaitForDisarmPrompt, StepResult::DisarmPrompt) => {
                info!("{p} Disarm prompt confirmed, disarming");
                self.confirm(ctx);
                self.step = TaskStep::DisarmRequested;
            }
            (TaskStep::DisarmRequested, StepResult::IsDisarmed) => {
                info!("{p} DISARM CONFIRMED");
                self.complete(true);
            }
            _ => self.unexpected(result, ctx),
        }
    }

    fn arm(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        let p = self.prefix();
        match (self.step, result) {
            (TaskStep::Start, _) => {
                match self.pending.arm_type() {
                    Some(ArmType::Full) => info!("{p} Starting full arm process"),
                    Some(ArmType::Night) => info!("{p} Starting night arm process"),
                    None => return,
                }
                self.started_at = Some(ctx.now);
                self.step = TaskStep::ConfirmDisarmed;
                self.send(Command::ArmState, ctx.now);
            }
            (TaskStep::ConfirmDisarmed, StepResult::IsDisarmed) => {
                info!("{p} Confirmed disarmed. Confirming idle screen");
                self.step = TaskStep::ConfirmIdleScreen;
                self.send(Command::Screen, ctx.now);
            }
            (TaskStep::ConfirmDisarmed, StepResult::IsArmed) => {
                info!("{p} System already armed. Aborting");
                self.abort(ctx);
            }
            (TaskStep::ConfirmIdleScreen, StepResult::ScreenIdle) => {
                info!("{p} Idle screen confirmed. Starting login process");
                self.begin_code_entry();
            }
            (TaskStep::ConfirmIdleScreen, _) => {
                info!("{p} Screen is not idle. Aborting");
                self.abort(ctx);
            }
            (TaskStep::Login, StepResult::LoginComplete) => {
                info!("{p} Login complete. Awaiting confirmed login");
                self.step = TaskStep::LoginWait;
            }
            (TaskStep::LoginWait, StepResult::LoginConfirmed) => {
                info!("{p} Login confirmed. Waiting for arm prompt");
                self.step = TaskStep::WaitForArmPrompt;
                self.delay(Command::Screen, ctx);
            }
            (TaskStep::WaitForArmPrompt, StepResult::FullArmPrompt) => {
                if self.pending.arm_type() == Some(ArmType::Night) {
                    info!("{p} Full arm prompt confirmed, waiting for part arm prompt");
                    self.step = TaskStep::WaitForPartArmPrompt;
                    self.send(Command::KeyDown, ctx.now);
                    self.delay(Command::Screen, ctx);
                } else {
                    info!("{p} Full arm prompt confirmed, completing full arm");
                    self.confirm(ctx);
                    self.step = TaskStep::ArmRequested;
                }
            }
            (TaskStep::WaitForPartArmPrompt, StepResult::PartArmPrompt) => {
                info!("{p} Part arm prompt confirmed, waiting for night arm prompt");
                self.step = TaskStep::WaitForNightArmPrompt;
                self.send(Command::KeyYes, ctx.now);
                self.delay(Command::Screen, ctx);
            }
            (TaskStep::WaitForNightArmPrompt, StepResult::NightArmPrompt) => {
                info!("{p} Night arm prompt confirmed, completing night arm");
                self.confirm(ctx);
                self.step = TaskStep::ArmRequested;
            }
            (TaskStep::ArmRequested, StepResult::IsArming) => {
                info!("{p} ARM CONFIRMED");
                self.complete(true);
            }
            _ => self.unexpected(result, ctx),
        }
    }

    fn query_login(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        let p = self.prefix();
        match (self.step, result) {
            (TaskStep::LoginRequired, _) => {
                info!("{p} Login required");
                self.step = TaskStep::QueryLogin;
                self.negotiator.start_login();
            }
            (TaskStep::QueryLogin, StepResult::Ok) => {
                self.negotiator
                    .login_confirmed(ctx.now, ctx.config.query_session_timeout);
                self.step = TaskStep::QueryStart;
                self.advance(StepResult::LoginConfirmed, ctx);
            }
            (TaskStep::QueryLogin, StepResult::Error) => {
                warn!("{p} Login rejected by panel");
            }
            (_, other) => debug!("{p} Ignoring {other:?} during login"),
        }
    }

    fn time_sync(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        let p = self.prefix();
        match (self.step, result) {
            (TaskStep::QueryStart, _) => {
                info!("{p} Requesting time");
                self.step = TaskStep::RequestTime;
                self.send(Command::QueryTime, ctx.now);
            }
            (TaskStep::RequestTime, StepResult::TimeCheckOk) => {
                info!("{p} Time ok, logging out");
                self.logout(ctx.now);
            }
            (TaskStep::RequestTime, StepResult::TimeCheckOut) => {
                info!("{p} Time is out, setting panel clock");
                self.step = TaskStep::SendTime;
                self.send(Command::SetTime { at: ctx.local_now }, ctx.now);
            }
            (TaskStep::SendTime, StepResult::Ok) => {
                info!("{p} Panel clock set, logging out");
                self.logout(ctx.now);
            }
            (step, other) => {
                warn!("{p} Unexpected result {other:?} at {step:?}. Logging out");
                self.query_failed = true;
                self.logout(ctx.now);
            }
        }
    }

    fn zone_sync(&mut self, result: StepResult, ctx: &StepContext<'_>) {
        let p = self.prefix();
        match (self.step, result) {
            (TaskStep::QueryStart, _) => {
                info!("{p} Requesting zone state");
                self.step = TaskStep::ReadZoneState;
                self.send(
                    Command::QueryZones {
                        first: ctx.config.first_zone,
                        count: ctx.config.zone_count,
                    },
                    ctx.now,
                );
            }
            (TaskStep::ReadZoneState, StepResult::Ok) => {
                info!("{p} Zone state read, logging out");
                self.logout(ctx.now);
            }
            (step, other) => {
                warn!("{p} Unexpected result {other:?} at {step:?}. Logging out");
                self.query_failed = true;
                self.logout(ctx.now);
            }
        }
    }

    fn logout(&mut self, now: Instant) {
        let command = self.negotiator.start_logout();
        self.step = TaskStep::Logout;
        self.send(command, now);
    }

    fn logout_reply(&mut self, result: StepResult) {
        if result == StepResult::Ok {
            self.negotiator.logout_confirmed();
            let success = !self.query_failed;
            info!("{} Complete", self.prefix());
            self.complete(success);
        } else {
            warn!("{} Unexpected result {result:?} at Logout", self.prefix());
        }
    }

    // -----------------------------------------------------------------------
    // Time-driven work
    // -----------------------------------------------------------------------

    /// Type the next digit of the user code if its delay has passed.
    pub fn poll_code_entry(&mut self, ctx: &StepContext<'_>) {
        if self.step != TaskStep::Login || !matches!(self.task, Task::Arm | Task::Disarm) {
            return;
        }
        if self.next_pin_at.is_some_and(|at| ctx.now < at) {
            return;
        }
        let Some(&digit) = self.pending.digits().get(self.pin_position) else {
            self.advance(StepResult::LoginComplete, ctx);
            return;
        };
        self.send(Command::Key(digit), ctx.now);
        self.pin_position += 1;

        if self.pin_position >= self.pending.digits().len() {
            self.pin_position = 0;
            self.next_pin_at = None;
            self.advance(StepResult::LoginComplete, ctx);
        } else {
            self.next_pin_at = Some(ctx.now + ctx.config.pin_entry_delay);
        }
    }

    /// Fire delayed commands, task timeouts, the login cadence, the query
    /// session deadline and the command reply timeout.
    pub fn poll_timers(&mut self, ctx: &StepContext<'_>) {
        if self.delayed.as_ref().is_some_and(|(_, at)| ctx.now >= *at) {
            if let Some((command, _)) = self.delayed.take() {
                self.send(command, ctx.now);
            }
        }

        let limit = match self.task {
            Task::Arm => Some(ctx.config.arm_timeout),
            Task::Disarm => Some(ctx.config.disarm_timeout),
            _ => None,
        };
        if let (Some(limit), Some(started)) = (limit, self.started_at) {
            if ctx.now.saturating_duration_since(started) > limit {
                self.advance(StepResult::Timeout, ctx);
            }
        }

        if self.step == TaskStep::QueryLogin {
            match self.negotiator.poll_login(
                ctx.now,
                &ctx.config.udl_code,
                ctx.config.login_interval,
                ctx.config.max_login_attempts,
            ) {
                LoginPoll::Wait => {}
                LoginPoll::Send(command) => self.send(command, ctx.now),
                LoginPoll::GiveUp => {
                    warn!("{} Too many login attempts, giving up", self.prefix());
                    self.negotiator.reset();
                    self.complete(false);
                }
            }
        }

        match self.negotiator.poll_deadline(
            ctx.now,
            self.step == TaskStep::Logout,
            ctx.config.forced_logout_grace,
        ) {
            SafetyAction::None => {}
            SafetyAction::SendLogout => {
                self.query_failed = true;
                self.step = TaskStep::Logout;
                self.send(Command::Logout, ctx.now);
            }
            SafetyAction::ForceScreenEmulation => {
                warn!("{} Forced logout", self.prefix());
                self.complete(false);
            }
        }

        if matches!(self.task, Task::Arm | Task::Disarm)
            && self.step.awaits_request()
            && self
                .awaiting_since
                .is_some_and(|since| ctx.now.saturating_duration_since(since) >= ctx.config.command_timeout)
        {
            self.awaiting_since = None;
            info!("{} No reply within {:?}", self.prefix(), ctx.config.command_timeout);
            self.retry_request(ctx);
        }
    }

    // -----------------------------------------------------------------------
    // Endings
    // -----------------------------------------------------------------------

    fn reset_task_state(&mut self) {
        self.task = Task::Idle;
        self.step = TaskStep::Start;
        self.pending.clear();
        self.delayed = None;
        self.pin_position = 0;
        self.next_pin_at = None;
        self.started_at = None;
        self.retries = 0;
        self.awaiting_since = None;
        self.query_failed = false;
    }

    fn complete(&mut self, success: bool) {
        let task = self.task;
        self.reset_task_state();
        self.outputs.push(Output::Finished { task, success });
    }

    /// Escape out of whatever the keypad is showing and re-read the armed state.
    pub fn abort(&mut self, ctx: &StepContext<'_>) {
        let task = self.task;
        info!("{} Task aborted", self.prefix());
        self.reset_task_state();
        self.send(Command::KeyReset, ctx.now);
        self.send(Command::ArmState, ctx.now);
        self.outputs.push(Output::Finished { task, success: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct Rig {
        config: GatewayConfig,
        now: Instant,
        local: NaiveDateTime,
        alarm_state: AlarmState,
        machine: TaskMachine,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                config: GatewayConfig::builder().udl_code("123456").build().unwrap(),
                now: Instant::now(),
                local: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap(),
                alarm_state: AlarmState::Disarmed,
                machine: TaskMachine::new(),
            }
        }

        fn parts(&mut self) -> (&mut TaskMachine, StepContext<'_>) {
            let ctx = StepContext {
                now: self.now,
                local_now: self.local,
                alarm_state: self.alarm_state,
                config: &self.config,
            };
            (&mut self.machine, ctx)
        }

        fn advance(&mut self, result: StepResult) {
            let (machine, ctx) = self.parts();
            machine.advance(result, &ctx);
        }

        fn poll(&mut self, by: Duration) {
            self.now += by;
            let (machine, ctx) = self.parts();
            machine.poll_code_entry(&ctx);
            machine.poll_timers(&ctx);
        }

        fn sent(&mut self) -> Vec<Command> {
            self.machine
                .take_outputs()
                .into_iter()
                .filter_map(|o| match o {
                    Output::Send(c) => Some(c),
                    Output::Finished { .. } => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_user_code_validation() {
        assert!(validate_user_code("1234").is_ok());
        assert!(validate_user_code("12345678").is_ok());
        assert!(matches!(validate_user_code(""), Err(BridgeError::InvalidCode { .. })));
        assert!(matches!(validate_user_code("123456789"), Err(BridgeError::InvalidCode { .. })));
        assert!(matches!(validate_user_code("12a4"), Err(BridgeError::InvalidCode { .. })));
    }

    #[test]
    fn test_pending_request_clear_and_redaction() {
        let mut pending = PendingRequest::new("9876", Some(ArmType::Full)).unwrap();
        assert_eq!(pending.digits(), b"9876");
        assert!(!format!("{pending:?}").contains("9876"));
        pending.clear();
        assert!(pending.is_empty());
        assert_eq!(pending.code, [0; MAX_USER_CODE_LEN]);
    }

    #[test]
    fn test_full_disarm_flow() {
        let mut rig = Rig::new();
        rig.alarm_state = AlarmState::ArmedAway;
        let (machine, ctx) = rig.parts();
        machine.request_disarm("12", &ctx).unwrap();
        assert_eq!(rig.sent(), vec![Command::ArmState]);
        assert_eq!(rig.machine.step(), TaskStep::ConfirmArmed);

        rig.advance(StepResult::IsArmed);
        assert_eq!(rig.sent(), vec![Command::Screen]);
        rig.advance(StepResult::ScreenFullArmed);
        assert_eq!(rig.machine.step(), TaskStep::Login);

        rig.poll(Duration::from_millis(10));
        assert_eq!(rig.sent(), vec![Command::Key(b'1')]);
        rig.poll(Duration::from_millis(100));
        assert!(rig.sent().is_empty());
        rig.poll(Duration::from_millis(400));
        assert_eq!(rig.sent(), vec![Command::Key(b'2')]);
        assert_eq!(rig.machine.step(), TaskStep::LoginWait);

        rig.advance(StepResult::LoginConfirmed);
        assert_eq!(rig.machine.step(), TaskStep::WaitForDisarmPrompt);
        rig.poll(Duration::from_millis(500));
        assert_eq!(rig.sent(), vec![Command::Screen]);

        rig.advance(StepResult::DisarmPrompt);
        assert_eq!(rig.sent(), vec![Command::KeyYes]);
        rig.advance(StepResult::IsDisarmed);
        assert!(rig.machine.is_idle());
        assert!(!rig.machine.has_pending_code());
        assert_eq!(
            rig.machine.take_outputs(),
            vec![Output::Finished { task: Task::Disarm, success: true }]
        );
    }

    #[test]
    fn test_disarm_during_entry_skips_prompt() {
        let mut rig = Rig::new();
        rig.alarm_state = AlarmState::Entry;
        let (machine, ctx) = rig.parts();
        machine.request_disarm("1", &ctx).unwrap();
        rig.advance(StepResult::IsArmed);
        rig.advance(StepResult::ScreenAreaEntry);
        rig.poll(Duration::from_millis(1));
        rig.advance(StepResult::LoginConfirmed);
        assert_eq!(rig.machine.step(), TaskStep::DisarmRequested);
    }

    #[test]
    fn test_night_arm_flow_with_debug() {
        let mut rig = Rig::new();
        rig.config.debug = true;
        let (machine, ctx) = rig.parts();
        machine.request_arm("5", ArmType::Night, &ctx).unwrap();
        rig.advance(StepResult::IsDisarmed);
        rig.advance(StepResult::ScreenIdle);
        rig.poll(Duration::from_millis(1));
        rig.advance(StepResult::LoginConfirmed);
        rig.sent();

        rig.advance(StepResult::FullArmPrompt);
        assert_eq!(rig.sent(), vec![Command::KeyDown]);
        assert_eq!(rig.machine.step(), TaskStep::WaitForPartArmPrompt);
        rig.advance(StepResult::PartArmPrompt);
        // Navigation keypress is sent even in debug mode
        assert_eq!(rig.sent(), vec![Command::KeyYes]);
        rig.advance(StepResult::NightArmPrompt);
        // Final confirmation suppressed
        assert!(rig.sent().is_empty());
        assert_eq!(rig.machine.step(), TaskStep::ArmRequested);
        rig.advance(StepResult::IsArming);
        assert!(rig.machine.is_idle());
    }

    #[test]
    fn test_arm_requires_strict_idle_screen() {
        let mut rig = Rig::new();
        let (machine, ctx) = rig.parts();
        machine.request_arm("5", ArmType::Full, &ctx).unwrap();
        rig.advance(StepResult::IsDisarmed);
        rig.sent();
        rig.advance(StepResult::ScreenPartArmed);
        assert!(rig.machine.is_idle());
        assert_eq!(rig.sent(), vec![Command::KeyReset, Command::ArmState]);
    }

    #[test]
    fn test_busy_request_rejected_without_mutation() {
        let mut rig = Rig::new();
        let (machine, ctx) = rig.parts();
        machine.request_disarm("1234", &ctx).unwrap();
        machine.take_outputs();
        let err = machine.request_arm("9999", ArmType::Full, &ctx).unwrap_err();
        assert!(matches!(err, BridgeError::Busy { active: Task::Disarm }));
        assert_eq!(machine.task(), Task::Disarm);
        assert_eq!(machine.step(), TaskStep::ConfirmArmed);
        assert_eq!(machine.pending.digits(), b"1234");
        assert!(machine.take_outputs().is_empty());
    }

    #[test]
    fn test_retry_bound_then_abort() {
        let mut rig = Rig::new();
        let (machine, ctx) = rig.parts();
        machine.request_disarm("1", &ctx).unwrap();
        rig.sent();
        for attempt in 1..=3 {
            let (machine, ctx) = rig.parts();
            machine.message_received(false);
            machine.incomplete_message(&ctx);
            assert_eq!(rig.sent(), vec![Command::ArmState]);
            assert_eq!(rig.machine.retries(), attempt);
        }
        let (machine, ctx) = rig.parts();
        machine.incomplete_message(&ctx);
        assert!(rig.machine.is_idle());
        assert_eq!(rig.sent(), vec![Command::KeyReset, Command::ArmState]);
    }

    #[test]
    fn test_command_timeout_retries() {
        let mut rig = Rig::new();
        rig.alarm_state = AlarmState::ArmedAway;
        let (machine, ctx) = rig.parts();
        machine.request_disarm("1", &ctx).unwrap();
        rig.sent();
        rig.poll(Duration::from_millis(1999));
        assert!(rig.sent().is_empty());
        rig.poll(Duration::from_millis(1));
        assert_eq!(rig.sent(), vec![Command::ArmState]);
    }

    #[test]
    fn test_unsolicited_line_keeps_reply_timer() {
        let mut rig = Rig::new();
        rig.alarm_state = AlarmState::ArmedAway;
        let (machine, ctx) = rig.parts();
        machine.request_disarm("1", &ctx).unwrap();
        rig.sent();

        // A zone update line arrives; the gateway handles it without advancing
        rig.now += Duration::from_millis(500);
        rig.machine.message_received(true);
        rig.poll(Duration::from_millis(1500));
        assert_eq!(rig.sent(), vec![Command::ArmState]);
        assert_eq!(rig.machine.retries(), 1);
        rig.poll(Duration::from_secs(2));
        assert_eq!(rig.sent(), vec![Command::ArmState]);
    }

    #[test]
    fn test_disarm_task_timeout() {
        let mut rig = Rig::new();
        let (machine, ctx) = rig.parts();
        machine.request_disarm("1", &ctx).unwrap();
        rig.advance(StepResult::IsArmed);
        rig.advance(StepResult::ScreenIdle);
        rig.poll(Duration::from_millis(1));
        assert_eq!(rig.machine.step(), TaskStep::LoginWait);
        rig.sent();

        rig.poll(Duration::from_secs(10));
        assert!(rig.machine.is_idle());
        assert_eq!(rig.sent(), vec![Command::KeyReset, Command::ArmState]);
    }

    #[test]
    fn test_time_sync_out_of_sync() {
        let mut rig = Rig::new();
        let (machine, ctx) = rig.parts();
        machine.request_query(Task::TimeSync, &ctx).unwrap();
        assert_eq!(rig.machine.step(), TaskStep::QueryLogin);
        rig.poll(Duration::from_millis(1));
        assert_eq!(rig.sent(), vec![Command::Login { code: *b"123456" }]);

        rig.advance(StepResult::Ok);
        assert_eq!(rig.machine.protocol_mode(), ProtocolMode::QueryResponse);
        assert_eq!(rig.sent(), vec![Command::QueryTime]);

        rig.advance(StepResult::TimeCheckOut);
        assert_eq!(rig.sent(), vec![Command::SetTime { at: rig.local }]);
        rig.advance(StepResult::Ok);
        assert_eq!(rig.sent(), vec![Command::Logout]);
        rig.advance(StepResult::Ok);
        assert!(rig.machine.is_idle());
        assert_eq!(rig.machine.protocol_mode(), ProtocolMode::ScreenEmulation);
        assert_eq!(
            rig.machine.take_outputs(),
            vec![Output::Finished { task: Task::TimeSync, success: true }]
        );
    }

    #[test]
    fn test_query_requires_udl_code() {
        let mut rig = Rig::new();
        rig.config.udl_code = "123".to_string();
        let (machine, ctx) = rig.parts();
        assert!(matches!(
            machine.request_query(Task::ZoneSync, &ctx),
            Err(BridgeError::InvalidUdlCode)
        ));
        assert!(rig.machine.is_idle());
    }

    #[test]
    fn test_login_gives_up() {
        let mut rig = Rig::new();
        rig.config.max_login_attempts = 2;
        let (machine, ctx) = rig.parts();
        machine.request_query(Task::ZoneSync, &ctx).unwrap();
        rig.poll(Duration::from_millis(1));
        rig.poll(Duration::from_millis(500));
        assert_eq!(rig.sent().len(), 2);
        rig.poll(Duration::from_millis(500));
        assert!(rig.machine.is_idle());
        assert_eq!(rig.machine.protocol_mode(), ProtocolMode::ScreenEmulation);
        assert_eq!(
            rig.machine.take_outputs(),
            vec![Output::Finished { task: Task::ZoneSync, success: false }]
        );
    }

    #[test]
    fn test_forced_logout() {
        let mut rig = Rig::new();
        let (machine, ctx) = rig.parts();
        machine.request_query(Task::ZoneSync, &ctx).unwrap();
        rig.poll(Duration::from_millis(1));
        rig.advance(StepResult::Ok);
        assert_eq!(rig.machine.step(), TaskStep::ReadZoneState);
        rig.sent();

        rig.poll(Duration::from_secs(30));
        assert_eq!(rig.sent(), vec![Command::Logout]);
        assert_eq!(rig.machine.step(), TaskStep::Logout);

        rig.poll(Duration::from_secs(10));
        assert!(rig.machine.is_idle());
        assert_eq!(rig.machine.protocol_mode(), ProtocolMode::ScreenEmulation);
    }
}
