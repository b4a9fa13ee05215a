// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::constants::UDL_CODE_LEN;
use crate::framer::FrameRule;
use crate::protocol::Command;

/// Which protocol the panel is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    #[default]
    ScreenEmulation,
    QueryResponse,
}

/// Where the login/logout ritual stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiatorState {
    #[default]
    Idle,
    LoginRequired,
    LoginInProgress,
    Active,
    LogoutInProgress,
}

/// Outcome of polling the login cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    Wait,
    Send(Command),
    /// Attempts exhausted without an OK
    GiveUp,
}

/// Outcome of polling the query-response safety deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyAction {
    None,
    /// Session ran too long: ask the panel to hang up
    SendLogout,
    /// The logout was not acknowledged either
    ForceScreenEmulation,
}

/// Owns the protocol mode and the transitions between the two modes.
#[derive(Debug, Default)]
pub struct Negotiator {
    mode: ProtocolMode,
    state: NegotiatorState,
    login_attempts: u32,
    last_login_sent: Option<Instant>,
    deadline: Option<Instant>,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    pub fn login_attempts(&self) -> u32 {
        self.login_attempts
    }

    /// Replies are checksummed in query-response mode and during the login
    /// handshake, which is answered in the query-response format.
    pub fn frame_rule(&self) -> FrameRule {
        if self.mode == ProtocolMode::QueryResponse || self.state == NegotiatorState::LoginInProgress {
            FrameRule::Checksummed
        } else {
            FrameRule::Line
        }
    }

    /// A query task wants the panel in query-response mode.
    pub fn require_login(&mut self) {
        self.state = NegotiatorState::LoginRequired;
    }

    pub fn start_login(&mut self) {
        info!("Starting query login");
        self.state = NegotiatorState::LoginInProgress;
        self.login_attempts = 0;
        self.last_login_sent = None;
    }

    /// Send the login frame every `interval`, up to `max_attempts` times.
    pub fn poll_login(
        &mut self,
        now: Instant,
        udl_code: &str,
        interval: Duration,
        max_attempts: u32,
    ) -> LoginPoll {
        if self.state != NegotiatorState::LoginInProgress {
            return LoginPoll::Wait;
        }
        if let Some(last) = self.last_login_sent {
            if now.saturating_duration_since(last) < interval {
                return LoginPoll::Wait;
            }
        }
        if self.login_attempts >= max_attempts {
            warn!("Query login abandoned after {} attempts", self.login_attempts);
            self.state = NegotiatorState::Idle;
            self.last_login_sent = None;
            return LoginPoll::GiveUp;
        }

        let mut code = [b'0'; UDL_CODE_LEN];
        for (slot, byte) in code.iter_mut().zip(udl_code.bytes()) {
            *slot = byte;
        }
        self.login_attempts += 1;
        self.last_login_sent = Some(now);
        info!("Performing query login (attempt {})", self.login_attempts);
        LoginPoll::Send(Command::Login { code })
    }

    /// OK received for the login frame: switch modes and arm the safety deadline.
    pub fn login_confirmed(&mut self, now: Instant, session_timeout: Duration) {
        info!("Query login confirmed");
        self.mode = ProtocolMode::QueryResponse;
        self.state = NegotiatorState::Active;
        self.last_login_sent = None;
        self.deadline = Some(now + session_timeout);
    }

    pub fn start_logout(&mut self) -> Command {
        self.state = NegotiatorState::LogoutInProgress;
        Command::Logout
    }

    pub fn logout_confirmed(&mut self) {
        info!("Logout confirmed");
        self.reset();
    }

    /// Check the safety deadline. `logging_out` is whether the active task is
    /// already waiting on a logout.
    pub fn poll_deadline(&mut self, now: Instant, logging_out: bool, grace: Duration) -> SafetyAction {
        let Some(deadline) = self.deadline else {
            return SafetyAction::None;
        };
        if self.mode != ProtocolMode::QueryResponse || now < deadline {
            return SafetyAction::None;
        }
        if logging_out {
            warn!("Query logout failed and was forced");
            self.reset();
            SafetyAction::ForceScreenEmulation
        } else {
            warn!("Query session timeout, logging out");
            self.deadline = Some(now + grace);
            self.state = NegotiatorState::LogoutInProgress;
            SafetyAction::SendLogout
        }
    }

    /// Back to screen emulation with nothing in flight.
    pub fn reset(&mut self) {
        self.mode = ProtocolMode::ScreenEmulation;
        self.state = NegotiatorState::Idle;
        self.login_attempts = 0;
        self.last_login_sent = None;
        self.deadline = None;
    }
}
