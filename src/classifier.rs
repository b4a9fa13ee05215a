// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use crate::constants::{
    ARM_STATE_REPLY_LEN, MSG_AREA_IN_ENTRY, MSG_AREA_IN_EXIT, MSG_ARMING_UPDATE, MSG_ARM_UPDATE,
    MSG_DISARM_UPDATE, MSG_ENTRY_UPDATE, MSG_INTRUDER_UPDATE, MSG_QUESTION_ARM,
    MSG_QUESTION_DISARM, MSG_QUESTION_NIGHT_ARM, MSG_QUESTION_PART_ARM, MSG_REPLY_ARMED,
    MSG_REPLY_DISARMED, MSG_SCREEN_ARMED_FULL, MSG_SCREEN_ARMED_NIGHT, MSG_SCREEN_ARMED_PART,
    MSG_SCREEN_IDLE_PART_ARMED, MSG_USER_PIN_LOGIN, MSG_USER_TAG_LOGIN, MSG_WELCOME_BACK,
    MSG_ZONE_UPDATE, UPDATE_LINE_LEN,
};

/// A recognised screen-emulation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMessage {
    /// `"Z0nnns`: zone number and raw state digit
    ZoneUpdate { zone: u16, state: u8 },
    SystemArmed,
    SystemDisarmed,
    EntryWhileArmed,
    SystemArming,
    Intruder,
    /// A user logged in at a keypad, by code or by tag
    UserLogin { user: u8, by_tag: bool },
    /// `"N` reply to ASTATUS
    ReplyDisarmed,
    /// `"Y` reply to ASTATUS
    ReplyArmed,
    ScreenPartArmed,
    ScreenFullArmed,
    ScreenIdle,
    WelcomeBack,
    FullArmPrompt,
    PartArmPrompt,
    NightArmPrompt,
    DisarmPrompt,
    AreaEntry,
    AreaExit,
    Unknown,
}

/// Ordered prefix table for screen-emulation lines.
///
/// The first matching row wins. Order and the length qualifiers matter: the
/// panel reuses prefixes across unrelated screens (`"Part` vs. the idle
/// banner, `"A0` updates vs. longer `"A0` text).
#[derive(Debug, Clone)]
pub struct Classifier {
    idle_screen: Vec<u8>,
}

impl Classifier {
    /// `idle_screen_text` is the idle banner without the leading quote.
    pub fn new(idle_screen_text: &str) -> Self {
        let mut idle_screen = Vec::with_capacity(idle_screen_text.len() + 1);
        idle_screen.push(b'"');
        idle_screen.extend_from_slice(idle_screen_text.as_bytes());
        Self { idle_screen }
    }

    pub fn classify(&self, line: &[u8]) -> ScreenMessage {
        let len = line.len();
        let exact = |n: usize, prefix: &[u8]| len == n && line.starts_with(prefix);
        let at_least = |n: usize, prefix: &[u8]| len >= n && line.starts_with(prefix);
        let starts = |prefix: &[u8]| line.starts_with(prefix);

        if exact(UPDATE_LINE_LEN, MSG_ZONE_UPDATE) {
            if let Some(message) = decode_zone_update(line) {
                return message;
            }
            return ScreenMessage::Unknown;
        }
        if at_least(UPDATE_LINE_LEN, MSG_ARM_UPDATE) {
            return ScreenMessage::SystemArmed;
        }
        if at_least(UPDATE_LINE_LEN, MSG_DISARM_UPDATE) {
            return ScreenMessage::SystemDisarmed;
        }
        if exact(UPDATE_LINE_LEN, MSG_ENTRY_UPDATE) {
            return ScreenMessage::EntryWhileArmed;
        }
        if exact(UPDATE_LINE_LEN, MSG_ARMING_UPDATE) {
            return ScreenMessage::SystemArming;
        }
        if exact(UPDATE_LINE_LEN, MSG_INTRUDER_UPDATE) {
            return ScreenMessage::Intruder;
        }
        if exact(UPDATE_LINE_LEN, MSG_USER_PIN_LOGIN) || exact(UPDATE_LINE_LEN, MSG_USER_TAG_LOGIN) {
            return ScreenMessage::UserLogin {
                user: line[4].wrapping_sub(b'0'),
                by_tag: starts(MSG_USER_TAG_LOGIN),
            };
        }
        if exact(ARM_STATE_REPLY_LEN, MSG_REPLY_DISARMED) {
            return ScreenMessage::ReplyDisarmed;
        }
        if exact(ARM_STATE_REPLY_LEN, MSG_REPLY_ARMED) {
            return ScreenMessage::ReplyArmed;
        }
        if starts(MSG_SCREEN_ARMED_PART)
            || starts(MSG_SCREEN_ARMED_NIGHT)
            || starts(MSG_SCREEN_IDLE_PART_ARMED)
        {
            return ScreenMessage::ScreenPartArmed;
        }
        if starts(MSG_SCREEN_ARMED_FULL) {
            return ScreenMessage::ScreenFullArmed;
        }
        if starts(&self.idle_screen) {
            return ScreenMessage::ScreenIdle;
        }
        if len > MSG_WELCOME_BACK.len() && starts(MSG_WELCOME_BACK) {
            return ScreenMessage::WelcomeBack;
        }
        if starts(MSG_QUESTION_ARM) {
            return ScreenMessage::FullArmPrompt;
        }
        if starts(MSG_QUESTION_PART_ARM) {
            return ScreenMessage::PartArmPrompt;
        }
        if starts(MSG_QUESTION_NIGHT_ARM) {
            return ScreenMessage::NightArmPrompt;
        }
        if starts(MSG_QUESTION_DISARM) {
            return ScreenMessage::DisarmPrompt;
        }
        if starts(MSG_AREA_IN_ENTRY) {
            return ScreenMessage::AreaEntry;
        }
        if starts(MSG_AREA_IN_EXIT) {
            return ScreenMessage::AreaExit;
        }
        ScreenMessage::Unknown
    }
}

/// Zone digits sit at offsets 2..5 (the prefix's own `0` is the hundreds digit),
/// the state digit at offset 5.
fn decode_zone_update(line: &[u8]) -> Option<ScreenMessage> {
    let digits = line.get(2..5)?;
    if !digits.iter().all(u8::is_ascii_digit) || !line[5].is_ascii_digit() {
        return None;
    }
    let zone = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    Some(ScreenMessage::ZoneUpdate {
        zone,
        state: line[5] - b'0',
    })
}
