// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::time::Duration;

/// Line terminator bytes.
pub const CR: u8 = 0x0D;
pub const LF: u8 = 0x0A;

/// Query/response frame delimiters.
pub const FRAME_START: u8 = b'\\';
pub const FRAME_END: u8 = b'/';

/// Accumulation buffer bound; a full buffer is force-emitted.
pub const MAX_MESSAGE_SIZE: usize = 100;

/// Largest payload that still fits a checksummed frame plus CRLF.
pub const MAX_FRAME_PAYLOAD: usize = MAX_MESSAGE_SIZE - 2;

/// Serial line settings required by the panel.
pub const BAUD_RATE: u32 = 19_200;

// ---------------------------------------------------------------------------
// Screen emulation ("Crestron") messages. Every line starts with a double quote.
// ---------------------------------------------------------------------------

pub const MSG_ZONE_UPDATE: &[u8] = b"\"Z0";
pub const MSG_ARM_UPDATE: &[u8] = b"\"A0";
pub const MSG_DISARM_UPDATE: &[u8] = b"\"D0";
pub const MSG_ENTRY_UPDATE: &[u8] = b"\"E0";
pub const MSG_ARMING_UPDATE: &[u8] = b"\"X0";
pub const MSG_INTRUDER_UPDATE: &[u8] = b"\"L0";

pub const MSG_USER_PIN_LOGIN: &[u8] = b"\"U0";
pub const MSG_USER_TAG_LOGIN: &[u8] = b"\"T0";

pub const MSG_REPLY_DISARMED: &[u8] = b"\"N";
pub const MSG_REPLY_ARMED: &[u8] = b"\"Y";

pub const MSG_WELCOME_BACK: &[u8] = b"\"  Welcome Back";
pub const MSG_SCREEN_IDLE_PART_ARMED: &[u8] = b"\" * PART ARMED *";

pub const MSG_SCREEN_ARMED_PART: &[u8] = b"\"Part";
pub const MSG_SCREEN_ARMED_NIGHT: &[u8] = b"\"Night";
pub const MSG_SCREEN_ARMED_FULL: &[u8] = b"\"Area FULL ARMED";

pub const MSG_QUESTION_ARM: &[u8] = b"\"Do you want to  Arm System?";
pub const MSG_QUESTION_PART_ARM: &[u8] = b"\"Do you want to  Part Arm System?";
pub const MSG_QUESTION_NIGHT_ARM: &[u8] = b"\"Do you want:-   Night Arm";
pub const MSG_QUESTION_DISARM: &[u8] = b"\"Do you want to  Disarm System?";

pub const MSG_AREA_IN_ENTRY: &[u8] = b"\"Area in Entry";
pub const MSG_AREA_IN_EXIT: &[u8] = b"\"Area in Exit >";

/// Idle screen banner text (after the leading quote). Site specific.
pub const DEFAULT_IDLE_SCREEN_TEXT: &str = "  The Cooper's";

/// Length of zone-update and event-update lines.
pub const UPDATE_LINE_LEN: usize = 6;

/// Length of ASTATUS reply lines.
pub const ARM_STATE_REPLY_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Query/response replies
// ---------------------------------------------------------------------------

pub const REPLY_OK: &[u8] = b"OK";
pub const REPLY_ERROR: &[u8] = b"ERROR";

/// Length of the panel's `\T?/` reply: day, month, year, hour, minute.
pub const TIME_REPLY_LEN: usize = 5;

/// Bytes per zone in a `\Z` reply.
pub const ZONE_REPLY_STRIDE: usize = 2;

/// Largest zone range whose `\Z` reply, checksum and CR fit the receive buffer.
pub const MAX_ZONE_COUNT: u8 = 48;

/// Length of the UDL code sent in the login frame.
pub const UDL_CODE_LEN: usize = 6;

/// Longest user code accepted for keypad login.
pub const MAX_USER_CODE_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

pub const STALE_MESSAGE_TIMEOUT: Duration = Duration::from_millis(50);
pub const PIN_ENTRY_DELAY: Duration = Duration::from_millis(500);
pub const PROMPT_DELAY: Duration = Duration::from_millis(500);
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
pub const MAX_RETRIES: u8 = 3;
pub const ARM_TIMEOUT: Duration = Duration::from_secs(15);
pub const DISARM_TIMEOUT: Duration = Duration::from_secs(10);
pub const LOGIN_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_LOGIN_ATTEMPTS: u32 = 10;
pub const QUERY_SESSION_TIMEOUT: Duration = Duration::from_secs(30);
pub const FORCED_LOGOUT_GRACE: Duration = Duration::from_secs(10);
pub const ZONE_SYNC_INTERVAL: Duration = Duration::from_secs(180);
pub const TRIGGER_ZONE_SYNC_DELAY: Duration = Duration::from_secs(5);
pub const TIME_TOLERANCE_SECS: i64 = 120;
