// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::codec::encode_frame;
use crate::constants::{CR, FRAME_END, FRAME_START, LF, UDL_CODE_LEN};

/// Everything the gateway can send to the panel.
///
/// # Screen emulation
///
/// Keypresses and screen requests are plain ASCII lines terminated by CRLF:
///
/// ```text
/// KEY0..KEY9   digit key
/// KEYY         "yes" / confirm
/// KEYD         cursor down
/// KEYR         reset / escape
/// ASTATUS      ask for the armed state ("N / "Y reply)
/// LSTATUS      ask for the current screen text
/// ```
///
/// # Query/response
///
/// Structured commands are `\` + letter + binary parameters + `/`, followed by
/// a checksum byte and no line terminator:
///
/// ```text
/// \W<code>/    login with the six character UDL code
/// \H/          logout (hang up)
/// \T?/         read the panel clock
/// \T<dmyhm>/   set the panel clock
/// \Z<f><n>/    read n zones starting at f
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// A single digit key, as its ASCII character
    Key(u8),
    KeyYes,
    KeyDown,
    KeyReset,
    /// `ASTATUS`
    ArmState,
    /// `LSTATUS`
    Screen,
    Login { code: [u8; UDL_CODE_LEN] },
    Logout,
    QueryTime,
    SetTime { at: NaiveDateTime },
    QueryZones { first: u8, count: u8 },
}

impl Command {
    /// Whether this is a checksummed query/response frame.
    pub fn is_framed(&self) -> bool {
        matches!(
            self,
            Command::Login { .. }
                | Command::Logout
                | Command::QueryTime
                | Command::SetTime { .. }
                | Command::QueryZones { .. }
        )
    }

    /// Bytes before the line terminator or checksum.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::Key(digit) => vec![b'K', b'E', b'Y', *digit],
            Command::KeyYes => b"KEYY".to_vec(),
            Command::KeyDown => b"KEYD".to_vec(),
            Command::KeyReset => b"KEYR".to_vec(),
            Command::ArmState => b"ASTATUS".to_vec(),
            Command::Screen => b"LSTATUS".to_vec(),
            Command::Login { code } => framed(b'W', code),
            Command::Logout => framed(b'H', &[]),
            Command::QueryTime => framed(b'T', b"?"),
            Command::SetTime { at } => {
                let year = u8::try_from(at.year() - 2000).unwrap_or(0);
                #[allow(clippy::cast_possible_truncation)]
                let fields = [
                    at.day() as u8,
                    at.month() as u8,
                    year,
                    at.hour() as u8,
                    at.minute() as u8,
                ];
                framed(b'T', &fields)
            }
            Command::QueryZones { first, count } => framed(b'Z', &[*first, *count]),
        }
    }

    /// Complete bytes to write to the serial line.
    pub fn to_wire(&self) -> Vec<u8> {
        let payload = self.payload();
        if self.is_framed() {
            encode_frame(&payload)
        } else {
            let mut line = payload;
            line.extend_from_slice(&[CR, LF]);
            line
        }
    }
}

fn framed(letter: u8, params: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(params.len() + 3);
    frame.push(FRAME_START);
    frame.push(letter);
    frame.extend_from_slice(params);
    frame.push(FRAME_END);
    frame
}

/// Codes are never printed.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Key(_) => f.write_str("KEY*"),
            Command::Login { .. } => f.write_str("\\W******/"),
            Command::SetTime { at } => write!(f, "\\T{}/", at.format("%d/%m/%y %H:%M")),
            Command::QueryZones { first, count } => write!(f, "\\Z {first} {count}/"),
            other => f.write_str(&String::from_utf8_lossy(&other.payload())),
        }
    }
}
