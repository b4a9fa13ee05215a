// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

//! Query/response wire helpers: checksum, frame encoding and reply decoding.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::constants::ZONE_REPLY_STRIDE;

/// Sum of all bytes modulo 256, inverted.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Append the checksum byte to a payload.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

/// Check a frame's trailing checksum byte and return the payload before it.
pub fn verify_frame(frame: &[u8]) -> Option<&[u8]> {
    let (&sum, payload) = frame.split_last()?;
    (checksum(payload) == sum).then_some(payload)
}

/// Decode a `\T?/` reply: day, month, year since 2000, hour, minute.
///
/// Returns `None` if the record is the wrong length or not a real date.
pub fn decode_time(reply: &[u8]) -> Option<NaiveDateTime> {
    let &[day, month, year, hour, minute] = reply else {
        return None;
    };
    NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))?
        .and_hms_opt(u32::from(hour), u32::from(minute), 0)
}

/// Whether the panel clock is within `tolerance_secs` of local time (inclusive).
pub fn time_in_sync(panel: NaiveDateTime, local: NaiveDateTime, tolerance_secs: i64) -> bool {
    let drift = (panel - local).num_seconds().abs();
    debug!("Time - panel: {panel}, local: {local}, drift: {drift}s");
    drift <= tolerance_secs
}

/// Low byte of each two-byte zone entry in a `\Z` reply.
pub fn zone_low_bytes(reply: &[u8]) -> impl Iterator<Item = u8> + '_ {
    reply.chunks_exact(ZONE_REPLY_STRIDE).map(|entry| entry[0])
}
