// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use bitflags::bitflags;

bitflags! {
    /// Zone status flags.
    ///
    /// The bit layout matches the low byte of a zone entry in the panel's
    /// `\Z` reply, so a reply byte can be masked straight into these flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ZoneFlags: u8 {
        /// Zone is active (open / detecting)
        const ACTIVE        = 1 << 0;
        /// Tamper detected
        const TAMPER        = 1 << 1;
        /// Fault (short circuit / masked)
        const FAULT         = 1 << 2;
        /// Zone failed its last test
        const FAILED_TEST   = 1 << 3;
        /// Zone is in alarm
        const ALARMED       = 1 << 4;
        /// Bypassed by a user
        const MANUAL_BYPASS = 1 << 5;
        /// Bypassed automatically by the panel
        const AUTO_BYPASS   = 1 << 6;
    }
}

impl ZoneFlags {
    /// Bits carried by a `\Z` reply low byte. Every other bit is preserved on update.
    pub const QUERY_MASK: Self = Self::ACTIVE.union(Self::TAMPER).union(Self::FAULT);

    /// Bits driven by the state digit of a screen-emulation zone update line.
    pub const SCREEN_MASK: Self = Self::QUERY_MASK;

    /// Decode the state digit of a `"Z0nnns` line.
    ///
    /// `0` clear, `1` active, `2` tamper, `3` fault. Any other digit is unknown.
    pub fn from_screen_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::empty()),
            1 => Some(Self::ACTIVE),
            2 => Some(Self::TAMPER),
            3 => Some(Self::FAULT),
            _ => None,
        }
    }

    /// Get the flags that changed between old and new status.
    pub fn changed(old: Self, new: Self) -> Self {
        old ^ new
    }
}

/// A single zone in the tracked range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Panel zone number
    pub number: u16,
    pub flags: ZoneFlags,
}

impl Zone {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            flags: ZoneFlags::empty(),
        }
    }

    /// Replace the bits in `mask` with those in `value`, keeping the rest.
    ///
    /// Returns the flags that changed.
    pub fn update_masked(&mut self, mask: ZoneFlags, value: ZoneFlags) -> ZoneFlags {
        let old = self.flags;
        self.flags = (old - mask) | (value & mask);
        ZoneFlags::changed(old, self.flags)
    }

    /// Apply the low byte of a `\Z` reply entry.
    pub fn apply_query_byte(&mut self, low: u8) -> ZoneFlags {
        self.update_masked(ZoneFlags::QUERY_MASK, ZoneFlags::from_bits_truncate(low))
    }

    pub fn is_active(&self) -> bool { self.flags.contains(ZoneFlags::ACTIVE) }
    pub fn is_tamper(&self) -> bool { self.flags.contains(ZoneFlags::TAMPER) }
    pub fn is_fault(&self) -> bool { self.flags.contains(ZoneFlags::FAULT) }
    pub fn is_alarmed(&self) -> bool { self.flags.contains(ZoneFlags::ALARMED) }
    pub fn is_bypassed(&self) -> bool {
        self.flags.intersects(ZoneFlags::MANUAL_BYPASS | ZoneFlags::AUTO_BYPASS)
    }
}

/// The contiguous range of zones `[first, first + count)`, stored 0-based.
#[derive(Debug, Clone)]
pub struct ZoneTable {
    first: u16,
    zones: Vec<Zone>,
}

impl ZoneTable {
    pub fn new(first: u8, count: u8) -> Self {
        let first = u16::from(first);
        let zones = (0..u16::from(count)).map(|i| Zone::new(first + i)).collect();
        Self { first, zones }
    }

    pub fn first(&self) -> u16 {
        self.first
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Look up a zone by panel number.
    pub fn get(&self, number: u16) -> Option<&Zone> {
        number
            .checked_sub(self.first)
            .and_then(|i| self.zones.get(usize::from(i)))
    }

    pub fn get_mut(&mut self, number: u16) -> Option<&mut Zone> {
        number
            .checked_sub(self.first)
            .and_then(|i| self.zones.get_mut(usize::from(i)))
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut Zone> {
        self.zones.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_byte_low_bits() {
        let mut zone = Zone::new(1);
        zone.apply_query_byte(0b0000_0011);
        assert!(zone.is_active());
        assert!(zone.is_tamper());
        assert!(!zone.is_fault());

        zone.apply_query_byte(0b0000_0000);
        assert!(!zone.is_active());
        assert!(!zone.is_tamper());
        assert!(!zone.is_fault());
    }

    #[test]
    fn test_query_byte_preserves_other_bits() {
        let mut zone = Zone::new(3);
        zone.flags = ZoneFlags::ALARMED | ZoneFlags::MANUAL_BYPASS | ZoneFlags::ACTIVE;

        // Alarmed bit set in the reply must not leak in, known bits must survive
        let changed = zone.apply_query_byte(0b0001_0100);
        assert_eq!(changed, ZoneFlags::ACTIVE | ZoneFlags::FAULT);
        assert_eq!(
            zone.flags,
            ZoneFlags::ALARMED | ZoneFlags::MANUAL_BYPASS | ZoneFlags::FAULT
        );
        assert!(zone.is_bypassed());
    }

    #[test]
    fn test_screen_digit() {
        assert_eq!(ZoneFlags::from_screen_digit(0), Some(ZoneFlags::empty()));
        assert_eq!(ZoneFlags::from_screen_digit(1), Some(ZoneFlags::ACTIVE));
        assert_eq!(ZoneFlags::from_screen_digit(2), Some(ZoneFlags::TAMPER));
        assert_eq!(ZoneFlags::from_screen_digit(3), Some(ZoneFlags::FAULT));
        assert_eq!(ZoneFlags::from_screen_digit(9), None);
    }

    #[test]
    fn test_zone_table_lookup() {
        let mut table = ZoneTable::new(8, 11);
        assert_eq!(table.len(), 11);
        assert!(table.get(7).is_none());
        assert_eq!(table.get(8).map(|z| z.number), Some(8));
        assert_eq!(table.get(18).map(|z| z.number), Some(18));
        assert!(table.get(19).is_none());

        table.get_mut(10).unwrap().apply_query_byte(1);
        assert!(table.zones()[2].is_active());
    }
}
