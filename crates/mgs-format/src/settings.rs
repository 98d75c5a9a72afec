//! Settings-byte decoding.

use bitflags::bitflags;

use crate::format::Settings;

bitflags! {
    /// Raw settings byte stored after the title terminator.
    ///
    /// Bits 2..=4 hold the machine id and are not part of the flag set;
    /// use [`machine_id`] to extract them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SettingsFlags: u8 {
        /// FM (OPLL) mode enabled.
        const OPLL_MODE = 0x01;
        /// Software LFO enabled.
        const LFO_MODE = 0x02;
        /// Payload is compressed (meaning of bit 7 on the original
        /// container, before decompression).
        const COMPRESSED = 0x80;
        /// Reverse compilation disabled (meaning of the same bit on
        /// plaintext data).
        const DISABLE_REVERSE_COMPILE = 0x80;
    }
}

/// Machine id field of the raw settings byte (bits 2..=4).
pub fn machine_id(raw: u8) -> u8 {
    (raw >> 2) & 7
}

impl Settings {
    /// Interpret a plaintext-pass settings byte.
    ///
    /// `was_compressed` comes from the first (pre-decompression) header
    /// pass; bit 7 of `raw` is read with its plaintext meaning.
    pub fn from_raw(raw: u8, was_compressed: bool) -> Self {
        let flags = SettingsFlags::from_bits_truncate(raw);
        Settings {
            opll_mode: flags.contains(SettingsFlags::OPLL_MODE),
            lfo_mode: flags.contains(SettingsFlags::LFO_MODE),
            machine_id: machine_id(raw),
            disable_reverse_compile: flags.contains(SettingsFlags::DISABLE_REVERSE_COMPILE),
            was_compressed,
        }
    }
}
