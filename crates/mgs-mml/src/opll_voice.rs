//! Unpacking of the 8-byte OPLL register image into named fields.

/// Parameters of one OPLL operator slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpllSlot {
    /// Amplitude modulation enable.
    pub am: u8,
    /// Pitch modulation (vibrato) enable.
    pub pm: u8,
    /// Envelope type (sustained tone).
    pub eg: u8,
    /// Key-scale rate.
    pub kr: u8,
    /// Frequency multiplier.
    pub ml: u8,
    /// Key-scale level.
    pub kl: u8,
    /// Total level (modulator only; zero on the carrier).
    pub tl: u8,
    /// Attack rate.
    pub ar: u8,
    /// Decay rate.
    pub dr: u8,
    /// Sustain level.
    pub sl: u8,
    /// Release rate.
    pub rr: u8,
    /// Waveform select.
    pub wf: u8,
}

/// A 2-operator OPLL voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpllVoice {
    /// Modulator feedback.
    pub fb: u8,
    /// Modulator (slot 0) and carrier (slot 1).
    pub slots: [OpllSlot; 2],
}

impl OpllVoice {
    /// Unpack the raw register image of an OPLL patch.
    pub fn from_registers(d: &[u8; 8]) -> Self {
        OpllVoice {
            fb: d[3] & 7,
            slots: [
                OpllSlot {
                    am: (d[0] >> 7) & 1,
                    pm: (d[0] >> 6) & 1,
                    eg: (d[0] >> 5) & 1,
                    kr: (d[0] >> 4) & 1,
                    ml: d[0] & 0xf,
                    kl: (d[2] >> 6) & 3,
                    tl: d[2] & 0x3f,
                    ar: (d[4] >> 4) & 0xf,
                    dr: d[4] & 0xf,
                    sl: (d[6] >> 4) & 0xf,
                    rr: d[6] & 0xf,
                    wf: (d[3] >> 3) & 1,
                },
                OpllSlot {
                    am: (d[1] >> 7) & 1,
                    pm: (d[1] >> 6) & 1,
                    eg: (d[1] >> 5) & 1,
                    kr: (d[1] >> 4) & 1,
                    ml: d[1] & 0xf,
                    kl: (d[3] >> 6) & 3,
                    tl: 0,
                    ar: (d[5] >> 4) & 0xf,
                    dr: d[5] & 0xf,
                    sl: (d[7] >> 4) & 0xf,
                    rr: d[7] & 0xf,
                    wf: (d[3] >> 4) & 1,
                },
            ],
        }
    }
}
