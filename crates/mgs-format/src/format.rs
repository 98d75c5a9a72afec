//! Data structures describing decoded MGS containers.

use serde::Serialize;

/// Number of track slots in the offset table (voice track + 17 channels).
pub const TRACK_COUNT: usize = 18;

/// Driver settings stored in the settings byte of the container header.
///
/// Bit 7 of the raw byte is overloaded: on the original container it marks
/// the payload as compressed, while on decompressed (or never-compressed)
/// data the same position means "reverse compilation disabled". The two
/// meanings are kept as distinct fields, populated at different stages of
/// the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// FM (OPLL) mode enabled; track 15 becomes the rhythm channel.
    pub opll_mode: bool,
    /// Software LFO enabled.
    pub lfo_mode: bool,
    /// Target machine identifier (3 bits).
    pub machine_id: u8,
    /// Reverse compilation disabled (bit 7 on plaintext data).
    pub disable_reverse_compile: bool,
    /// The container carried the compression bit before decompression.
    pub was_compressed: bool,
}

/// An FM timbre patch for the OPLL (2-operator) synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpllPatch {
    /// Patch slot (5 bits).
    pub number: u8,
    /// Raw register image, 8 bytes.
    pub data: [u8; 8],
}

/// A wavetable patch for the SCC sound chip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SccPatch {
    /// Patch slot (5 bits).
    pub number: u8,
    /// Raw 32-sample waveform.
    pub data: [u8; 32],
}

/// Redirects one voice slot to another already-defined patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchAlias {
    /// Source patch slot.
    pub from: u8,
    /// Slot that becomes an alias of `from`.
    pub to: u8,
}

/// A text resource embedded in the voice track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextResource {
    /// Resource slot.
    pub number: u8,
    /// Decoded text.
    pub text: String,
}

/// A software volume/pitch envelope.
///
/// Exactly one of the two shapes is stored per record, selected by the
/// high bit of the mode byte in the binary form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Envelope {
    /// Step-sequenced envelope (`@e` declaration).
    Step {
        /// Envelope slot (5 bits).
        number: u8,
        /// Envelope mode selector.
        mode: u8,
        /// Noise frequency selector.
        noise_freq: u8,
        /// Ordered step tokens in MML syntax.
        steps: Vec<String>,
    },
    /// Hardware-style ADSR envelope (`@r` declaration).
    Adsr {
        /// Envelope slot (5 bits).
        number: u8,
        /// Envelope mode selector.
        mode: u8,
        /// Noise frequency selector.
        noise_freq: u8,
        /// Attack level.
        al: u8,
        /// Attack rate.
        ar: u8,
        /// Decay rate.
        dr: u8,
        /// Sustain level.
        sl: u8,
        /// Sustain rate.
        sr: u8,
        /// Release rate.
        rr: u8,
    },
}

/// Decoded contents of the reserved voice/resource track (track 0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceData {
    /// Bytes consumed by the decoder, including the terminator.
    pub byte_length: usize,
    /// OPLL timbre patches in record order.
    pub opll_patches: Vec<OpllPatch>,
    /// SCC wavetable patches in record order.
    pub scc_patches: Vec<SccPatch>,
    /// Envelopes in record order.
    pub envelopes: Vec<Envelope>,
    /// Patch aliases in record order.
    pub aliases: Vec<PatchAlias>,
    /// Embedded text resources in record order.
    pub texts: Vec<TextResource>,
    /// PSG tuning table (12 chromatic entries), when present.
    pub psg_tuning: Option<[u16; 12]>,
    /// OPLL tuning table (12 chromatic entries), when present.
    pub opll_tuning: Option<[u16; 12]>,
}

/// One decoded channel command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackCommand {
    /// Opcode byte the command was decoded from.
    pub opcode: u8,
    /// Rendered MML token.
    pub mml: String,
    /// Duration in ticks, for commands that advance time.
    pub ticks: Option<u32>,
    /// Loop repeat count (0 = infinite) for loop-start commands.
    pub loop_count: Option<u8>,
}

/// Decoded command stream of one channel track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackData {
    /// Track index (1..=17).
    pub track: usize,
    /// Bytes consumed by the decoder, including the terminator.
    pub byte_length: usize,
    /// Commands in source byte order.
    pub commands: Vec<TrackCommand>,
    /// Number of synthesized tie joints from chained duration runs.
    pub extra_ties: u32,
    /// Number of jump markers (`|`) seen in the stream.
    pub loop_marker_count: u32,
}

/// A fully decoded MGS container.
///
/// Construction happens once inside [`crate::parse_document`]; the value
/// is not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MgsDocument {
    /// Three-digit version code (e.g. `"310"`), normalized after
    /// decompression.
    pub version: String,
    /// Song title, transcoded from the legacy encoding.
    pub title: String,
    /// Driver settings.
    pub settings: Settings,
    /// Default tempo (75 when the stored value is zero).
    pub tempo: u16,
    /// Raw byte slices per track slot; `None` where the offset table
    /// entry is zero.
    pub raw_tracks: [Option<Vec<u8>>; TRACK_COUNT],
    /// Decoded voice/resource track (slot 0).
    pub voice: Option<VoiceData>,
    /// Decoded channel tracks (slots 1..=17; slot 0 stays `None`).
    pub tracks: [Option<TrackData>; TRACK_COUNT],
}
