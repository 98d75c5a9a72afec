//! MGSDRV (MGS) Binary Music Data Decoder
//!
//! This crate decodes the compressed binary container produced by the
//! MGSC compiler for the MSX MGSDRV music driver into a structured
//! [`MgsDocument`]: container header, transparent decompression, the
//! voice/resource track and up to 17 per-channel command streams.
//!
//! Decoding is a pure function of the input buffer. There is no shared
//! state between calls, so independent documents may be decoded
//! concurrently without synchronization.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("song.mgs")?;
//! let doc = mgs_format::parse_document(&data)?;
//! println!("{} (v{})", doc.title, doc.version);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
mod error;
pub use error::{MgsError, Result};

// Core modules
mod compression;
mod document;
mod duration;
mod format;
mod header;
mod reader;
mod settings;
mod text;
mod track;
mod voice;

// Re-export the decoding entry points and the document model.
pub use compression::{decompress, is_compressed, OUTPUT_CAPACITY};
pub use document::{count_loop_markers, parse_document};
pub use duration::{tick_to_length, TICKS_PER_WHOLE_NOTE};
pub use format::{
    Envelope, MgsDocument, OpllPatch, PatchAlias, SccPatch, Settings, TextResource, TrackCommand,
    TrackData, VoiceData, TRACK_COUNT,
};
pub use header::{read_header, Header, COMPRESSED_VERSION_SENTINEL, MAGIC, TITLE_TERMINATOR};
pub use settings::SettingsFlags;
pub use text::{decode_legacy_text, decode_text_resource, escape_text_payload};
pub use track::decode_channel_track;
pub use voice::decode_voice_track;
