//! MML Rendering for Decoded MGS Documents
//!
//! Turns an [`mgs_format::MgsDocument`] back into MML source text: the
//! directive header, voice/envelope declarations and one wrapped command
//! block per channel track.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("song.mgs")?;
//! let doc = mgs_format::parse_document(&data)?;
//! print!("{}", mgs_mml::render_mml(&doc));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod builder;
mod opll_voice;

pub use builder::{
    build_header, build_track_mml, build_voice_mml, declare_envelope, declare_opll_voice,
    declare_scc_voice, render_mml,
};
pub use opll_voice::{OpllSlot, OpllVoice};
