//! Decoding of the reserved voice/resource track (track 0).

use crate::error::{MgsError, Result};
use crate::format::{Envelope, OpllPatch, PatchAlias, SccPatch, TextResource, VoiceData};
use crate::reader::ByteReader;
use crate::text::decode_text_resource;

/// Patch and envelope slots are 5-bit.
const SLOT_MASK: u8 = 0x1f;

/// Terminator for the voice track and the channel streams alike.
const TRACK_TERMINATOR: u8 = 0xff;

/// Decode the track-0 payload into patches, envelopes, tuning tables,
/// text resources and aliases.
///
/// Record framing is strict: an opcode outside the table means the
/// framing is lost and decoding fails with [`MgsError::UnknownOpcode`].
pub fn decode_voice_track(data: &[u8]) -> Result<VoiceData> {
    let mut r = ByteReader::new(data);
    let mut voice = VoiceData::default();

    while let Some(opcode) = r.peek() {
        let at = r.pos();
        r.read_u8("voice record tag")?;
        match opcode {
            0x00 => {
                let number = r.read_u8("OPLL patch id")? & SLOT_MASK;
                let data = r.read_array::<8>("OPLL patch data")?;
                voice.opll_patches.push(OpllPatch { number, data });
            }
            0x01 => {
                let from = r.read_u8("patch alias")?;
                let to = r.read_u8("patch alias")?;
                voice.aliases.push(PatchAlias { from, to });
            }
            0x02 => voice.envelopes.push(decode_envelope(&mut r)?),
            0x03 => {
                let number = r.read_u8("SCC patch id")? & SLOT_MASK;
                let data = r.read_array::<32>("SCC waveform")?;
                voice.scc_patches.push(SccPatch { number, data });
            }
            0x04 => voice.psg_tuning = Some(read_tuning_table(&mut r, "PSG tuning table")?),
            0x05 => voice.opll_tuning = Some(read_tuning_table(&mut r, "OPLL tuning table")?),
            0x06 => {
                let number = r.read_u8("text resource id")?;
                let raw = r.read_until_nul();
                voice.texts.push(TextResource {
                    number,
                    text: decode_text_resource(raw),
                });
            }
            TRACK_TERMINATOR => break,
            other => {
                return Err(MgsError::UnknownOpcode {
                    opcode: other,
                    offset: at,
                    context: "voice track",
                });
            }
        }
    }

    voice.byte_length = r.pos();
    Ok(voice)
}

fn read_tuning_table(r: &mut ByteReader, context: &'static str) -> Result<[u16; 12]> {
    let mut table = [0u16; 12];
    for entry in &mut table {
        *entry = r.read_u16_le(context)?;
    }
    Ok(table)
}

fn decode_envelope(r: &mut ByteReader) -> Result<Envelope> {
    let number = r.read_u8("envelope id")? & SLOT_MASK;
    let m = r.read_u8("envelope mode")?;
    let mode = (m & 0x7f) >> 5;
    let noise_freq = m & 0x1f;
    if m & 0x80 != 0 {
        Ok(Envelope::Adsr {
            number,
            mode,
            noise_freq,
            al: r.read_u8("ADSR envelope")?,
            ar: r.read_u8("ADSR envelope")?,
            dr: r.read_u8("ADSR envelope")?,
            sl: r.read_u8("ADSR envelope")?,
            sr: r.read_u8("ADSR envelope")?,
            rr: r.read_u8("ADSR envelope")?,
        })
    } else {
        let len = r.read_u8("step envelope length")? as usize;
        let body = r.read_slice(len, "step envelope body")?;
        Ok(Envelope::Step {
            number,
            mode,
            noise_freq,
            steps: decode_step_envelope(body)?,
        })
    }
}

/// Decode the step-envelope grammar into MML step tokens.
///
/// The opcode space is small and fixed; anything outside it is fatal.
fn decode_step_envelope(data: &[u8]) -> Result<Vec<String>> {
    let mut r = ByteReader::new(data);
    let mut steps = Vec::new();

    while let Some(opcode) = r.peek() {
        let at = r.pos();
        r.read_u8("step opcode")?;
        let token = match opcode {
            c if c < 0x10 => format!("{c:x}"),
            0x10 => {
                let n = r.read_u8("step operand")?;
                format!("@{n}.")
            }
            0x11 => {
                let n1 = r.read_u8("step operand")?;
                let n2 = r.read_u8("step operand")?;
                format!("y{n1},{n2}.")
            }
            0x12 => {
                let n = r.read_i8("step operand")?;
                format!("\\{n}.")
            }
            c @ 0x20..=0x2f => {
                let n = r.read_u8("step operand")?;
                format!("{:x}={n}.", c & 0xf)
            }
            0x40 => "[".to_string(),
            0x60 => {
                let n = r.read_u8("step operand")?;
                format!("]{n}.")
            }
            c @ 0x80..=0x9f => format!("n{}.", c & 0x1f),
            c @ 0xa0..=0xaf => format!("/{}.", c & 0x3),
            c @ 0xe0..=0xef => {
                let n = r.read_u8("step operand")?;
                format!("{:x}:{n}.", c & 0xf)
            }
            other => {
                return Err(MgsError::UnknownOpcode {
                    opcode: other,
                    offset: at,
                    context: "step envelope",
                });
            }
        };
        steps.push(token);
    }

    Ok(steps)
}
