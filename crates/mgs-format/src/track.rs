//! Decoding of per-channel opcode streams.

use crate::duration::{byte_ticks, tick_to_length};
use crate::error::Result;
use crate::format::{TrackCommand, TrackData};
use crate::reader::ByteReader;

/// Pitch-class table; entries 12..=15 are rests.
const NOTE_NAMES: [&str; 16] = [
    "c", "c+", "d", "d+", "e", "f", "f+", "g", "g+", "a", "a+", "b", "r", "r", "r", "r",
];

/// Rhythm-voice volume register names, selected by the operand's top bits.
const RHYTHM_VOLUME_NAMES: [&str; 5] = ["vb", "vs", "vm", "vc", "vh"];

/// Tracks below this index drive FM channel pairs whose pitch registers
/// carry mirrored polarity; detune and sweep amounts flip sign for them.
const MIRRORED_PITCH_TRACKS: usize = 9;

/// Channel forced into rhythm mode when the container enables OPLL mode.
pub(crate) const RHYTHM_TRACK: usize = 15;

const TRACK_TERMINATOR: u8 = 0xff;

/// Explicit decode-time state threaded through the opcode handlers.
struct DecodeState {
    /// Current octave, 0..=7 (rendered as `o1`..`o8`).
    octave: u8,
    /// Default note duration in ticks.
    default_ticks: u32,
    /// This stream uses the rhythm-voice note encoding.
    rhythm: bool,
}

/// A note duration, possibly chained into a tie run.
///
/// Durations longer than one byte can express are stored as
/// terminator-prefixed segments: `0xff d` for the first, another
/// `0xff d` per continuation. A plain byte stands alone.
struct DurationRun {
    first: u8,
    extras: Vec<u8>,
}

impl DurationRun {
    fn ticks(&self) -> u32 {
        byte_ticks(self.first) + self.extras.iter().map(|&b| byte_ticks(b)).sum::<u32>()
    }

    /// Length tokens joined by tie markers.
    fn render(&self) -> String {
        let mut out = tick_to_length(self.first as u32);
        for &b in &self.extras {
            out.push('&');
            out.push_str(&tick_to_length(b as u32));
        }
        out
    }

    fn tie_joints(&self) -> u32 {
        self.extras.len() as u32
    }
}

fn read_duration_run(r: &mut ByteReader) -> Result<DurationRun> {
    let first = r.read_u8("note duration")?;
    if first != TRACK_TERMINATOR {
        return Ok(DurationRun {
            first,
            extras: Vec::new(),
        });
    }
    let first = r.read_u8("note duration")?;
    let mut extras = Vec::new();
    // Each continuation carries its own 0xff prefix. The loop needs two
    // remaining bytes: a final lone 0xff is the track terminator.
    while r.peek() == Some(TRACK_TERMINATOR) && r.remaining() >= 2 {
        r.read_u8("tie prefix")?;
        extras.push(r.read_u8("tie duration")?);
    }
    Ok(DurationRun { first, extras })
}

/// Rhythm-voice note name from the 5 instrument flag bits.
fn rhythm_note(flag: u8) -> String {
    if flag == 0 {
        return "r".to_string();
    }
    let mut name = String::new();
    for (bit, ch) in [(0x10u8, 'b'), (0x08, 's'), (0x04, 'm'), (0x02, 'c'), (0x01, 'h')] {
        if flag & bit != 0 {
            name.push(ch);
        }
    }
    name
}

fn is_octave_opcode(op: u8) -> bool {
    matches!(op, 0x4e | 0x4f | 0xd0..=0xdf)
}

fn octave_command(op: u8, state: &mut DecodeState) -> TrackCommand {
    let mml = match op {
        0x4e => {
            state.octave = (state.octave + 1).min(7);
            ">".to_string()
        }
        0x4f => {
            state.octave = state.octave.saturating_sub(1);
            "<".to_string()
        }
        _ => {
            state.octave = op & 0x07;
            format!("o{}", (op & 0x07) + 1)
        }
    };
    command(op, mml)
}

fn command(opcode: u8, mml: impl Into<String>) -> TrackCommand {
    TrackCommand {
        opcode,
        mml: mml.into(),
        ticks: None,
        loop_count: None,
    }
}

fn note_command(opcode: u8, mml: String, ticks: u32) -> TrackCommand {
    TrackCommand {
        opcode,
        mml,
        ticks: Some(ticks),
        loop_count: None,
    }
}

/// Decode one channel opcode stream.
///
/// Decoding stops at the `0xff` terminator or the end of the slice.
/// Unknown opcodes are reported and skipped; real-world files depend on
/// the driver's tolerance here, unlike the strict voice records.
pub fn decode_channel_track(data: &[u8], track: usize, rhythm: bool) -> Result<TrackData> {
    let mut r = ByteReader::new(data);
    let mut commands = Vec::new();
    let mut state = DecodeState {
        octave: 4,
        default_ticks: 48,
        rhythm,
    };
    let mut extra_ties = 0u32;
    let mut loop_marker_count = 0u32;

    while r.peek().is_some() {
        let at = r.pos();
        let opcode = r.read_u8("channel opcode")?;
        if opcode == TRACK_TERMINATOR {
            break;
        }
        match opcode {
            c if state.rhythm && c & 0xe0 == 0x20 => {
                let run = read_duration_run(&mut r)?;
                extra_ties += run.tie_joints();
                let mml = format!("{}{}", rhythm_note(c & 0x1f), run.render());
                commands.push(note_command(c, mml, run.ticks()));
            }
            c if state.rhythm && c & 0xe0 == 0xa0 => {
                let mml = format!("{}:", rhythm_note(c & 0x1f));
                commands.push(note_command(c, mml, state.default_ticks));
            }
            // Driver 3.00 encoding, explicit duration.
            c @ 0x00..=0x0c => {
                let run = read_duration_run(&mut r)?;
                extra_ties += run.tie_joints();
                let mml = format!("{}{}", NOTE_NAMES[(c & 0xf) as usize], run.render());
                commands.push(note_command(c, mml, run.ticks()));
            }
            // Driver 3.00 encoding, default duration.
            c @ 0x10..=0x1c => {
                let mml = NOTE_NAMES[(c & 0xf) as usize].to_string();
                commands.push(note_command(c, mml, state.default_ticks));
            }
            c @ 0x20..=0x2f => {
                let run = read_duration_run(&mut r)?;
                extra_ties += run.tie_joints();
                let mml = format!("{}{}", NOTE_NAMES[(c & 0xf) as usize], run.render());
                commands.push(note_command(c, mml, run.ticks()));
            }
            c @ 0x30..=0x3f => {
                let mml = NOTE_NAMES[(c & 0xf) as usize].to_string();
                commands.push(note_command(c, mml, state.default_ticks));
            }
            0x40 => commands.push(command(opcode, "&")),
            0x41 => {
                let value = r.read_u16_le("tempo")?;
                // Precomputed timer table; derivable from the value.
                r.skip(48);
                commands.push(command(opcode, format!("t{value}")));
            }
            0x42 => {
                let n = r.read_u8("default length")?;
                state.default_ticks = byte_ticks(n);
                commands.push(command(opcode, format!("l{}", tick_to_length(n as u32))));
            }
            0x43 => {
                let n = r.read_u16_le("default length")?;
                state.default_ticks = if n == 0 { 256 } else { n as u32 };
                commands.push(command(opcode, format!("l{}", tick_to_length(n as u32))));
            }
            0x44 => {
                let n = r.read_u8("quantize")?;
                commands.push(command(opcode, format!("q{n}")));
            }
            0x45 => {
                let n = r.read_u8("rhythm volume")?;
                match RHYTHM_VOLUME_NAMES.get((n >> 5) as usize) {
                    Some(name) => commands.push(command(opcode, format!("{name}{}", n & 0xf))),
                    None => tracing::warn!(
                        operand = n,
                        offset = at,
                        track,
                        "rhythm volume register out of range"
                    ),
                }
            }
            0x46 => {
                let n = r.read_i8("relative volume")?;
                let mml = if n >= 0 {
                    format!("v+{n}")
                } else {
                    format!("v{n}")
                };
                commands.push(command(opcode, mml));
            }
            0x47 => {
                let n = r.read_u8("rhythm volume")?;
                let sign = if n & 0x10 != 0 { '-' } else { '+' };
                match RHYTHM_VOLUME_NAMES.get((n >> 5) as usize) {
                    Some(name) => {
                        commands.push(command(opcode, format!("{name}{sign}{}", n & 0xf)))
                    }
                    None => tracing::warn!(
                        operand = n,
                        offset = at,
                        track,
                        "rhythm volume register out of range"
                    ),
                }
            }
            0x48 => {
                let n = r.read_u8("key shift")?;
                commands.push(command(opcode, format!("k{n}")));
            }
            0x49 => {
                let n = r.read_u8("envelope select")?;
                commands.push(command(opcode, format!("@e{n}")));
            }
            0x4a => commands.push(command(opcode, "/")),
            0x4b => {
                let n = r.read_u8("sustain")?;
                commands.push(command(opcode, format!("s{n}")));
            }
            0x4c => {
                let n = r.read_u16_le("modulation")?;
                commands.push(command(opcode, format!("m{n}")));
            }
            0x4d => {
                let n = r.read_u8("noise frequency")?;
                commands.push(command(opcode, format!("n{n}")));
            }
            0x4e | 0x4f => commands.push(octave_command(opcode, &mut state)),
            0x50 => {
                let n = r.read_i8("detune")?;
                let amount = if track < MIRRORED_PITCH_TRACKS {
                    -(n as i32)
                } else {
                    n as i32
                };
                commands.push(command(opcode, format!("\\{amount}")));
            }
            0x51 => {
                let n = r.read_i16_le("detune")?;
                commands.push(command(opcode, format!("@\\{n}")));
            }
            0x52 => {
                let n = r.read_u8("pan")?;
                commands.push(command(opcode, format!("p{n}")));
            }
            0x53 => {
                let key = r.read_u8("portamento target")?;
                let mml = format!("{}_", NOTE_NAMES[(key & 0xf) as usize]);
                commands.push(command(opcode, mml));
                // The driver applies octave changes one note late while
                // a portamento is pending; the compiler stores them
                // after the target and they take effect at this point.
                while let Some(next) = r.peek() {
                    if !is_octave_opcode(next) {
                        break;
                    }
                    r.read_u8("octave command")?;
                    commands.push(octave_command(next, &mut state));
                }
            }
            0x54 => {
                let n1 = r.read_u8("pitch sweep")?;
                let n2 = r.read_u8("pitch sweep")?;
                let n3 = r.read_u8("pitch sweep")?;
                let n4 = r.read_i8("pitch sweep")?;
                let amount = if track < MIRRORED_PITCH_TRACKS {
                    -(n4 as i32)
                } else {
                    n4 as i32
                };
                let mml = format!("h{},{n2},{},{amount}", n1 as i32 - 1, n3 as i32 - 1);
                commands.push(command(opcode, mml));
            }
            0x55 => {
                let n = r.read_u16_le("pitch bend")?;
                commands.push(command(opcode, format!("@p{n}")));
            }
            0x57 => {
                let n = r.read_u8("loop count")?;
                r.skip(2); // loop-end pointer
                commands.push(TrackCommand {
                    opcode,
                    mml: format!("[{n}"),
                    ticks: None,
                    loop_count: Some(n),
                });
            }
            0x58 => {
                r.skip(2); // jump pointer
                loop_marker_count += 1;
                commands.push(command(opcode, "|"));
            }
            0x59 => {
                r.skip(3); // nest level + loop-start pointer
                commands.push(command(opcode, "]"));
            }
            0x5a => {
                let n = r.read_u8("hardware envelope switch")?;
                commands.push(command(opcode, if n > 0 { "ho" } else { "hf" }));
            }
            0x5b => {
                let n = r.read_u8("sustain switch")?;
                commands.push(command(opcode, if n > 0 { "so" } else { "sf" }));
            }
            0x5c => {
                let n1 = r.read_u8("register write")?;
                let n2 = r.read_u8("register write")?;
                commands.push(command(opcode, format!("y{n1},{n2}")));
            }
            0x5d => commands.push(command(opcode, "$")),
            0x5f => {
                let n = r.read_i8("detune")?;
                commands.push(command(opcode, format!("@\\{n}")));
            }
            0x60 => {
                let n = r.read_u8("modulation select")?;
                commands.push(command(opcode, format!("@m{n}")));
            }
            0x61 => {
                let n = r.read_u8("output select")?;
                commands.push(command(opcode, format!("@o{n}")));
            }
            0x63 => commands.push(command(opcode, "@f")),
            0x64 => commands.push(command(opcode, "hi")),
            c @ 0x80..=0x9f => commands.push(command(c, format!("@{}", c & 0x1f))),
            c @ 0xc0..=0xcf => commands.push(command(c, format!("v{}", c & 0xf))),
            c @ 0xd0..=0xdf => commands.push(octave_command(c, &mut state)),
            other => {
                tracing::warn!(opcode = other, offset = at, track, "unknown channel command");
            }
        }
    }

    Ok(TrackData {
        track,
        byte_length: r.pos(),
        commands,
        extra_ties,
        loop_marker_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> TrackData {
        decode_channel_track(data, 1, false).unwrap()
    }

    fn tokens(track: &TrackData) -> Vec<&str> {
        track.commands.iter().map(|c| c.mml.as_str()).collect()
    }

    #[test]
    fn test_note_with_explicit_duration() {
        let track = decode(&[0x20, 0x60, 0xff]);
        assert_eq!(track.commands.len(), 1);
        assert_eq!(track.commands[0].mml, "c2");
        assert_eq!(track.commands[0].ticks, Some(96));
        assert_eq!(track.byte_length, 3);
    }

    #[test]
    fn test_pitch_class_table() {
        let track = decode(&[0x24, 0x30, 0x2b, 0x30, 0x3c, 0xff]);
        assert_eq!(tokens(&track), ["e4", "b4", "r"]);
    }

    #[test]
    fn test_default_duration_is_updated_by_length_commands() {
        let track = decode(&[0x30, 0x42, 0x18, 0x30, 0xff]);
        assert_eq!(tokens(&track), ["c", "l8", "c"]);
        assert_eq!(track.commands[0].ticks, Some(48));
        assert_eq!(track.commands[2].ticks, Some(24));
    }

    #[test]
    fn test_extended_length_command() {
        let track = decode(&[0x43, 0x2c, 0x01, 0x30, 0xff]);
        assert_eq!(tokens(&track), ["l%300", "c"]);
        assert_eq!(track.commands[1].ticks, Some(300));
    }

    #[test]
    fn test_legacy_note_forms() {
        let track = decode(&[0x04, 0x30, 0x14, 0xff]);
        assert_eq!(tokens(&track), ["e4", "e"]);
    }

    #[test]
    fn test_duration_run_synthesizes_ties() {
        let track = decode(&[0x20, 0xff, 0x00, 0xff, 0x30, 0xff]);
        assert_eq!(tokens(&track), ["c%256&4"]);
        assert_eq!(track.commands[0].ticks, Some(304));
        assert_eq!(track.extra_ties, 1);
        assert_eq!(track.byte_length, 6);
    }

    #[test]
    fn test_final_terminator_is_not_a_tie_segment() {
        let track = decode(&[0x20, 0xff, 0x30, 0xff]);
        assert_eq!(tokens(&track), ["c4"]);
        assert_eq!(track.extra_ties, 0);
        assert_eq!(track.byte_length, 4);
    }

    #[test]
    fn test_octave_commands() {
        let track = decode(&[0xd4, 0x4e, 0x4f, 0xff]);
        assert_eq!(tokens(&track), ["o5", ">", "<"]);
    }

    #[test]
    fn test_portamento_pulls_octave_commands_forward() {
        let track = decode(&[0x53, 0x00, 0xd4, 0x4e, 0x30, 0xff]);
        assert_eq!(tokens(&track), ["c_", "o5", ">", "c"]);
        let opcodes: Vec<u8> = track.commands.iter().map(|c| c.opcode).collect();
        assert_eq!(opcodes, [0x53, 0xd4, 0x4e, 0x30]);
    }

    #[test]
    fn test_loop_and_jump_markers() {
        let track = decode(&[
            0x57, 3, 0xaa, 0xbb, 0x59, 0x00, 0xcc, 0xdd, 0x58, 0xee, 0x12, 0xff,
        ]);
        assert_eq!(tokens(&track), ["[3", "]", "|"]);
        assert_eq!(track.commands[0].loop_count, Some(3));
        assert_eq!(track.loop_marker_count, 1);
    }

    #[test]
    fn test_infinite_loop_start() {
        let track = decode(&[0x57, 0, 0xaa, 0xbb, 0xff]);
        assert_eq!(track.commands[0].mml, "[0");
        assert_eq!(track.commands[0].loop_count, Some(0));
    }

    #[test]
    fn test_volume_commands() {
        let track = decode(&[0xc5, 0x46, 0x03, 0x46, 0xfd, 0x45, 0x23, 0x47, 0x93, 0xff]);
        assert_eq!(tokens(&track), ["v5", "v+3", "v-3", "vs3", "vh-3"]);
    }

    #[test]
    fn test_detune_sign_mirrors_on_fm_pair_tracks() {
        let fm = decode_channel_track(&[0x50, 0x05, 0xff], 1, false).unwrap();
        assert_eq!(fm.commands[0].mml, "\\-5");
        let psg = decode_channel_track(&[0x50, 0x05, 0xff], 10, false).unwrap();
        assert_eq!(psg.commands[0].mml, "\\5");
    }

    #[test]
    fn test_pitch_sweep_operands() {
        let track = decode(&[0x54, 1, 2, 3, 0x05, 0xff]);
        assert_eq!(track.commands[0].mml, "h0,2,2,-5");
        let track = decode_channel_track(&[0x54, 1, 2, 3, 0x05, 0xff], 12, false).unwrap();
        assert_eq!(track.commands[0].mml, "h0,2,2,5");
    }

    #[test]
    fn test_tempo_skips_timer_table() {
        let mut data = vec![0x41, 0x2c, 0x01];
        data.extend_from_slice(&[0u8; 48]);
        data.extend_from_slice(&[0x30, 0xff]);
        let track = decode(&data);
        assert_eq!(tokens(&track), ["t300", "c"]);
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let track = decode(&[0x65, 0x30, 0xff]);
        assert_eq!(tokens(&track), ["c"]);
    }

    #[test]
    fn test_rhythm_notes() {
        let track = decode_channel_track(&[0x35, 0x30, 0xa2, 0x20, 0x18, 0xff], 15, true).unwrap();
        assert_eq!(tokens(&track), ["bmh4", "c:", "r8"]);
        assert_eq!(track.commands[0].ticks, Some(48));
        assert_eq!(track.commands[1].ticks, Some(48));
    }

    #[test]
    fn test_hardware_switches() {
        let track = decode(&[0x5a, 1, 0x5a, 0, 0x5b, 1, 0x5b, 0, 0x63, 0x64, 0xff]);
        assert_eq!(tokens(&track), ["ho", "hf", "so", "sf", "@f", "hi"]);
    }

    #[test]
    fn test_voice_select_range() {
        let track = decode(&[0x80, 0x9f, 0xff]);
        assert_eq!(tokens(&track), ["@0", "@31"]);
    }

    #[test]
    fn test_empty_slice() {
        let track = decode(&[]);
        assert!(track.commands.is_empty());
        assert_eq!(track.byte_length, 0);
    }
}
