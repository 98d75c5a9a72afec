//! Rendering of decoded documents as MML text.

use mgs_format::{Envelope, MgsDocument, OpllPatch, SccPatch, TrackData, VoiceData, TRACK_COUNT};

use crate::opll_voice::OpllVoice;

/// Track letters used by MML block headers and the alloc map.
const TRACK_LETTERS: &[u8; 18] = b"0123456789ABCDEFGH";

/// Ticks accumulated on one output line before it wraps.
const WRAP_TICKS: u32 = 192;

fn track_letter(track: usize) -> char {
    TRACK_LETTERS[track] as char
}

/// Two-column right-aligned decimal, as voice tables are laid out.
fn dec(n: u8) -> String {
    format!("{n:2}")
}

/// `@s` declaration with the 32 waveform samples in hex, split into two
/// 16-sample halves.
pub fn declare_scc_voice(patch: &SccPatch) -> String {
    let mut wav = String::new();
    for (i, byte) in patch.data.iter().enumerate() {
        wav.push_str(&format!("{byte:02x}"));
        if i == 16 {
            wav.push(' ');
        }
    }
    format!("@s{}={{ {wav} }}", patch.number)
}

/// `@v` declaration with the register image unpacked into named columns.
pub fn declare_opll_voice(patch: &OpllPatch) -> String {
    let voice = OpllVoice::from_registers(&patch.data);
    let mut out = String::new();
    out.push_str(&format!("@v{} = {{\n", patch.number));
    out.push_str(";       TL FB\n");
    out.push_str(&format!(
        "        {},{},\n",
        dec(voice.slots[0].tl),
        dec(voice.fb)
    ));
    out.push_str("; AR DR SL RR KL ML AM PM EG KR WF\n");
    for (i, slot) in voice.slots.iter().enumerate() {
        out.push_str(&format!(
            "  {},{},{},{},{},{},{},{},{},{},{}",
            dec(slot.ar),
            dec(slot.dr),
            dec(slot.sl),
            dec(slot.rr),
            dec(slot.kl),
            dec(slot.ml),
            dec(slot.am),
            dec(slot.pm),
            dec(slot.eg),
            dec(slot.kr),
            dec(slot.wf)
        ));
        out.push_str(if i == 0 { ",\n" } else { " }\n" });
    }
    out
}

/// `@e`/`@r` declaration for an envelope.
pub fn declare_envelope(envelope: &Envelope) -> String {
    match envelope {
        Envelope::Step {
            number,
            mode,
            noise_freq,
            steps,
        } => format!(
            "@e{number}={{ {mode}, {noise_freq}, {} }}",
            steps.concat()
        ),
        Envelope::Adsr {
            number,
            mode,
            noise_freq,
            al,
            ar,
            dr,
            sl,
            sr,
            rr,
        } => format!("@r{number}={{ {mode}, {noise_freq}, {al}, {ar}, {dr}, {sl}, {sr}, {rr} }}"),
    }
}

/// Per-track byte allocation map, `{ 0=245, A=12, ... }`.
fn build_alloc_list(document: &MgsDocument) -> String {
    let mut entries = Vec::new();
    if let Some(voice) = &document.voice {
        entries.push(format!("{}={}", track_letter(0), voice.byte_length));
    }
    for index in 1..TRACK_COUNT {
        if let Some(track) = &document.tracks[index] {
            entries.push(format!("{}={}", track_letter(index), track.byte_length));
        }
    }
    format!("{{ {} }}", entries.join(", "))
}

fn build_title_block(title: &str) -> String {
    let lines: Vec<String> = title
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| format!("\"{line}\""))
        .collect();
    if lines.len() >= 2 {
        format!("{{\n  {}\n}}", lines.join("\n  "))
    } else {
        format!("{{ {} }}", lines.join("\n"))
    }
}

/// Header directives: mode flags, title, tempo, tuning tables and the
/// allocation map.
pub fn build_header(document: &MgsDocument) -> String {
    let mut out = format!(
        "; MML decompiled from MGS{} object.\n\
         #opll_mode {}\n\
         #lfo_mode {}\n\
         #machine_id {}\n\
         #title {}\n\
         #tempo {}\n",
        document.version,
        document.settings.opll_mode as u8,
        document.settings.lfo_mode as u8,
        document.settings.machine_id,
        build_title_block(&document.title),
        document.tempo
    );
    if let Some(voice) = &document.voice {
        if let Some(table) = &voice.psg_tuning {
            out.push_str(&format!("#psg_tune {}\n", format_tuning(table)));
        }
        if let Some(table) = &voice.opll_tuning {
            out.push_str(&format!("#opll_tune {}\n", format_tuning(table)));
        }
    }
    out.push_str(&format!("#alloc {}\n", build_alloc_list(document)));
    out
}

fn format_tuning(table: &[u16; 12]) -> String {
    let entries: Vec<String> = table.iter().map(|v| v.to_string()).collect();
    format!("{{ {} }}", entries.join(", "))
}

/// Voice block: patches, envelopes, aliases and text resources.
pub fn build_voice_mml(voice: &VoiceData) -> String {
    let mut out = Vec::new();
    for patch in &voice.opll_patches {
        out.push(declare_opll_voice(patch));
    }
    for patch in &voice.scc_patches {
        out.push(declare_scc_voice(patch));
    }
    for envelope in &voice.envelopes {
        out.push(declare_envelope(envelope));
    }
    for alias in &voice.aliases {
        out.push(format!("@v{}=@v{}", alias.to, alias.from));
    }
    for text in &voice.texts {
        out.push(format!("#text {} \"{}\"", text.number, text.text));
    }
    out.join("\n")
}

/// One channel block, wrapped to a fresh `{letter} ` line roughly every
/// whole note. Wrapping is held back while a portamento is pending so
/// the glide and its octave corrections stay on one line, and forced
/// before an infinite loop start.
pub fn build_track_mml(data: &TrackData) -> String {
    let letter = track_letter(data.track);
    let mut out = format!("\n{letter} ");
    let mut step_count: u32 = 0;
    let mut in_portamento = false;

    for cmd in &data.commands {
        if let Some(ticks) = cmd.ticks {
            if !in_portamento && step_count > WRAP_TICKS {
                out.push_str(&format!("\n{letter} "));
                step_count = 0;
            }
            step_count += ticks;
        }
        if cmd.opcode == 0x57 {
            if !in_portamento && (cmd.loop_count == Some(0) || step_count > WRAP_TICKS) {
                out.push_str(&format!("\n{letter} "));
                step_count = 0;
            }
            out.push_str(&format!("{} ", cmd.mml));
        } else {
            out.push_str(&cmd.mml);
        }

        if cmd.opcode == 0x53 {
            in_portamento = true;
        } else if (0x20..=0x3f).contains(&cmd.opcode) {
            in_portamento = false;
        }
    }
    out
}

/// Render a decoded document as a complete MML script.
pub fn render_mml(document: &MgsDocument) -> String {
    let mut sections = vec![build_header(document)];
    if let Some(voice) = &document.voice {
        sections.push(build_voice_mml(voice));
    }
    for index in 1..TRACK_COUNT {
        if let Some(track) = &document.tracks[index] {
            sections.push(build_track_mml(track));
        }
    }
    sections.join("\n")
}
