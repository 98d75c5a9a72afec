//! Offset-table resolution and document assembly.

use crate::compression::decompress;
use crate::error::Result;
use crate::format::{MgsDocument, Settings, TrackData, VoiceData, TRACK_COUNT};
use crate::header::read_header;
use crate::reader::ByteReader;
use crate::text::decode_legacy_text;
use crate::track::{decode_channel_track, RHYTHM_TRACK};
use crate::voice::decode_voice_track;

/// Tempo substituted when the stored value is zero.
const DEFAULT_TEMPO: u16 = 75;

/// Decode a complete MGS container, decompressing transparently.
///
/// The result is bit-identical to calling [`decompress`] by hand and
/// parsing its output, except that `settings.was_compressed` records the
/// first-pass detection.
pub fn parse_document(data: &[u8]) -> Result<MgsDocument> {
    let header = read_header(data)?;
    if header.is_compressed {
        let plaintext = decompress(data)?;
        assemble(&plaintext, true)
    } else {
        assemble(data, false)
    }
}

/// Assemble a document from plaintext container bytes.
fn assemble(data: &[u8], was_compressed: bool) -> Result<MgsDocument> {
    let header = read_header(data)?;
    let settings = Settings::from_raw(header.settings_byte, was_compressed);
    let root = header.root;

    let mut r = ByteReader::new(data);
    r.skip(header.settings_offset + 1);
    let stored_tempo = r.read_u16_le("tempo")?;
    let tempo = if stored_tempo == 0 {
        DEFAULT_TEMPO
    } else {
        stored_tempo
    };

    let mut offsets = [0u16; TRACK_COUNT];
    for entry in &mut offsets {
        *entry = r.read_u16_le("track offset table")?;
    }

    let mut raw_tracks: [Option<Vec<u8>>; TRACK_COUNT] = std::array::from_fn(|_| None);
    let mut tracks: [Option<TrackData>; TRACK_COUNT] = std::array::from_fn(|_| None);
    let mut voice: Option<VoiceData> = None;

    for (index, &offset) in offsets.iter().enumerate() {
        if offset == 0 {
            continue;
        }
        // Offsets address from the root; the slice runs to the end of
        // the buffer and the decoder finds its own terminator.
        let start = root + offset as usize;
        let slice = data.get(start..).unwrap_or(&[]);
        raw_tracks[index] = Some(slice.to_vec());
        if index == 0 {
            voice = Some(decode_voice_track(slice)?);
        } else {
            let rhythm = settings.opll_mode && index == RHYTHM_TRACK;
            tracks[index] = Some(decode_channel_track(slice, index, rhythm)?);
        }
    }

    Ok(MgsDocument {
        version: header.version,
        title: decode_legacy_text(&header.title_bytes),
        settings,
        tempo,
        raw_tracks,
        voice,
        tracks,
    })
}

/// Total jump markers across all decoded channel tracks.
pub fn count_loop_markers(document: &MgsDocument) -> u32 {
    document
        .tracks
        .iter()
        .flatten()
        .map(|track| track.loop_marker_count)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plaintext container: title "SONG", given settings byte and tempo,
    /// then an offset table pointing the provided tracks in slot order.
    fn container(settings: u8, tempo: u16, tracks: &[(usize, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"MGS310\0\0SONG\x1a\0");
        data.push(settings);
        data.extend_from_slice(&tempo.to_le_bytes());

        let root = 13;
        let table_at = data.len();
        data.extend_from_slice(&[0u8; TRACK_COUNT * 2]);

        for &(index, payload) in tracks {
            let offset = (data.len() - root) as u16;
            data[table_at + index * 2..table_at + index * 2 + 2]
                .copy_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(payload);
        }
        data
    }

    #[test]
    fn test_zero_offsets_leave_tracks_absent() {
        let doc = parse_document(&container(0, 120, &[(2, &[0x30, 0xff])])).unwrap();
        assert!(doc.raw_tracks[1].is_none());
        assert!(doc.tracks[1].is_none());
        assert!(doc.voice.is_none());
        assert!(doc.tracks[2].is_some());
        assert_eq!(doc.tempo, 120);
        assert_eq!(doc.title, "SONG");
    }

    #[test]
    fn test_zero_tempo_falls_back_to_default() {
        let doc = parse_document(&container(0, 0, &[])).unwrap();
        assert_eq!(doc.tempo, 75);
    }

    #[test]
    fn test_voice_track_uses_record_decoder() {
        let mut voice = vec![0x01, 1, 2];
        voice.push(0xff);
        let doc = parse_document(&container(0, 100, &[(0, &voice)])).unwrap();
        let voice = doc.voice.unwrap();
        assert_eq!(voice.aliases.len(), 1);
    }

    #[test]
    fn test_rhythm_mode_is_forced_on_track_15_in_opll_mode() {
        let doc = parse_document(&container(
            0x01,
            100,
            &[(15, &[0xa2, 0xff]), (14, &[0x30, 0xff])],
        ))
        .unwrap();
        // Track 15 decodes 0xa2 as a rhythm note; other tracks stay melodic.
        assert_eq!(doc.tracks[15].as_ref().unwrap().commands[0].mml, "c:");
        assert_eq!(doc.tracks[14].as_ref().unwrap().commands[0].mml, "c");
        assert!(doc.settings.opll_mode);
    }

    #[test]
    fn test_loop_marker_totals() {
        let doc = parse_document(&container(
            0,
            100,
            &[
                (1, &[0x58, 0, 0, 0xff]),
                (2, &[0x58, 0, 0, 0x58, 0, 0, 0xff]),
            ],
        ))
        .unwrap();
        assert_eq!(count_loop_markers(&doc), 3);
    }

    #[test]
    fn test_settings_decoding() {
        let doc = parse_document(&container(0x1f, 100, &[])).unwrap();
        assert!(doc.settings.opll_mode);
        assert!(doc.settings.lfo_mode);
        assert_eq!(doc.settings.machine_id, 7);
        assert!(!doc.settings.disable_reverse_compile);
        assert!(!doc.settings.was_compressed);
    }
}
