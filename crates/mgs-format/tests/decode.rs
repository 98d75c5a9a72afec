//! End-to-end decoding paths over hand-built containers.

use mgs_format::{count_loop_markers, decompress, parse_document, Envelope, MgsError};

const TRACK_COUNT: usize = mgs_format::TRACK_COUNT;

/// Plaintext container with title "FIXTURE" and the given tracks.
fn plaintext_container(settings: u8, tempo: u16, tracks: &[(usize, Vec<u8>)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"MGS310\0\0FIXTURE\x1a\0");
    let root = data.len() - 1;
    data.push(settings);
    data.extend_from_slice(&tempo.to_le_bytes());

    let table_at = data.len();
    data.extend_from_slice(&[0u8; TRACK_COUNT * 2]);
    for (index, payload) in tracks {
        let offset = (data.len() - root) as u16;
        data[table_at + index * 2..table_at + index * 2 + 2].copy_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(payload);
    }
    data
}

/// Compress a plaintext container as an all-literal stream.
///
/// Control bytes are placed where the decoder's eager refill consumes
/// them: one up front, then one more the moment eight flags are spent.
fn compress_literals(plaintext: &[u8]) -> Vec<u8> {
    let settings_offset = plaintext
        .iter()
        .position(|&b| b == 0x1a)
        .expect("plaintext fixture has a title terminator")
        + 2;
    let prefix_len = settings_offset + 1;
    let payload = &plaintext[prefix_len..];

    let mut out = plaintext[..prefix_len].to_vec();
    out[3] = b'A';
    out[settings_offset] |= 0x80;
    out.extend_from_slice(&(plaintext.len() as u16).to_le_bytes());

    // One literal flag per payload byte, then "01" + zero extended
    // length as the stream terminator.
    let mut flags: Vec<u8> = vec![1; payload.len()];
    flags.extend_from_slice(&[0, 1]);
    let control_byte = |group: usize| {
        let mut c = 0u8;
        for i in 0..8 {
            c |= flags.get(group * 8 + i).copied().unwrap_or(0) << (7 - i);
        }
        c
    };

    out.push(control_byte(0));
    let mut consumed = 0;
    let mut spend_flag = |out: &mut Vec<u8>| {
        consumed += 1;
        if consumed % 8 == 0 {
            out.push(control_byte(consumed / 8));
        }
    };
    for &b in payload {
        spend_flag(&mut out);
        out.push(b);
    }
    spend_flag(&mut out);
    spend_flag(&mut out);
    out.extend_from_slice(&[0, 0, 0]);
    out
}

fn fixture_tracks() -> Vec<(usize, Vec<u8>)> {
    let mut voice = vec![0x00, 0x01];
    voice.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    voice.extend_from_slice(&[0x02, 0x02, 0xe0, 9, 8, 7, 6, 5, 4]);
    voice.push(0xff);

    vec![
        (0, voice),
        (1, vec![0x20, 0x60, 0x58, 0, 0, 0xff]),
        (15, vec![0xa2, 0xff]),
    ]
}

#[test]
fn test_parse_plain_document() {
    let data = plaintext_container(0x01, 90, &fixture_tracks());
    let doc = parse_document(&data).unwrap();

    assert_eq!(doc.version, "310");
    assert_eq!(doc.title, "FIXTURE");
    assert_eq!(doc.tempo, 90);
    assert!(doc.settings.opll_mode);
    assert!(!doc.settings.was_compressed);

    let voice = doc.voice.as_ref().unwrap();
    assert_eq!(voice.opll_patches.len(), 1);
    assert!(matches!(voice.envelopes[0], Envelope::Adsr { .. }));

    let melody = doc.tracks[1].as_ref().unwrap();
    assert_eq!(melody.commands[0].mml, "c2");
    assert_eq!(melody.commands[0].ticks, Some(96));

    let rhythm = doc.tracks[15].as_ref().unwrap();
    assert_eq!(rhythm.commands[0].mml, "c:");

    assert_eq!(count_loop_markers(&doc), 1);
}

#[test]
fn test_compressed_document_matches_manual_decompression() {
    let plaintext = plaintext_container(0x01, 90, &fixture_tracks());
    let compressed = compress_literals(&plaintext);

    let expanded = decompress(&compressed).unwrap();
    assert_eq!(expanded, plaintext);

    let auto = parse_document(&compressed).unwrap();
    let manual = parse_document(&expanded).unwrap();

    assert!(auto.settings.was_compressed);
    assert!(!manual.settings.was_compressed);

    // Everything except the first-pass compression flag is identical.
    let mut auto_plain = auto.clone();
    auto_plain.settings.was_compressed = false;
    assert_eq!(auto_plain, manual);
}

#[test]
fn test_document_serializes_to_json() {
    let data = plaintext_container(0x01, 90, &fixture_tracks());
    let doc = parse_document(&data).unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["version"], "310");
    assert_eq!(json["title"], "FIXTURE");
    assert_eq!(json["settings"]["opll_mode"], true);
    assert_eq!(json["tracks"][1]["commands"][0]["mml"], "c2");
}

#[test]
fn test_bad_magic_fails_regardless_of_content() {
    let mut data = plaintext_container(0, 90, &[]);
    data[0] = b'X';
    assert!(matches!(
        parse_document(&data),
        Err(MgsError::BadMagic)
    ));
}

#[test]
fn test_absent_tracks_have_no_slices() {
    let data = plaintext_container(0, 90, &[(3, vec![0x30, 0xff])]);
    let doc = parse_document(&data).unwrap();
    for index in 0..TRACK_COUNT {
        if index == 3 {
            assert!(doc.raw_tracks[index].is_some());
            assert!(doc.tracks[index].is_some());
        } else {
            assert!(doc.raw_tracks[index].is_none());
            assert!(doc.tracks[index].is_none());
        }
    }
}
