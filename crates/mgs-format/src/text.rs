//! Legacy Shift-JIS text transcoding.
//!
//! The container stores the title and embedded text resources in the
//! legacy double-byte encoding of the source platform. Transcoding
//! itself is delegated to `encoding_rs`; this module only prepares
//! text-resource payloads so that no raw control byte or unescaped MML
//! string delimiter survives into the decoded text.

use encoding_rs::SHIFT_JIS;

/// Decode legacy bytes to text, replacing invalid sequences.
pub fn decode_legacy_text(bytes: &[u8]) -> String {
    let (text, _, _) = SHIFT_JIS.decode(bytes);
    text.into_owned()
}

/// First byte of a double-byte character in the legacy encoding.
fn is_lead_byte(b: u8) -> bool {
    (0x81..=0x9f).contains(&b) || (0xe0..=0xfc).contains(&b)
}

/// Escape a text-resource payload ahead of transcoding.
///
/// Double-byte characters pass through with their trail byte paired so
/// the escape scan cannot split them. Quote and backslash get a
/// backslash escape; control bytes and the bare `0x80` byte (not a valid
/// lead) are rewritten as literal `\xNN` sequences.
pub fn escape_text_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_lead_byte(b) {
            out.push(b);
            i += 1;
            if i < bytes.len() {
                out.push(bytes[i]);
                i += 1;
            }
        } else if b == b'"' || b == b'\\' {
            out.push(b'\\');
            out.push(b);
            i += 1;
        } else if b < 0x20 || b == 0x80 {
            out.extend_from_slice(format!("\\x{b:02x}").as_bytes());
            i += 1;
        } else {
            out.push(b);
            i += 1;
        }
    }
    out
}

/// Decode a text-resource payload: escape, then transcode.
pub fn decode_text_resource(bytes: &[u8]) -> String {
    decode_legacy_text(&escape_text_payload(bytes))
}
