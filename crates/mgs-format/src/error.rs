//! Error handling for MGS container decoding.

use thiserror::Error;

/// Convenient result alias for MGS decoding operations.
pub type Result<T> = std::result::Result<T, MgsError>;

/// Errors that may occur while decoding an MGS container.
#[derive(Debug, Error)]
pub enum MgsError {
    /// Buffer does not start with the `MGS` magic.
    #[error("not an MGS object")]
    BadMagic,

    /// No EOF marker terminates the title region before the buffer ends.
    #[error("MGS data is corrupted: no EOF marker found after the title section")]
    MissingTitleTerminator,

    /// Version field of a plaintext container contains non-digit characters.
    #[error("malformed version field '{raw}'")]
    MalformedVersion {
        /// Raw three-character version field as stored in the file.
        raw: String,
    },

    /// Recognized container whose version is below the supported minimum.
    #[error("unsupported format version v{major}.{minor}: v3.10 or greater is required",
            major = .version.get(..1).unwrap_or("?"),
            minor = .version.get(1..).unwrap_or("?"))]
    UnsupportedVersion {
        /// Three-digit version code from the header.
        version: String,
    },

    /// A field or declared-length record extends past the end of the buffer.
    #[error("unexpected end of data while reading {context} at offset 0x{offset:04x}")]
    TruncatedData {
        /// What was being read when the buffer ran out.
        context: &'static str,
        /// Offset of the first missing byte.
        offset: usize,
    },

    /// Opcode absent from a decoder's table.
    #[error("unknown opcode 0x{opcode:02x} at offset 0x{offset:04x} in {context}")]
    UnknownOpcode {
        /// The offending opcode byte.
        opcode: u8,
        /// Offset of the opcode inside the record or track slice.
        offset: usize,
        /// Which decoder rejected it.
        context: &'static str,
    },

    /// Decompression write position left the fixed output window.
    #[error("decompressed data exceeds the {capacity}-byte output window")]
    DecompressionOverflow {
        /// Size of the fixed output window.
        capacity: usize,
    },

    /// `decompress` was called on a container without the compression bit.
    #[error("not a compressed MGS object")]
    NotCompressed,
}
