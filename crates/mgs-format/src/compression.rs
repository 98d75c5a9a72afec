//! Decompression of compressed MGS containers.
//!
//! Compressed objects keep the plaintext header through the settings byte
//! and follow it with a two-byte declared size and a bit-flagged
//! back-reference stream. The declared size is informational (the driver
//! uses it to stack the object at the end of its memory page) and is not
//! consulted here.
//!
//! The output arena is a fixed page: the source format is bounded by the
//! driver's addressable window, so running past it only happens on
//! corrupt input and fails hard rather than growing.

use crate::error::{MgsError, Result};
use crate::header::read_header;

/// Fixed decompression window: one driver memory page.
pub const OUTPUT_CAPACITY: usize = 0x4000;

/// Whether the container carries the compression bit.
///
/// Reads the settings byte through the normal header scan, so bad magic
/// or a missing title terminator fail here as well.
pub fn is_compressed(data: &[u8]) -> Result<bool> {
    Ok(read_header(data)?.is_compressed)
}

/// Expand a compressed MGS object into its plaintext form.
///
/// The returned buffer is trimmed to the exact decompressed length, has
/// the version sentinel letter rewritten to the canonical numeric tag,
/// and has the compression bit cleared, so it re-parses exactly like a
/// never-compressed container.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let header = read_header(data)?;
    if !header.is_compressed {
        return Err(MgsError::NotCompressed);
    }

    let prefix_len = header.settings_offset + 1;
    if prefix_len > OUTPUT_CAPACITY {
        return Err(MgsError::DecompressionOverflow {
            capacity: OUTPUT_CAPACITY,
        });
    }

    let mut state = Decompressor {
        input: data,
        // Skip the declared data size.
        read_pos: prefix_len + 2,
        output: vec![0u8; OUTPUT_CAPACITY],
        write_pos: prefix_len,
        control: 0,
        flags_left: 1,
    };

    // The header prefix carries over verbatim, then gets normalized:
    // MGSAxx becomes MGS3xx and the compression bit is cleared.
    state.output[..prefix_len].copy_from_slice(&data[..prefix_len]);
    state.output[3] = b'3';
    state.output[header.settings_offset] &= 0x7f;

    state.read_flag()?; // prime the control register
    state.run()?;

    let mut output = state.output;
    output.truncate(state.write_pos);
    tracing::debug!(
        compressed = data.len(),
        decompressed = output.len(),
        "expanded MGS object"
    );
    Ok(output)
}

struct Decompressor<'a> {
    input: &'a [u8],
    read_pos: usize,
    output: Vec<u8>,
    write_pos: usize,
    control: u8,
    flags_left: u8,
}

impl Decompressor<'_> {
    fn read_byte(&mut self, context: &'static str) -> Result<u8> {
        let b = self
            .input
            .get(self.read_pos)
            .copied()
            .ok_or(MgsError::TruncatedData {
                context,
                offset: self.read_pos,
            })?;
        self.read_pos += 1;
        Ok(b)
    }

    /// Next flag bit, MSB-first. The control register refills from the
    /// input stream the moment its last bit is handed out, so control
    /// bytes interleave with literal and reference bytes at the
    /// positions the compressor placed them.
    fn read_flag(&mut self) -> Result<u8> {
        let bit = self.control >> 7;
        self.control <<= 1;
        self.flags_left -= 1;
        if self.flags_left == 0 {
            self.flags_left = 8;
            self.control = self.read_byte("control byte")?;
        }
        Ok(bit)
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        if self.write_pos >= OUTPUT_CAPACITY {
            return Err(MgsError::DecompressionOverflow {
                capacity: OUTPUT_CAPACITY,
            });
        }
        self.output[self.write_pos] = byte;
        self.write_pos += 1;
        Ok(())
    }

    /// Copy `len` bytes from a negative displacement, one byte at a
    /// time: a reference may overlap its own output to repeat short
    /// periodic patterns. Reads from before the window start yield zero,
    /// as in the reference decoder.
    fn copy_back_reference(&mut self, displacement: i32, len: usize) -> Result<()> {
        for _ in 0..len {
            let src = self.write_pos as i32 + displacement;
            let byte = if src < 0 { 0 } else { self.output[src as usize] };
            self.push(byte)?;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        loop {
            if self.read_flag()? == 1 {
                let byte = self.read_byte("literal")?;
                self.push(byte)?;
                continue;
            }
            if self.read_flag()? == 1 {
                // Long reference: 13-bit displacement, up to 8 KiB back.
                let lo = self.read_byte("back-reference")? as u16;
                let hi = self.read_byte("back-reference")? as u16;
                let code = hi >> 5;
                let len = if code != 0 {
                    code as usize + 2
                } else {
                    let ext = self.read_byte("extended length code")?;
                    if ext == 0 {
                        // Stream terminator.
                        return Ok(());
                    }
                    ext as usize + 2
                };
                let displacement = ((hi << 8) | lo | 0xe000) as i32 - 0x10000;
                self.copy_back_reference(displacement, len)?;
            } else {
                // Short reference within the last 256 bytes; the length
                // code rides in the next two flag bits.
                let code = (self.read_flag()? << 1) | self.read_flag()?;
                let lo = self.read_byte("back-reference")?;
                let displacement = lo as i32 - 0x100;
                self.copy_back_reference(displacement, code as usize + 2)?;
            }
        }
    }
}
