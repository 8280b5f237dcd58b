//! RVL depth codec.
//!
//! Byte layout: 4-byte magic `"RVL\n"`, little-endian `u32 width`, `u32 height`, `f32 near`,
//! `f32 far`, then a payload of little-endian 32-bit words. Each word holds eight 4-bit nibbles,
//! most significant first. Integers are written as nibble varints: three value bits per nibble,
//! least significant group first, with the top bit of each nibble flagging a continuation.
//!
//! Pixels are coded as alternating runs: a varint count of "no depth" pixels followed by a varint
//! count of valid pixels, each valid pixel a zig-zag coded delta against a running 16-bit
//! disparity that persists across the whole raster scan.

use crate::depth::sample::{DepthSample, depth_to_disparity, disparity_to_depth, validate_range};
use crate::foundation::core::Dimensions;
use crate::foundation::error::{OdsError, OdsResult};

/// Magic tag at the start of every RVL stream.
pub const RVL_MAGIC: [u8; 4] = *b"RVL\n";

/// Fixed header length in bytes.
pub const RVL_HEADER_LEN: usize = 20;

/// A `u32` needs at most eleven 3-bit groups.
const MAX_VARINT_NIBBLES: u32 = 11;

/// Parsed RVL header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RvlHeader {
    /// Declared image dimensions.
    pub dims: Dimensions,
    /// Near clipping distance.
    pub near: f32,
    /// Far clipping distance.
    pub far: f32,
}

/// Parse and validate the 20-byte header without touching the payload.
pub fn parse_header(bytes: &[u8]) -> OdsResult<RvlHeader> {
    if bytes.len() < RVL_HEADER_LEN {
        return Err(OdsError::format(format!(
            "RVL stream is {} bytes, shorter than the {RVL_HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    if bytes[0..4] != RVL_MAGIC {
        return Err(OdsError::format(format!(
            "bad RVL magic {:?}",
            String::from_utf8_lossy(&bytes[0..4])
        )));
    }

    let width = read_u32_le(&bytes[4..8]);
    let height = read_u32_le(&bytes[8..12]);
    let near = f32::from_bits(read_u32_le(&bytes[12..16]));
    let far = f32::from_bits(read_u32_le(&bytes[16..20]));

    let dims = Dimensions::new(width, height)
        .map_err(|_| OdsError::format(format!("RVL header declares {width}x{height} image")))?;
    if dims.checked_pixel_count().is_none() {
        return Err(OdsError::format("RVL header dimensions overflow usize"));
    }
    validate_range(near, far).map_err(|e| OdsError::format(format!("RVL header: {e}")))?;

    Ok(RvlHeader { dims, near, far })
}

/// Decode an RVL stream into a dense depth sample.
///
/// Fails with [`OdsError::Format`] on a bad header or malformed payload and with
/// [`OdsError::TruncatedData`] when the payload ends before `width * height` samples.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode(bytes: &[u8]) -> OdsResult<DepthSample> {
    let header = parse_header(bytes)?;
    let payload = &bytes[RVL_HEADER_LEN..];
    if payload.len() % 4 != 0 {
        return Err(OdsError::format(format!(
            "RVL payload is {} bytes, not a whole number of 32-bit words",
            payload.len()
        )));
    }

    let RvlHeader { dims, near, far } = header;
    let total = dims.pixel_count();
    let mut values = Vec::with_capacity(total.min(1 << 24));
    let mut reader = NibbleReader::new(payload);
    let mut current: i16 = 0;

    while values.len() < total {
        let zeros = reader.read_varint()? as usize;
        let remaining = total - values.len();
        if zeros > remaining {
            return Err(OdsError::format(format!(
                "zero run of {zeros} overruns the {remaining} remaining pixels"
            )));
        }
        values.resize(values.len() + zeros, far);
        if values.len() == total {
            break;
        }

        let nonzeros = reader.read_varint()? as usize;
        let remaining = total - values.len();
        if nonzeros > remaining {
            return Err(OdsError::format(format!(
                "value run of {nonzeros} overruns the {remaining} remaining pixels"
            )));
        }
        for _ in 0..nonzeros {
            let positive = reader.read_varint()?;
            current = (i32::from(current) + unzigzag(positive)) as i16;
            values.push(disparity_to_depth(current as u16, near, far));
        }
    }

    Ok(DepthSample::from_parts_unchecked(dims, near, far, values))
}

/// Encode a depth sample as an RVL stream.
///
/// Depths are quantized to 16-bit disparity; pixels that quantize to disparity `0` (the far
/// plane) are coded as "no depth".
pub fn encode(sample: &DepthSample) -> Vec<u8> {
    let dims = sample.dimensions();
    let (near, far) = (sample.near(), sample.far());

    let mut out = Vec::with_capacity(RVL_HEADER_LEN + sample.values().len());
    out.extend_from_slice(&RVL_MAGIC);
    out.extend_from_slice(&dims.width.to_le_bytes());
    out.extend_from_slice(&dims.height.to_le_bytes());
    out.extend_from_slice(&near.to_le_bytes());
    out.extend_from_slice(&far.to_le_bytes());

    let disparities: Vec<u16> = sample
        .values()
        .iter()
        .map(|&v| depth_to_disparity(v, near, far))
        .collect();

    let mut writer = NibbleWriter::new(out);
    let mut previous: i16 = 0;
    let mut i = 0;
    while i < disparities.len() {
        let zeros = disparities[i..].iter().take_while(|d| **d == 0).count();
        i += zeros;
        let nonzeros = disparities[i..].iter().take_while(|d| **d != 0).count();
        writer.write_varint(zeros as u32);
        writer.write_varint(nonzeros as u32);
        for &d in &disparities[i..i + nonzeros] {
            let delta = (d as i16).wrapping_sub(previous);
            writer.write_varint(zigzag(delta));
            previous = d as i16;
        }
        i += nonzeros;
    }
    writer.finish()
}

fn zigzag(delta: i16) -> u32 {
    let d = i32::from(delta);
    ((d << 1) ^ (d >> 31)) as u32
}

fn unzigzag(positive: u32) -> i32 {
    ((positive >> 1) as i32) ^ -((positive & 1) as i32)
}

fn read_u32_le(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Nibble-granular cursor over little-endian 32-bit words.
struct NibbleReader<'a> {
    words: std::slice::ChunksExact<'a, u8>,
    word: u32,
    nibbles_left: u32,
}

impl<'a> NibbleReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            words: payload.chunks_exact(4),
            word: 0,
            nibbles_left: 0,
        }
    }

    fn next_nibble(&mut self) -> Option<u32> {
        if self.nibbles_left == 0 {
            self.word = read_u32_le(self.words.next()?);
            self.nibbles_left = 8;
        }
        let nibble = self.word >> 28;
        self.word <<= 4;
        self.nibbles_left -= 1;
        Some(nibble)
    }

    fn read_varint(&mut self) -> OdsResult<u32> {
        let mut value = 0u64;
        for group in 0..MAX_VARINT_NIBBLES {
            let nibble = self
                .next_nibble()
                .ok_or_else(|| OdsError::truncated("RVL payload ended inside the pixel stream"))?;
            value |= u64::from(nibble & 0x7) << (3 * group);
            if nibble & 0x8 == 0 {
                return u32::try_from(value)
                    .map_err(|_| OdsError::format("RVL varint exceeds 32 bits"));
            }
        }
        Err(OdsError::format(format!(
            "RVL varint longer than {MAX_VARINT_NIBBLES} nibbles"
        )))
    }
}

struct NibbleWriter {
    out: Vec<u8>,
    word: u32,
    nibbles: u32,
}

impl NibbleWriter {
    fn new(out: Vec<u8>) -> Self {
        Self {
            out,
            word: 0,
            nibbles: 0,
        }
    }

    fn push_nibble(&mut self, nibble: u32) {
        self.word = (self.word << 4) | (nibble & 0xf);
        self.nibbles += 1;
        if self.nibbles == 8 {
            self.out.extend_from_slice(&self.word.to_le_bytes());
            self.word = 0;
            self.nibbles = 0;
        }
    }

    fn write_varint(&mut self, mut value: u32) {
        loop {
            let mut nibble = value & 0x7;
            value >>= 3;
            if value != 0 {
                nibble |= 0x8;
            }
            self.push_nibble(nibble);
            if value == 0 {
                break;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nibbles > 0 {
            self.word <<= 4 * (8 - self.nibbles);
            self.out.extend_from_slice(&self.word.to_le_bytes());
        }
        self.out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/depth/rvl.rs"]
mod tests;
