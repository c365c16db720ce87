//! The minimal loadable SWF envelope wrapping a `DoABC` tag (§6 Output).
//!
//! Grounded on the same "small header + length-prefixed payload" shape as
//! the teacher's `spi::SpiProgram`, just with SWF's own tag framing instead
//! of the SPI header.

const STAGE_TWIPS: i32 = 7500 * 20; // RECT values are in twips (1/20 px); stage is 10000x7500 "pixels" per §6.
const FRAME_RATE_FP8_8: u16 = 24 << 8;

pub struct SwfMovie {
    abc: Vec<u8>,
    /// Symbol name bound to the ABC class that should be instantiated as
    /// the movie's root: "Wrapper" with `--sprite`, else "Instance".
    symbol_name: String,
}

impl SwfMovie {
    #[must_use]
    pub fn new(abc: Vec<u8>, sprite: bool, instance_name: &str) -> Self {
        Self {
            abc,
            symbol_name: if sprite {
                "Wrapper".to_string()
            } else {
                instance_name.to_string()
            },
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend(encode_rect(0, STAGE_TWIPS, 0, STAGE_TWIPS));
        body.extend(FRAME_RATE_FP8_8.to_le_bytes());
        body.extend(1u16.to_le_bytes()); // frame count

        body.extend(tag(0x45, &encode_file_attributes()));
        body.extend(tag(0x2b, &encode_frame_label("frame1")));
        body.extend(tag(0x52, &encode_do_abc("frame1", &self.abc)));
        body.extend(tag(0x4c, &encode_symbol_class(&[(&self.symbol_name, 1)])));
        body.extend(tag(0x01, &[])); // ShowFrame
        body.extend(0u16.to_le_bytes()); // End tag

        let mut out = Vec::new();
        out.extend(b"FWS");
        out.push(10); // SWF version with ActionScript 3 + AVM2 support

        let full_len = (8 + body.len()) as u32; // signature(3)+version(1)+length(4) + body
        let mut file = Vec::new();
        file.extend(full_len.to_le_bytes());
        file.extend(body);

        out.extend(file);
        out
    }
}

fn encode_rect(x_min: i32, x_max: i32, y_min: i32, y_max: i32) -> Vec<u8> {
    // Smallest representation that fits all four twips values in signed bits.
    let max_abs = [x_min, x_max, y_min, y_max]
        .iter()
        .map(|v| v.unsigned_abs())
        .max()
        .unwrap_or(0);
    let mut nbits = 1u32;
    while (1u32 << (nbits - 1)) <= max_abs && nbits < 32 {
        nbits += 1;
    }
    nbits += 1; // sign bit

    let mut bits = BitWriter::new();
    bits.write(nbits - 1, 5);
    for v in [x_min, x_max, y_min, y_max] {
        bits.write_signed(v, nbits);
    }
    bits.finish()
}

fn encode_file_attributes() -> Vec<u8> {
    // Bit 3 (0x08) = ActionScript3, bit 6 (0x40, as part of byte 0) = UseNetwork.
    let flags: u32 = 0x0000_0008 | 0x0000_0040;
    flags.to_le_bytes().to_vec()
}

fn encode_frame_label(label: &str) -> Vec<u8> {
    let mut out = label.as_bytes().to_vec();
    out.push(0);
    out
}

fn encode_do_abc(name: &str, abc: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(1u32.to_le_bytes()); // flags: lazy-initialize = false
    out.extend(name.as_bytes());
    out.push(0);
    out.extend(abc);
    out
}

fn encode_symbol_class(symbols: &[(&str, u16)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend((symbols.len() as u16).to_le_bytes());
    for (name, id) in symbols {
        out.extend(id.to_le_bytes());
        out.extend(name.as_bytes());
        out.push(0);
    }
    out
}

fn tag(code: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if body.len() < 0x3f {
        out.extend(((code << 6) | body.len() as u16).to_le_bytes());
    } else {
        out.extend(((code << 6) | 0x3f).to_le_bytes());
        out.extend((body.len() as u32).to_le_bytes());
    }
    out.extend(body);
    out
}

struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_pos: 0,
        }
    }

    fn write(&mut self, value: u32, nbits: u32) {
        for i in (0..nbits).rev() {
            let bit = (value >> i) & 1;
            if self.bit_pos == 0 {
                self.bytes.push(0);
            }
            let byte_idx = self.bytes.len() - 1;
            self.bytes[byte_idx] |= (bit as u8) << (7 - self.bit_pos);
            self.bit_pos = (self.bit_pos + 1) % 8;
        }
    }

    fn write_signed(&mut self, value: i32, nbits: u32) {
        let mask = if nbits >= 32 {
            u32::MAX
        } else {
            (1u32 << nbits) - 1
        };
        self.write(value as u32 & mask, nbits);
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_starts_with_fws_and_as3_version() {
        let movie = SwfMovie::new(vec![0xde, 0xad], false, "Instance");
        let bytes = movie.encode();
        assert_eq!(&bytes[0..3], b"FWS");
        assert_eq!(bytes[3], 10);
    }

    #[test]
    fn do_abc_tag_contains_the_payload() {
        let abc = vec![1, 2, 3, 4];
        let movie = SwfMovie::new(abc.clone(), false, "Instance");
        let bytes = movie.encode();
        assert!(bytes.windows(abc.len()).any(|w| w == abc));
    }
}
