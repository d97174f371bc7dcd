#![doc = include_str!("../README.md")]

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

mod dictionary;

use dictionary::{DictionaryReference, TokenDictionary};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Compressed RTF header truncated: {0} bytes")]
    InvalidHeader(usize),
    #[error("Invalid COMPTYPE: 0x{0:08X}")]
    InvalidMagic(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

/// `COMPTYPE` value for LZFu dictionary compression (`LZFu`).
pub const MAGIC_COMPRESSED: u32 = 0x75465A4C;

/// `COMPTYPE` value for stored, uncompressed payloads (`MELA`).
pub const MAGIC_UNCOMPRESSED: u32 = 0x414C454D;

/// The 16-byte header in front of every compressed RTF payload.
///
/// `crc` is carried but never validated.
#[derive(Clone, Copy, Debug)]
pub struct RtfCompressedHeader {
    pub compressed_size: u32,
    pub raw_size: u32,
    pub magic: u32,
    pub crc: u32,
}

impl RtfCompressedHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(Error::InvalidHeader(data.len()));
        }

        let mut cursor = Cursor::new(&data[..16]);
        // COMPSIZE
        let compressed_size = cursor.read_u32::<LittleEndian>().expect("16-byte slice");
        // RAWSIZE
        let raw_size = cursor.read_u32::<LittleEndian>().expect("16-byte slice");
        // COMPTYPE
        let magic = cursor.read_u32::<LittleEndian>().expect("16-byte slice");
        // CRC
        let crc = cursor.read_u32::<LittleEndian>().expect("16-byte slice");

        Ok(Self {
            compressed_size,
            raw_size,
            magic,
            crc,
        })
    }
}

/// Decompresses a complete compressed RTF property value (header included).
///
/// Best-effort: a payload that runs out mid-token yields whatever was
/// recovered up to that point, truncated to the header's `RAWSIZE`.
pub fn decompress_rtf(data: &[u8]) -> Result<Vec<u8>> {
    let header = RtfCompressedHeader::parse(data)?;
    let payload = &data[16..];
    let raw_size = header.raw_size as usize;

    match header.magic {
        MAGIC_UNCOMPRESSED => Ok(payload[..raw_size.min(payload.len())].to_vec()),
        MAGIC_COMPRESSED => {
            let mut dictionary = TokenDictionary::default();
            let mut output = Vec::with_capacity(raw_size.min(payload.len() * 16));

            let mut cursor = Cursor::new(payload);
            'decompress: while let Ok(control) = cursor.read_u8() {
                for i in 0..8 {
                    if control & (0x01 << i) == 0 {
                        let Ok(byte) = cursor.read_u8() else {
                            break 'decompress;
                        };
                        output.push(byte);
                        dictionary.write_byte(byte);
                    } else {
                        let Ok(reference) = DictionaryReference::read(&mut cursor) else {
                            break 'decompress;
                        };
                        let Some(mut run) = dictionary.read_reference(reference) else {
                            break 'decompress;
                        };
                        output.append(&mut run);
                    }
                }
            }

            output.truncate(raw_size);
            Ok(output)
        }
        invalid => Err(Error::InvalidMagic(invalid)),
    }
}

/// [decompress_rtf], then each output byte widened to a char. Compressed RTF
/// bodies are single-byte text; escapes inside the RTF carry anything wider.
pub fn decompress_rtf_to_string(data: &[u8]) -> Result<String> {
    let bytes = decompress_rtf(data)?;
    let units: Vec<u16> = bytes.into_iter().map(u16::from).collect();
    Ok(String::from_utf16_lossy(&units))
}
