//! Bounds-checked view over an in-memory blob.
//!
//! Every reader is total: a short read yields [MapiError::OutOfRange], never
//! a panic. Binary container fields are little-endian throughout except where
//! a reader says otherwise; GUIDs use the mixed-endian layout of
//! [MS-DTYP 2.3.4.2](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dtyp/49e490b8-f972-45d6-a3a4-99f924998d97).

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{filetime::FileTime, guid::Guid, MapiError, MapiResult};

#[derive(Clone, Copy, Debug)]
pub struct ByteWindow<'a> {
    data: &'a [u8],
}

impl<'a> ByteWindow<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn slice(&self, offset: usize, len: usize) -> MapiResult<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(MapiError::OutOfRange {
            offset,
            len,
            available: self.data.len(),
        })?;
        self.data.get(offset..end).ok_or(MapiError::OutOfRange {
            offset,
            len,
            available: self.data.len(),
        })
    }

    /// Sub-window over `[offset, offset + len)`.
    pub fn window(&self, offset: usize, len: usize) -> MapiResult<ByteWindow<'a>> {
        Ok(ByteWindow::new(self.slice(offset, len)?))
    }

    pub fn read_u8(&self, offset: usize) -> MapiResult<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_u16_le(&self, offset: usize) -> MapiResult<u16> {
        Ok(LittleEndian::read_u16(self.slice(offset, 2)?))
    }

    pub fn read_u16_be(&self, offset: usize) -> MapiResult<u16> {
        Ok(BigEndian::read_u16(self.slice(offset, 2)?))
    }

    pub fn read_u32_le(&self, offset: usize) -> MapiResult<u32> {
        Ok(LittleEndian::read_u32(self.slice(offset, 4)?))
    }

    pub fn read_u64_le(&self, offset: usize) -> MapiResult<u64> {
        Ok(LittleEndian::read_u64(self.slice(offset, 8)?))
    }

    pub fn read_i16_le(&self, offset: usize) -> MapiResult<i16> {
        Ok(LittleEndian::read_i16(self.slice(offset, 2)?))
    }

    pub fn read_i32_le(&self, offset: usize) -> MapiResult<i32> {
        Ok(LittleEndian::read_i32(self.slice(offset, 4)?))
    }

    pub fn read_i64_le(&self, offset: usize) -> MapiResult<i64> {
        Ok(LittleEndian::read_i64(self.slice(offset, 8)?))
    }

    pub fn read_f32_le(&self, offset: usize) -> MapiResult<f32> {
        Ok(LittleEndian::read_f32(self.slice(offset, 4)?))
    }

    pub fn read_f64_le(&self, offset: usize) -> MapiResult<f64> {
        Ok(LittleEndian::read_f64(self.slice(offset, 8)?))
    }

    /// Decodes `len_bytes` bytes of UTF-16LE. An odd trailing byte is
    /// dropped; unpaired surrogates become U+FFFD.
    pub fn read_utf16_le(&self, offset: usize, len_bytes: usize) -> MapiResult<String> {
        let raw = self.slice(offset, len_bytes)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    pub fn read_filetime(&self, offset: usize) -> MapiResult<FileTime> {
        Ok(FileTime::new(self.read_u64_le(offset)?))
    }

    pub fn read_guid(&self, offset: usize) -> MapiResult<Guid> {
        let raw = self.slice(offset, 16)?;
        Ok(Guid::from_mixed_endian(raw.try_into().expect("16-byte slice")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_is_an_error() {
        let win = ByteWindow::new(&[0x01, 0x02]);
        assert!(matches!(
            win.read_u32_le(0),
            Err(MapiError::OutOfRange { offset: 0, len: 4, available: 2 })
        ));
        assert!(win.read_u8(2).is_err());
        assert_eq!(win.read_u16_le(0).unwrap(), 0x0201);
    }

    #[test]
    fn test_slice_offset_overflow() {
        let win = ByteWindow::new(&[0u8; 8]);
        assert!(win.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_endianness() {
        let win = ByteWindow::new(&[0x12, 0x34]);
        assert_eq!(win.read_u16_le(0).unwrap(), 0x3412);
        assert_eq!(win.read_u16_be(0).unwrap(), 0x1234);
    }

    #[test]
    fn test_read_utf16_le() {
        // "Hi" with a stray trailing byte
        let win = ByteWindow::new(&[0x48, 0x00, 0x69, 0x00, 0xFF]);
        assert_eq!(win.read_utf16_le(0, 4).unwrap(), "Hi");
        assert_eq!(win.read_utf16_le(0, 5).unwrap(), "Hi");
    }
}
