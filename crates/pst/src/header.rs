//! [HEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5):
//! the fixed structure at the front of every PST file. Only the fields the
//! reader needs are pulled out; CRCs are not validated.

use mailbag_mapi::ByteWindow;

use crate::{PstError, PstResult};

/// `dwMagic`: `!BDN`
pub const PST_MAGIC: [u8; 4] = [0x21, 0x42, 0x44, 0x4E];

/// `wVer` low byte selects the file layout.
const INDEX_TYPE_OFFSET: usize = 10;

const INDEX_TYPE_ANSI: u8 = 0x0E;
const INDEX_TYPE_UNICODE: u8 = 0x17;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PstVersion {
    /// Outlook 97: 32-bit file offsets.
    Ansi97,
    /// Outlook 2003: 64-bit file offsets.
    Unicode2003,
}

#[derive(Clone, Debug)]
pub struct PstHeader {
    pub version: PstVersion,
    /// `bCryptMethod`; see [crate::encode].
    pub encryption_type: u8,
    /// Root page of the index B-tree (block id to file location).
    pub index1_offset: u64,
    /// Root page of the descriptor B-tree (item hierarchy).
    pub index2_offset: u64,
}

impl PstHeader {
    pub fn parse(win: &ByteWindow<'_>) -> PstResult<Self> {
        if win.len() < 4 {
            return Err(PstError::DataTooShort(win.len()));
        }
        if win.slice(0, 4)? != PST_MAGIC {
            return Err(PstError::InvalidMagic);
        }

        let index_type = win
            .read_u8(INDEX_TYPE_OFFSET)
            .map_err(|_| PstError::DataTooShort(win.len()))?;
        let version = match index_type {
            INDEX_TYPE_ANSI => PstVersion::Ansi97,
            INDEX_TYPE_UNICODE => PstVersion::Unicode2003,
            unknown => return Err(PstError::UnknownIndexType(unknown)),
        };

        let too_short = |_| PstError::DataTooShort(win.len());
        let (encryption_type, index1_offset, index2_offset) = match version {
            PstVersion::Ansi97 => (
                win.read_u8(0x1CD).map_err(too_short)?,
                u64::from(win.read_u32_le(0xA0).map_err(too_short)?),
                u64::from(win.read_u32_le(0xA8).map_err(too_short)?),
            ),
            PstVersion::Unicode2003 => (
                win.read_u8(0x201).map_err(too_short)?,
                win.read_u64_le(0xB8).map_err(too_short)?,
                win.read_u64_le(0xC0).map_err(too_short)?,
            ),
        };

        Ok(Self {
            version,
            encryption_type,
            index1_offset,
            index2_offset,
        })
    }
}
