//! [Named Property Mapping Storage](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/193c169b-0628-4392-aa51-83009be7d71e):
//! the `__nameid_version1.0` storage that maps pseudo property codes at or
//! above 0x8000 to their real (id-or-name, GUID) identity.

use std::collections::BTreeMap;

use mailbag_mapi::{
    guid::{PS_MAPI, PS_PUBLIC_STRINGS},
    ByteWindow, Guid, KeyCode, MapiKey,
};

use crate::{cfb::CompoundFile, MsgError};

pub const NAMEID_STORAGE: &str = "__nameid_version1.0";

const GUID_STREAM: &str = "__substg1.0_00020102";
const ENTRY_STREAM: &str = "__substg1.0_00030102";
const STRING_STREAM: &str = "__substg1.0_00040102";

/// Resolved pseudo-code map. Codes below 0x8000 never hit the map; they are
/// standard tags under [PS_MAPI].
#[derive(Clone, Default, Debug)]
pub struct NameidMap {
    entries: BTreeMap<u16, MapiKey>,
}

impl NameidMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: u16) -> Option<&MapiKey> {
        self.entries.get(&code)
    }

    /// Property-code resolution: standard tag below 0x8000, mapped named
    /// property at or above, and the PS_MAPI fallback for unmapped codes.
    pub fn resolve(&self, code: u16) -> MapiKey {
        if code >= 0x8000 {
            if let Some(key) = self.entries.get(&code) {
                return key.clone();
            }
        }
        MapiKey::numeric(u32::from(code))
    }

    /// Parses the nameid storage under the root. A missing or malformed
    /// storage is an error; the caller downgrades it to a warning and
    /// continues with an empty map.
    pub fn parse(file: &CompoundFile) -> Result<Self, MsgError> {
        let root = file.root().ok_or(MsgError::MissingRootEntry)?;
        let storage = file
            .find_child(root, NAMEID_STORAGE)
            .ok_or(MsgError::MissingStream(NAMEID_STORAGE))?;

        let guids = read_stream(file, storage, GUID_STREAM);
        let entries = read_stream(file, storage, ENTRY_STREAM);
        let strings = read_stream(file, storage, STRING_STREAM);

        let guid_table: Vec<Guid> = guids
            .chunks_exact(16)
            .map(|raw| Guid::from_mixed_endian(raw.try_into().expect("16-byte chunk")))
            .collect();
        let strings = ByteWindow::new(&strings);

        let mut map = BTreeMap::new();
        for (index, record) in entries.chunks_exact(8).enumerate() {
            if index >= 0x8000 {
                break;
            }
            let record = ByteWindow::new(record);
            let name_or_id = record.read_u32_le(0)?;
            let flags = record.read_u32_le(4)?;

            let guid = resolve_guid(&guid_table, (flags >> 1) & 0x7FFF);
            let code = if flags & 0x1 != 0 {
                match read_string_name(&strings, name_or_id as usize) {
                    Some(name) => KeyCode::Name(name),
                    // Dangling string offset: keep the raw offset as a
                    // numeric identity rather than dropping the property.
                    None => KeyCode::Number(name_or_id),
                }
            } else {
                KeyCode::Number(name_or_id)
            };

            let pseudo_code = 0x8000 + index as u16;
            map.insert(pseudo_code, MapiKey::new(code, guid));
        }

        Ok(Self { entries: map })
    }
}

/// Predefined indexes 0 and 1, then the GUID table from index 2 up. Unmapped
/// indexes fall back to PS_MAPI.
fn resolve_guid(guid_table: &[Guid], index: u32) -> Guid {
    match index {
        0 => PS_MAPI,
        1 => PS_PUBLIC_STRINGS,
        n => guid_table
            .get(n as usize - 2)
            .copied()
            .unwrap_or(PS_MAPI),
    }
}

/// A string-table entry is a u32 byte length followed by that many bytes of
/// UTF-16LE name.
fn read_string_name(strings: &ByteWindow<'_>, offset: usize) -> Option<String> {
    let len = strings.read_u32_le(offset).ok()? as usize;
    strings
        .read_utf16_le(offset + 4, len)
        .ok()
        .map(|name| name.trim_end_matches('\0').to_owned())
}

/// A missing inner stream reads as empty; only the storage itself is
/// required.
fn read_stream(file: &CompoundFile, storage: &crate::cfb::Dirent, name: &str) -> Vec<u8> {
    file.find_child(storage, name)
        .map(|child| file.stream_bytes(child))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_guid_indexes() {
        let table = vec![mailbag_mapi::guid::PSETID_COMMON];
        assert_eq!(resolve_guid(&table, 0), PS_MAPI);
        assert_eq!(resolve_guid(&table, 1), PS_PUBLIC_STRINGS);
        assert_eq!(resolve_guid(&table, 2), mailbag_mapi::guid::PSETID_COMMON);
        assert_eq!(resolve_guid(&table, 3), PS_MAPI);
    }

    #[test]
    fn test_resolution_law() {
        let map = NameidMap::default();
        assert_eq!(map.resolve(0x0037), MapiKey::numeric(0x0037));
        // Unmapped high code falls back to PS_MAPI.
        assert_eq!(map.resolve(0x8000), MapiKey::numeric(0x8000));
    }

    #[test]
    fn test_parse_from_synthetic_container() {
        use crate::testutil::{build_container, root, storage, stream, utf16};
        use mailbag_mapi::guid::PSETID_COMMON;

        // Entry 0: numeric id 0x8580 under GUID-table index 2 (the first
        // table slot, PSETID_COMMON). Entry 1: string name "Keywords" under
        // index 1 (PS_PUBLIC_STRINGS).
        let mut entries = Vec::new();
        entries.extend_from_slice(&0x8580_u32.to_le_bytes());
        entries.extend_from_slice(&(2_u32 << 1).to_le_bytes());
        entries.extend_from_slice(&0_u32.to_le_bytes());
        entries.extend_from_slice(&((1_u32 << 1) | 1).to_le_bytes());

        let mut strings = Vec::new();
        strings.extend_from_slice(&16_u32.to_le_bytes());
        strings.extend_from_slice(&utf16("Keywords"));

        let blob = build_container(&[
            root(vec![1, 5]),
            storage(NAMEID_STORAGE, vec![2, 3, 4]),
            stream(GUID_STREAM, PSETID_COMMON.to_mixed_endian().to_vec()),
            stream(ENTRY_STREAM, entries),
            stream(STRING_STREAM, strings),
            stream("__substg1.0_8000001F", utf16("Personal")),
        ]);

        let msg = crate::MsgFile::parse(blob).unwrap();
        assert!(msg.warnings().is_empty());
        let nameid = msg.nameid();
        assert_eq!(nameid.len(), 2);
        assert_eq!(
            nameid.resolve(0x8000),
            MapiKey::new(KeyCode::Number(0x8580), PSETID_COMMON)
        );
        assert_eq!(
            nameid.resolve(0x8001),
            MapiKey::named("Keywords", PS_PUBLIC_STRINGS)
        );

        // The substg under pseudo-code 0x8000 resolves to the named key,
        // which the registry knows as internet_account_name.
        let message = msg.message();
        assert_eq!(
            message
                .properties
                .get("internet_account_name")
                .unwrap()
                .as_str(),
            Some("Personal")
        );
    }

    #[test]
    fn test_read_string_name() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&10_u32.to_le_bytes());
        for unit in "Keywords".encode_utf16().take(5) {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        let win = ByteWindow::new(&raw);
        assert_eq!(read_string_name(&win, 0).unwrap(), "Keywo");
        assert!(read_string_name(&win, 32).is_none());
    }
}
