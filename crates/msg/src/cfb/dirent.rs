//! [Compound File Directory Entry](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/60fe8611-66c3-496b-b70d-a504c94c9ace)
//! records and the flattened directory tree.

use std::collections::{BTreeMap, HashSet};

use mailbag_mapi::{ByteWindow, FileTime, Guid};

/// Absent sibling/child linkage.
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// On-disk size of one directory entry.
pub const DIRENT_SIZE: usize = 128;

const NAME_FIELD_SIZE: usize = 64;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DirentType {
    Empty,
    Storage,
    Stream,
    LockBytes,
    Property,
    Root,
}

impl From<u8> for DirentType {
    /// Unknown object types are treated as empty, which drops the entry.
    fn from(value: u8) -> Self {
        match value {
            0x01 => DirentType::Storage,
            0x02 => DirentType::Stream,
            0x03 => DirentType::LockBytes,
            0x04 => DirentType::Property,
            0x05 => DirentType::Root,
            _ => DirentType::Empty,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Dirent {
    /// Zero-based stream identifier: the entry's index in the directory.
    pub sid: u32,
    pub name: String,
    pub dirent_type: DirentType,
    pub color: u8,
    pub left_sid: u32,
    pub right_sid: u32,
    pub child_sid: u32,
    pub clsid: Guid,
    pub created: FileTime,
    pub modified: FileTime,
    pub start_sector: u32,
    pub size: u64,
}

impl Dirent {
    /// Parses one 128-byte record. Empty entries come back as `None`.
    fn parse(win: &ByteWindow<'_>, sid: u32, major_version: u16) -> Option<Self> {
        let dirent_type = DirentType::from(win.read_u8(66).ok()?);
        if dirent_type == DirentType::Empty {
            return None;
        }

        // Name length counts bytes including the terminating NUL, capped at
        // the 64-byte field.
        let name_size = (win.read_u16_le(64).ok()? as usize).min(NAME_FIELD_SIZE);
        let name = if name_size >= 2 {
            win.read_utf16_le(0, name_size - 2)
                .ok()?
                .trim_end_matches('\0')
                .to_owned()
        } else {
            String::new()
        };

        let mut size = win.read_u64_le(120).ok()?;
        if major_version == 3 && dirent_type != DirentType::Root {
            size &= 0xFFFF_FFFF;
        }

        Some(Self {
            sid,
            name,
            dirent_type,
            color: win.read_u8(67).ok()?,
            left_sid: win.read_u32_le(68).ok()?,
            right_sid: win.read_u32_le(72).ok()?,
            child_sid: win.read_u32_le(76).ok()?,
            clsid: win.read_guid(80).ok()?,
            created: win.read_filetime(100).ok()?,
            modified: win.read_filetime(108).ok()?,
            start_sector: win.read_u32_le(116).ok()?,
            size,
        })
    }
}

#[derive(Clone, Default, Debug)]
pub struct DirectoryTree {
    entries: BTreeMap<u32, Dirent>,
}

impl DirectoryTree {
    /// Splits the directory stream into consecutive 128-byte records indexed
    /// by SID, dropping empty entries.
    pub fn parse(dir_stream: &[u8], major_version: u16) -> Self {
        let mut entries = BTreeMap::new();
        for (index, record) in dir_stream.chunks_exact(DIRENT_SIZE).enumerate() {
            let sid = index as u32;
            if let Some(dirent) = Dirent::parse(&ByteWindow::new(record), sid, major_version) {
                entries.insert(sid, dirent);
            }
        }
        Self { entries }
    }

    pub fn get(&self, sid: u32) -> Option<&Dirent> {
        self.entries.get(&sid)
    }

    /// The root storage entry, by convention SID 0.
    pub fn root(&self) -> Option<&Dirent> {
        self.entries
            .get(&0)
            .filter(|dirent| dirent.dirent_type == DirentType::Root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered children of a storage: the in-order traversal of the
    /// red-black tree hanging off `child_sid`. Broken linkage (a SID with no
    /// entry) terminates that leg; revisiting a SID terminates the walk.
    pub fn children(&self, parent: &Dirent) -> Vec<&Dirent> {
        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut current = parent.child_sid;

        loop {
            while current != NOSTREAM && visited.insert(current) {
                match self.get(current) {
                    Some(dirent) => {
                        stack.push(dirent);
                        current = dirent.left_sid;
                    }
                    None => break,
                }
            }
            let Some(dirent) = stack.pop() else {
                break;
            };
            ordered.push(dirent);
            current = dirent.right_sid;
        }

        ordered
    }

    /// Case-insensitive name match over the ordered children.
    pub fn find_child(&self, parent: &Dirent, name: &str) -> Option<&Dirent> {
        self.children(parent)
            .into_iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }
}
