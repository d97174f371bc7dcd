//! Test-only builder for small synthetic compound files: one FAT sector,
//! every stream in the mini stream, directory sectors chained as needed.

use crate::cfb::dirent::tests::dirent_bytes;
use crate::cfb::{NOSTREAM, SECTOR_END_OF_CHAIN, SECTOR_FAT, SECTOR_FREE};

const SECTOR: usize = 512;
const MINI: usize = 64;
const DIRENTS_PER_SECTOR: usize = 4;

pub(crate) struct NodeSpec {
    pub name: String,
    /// Raw dirent object type byte.
    pub kind: u8,
    pub content: Vec<u8>,
    /// Indices into the node list; becomes the sibling chain order.
    pub children: Vec<usize>,
}

pub(crate) fn root(children: Vec<usize>) -> NodeSpec {
    NodeSpec {
        name: "Root Entry".to_owned(),
        kind: 5,
        content: Vec::new(),
        children,
    }
}

pub(crate) fn storage(name: &str, children: Vec<usize>) -> NodeSpec {
    NodeSpec {
        name: name.to_owned(),
        kind: 1,
        content: Vec::new(),
        children,
    }
}

pub(crate) fn stream(name: &str, content: Vec<u8>) -> NodeSpec {
    NodeSpec {
        name: name.to_owned(),
        kind: 2,
        content,
        children: Vec::new(),
    }
}

pub(crate) fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// A `__properties_version1.0` body: `header_size` zero bytes, then 16-byte
/// records of `(raw_type, code, value)`.
pub(crate) fn properties_stream(header_size: usize, records: &[(u16, u16, u64)]) -> Vec<u8> {
    let mut body = vec![0_u8; header_size];
    for &(raw_type, code, value) in records {
        body.extend_from_slice(&raw_type.to_le_bytes());
        body.extend_from_slice(&code.to_le_bytes());
        body.extend_from_slice(&[0_u8; 4]);
        body.extend_from_slice(&value.to_le_bytes());
    }
    body
}

fn put_u16(blob: &mut [u8], offset: usize, value: u16) {
    blob[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(blob: &mut [u8], offset: usize, value: u32) {
    blob[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Assembles the container. Node 0 must be the root.
pub(crate) fn build_container(nodes: &[NodeSpec]) -> Vec<u8> {
    assert_eq!(nodes[0].kind, 5, "node 0 must be the root storage");

    // Mini stream allocation, one chain per non-empty stream.
    let mut mini_start = vec![SECTOR_END_OF_CHAIN; nodes.len()];
    let mut mini_fat_entries: Vec<u32> = Vec::new();
    let mut mini_data: Vec<u8> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.kind != 2 || node.content.is_empty() {
            continue;
        }
        let count = node.content.len().div_ceil(MINI);
        mini_start[i] = mini_fat_entries.len() as u32;
        for k in 0..count {
            if k + 1 == count {
                mini_fat_entries.push(SECTOR_END_OF_CHAIN);
            } else {
                mini_fat_entries.push(mini_fat_entries.len() as u32 + 1);
            }
        }
        mini_data.extend_from_slice(&node.content);
        mini_data.resize(mini_fat_entries.len() * MINI, 0);
    }
    assert!(mini_fat_entries.len() <= SECTOR / 4, "one Mini FAT sector only");

    // Sibling chains: first child hangs off the parent, the rest chain
    // through right_sid.
    let mut right = vec![NOSTREAM; nodes.len()];
    let mut child = vec![NOSTREAM; nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        if let Some(&first) = node.children.first() {
            child[i] = first as u32;
        }
        for pair in node.children.windows(2) {
            right[pair[0]] = pair[1] as u32;
        }
    }

    // Sector map: FAT, directory sectors, Mini FAT, mini stream sectors.
    let dir_sectors = nodes.len().div_ceil(DIRENTS_PER_SECTOR);
    let mini_fat_sector = 1 + dir_sectors;
    let mini_stream_sector = mini_fat_sector + 1;
    let mini_stream_sectors = mini_data.len().div_ceil(SECTOR);
    let total_sectors = mini_stream_sector + mini_stream_sectors;

    let mut blob = vec![0_u8; (1 + total_sectors) * SECTOR];

    // Header
    blob[..8].copy_from_slice(&crate::cfb::CFB_MAGIC);
    put_u16(&mut blob, 26, 3);
    put_u16(&mut blob, 28, 0xFFFE);
    put_u16(&mut blob, 30, 9);
    put_u16(&mut blob, 32, 6);
    put_u32(&mut blob, 44, 1);
    put_u32(&mut blob, 48, 1);
    put_u32(&mut blob, 56, 4096);
    put_u32(&mut blob, 60, mini_fat_sector as u32);
    put_u32(&mut blob, 64, 1);
    put_u32(&mut blob, 68, SECTOR_END_OF_CHAIN);
    put_u32(&mut blob, 72, 0);
    put_u32(&mut blob, 76, 0);
    for i in 1..109 {
        put_u32(&mut blob, 76 + i * 4, SECTOR_FREE);
    }

    // FAT sector 0
    let fat = SECTOR;
    for i in 0..SECTOR / 4 {
        put_u32(&mut blob, fat + i * 4, SECTOR_FREE);
    }
    put_u32(&mut blob, fat, SECTOR_FAT);
    for d in 0..dir_sectors {
        let sector = 1 + d;
        let next = if d + 1 == dir_sectors {
            SECTOR_END_OF_CHAIN
        } else {
            sector as u32 + 1
        };
        put_u32(&mut blob, fat + sector * 4, next);
    }
    put_u32(&mut blob, fat + mini_fat_sector * 4, SECTOR_END_OF_CHAIN);
    for m in 0..mini_stream_sectors {
        let sector = mini_stream_sector + m;
        let next = if m + 1 == mini_stream_sectors {
            SECTOR_END_OF_CHAIN
        } else {
            sector as u32 + 1
        };
        put_u32(&mut blob, fat + sector * 4, next);
    }

    // Directory entries
    for (i, node) in nodes.iter().enumerate() {
        let (start, size) = match node.kind {
            5 if !mini_data.is_empty() => (mini_stream_sector as u32, mini_data.len() as u64),
            5 => (SECTOR_END_OF_CHAIN, 0),
            2 => (mini_start[i], node.content.len() as u64),
            _ => (0, 0),
        };
        let record = dirent_bytes(
            &node.name,
            node.kind,
            NOSTREAM,
            right[i],
            child[i],
            start,
            size,
        );
        let offset = (1 + 1 + i / DIRENTS_PER_SECTOR) * SECTOR + (i % DIRENTS_PER_SECTOR) * 128;
        blob[offset..offset + 128].copy_from_slice(&record);
    }

    // Mini FAT
    let mini_fat_offset = (1 + mini_fat_sector) * SECTOR;
    for i in 0..SECTOR / 4 {
        put_u32(&mut blob, mini_fat_offset + i * 4, SECTOR_FREE);
    }
    for (i, &next) in mini_fat_entries.iter().enumerate() {
        put_u32(&mut blob, mini_fat_offset + i * 4, next);
    }

    // Mini stream
    let mini_offset = (1 + mini_stream_sector) * SECTOR;
    blob[mini_offset..mini_offset + mini_data.len()].copy_from_slice(&mini_data);

    blob
}
