//! The two PST B-trees: the index tree (block id to file location and size)
//! and the descriptor tree (item hierarchy). Pages are a fixed 512 bytes in
//! both file versions; only the leaf and branch record widths differ.
//!
//! Traversal is defensive: out-of-range pages yield empty results plus a
//! warning, oversized item counts are clamped to what fits a page, and a
//! visited set breaks branch loops.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use mailbag_mapi::{ByteWindow, Warning, WarningCode};

use crate::header::PstVersion;

pub const PAGE_SIZE: usize = 512;

/// Offset of the page trailer: `item_count, max_count, entry_size, level`.
const TRAILER_OFFSET: usize = 496;

/// One index leaf record: where a block lives in the file.
#[derive(Clone, Copy, Debug)]
pub struct IndexRecord {
    pub id: u64,
    pub offset: u64,
    pub size: u32,
    pub flags: u16,
}

/// One descriptor leaf record: an item, its block, its sub-node table and
/// its parent.
#[derive(Clone, Copy, Debug)]
pub struct Descriptor {
    pub desc_id: u64,
    pub idx_id: u64,
    pub idx2_id: u64,
    pub parent: u32,
}

/// Leaf layout, parameterized over the two file versions.
trait LeafRecord: Sized {
    const WARNING: WarningCode;

    fn width(version: PstVersion) -> usize;
    fn parse(win: &ByteWindow<'_>, offset: usize, version: PstVersion) -> Option<Self>;
    fn key(&self) -> u64;
}

impl LeafRecord for IndexRecord {
    const WARNING: WarningCode = WarningCode::PstIndexParseFailed;

    fn width(version: PstVersion) -> usize {
        match version {
            PstVersion::Ansi97 => 12,
            PstVersion::Unicode2003 => 24,
        }
    }

    fn parse(win: &ByteWindow<'_>, offset: usize, version: PstVersion) -> Option<Self> {
        match version {
            PstVersion::Ansi97 => Some(Self {
                id: u64::from(win.read_u32_le(offset).ok()?),
                offset: u64::from(win.read_u32_le(offset + 4).ok()?),
                size: u32::from(win.read_u16_le(offset + 8).ok()?),
                flags: win.read_u16_le(offset + 10).ok()?,
            }),
            PstVersion::Unicode2003 => Some(Self {
                id: win.read_u64_le(offset).ok()?,
                offset: win.read_u64_le(offset + 8).ok()?,
                size: u32::from(win.read_u16_le(offset + 16).ok()?),
                flags: win.read_u16_le(offset + 18).ok()?,
            }),
        }
    }

    fn key(&self) -> u64 {
        self.id
    }
}

impl LeafRecord for Descriptor {
    const WARNING: WarningCode = WarningCode::PstDescriptorParseFailed;

    fn width(version: PstVersion) -> usize {
        match version {
            PstVersion::Ansi97 => 16,
            PstVersion::Unicode2003 => 32,
        }
    }

    fn parse(win: &ByteWindow<'_>, offset: usize, version: PstVersion) -> Option<Self> {
        match version {
            PstVersion::Ansi97 => Some(Self {
                desc_id: u64::from(win.read_u32_le(offset).ok()?),
                idx_id: u64::from(win.read_u32_le(offset + 4).ok()?),
                idx2_id: u64::from(win.read_u32_le(offset + 8).ok()?),
                parent: win.read_u32_le(offset + 12).ok()?,
            }),
            PstVersion::Unicode2003 => Some(Self {
                desc_id: win.read_u64_le(offset).ok()?,
                idx_id: win.read_u64_le(offset + 8).ok()?,
                idx2_id: win.read_u64_le(offset + 16).ok()?,
                parent: win.read_u32_le(offset + 24).ok()?,
            }),
        }
    }

    fn key(&self) -> u64 {
        self.desc_id
    }
}

fn branch_width(version: PstVersion) -> usize {
    match version {
        PstVersion::Ansi97 => 12,
        PstVersion::Unicode2003 => 24,
    }
}

fn branch_child(win: &ByteWindow<'_>, offset: usize, version: PstVersion) -> Option<u64> {
    match version {
        PstVersion::Ansi97 => win.read_u32_le(offset + 4).ok().map(u64::from),
        PstVersion::Unicode2003 => win.read_u64_le(offset + 8).ok(),
    }
}

pub fn read_index_btree(
    win: &ByteWindow<'_>,
    version: PstVersion,
    root_offset: u64,
    warnings: &mut Vec<Warning>,
) -> BTreeMap<u64, IndexRecord> {
    let mut records = BTreeMap::new();
    let mut visited = HashSet::new();
    walk::<IndexRecord>(win, version, root_offset, &mut visited, &mut records, warnings);
    records
}

pub fn read_descriptor_btree(
    win: &ByteWindow<'_>,
    version: PstVersion,
    root_offset: u64,
    warnings: &mut Vec<Warning>,
) -> BTreeMap<u64, Descriptor> {
    let mut records = BTreeMap::new();
    let mut visited = HashSet::new();
    walk::<Descriptor>(win, version, root_offset, &mut visited, &mut records, warnings);
    records
}

fn walk<R: LeafRecord>(
    win: &ByteWindow<'_>,
    version: PstVersion,
    page_offset: u64,
    visited: &mut HashSet<u64>,
    records: &mut BTreeMap<u64, R>,
    warnings: &mut Vec<Warning>,
) {
    if !visited.insert(page_offset) {
        debug!("B-tree branch loop at page offset 0x{page_offset:X}");
        warnings.push(
            Warning::new(
                WarningCode::PstBranchLoopDetected,
                "branch page already visited",
            )
            .with_context(format!("0x{page_offset:X}")),
        );
        return;
    }

    let Ok(page_offset) = usize::try_from(page_offset) else {
        warnings.push(out_of_range_warning::<R>(page_offset));
        return;
    };
    let Ok(page) = win.window(page_offset, PAGE_SIZE) else {
        warnings.push(out_of_range_warning::<R>(page_offset as u64));
        return;
    };

    // Page trailer
    let item_count = page.read_u8(TRAILER_OFFSET).expect("fixed-size page") as usize;
    let level = page.read_u8(TRAILER_OFFSET + 3).expect("fixed-size page");

    if level == 0 {
        let width = R::width(version);
        // An oversized count degrades to the records that actually fit.
        let count = item_count.min(TRAILER_OFFSET / width);
        for i in 0..count {
            if let Some(record) = R::parse(&page, i * width, version) {
                records.insert(record.key(), record);
            }
        }
    } else {
        let width = branch_width(version);
        let count = item_count.min(TRAILER_OFFSET / width);
        for i in 0..count {
            if let Some(child_offset) = branch_child(&page, i * width, version) {
                walk::<R>(win, version, child_offset, visited, records, warnings);
            }
        }
    }
}

fn out_of_range_warning<R: LeafRecord>(page_offset: u64) -> Warning {
    Warning::new(R::WARNING, "page offset out of range")
        .with_context(format!("0x{page_offset:X}"))
}

/// Reverse index of the descriptor hierarchy: parent id to ordered child
/// ids. Parent 0 marks a root-level descriptor and produces no edge.
pub fn build_children(descriptors: &BTreeMap<u64, Descriptor>) -> BTreeMap<u64, Vec<u64>> {
    let mut children: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for descriptor in descriptors.values() {
        if descriptor.parent != 0 && u64::from(descriptor.parent) != descriptor.desc_id {
            children
                .entry(u64::from(descriptor.parent))
                .or_default()
                .push(descriptor.desc_id);
        }
    }
    children
}
