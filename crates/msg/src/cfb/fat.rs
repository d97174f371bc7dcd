//! [Compound File FAT](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/30e1013a-a0ff-4404-9ccf-d75d835ff404)
//! and [Mini FAT](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/c5d235f7-b73c-4ec5-bf8d-5c08306cd023)
//! sector allocation tables.

use std::collections::{BTreeMap, HashSet};

use mailbag_mapi::ByteWindow;

use super::header::{is_sentinel, CfbHeader, SECTOR_END_OF_CHAIN};

/// Upper bound on any sector chain walk. Valid files never get near it;
/// adversarial ones must not walk forever.
pub const MAX_CHAIN_LENGTH: usize = 1_000_000;

/// Next-pointer map: entry `n` holds the sector that follows `n` in its
/// chain, or a sentinel.
#[derive(Clone, Default, Debug)]
pub struct SectorTable {
    next: BTreeMap<u32, u32>,
}

impl SectorTable {
    pub fn insert(&mut self, sector: u32, next: u32) {
        self.next.insert(sector, next);
    }

    pub fn next(&self, sector: u32) -> Option<u32> {
        self.next.get(&sector).copied()
    }

    pub fn len(&self) -> usize {
        self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// The ordered chain starting at `start`, ending at the first sentinel,
    /// unmapped sector, repeated sector or the [MAX_CHAIN_LENGTH] bound.
    pub fn chain(&self, start: u32) -> Vec<u32> {
        let mut sectors = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start;

        while !is_sentinel(current) && sectors.len() < MAX_CHAIN_LENGTH {
            if !visited.insert(current) {
                break;
            }
            sectors.push(current);
            match self.next(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        sectors
    }
}

/// Raw bytes of sector `n`, clamped to what the blob actually holds.
pub(crate) fn sector_bytes<'a>(
    win: &ByteWindow<'a>,
    header: &CfbHeader,
    sector: u32,
) -> &'a [u8] {
    let offset = header.sector_offset(sector);
    if offset >= win.len() {
        return &[];
    }
    let len = header.sector_size.min(win.len() - offset);
    win.slice(offset, len).unwrap_or(&[])
}

/// Collects the FAT from the in-header DIFAT entries plus the DIFAT sector
/// chain. Each DIFAT sector holds `sector_size / 4 - 1` FAT sector numbers
/// followed by the next-DIFAT pointer.
pub(crate) fn build_fat(win: &ByteWindow<'_>, header: &CfbHeader) -> SectorTable {
    let mut fat_sectors = header.difat.clone();

    if header.difat_count > 0 {
        let mut visited = HashSet::new();
        let mut current = header.difat_start;
        while !is_sentinel(current) && visited.insert(current) {
            let raw = sector_bytes(win, header, current);
            if raw.len() < header.sector_size {
                break;
            }
            let difat_win = ByteWindow::new(raw);
            let pointers = header.sector_size / 4 - 1;
            for i in 0..pointers {
                let entry = difat_win.read_u32_le(i * 4).unwrap_or(SECTOR_END_OF_CHAIN);
                if !is_sentinel(entry) {
                    fat_sectors.push(entry);
                }
            }
            current = difat_win
                .read_u32_le(pointers * 4)
                .unwrap_or(SECTOR_END_OF_CHAIN);
        }
    }

    let entries_per_sector = header.sector_size / 4;
    let mut table = SectorTable::default();
    for (index, &fat_sector) in fat_sectors.iter().enumerate() {
        let raw = sector_bytes(win, header, fat_sector);
        let fat_win = ByteWindow::new(raw);
        for i in 0..raw.len() / 4 {
            let Ok(next) = fat_win.read_u32_le(i * 4) else {
                break;
            };
            table.insert((index * entries_per_sector + i) as u32, next);
        }
    }

    table
}

/// The Mini FAT is an ordinary FAT chain of sectors, each an array of
/// next-pointers for 64-byte mini sectors.
pub(crate) fn build_mini_fat(
    win: &ByteWindow<'_>,
    header: &CfbHeader,
    fat: &SectorTable,
) -> SectorTable {
    let mut table = SectorTable::default();
    if header.mini_fat_start == SECTOR_END_OF_CHAIN {
        return table;
    }

    let mut index = 0_usize;
    for sector in fat.chain(header.mini_fat_start) {
        let raw = sector_bytes(win, header, sector);
        let mini_win = ByteWindow::new(raw);
        for i in 0..raw.len() / 4 {
            let Ok(next) = mini_win.read_u32_le(i * 4) else {
                break;
            };
            table.insert(index as u32, next);
            index += 1;
        }
    }

    table
}

/// Concatenation of every sector in the FAT chain from `start`.
pub(crate) fn read_stream(win: &ByteWindow<'_>, header: &CfbHeader, fat: &SectorTable, start: u32) -> Vec<u8> {
    let mut data = Vec::new();
    for sector in fat.chain(start) {
        data.extend_from_slice(sector_bytes(win, header, sector));
    }
    data
}

/// Concatenation of 64-byte chunks of the mini stream along the Mini FAT
/// chain from `start`, truncated to `size`.
pub(crate) fn read_mini_stream(
    mini_stream: &[u8],
    mini_fat: &SectorTable,
    mini_sector_size: usize,
    start: u32,
    size: usize,
) -> Vec<u8> {
    let mut data = Vec::new();
    for mini_sector in mini_fat.chain(start) {
        let offset = mini_sector as usize * mini_sector_size;
        if offset >= mini_stream.len() {
            continue;
        }
        let end = (offset + mini_sector_size).min(mini_stream.len());
        data.extend_from_slice(&mini_stream[offset..end]);
        if data.len() >= size {
            break;
        }
    }
    data.truncate(size);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_stops_at_end_of_chain() {
        let mut table = SectorTable::default();
        table.insert(0, 1);
        table.insert(1, 2);
        table.insert(2, SECTOR_END_OF_CHAIN);
        assert_eq!(table.chain(0), vec![0, 1, 2]);
    }

    #[test]
    fn test_chain_detects_cycle() {
        let mut table = SectorTable::default();
        table.insert(0, 1);
        table.insert(1, 0);
        let chain = table.chain(0);
        assert!(chain.len() <= 2);
        assert_eq!(chain, vec![0, 1]);
    }

    #[test]
    fn test_chain_self_loop() {
        let mut table = SectorTable::default();
        table.insert(5, 5);
        assert_eq!(table.chain(5), vec![5]);
    }

    #[test]
    fn test_chain_stops_at_unmapped_sector() {
        let mut table = SectorTable::default();
        table.insert(0, 7);
        assert_eq!(table.chain(0), vec![0, 7]);
    }

    #[test]
    fn test_chain_of_sentinel_is_empty() {
        let table = SectorTable::default();
        assert!(table.chain(SECTOR_END_OF_CHAIN).is_empty());
        assert!(table.chain(super::super::header::SECTOR_FREE).is_empty());
    }

    #[test]
    fn test_build_fat_follows_difat_chain() {
        use super::super::header::{SECTOR_FAT, SECTOR_FREE};
        use mailbag_mapi::ByteWindow;

        let header = CfbHeader {
            major_version: 3,
            sector_size: 512,
            mini_sector_size: 64,
            mini_cutoff: 4096,
            dir_start_sector: SECTOR_END_OF_CHAIN,
            fat_sector_count: 2,
            mini_fat_start: SECTOR_END_OF_CHAIN,
            mini_fat_count: 0,
            difat_start: 1,
            difat_count: 1,
            difat: vec![0],
        };

        // Sector 0: first FAT sector. Sector 1: a DIFAT sector pointing at
        // one more FAT sector (2). Sector 2: second FAT sector.
        let mut blob = vec![0_u8; 4 * 512];
        for entry in blob[512..1024].chunks_exact_mut(4) {
            entry.copy_from_slice(&SECTOR_FREE.to_le_bytes());
        }
        blob[512..516].copy_from_slice(&SECTOR_FAT.to_le_bytes());
        blob[516..520].copy_from_slice(&0x31_u32.to_le_bytes());
        for entry in blob[1024..1536].chunks_exact_mut(4) {
            entry.copy_from_slice(&SECTOR_FREE.to_le_bytes());
        }
        blob[1024..1028].copy_from_slice(&2_u32.to_le_bytes());
        blob[1532..1536].copy_from_slice(&SECTOR_END_OF_CHAIN.to_le_bytes());
        blob[1536..1540].copy_from_slice(&0x42_u32.to_le_bytes());

        let table = build_fat(&ByteWindow::new(&blob), &header);
        // Entry 1 from the in-header FAT sector, entry 128 from the one the
        // DIFAT chain contributed.
        assert_eq!(table.next(1), Some(0x31));
        assert_eq!(table.next(128), Some(0x42));
    }
}
