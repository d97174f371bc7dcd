//! Property block parsing. A block is located through an [IndexRecord],
//! decoded per [crate::encode], then dispatched on its first byte: `0xBC`
//! for a property store, `0x7C` for a table of fixed-column rows.
//!
//! Layout of both forms: `sig:u8, pad:u8, offset_table_start:u16`, followed
//! by 8-byte property records in `[4, offset_table_start)`. The offset table
//! at `offset_table_start` is `count:u16, free:u16` and `count + 1` block-
//! relative `u16` boundaries; heap references index the boundary pairs.

use std::collections::BTreeMap;

use log::debug;
use mailbag_mapi::{
    prop_type::split_type, ByteWindow, MapiKey, PropertySet, PropertyValue, Warning, WarningCode,
};

use crate::{btree::IndexRecord, encode};

/// `0xBC`: variable property records.
pub const BLOCK_SIG_PROPERTIES: u8 = 0xBC;

/// `0x7C`: fixed-column table rows.
pub const BLOCK_SIG_TABLE: u8 = 0x7C;

const RECORD_SIZE: usize = 8;

/// Heap references keep their low five bits clear; the rest is a 1-based
/// boundary-pair index. Anything else resolves through the ID2 map.
const HEAP_TYPE_MASK: u32 = 0x1F;
const HEAP_INDEX_SHIFT: u32 = 5;

#[derive(Clone, Debug)]
pub enum PropertyBlock {
    Properties(PropertySet),
    Table(Vec<PropertySet>),
}

/// Everything needed to chase a variable-size reference out of a block.
pub(crate) struct BlockContext<'a> {
    pub win: ByteWindow<'a>,
    pub index: &'a BTreeMap<u64, IndexRecord>,
    pub encryption_type: u8,
    pub id2: &'a BTreeMap<u32, u64>,
}

impl BlockContext<'_> {
    /// Reads and decodes the block behind an index record id. Sizes and
    /// offsets are clamped to the blob.
    pub(crate) fn read_block(&self, idx_id: u64) -> Option<Vec<u8>> {
        let record = self.index.get(&idx_id)?;
        let offset = usize::try_from(record.offset).ok()?;
        if offset >= self.win.len() {
            return None;
        }
        let len = (record.size as usize).min(self.win.len() - offset);
        let mut data = self.win.slice(offset, len).ok()?.to_vec();
        encode::decode_block(&mut data, self.encryption_type);
        Some(data)
    }
}

/// Parses a decoded block. `None` means the signature is not a property
/// block at all; the caller decides how loudly to complain.
pub(crate) fn parse_property_block(
    data: &[u8],
    ctx: &BlockContext<'_>,
    warnings: &mut Vec<Warning>,
) -> Option<PropertyBlock> {
    if data.len() < 4 {
        return None;
    }
    match data[0] {
        BLOCK_SIG_PROPERTIES => Some(PropertyBlock::Properties(parse_records(
            data, ctx, warnings,
        ))),
        // A table collapses to a single row over the shared record region;
        // per-row column schemas are not parsed.
        BLOCK_SIG_TABLE => Some(PropertyBlock::Table(vec![parse_records(
            data, ctx, warnings,
        )])),
        _ => None,
    }
}

fn parse_records(data: &[u8], ctx: &BlockContext<'_>, warnings: &mut Vec<Warning>) -> PropertySet {
    let win = ByteWindow::new(data);
    let offset_table_start = win.read_u16_le(2).unwrap_or(0) as usize;
    let records_end = offset_table_start.min(data.len());

    let mut props = PropertySet::new();
    let mut offset = 4;
    while offset + RECORD_SIZE <= records_end {
        let raw_type = win.read_u16_le(offset).expect("bounded record");
        let code = win.read_u16_le(offset + 2).expect("bounded record");
        let reference = win.read_u32_le(offset + 4).expect("bounded record");
        offset += RECORD_SIZE;

        let base = match split_type(raw_type) {
            Ok((base, _is_multi)) => base,
            Err(err) => {
                push_record_warning(warnings, code, &err.to_string());
                continue;
            }
        };

        // Small fixed values are immediate; everything wider is referenced.
        let decoded = if base.fixed_size().is_some_and(|size| size <= 4) {
            let mut value = [0_u8; 8];
            value[..4].copy_from_slice(&reference.to_le_bytes());
            PropertyValue::decode_fixed(base, &value)
        } else if reference == 0 {
            continue;
        } else {
            match resolve_reference(data, offset_table_start, reference, ctx) {
                Some(bytes) => PropertyValue::decode_buffer(base, &bytes),
                None => {
                    push_record_warning(warnings, code, "unresolvable value reference");
                    continue;
                }
            }
        };

        match decoded {
            Ok(value) => props.insert(MapiKey::numeric(u32::from(code)), value),
            Err(err) => push_record_warning(warnings, code, &err.to_string()),
        }
    }

    props
}

/// Chases a nonzero variable-size reference: first the block's own offset
/// table, then the ID2 sub-node map, which yields a further data block.
fn resolve_reference(
    data: &[u8],
    offset_table_start: usize,
    reference: u32,
    ctx: &BlockContext<'_>,
) -> Option<Vec<u8>> {
    if reference & HEAP_TYPE_MASK == 0 {
        let index = (reference >> HEAP_INDEX_SHIFT) as usize;
        if let Some(bytes) = heap_range(data, offset_table_start, index) {
            return Some(bytes.to_vec());
        }
    }
    let idx_id = ctx.id2.get(&reference)?;
    ctx.read_block(*idx_id)
}

/// Range `index` (1-based) of the boundary array at `offset_table_start`.
fn heap_range(data: &[u8], offset_table_start: usize, index: usize) -> Option<&[u8]> {
    if index == 0 {
        return None;
    }
    let win = ByteWindow::new(data);
    let count = win.read_u16_le(offset_table_start).ok()? as usize;
    if index > count {
        return None;
    }
    // count:u16, free:u16, then count + 1 boundaries.
    let boundaries = offset_table_start + 4;
    let start = win.read_u16_le(boundaries + (index - 1) * 2).ok()? as usize;
    let end = win.read_u16_le(boundaries + index * 2).ok()? as usize;
    if start > end || end > data.len() {
        return None;
    }
    Some(&data[start..end])
}

fn push_record_warning(warnings: &mut Vec<Warning>, code: u16, message: &str) {
    debug!("block record 0x{code:04X}: {message}");
    warnings.push(
        Warning::new(WarningCode::PropertyParseFailed, message.to_owned())
            .with_context(format!("0x{code:04X}")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn empty_context<'a>(
        win: &'a [u8],
        index: &'a BTreeMap<u64, IndexRecord>,
        id2: &'a BTreeMap<u32, u64>,
    ) -> BlockContext<'a> {
        BlockContext {
            win: ByteWindow::new(win),
            index,
            encryption_type: 0,
            id2,
        }
    }

    /// One `0xBC` block: an inline long, plus a string referenced through
    /// the offset table.
    pub(crate) fn message_class_block(sig: u8) -> Vec<u8> {
        let mut block = vec![0_u8; 36];
        block[0] = sig;
        LittleEndian::write_u16(&mut block[2..4], 20); // offset table start
        // record: pr_message_flags (PT_LONG) = 4, immediate
        LittleEndian::write_u16(&mut block[4..6], 0x0003);
        LittleEndian::write_u16(&mut block[6..8], 0x0E07);
        LittleEndian::write_u32(&mut block[8..12], 4);
        // record: pr_message_class (PT_STRING8), heap reference index 1
        LittleEndian::write_u16(&mut block[12..14], 0x001E);
        LittleEndian::write_u16(&mut block[14..16], 0x001A);
        LittleEndian::write_u32(&mut block[16..20], 1 << HEAP_INDEX_SHIFT);
        // offset table: count 1, free 0, boundaries [28, 36]
        LittleEndian::write_u16(&mut block[20..22], 1);
        LittleEndian::write_u16(&mut block[24..26], 28);
        LittleEndian::write_u16(&mut block[26..28], 36);
        block[28..36].copy_from_slice(b"IPM.Note");
        block
    }

    #[test]
    fn test_property_block_with_heap_string() {
        let block = message_class_block(BLOCK_SIG_PROPERTIES);
        let (index, id2) = (BTreeMap::new(), BTreeMap::new());
        let ctx = empty_context(&[], &index, &id2);
        let mut warnings = Vec::new();

        let Some(PropertyBlock::Properties(props)) =
            parse_property_block(&block, &ctx, &mut warnings)
        else {
            panic!("expected a property store");
        };
        assert!(warnings.is_empty());
        assert_eq!(props.get("pr_message_flags").unwrap().as_i32(), Some(4));
        assert_eq!(
            props.get("pr_message_class").unwrap().as_str(),
            Some("IPM.Note")
        );
    }

    #[test]
    fn test_table_block_collapses_to_one_row() {
        let block = message_class_block(BLOCK_SIG_TABLE);
        let (index, id2) = (BTreeMap::new(), BTreeMap::new());
        let ctx = empty_context(&[], &index, &id2);
        let mut warnings = Vec::new();

        let Some(PropertyBlock::Table(rows)) = parse_property_block(&block, &ctx, &mut warnings)
        else {
            panic!("expected a table");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("pr_message_class").unwrap().as_str(), Some("IPM.Note"));
    }

    #[test]
    fn test_unknown_signature() {
        let (index, id2) = (BTreeMap::new(), BTreeMap::new());
        let ctx = empty_context(&[], &index, &id2);
        let mut warnings = Vec::new();
        assert!(parse_property_block(&[0x00, 0, 0, 0], &ctx, &mut warnings).is_none());
        assert!(parse_property_block(&[0xBC], &ctx, &mut warnings).is_none());
    }

    #[test]
    fn test_null_reference_is_skipped() {
        let mut block = vec![0_u8; 12];
        block[0] = BLOCK_SIG_PROPERTIES;
        LittleEndian::write_u16(&mut block[2..4], 12);
        LittleEndian::write_u16(&mut block[4..6], 0x001E);
        LittleEndian::write_u16(&mut block[6..8], 0x001A);
        // reference stays zero
        let (index, id2) = (BTreeMap::new(), BTreeMap::new());
        let ctx = empty_context(&[], &index, &id2);
        let mut warnings = Vec::new();

        let Some(PropertyBlock::Properties(props)) =
            parse_property_block(&block, &ctx, &mut warnings)
        else {
            panic!("expected a property store");
        };
        assert!(props.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_dangling_reference_warns_and_continues() {
        let mut block = message_class_block(BLOCK_SIG_PROPERTIES);
        // Point the string reference at boundary pair 7 of a 1-entry table.
        LittleEndian::write_u32(&mut block[16..20], 7 << HEAP_INDEX_SHIFT);
        let (index, id2) = (BTreeMap::new(), BTreeMap::new());
        let ctx = empty_context(&[], &index, &id2);
        let mut warnings = Vec::new();

        let Some(PropertyBlock::Properties(props)) =
            parse_property_block(&block, &ctx, &mut warnings)
        else {
            panic!("expected a property store");
        };
        assert_eq!(props.get("pr_message_flags").unwrap().as_i32(), Some(4));
        assert!(props.get("pr_message_class").is_none());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::PropertyParseFailed);
    }

    #[test]
    fn test_id2_reference_reads_another_block() {
        // Blob holds one 4-byte payload block at offset 8.
        let mut blob = vec![0_u8; 16];
        blob[8..12].copy_from_slice(b"data");
        let mut index = BTreeMap::new();
        index.insert(
            9,
            IndexRecord {
                id: 9,
                offset: 8,
                size: 4,
                flags: 0,
            },
        );
        let mut id2 = BTreeMap::new();
        id2.insert(0x0601, 9_u64);
        let ctx = empty_context(&blob, &index, &id2);

        // A binary property whose reference is the ID2 key 0x0601.
        let mut block = vec![0_u8; 12];
        block[0] = BLOCK_SIG_PROPERTIES;
        LittleEndian::write_u16(&mut block[2..4], 12);
        LittleEndian::write_u16(&mut block[4..6], 0x0102);
        LittleEndian::write_u16(&mut block[6..8], 0x3701);
        LittleEndian::write_u32(&mut block[8..12], 0x0601);
        let mut warnings = Vec::new();

        let Some(PropertyBlock::Properties(props)) =
            parse_property_block(&block, &ctx, &mut warnings)
        else {
            panic!("expected a property store");
        };
        assert_eq!(
            props.get("pr_attach_data_bin").unwrap().as_bytes(),
            Some(&b"data"[..])
        );
    }
}
