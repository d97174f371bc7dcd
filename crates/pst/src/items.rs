//! Item materialization: ID2 sub-node tables, message-class driven typing
//! and the lazy depth-first traversal over the descriptor hierarchy.

use std::collections::BTreeMap;

use mailbag_mapi::{ByteWindow, PropertySet, PropertyValue, Warning};

use crate::{
    block::{parse_property_block, BlockContext, PropertyBlock},
    btree::Descriptor,
    Pst,
};

/// The canonical root of the descriptor hierarchy.
pub const ROOT_DESCRIPTOR_ID: u64 = 0x21;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ItemKind {
    Message,
    Appointment,
    Contact,
    Task,
    Note,
    Journal,
    Folder,
}

#[derive(Clone, Debug)]
pub struct Item {
    pub desc_id: u64,
    pub kind: ItemKind,
    pub properties: PropertySet,
    /// Faults recovered from while materializing this item.
    pub warnings: Vec<Warning>,
}

impl Item {
    pub fn message_class(&self) -> Option<&str> {
        self.properties.get("pr_message_class")?.as_str()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.properties.get("pr_display_name")?.as_str()
    }

    pub fn is_message(&self) -> bool {
        self.kind == ItemKind::Message
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

/// Message-class driven typing; folders are recognized by their content
/// counters when no class is present.
pub(crate) fn classify(properties: &PropertySet) -> ItemKind {
    if let Some(class) = properties
        .get("pr_message_class")
        .and_then(PropertyValue::as_str)
    {
        let class = class.to_ascii_lowercase();
        return if class.starts_with("ipm.appointment") {
            ItemKind::Appointment
        } else if class.starts_with("ipm.contact") {
            ItemKind::Contact
        } else if class.starts_with("ipm.task") {
            ItemKind::Task
        } else if class.starts_with("ipm.stickynote") {
            ItemKind::Note
        } else if class.starts_with("ipm.activity") {
            ItemKind::Journal
        } else {
            // ipm.note, ipm.post and anything unrecognized.
            ItemKind::Message
        };
    }

    if properties.get("pr_content_count").is_some() || properties.get("pr_subfolders").is_some() {
        ItemKind::Folder
    } else {
        ItemKind::Message
    }
}

/// Parses an ID2 sub-node table: `id2 -> index record id`. Record width is
/// detected from the block size; entries with an id2 of zero are padding.
pub(crate) fn parse_id2_block(data: &[u8]) -> BTreeMap<u32, u64> {
    let win = ByteWindow::new(data);
    let mut entries = BTreeMap::new();

    let wide = data.len() >= 16 && data.len() % 16 == 0;
    let (width, idx_offset) = if wide { (16, 8) } else { (8, 4) };

    for offset in (0..data.len().saturating_sub(width - 1)).step_by(width) {
        let Ok(id2) = win.read_u32_le(offset) else {
            break;
        };
        let Ok(idx_id) = win.read_u32_le(offset + idx_offset) else {
            break;
        };
        if id2 == 0 {
            continue;
        }
        entries.insert(id2, u64::from(idx_id));
    }

    entries
}

/// Materializes one descriptor into an item: main block through `idx_id`,
/// ID2 map through `idx2_id`, property parse, classification.
pub(crate) fn materialize(pst: &Pst, descriptor: &Descriptor) -> Option<Item> {
    let win = ByteWindow::new(pst.blob());
    let mut warnings = Vec::new();

    let no_id2 = BTreeMap::new();
    let id2 = {
        let ctx = BlockContext {
            win,
            index: pst.index(),
            encryption_type: pst.encryption_type(),
            id2: &no_id2,
        };
        match descriptor.idx2_id {
            0 => BTreeMap::new(),
            idx2_id => ctx
                .read_block(idx2_id)
                .map(|data| parse_id2_block(&data))
                .unwrap_or_default(),
        }
    };

    let ctx = BlockContext {
        win,
        index: pst.index(),
        encryption_type: pst.encryption_type(),
        id2: &id2,
    };
    let data = ctx.read_block(descriptor.idx_id)?;
    let properties = match parse_property_block(&data, &ctx, &mut warnings)? {
        PropertyBlock::Properties(props) => props,
        PropertyBlock::Table(rows) => rows.into_iter().next().unwrap_or_default(),
    };

    Some(Item {
        desc_id: descriptor.desc_id,
        kind: classify(&properties),
        properties,
        warnings,
    })
}
