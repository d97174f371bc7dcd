#![doc = include_str!("../README.md")]

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;

use mailbag_mapi::{ByteWindow, MapiError, Warning};
use thiserror::Error;

pub mod block;
pub mod btree;
pub mod encode;
pub mod header;
pub mod items;

pub use btree::{Descriptor, IndexRecord};
pub use header::{PstHeader, PstVersion};
pub use items::{Item, ItemKind, ROOT_DESCRIPTOR_ID};

#[derive(Error, Debug)]
pub enum PstError {
    #[error("Invalid PST magic")]
    InvalidMagic,
    #[error("Unknown index type: 0x{0:02X}")]
    UnknownIndexType(u8),
    #[error("Data too short: {0} bytes")]
    DataTooShort(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("MAPI error: {0}")]
    Mapi(#[from] MapiError),
}

pub type PstResult<T> = Result<T, PstError>;

/// An open `.pst` parse session: the blob, both flattened B-trees and the
/// reverse-indexed descriptor hierarchy. Items are materialized lazily; the
/// session itself is immutable once constructed.
pub struct Pst {
    blob: Vec<u8>,
    header: PstHeader,
    index: BTreeMap<u64, IndexRecord>,
    descriptors: BTreeMap<u64, Descriptor>,
    children: BTreeMap<u64, Vec<u64>>,
    warnings: Vec<Warning>,
}

impl Pst {
    /// Parses an in-memory blob. Tree-level damage degrades to partial maps
    /// plus warnings; only an unusable header is an error.
    pub fn parse(blob: Vec<u8>) -> PstResult<Self> {
        let win = ByteWindow::new(&blob);
        let header = PstHeader::parse(&win)?;

        let mut warnings = Vec::new();
        let index =
            btree::read_index_btree(&win, header.version, header.index1_offset, &mut warnings);
        let descriptors =
            btree::read_descriptor_btree(&win, header.version, header.index2_offset, &mut warnings);
        let children = btree::build_children(&descriptors);

        Ok(Self {
            blob,
            header,
            index,
            descriptors,
            children,
            warnings,
        })
    }

    /// Reads and parses a file.
    pub fn read(path: impl AsRef<Path>) -> PstResult<Self> {
        Self::parse(std::fs::read(path)?)
    }

    /// Accepts either raw container bytes or a path, the same routing rule
    /// as the MSG side: leading `!BDN` magic wins, then an existing regular
    /// file, then raw bytes.
    pub fn open(input: impl AsRef<[u8]>) -> PstResult<Self> {
        let input = input.as_ref();
        if input.starts_with(&header::PST_MAGIC) {
            return Self::parse(input.to_vec());
        }
        if let Ok(text) = std::str::from_utf8(input) {
            if Path::new(text).is_file() {
                return Self::read(text);
            }
        }
        Self::parse(input.to_vec())
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn header(&self) -> &PstHeader {
        &self.header
    }

    pub fn encryption_type(&self) -> u8 {
        self.header.encryption_type
    }

    pub fn index(&self) -> &BTreeMap<u64, IndexRecord> {
        &self.index
    }

    pub fn descriptors(&self) -> &BTreeMap<u64, Descriptor> {
        &self.descriptors
    }

    /// Ordered child descriptor ids of `desc_id`.
    pub fn children_of(&self, desc_id: u64) -> &[u64] {
        self.children
            .get(&desc_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Warnings gathered while the trees were flattened. Per-item warnings
    /// ride on the items themselves.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Materializes one item on demand.
    pub fn item(&self, desc_id: u64) -> Option<Item> {
        let descriptor = self.descriptors.get(&desc_id)?;
        items::materialize(self, descriptor)
    }

    /// Lazy depth-first traversal of every materializable item, starting at
    /// the root descriptor.
    pub fn items(&self) -> Items<'_> {
        Items {
            pst: self,
            stack: vec![(ROOT_DESCRIPTOR_ID, 0)],
            visited: HashSet::new(),
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = Item> + '_ {
        self.items().filter(Item::is_message)
    }

    pub fn folders(&self) -> impl Iterator<Item = Item> + '_ {
        self.items().filter(Item::is_folder)
    }

    /// Depth-first visitor over the hierarchy, called with each item's
    /// depth below the root.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &Item),
    {
        let mut iter = self.items();
        while let Some((depth, item)) = iter.next_with_depth() {
            visit(depth, &item);
        }
    }
}

/// Iterator state of the depth-first descriptor walk. Descriptors that fail
/// to materialize are skipped; their children are still visited.
pub struct Items<'a> {
    pst: &'a Pst,
    stack: Vec<(u64, usize)>,
    visited: HashSet<u64>,
}

impl Items<'_> {
    fn next_with_depth(&mut self) -> Option<(usize, Item)> {
        while let Some((desc_id, depth)) = self.stack.pop() {
            if !self.visited.insert(desc_id) {
                continue;
            }
            for &child in self.pst.children_of(desc_id).iter().rev() {
                self.stack.push((child, depth + 1));
            }
            if let Some(item) = self.pst.item(desc_id) {
                return Some((depth, item));
            }
        }
        None
    }
}

impl Iterator for Items<'_> {
    type Item = Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_with_depth().map(|(_, item)| item)
    }
}
