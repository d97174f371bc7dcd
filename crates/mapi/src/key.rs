//! Property keys and property sets.
//!
//! A key is a (code, property set GUID) pair. The code is numeric for
//! standard tags and for named properties addressed by id, or a string for
//! named properties resolved through the nameid string table.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use crate::{
    guid::{Guid, PS_MAPI},
    registry,
    value::PropertyValue,
};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum KeyCode {
    Number(u32),
    Name(String),
}

impl Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Number(code) => write!(f, "0x{code:04X}"),
            KeyCode::Name(name) => write!(f, "{name:?}"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MapiKey {
    pub code: KeyCode,
    pub guid: Guid,
}

impl MapiKey {
    pub fn new(code: KeyCode, guid: Guid) -> Self {
        Self { code, guid }
    }

    /// A standard tag under [PS_MAPI].
    pub fn numeric(code: u32) -> Self {
        Self {
            code: KeyCode::Number(code),
            guid: PS_MAPI,
        }
    }

    pub fn named(name: impl Into<String>, guid: Guid) -> Self {
        Self {
            code: KeyCode::Name(name.into()),
            guid,
        }
    }

    /// The registry atom this key answers to, if any.
    pub fn atom(&self) -> Option<&'static str> {
        match &self.code {
            KeyCode::Number(code) => {
                if let Some(entry) = registry::named_by_id(*code, &self.guid) {
                    return Some(entry.atom);
                }
                if self.guid == PS_MAPI {
                    if let Ok(code) = u16::try_from(*code) {
                        return registry::tag_by_code(code).map(|entry| entry.atom);
                    }
                }
                None
            }
            KeyCode::Name(name) => registry::named_by_name(name, &self.guid).map(|e| e.atom),
        }
    }
}

impl Display for MapiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.code, self.guid)
    }
}

/// The property map attached to a message, folder, attachment or recipient.
///
/// Callers must not depend on iteration order.
#[derive(Clone, Default, Debug)]
pub struct PropertySet {
    entries: BTreeMap<MapiKey, PropertyValue>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts win, which is what gives substg streams precedence over
    /// inline records.
    pub fn insert(&mut self, key: MapiKey, value: PropertyValue) {
        self.entries.insert(key, value);
    }

    /// Lookup by registry atom, e.g. `"pr_subject"` or `"location"`.
    pub fn get(&self, atom: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| key.atom() == Some(atom))
            .map(|(_, value)| value)
    }

    /// Lookup by numeric code alone, ignoring the property set GUID.
    pub fn get_code(&self, code: u32) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| key.code == KeyCode::Number(code))
            .map(|(_, value)| value)
    }

    pub fn get_exact(&self, key: &MapiKey) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    /// First present value among `atoms`, for preference chains like
    /// transmittable-display-name over display-name.
    pub fn first_of(&self, atoms: &[&str]) -> Option<&PropertyValue> {
        atoms.iter().find_map(|atom| self.get(atom))
    }

    pub fn iter(&self) -> btree_map::Iter<'_, MapiKey, PropertyValue> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a PropertySet {
    type Item = (&'a MapiKey, &'a PropertyValue);
    type IntoIter = btree_map::Iter<'a, MapiKey, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(MapiKey, PropertyValue)> for PropertySet {
    fn from_iter<T: IntoIterator<Item = (MapiKey, PropertyValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
