//! Property stores over storage dirents: the fixed-size records of
//! [`__properties_version1.0`](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/f28b1b2a-4b5e-4d01-b6bc-21cde9fbcf01)
//! merged with the variable-size
//! [`__substg1.0_` streams](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/e7fc7b30-6e1d-4f45-9596-49be74b885cc).

use std::collections::BTreeMap;

use log::debug;
use mailbag_mapi::{
    prop_type::{split_type, PropertyType},
    ByteWindow, MapiError, PropertySet, PropertyValue, Warning, WarningCode,
};

use crate::{
    cfb::{CompoundFile, Dirent, DirentType},
    nameid::{NameidMap, NAMEID_STORAGE},
};

pub const PROPERTIES_STREAM: &str = "__properties_version1.0";

const SUBSTG_PREFIX: &str = "__substg1.0_";

/// Header bytes to skip in `__properties_version1.0` for the root (or an
/// embedded message) storage.
pub const PROPERTIES_HEADER_ROOT: usize = 32;

/// Header bytes to skip for attachment and recipient sub-storages.
pub const PROPERTIES_HEADER_SUB: usize = 8;

const INLINE_RECORD_SIZE: usize = 16;

/// Prefix classification for a storage whose role is not already known:
/// root-typed or nameid-carrying storages use the 32-byte header, everything
/// else the 8-byte one. Stream size is deliberately not consulted; it is
/// ambiguous on truncated containers.
pub fn properties_prefix(file: &CompoundFile, storage: &Dirent) -> usize {
    if storage.dirent_type == DirentType::Root
        || file.find_child(storage, NAMEID_STORAGE).is_some()
    {
        PROPERTIES_HEADER_ROOT
    } else {
        PROPERTIES_HEADER_SUB
    }
}

/// Decoded pieces of a substg stream name: property code, raw type word and
/// the optional multi-value index.
pub(crate) fn parse_substg_name(name: &str) -> Option<(u16, u16, Option<u32>)> {
    let rest = name.strip_prefix(SUBSTG_PREFIX)?;
    if !(rest.len() == 8 || (rest.len() == 17 && rest.as_bytes()[8] == b'-')) {
        return None;
    }
    if !rest
        .bytes()
        .enumerate()
        .all(|(i, b)| b.is_ascii_hexdigit() || (i == 8 && b == b'-'))
    {
        return None;
    }

    let code = u16::from_str_radix(&rest[0..4], 16).ok()?;
    let raw_type = u16::from_str_radix(&rest[4..8], 16).ok()?;
    let index = if rest.len() == 17 {
        Some(u32::from_str_radix(&rest[9..17], 16).ok()?)
    } else {
        None
    };
    Some((code, raw_type, index))
}

/// Builds the property set of one storage dirent: inline fixed-size records
/// first, then substg streams, which override inline values for the same
/// key. Per-property failures downgrade to `property_parse_failed` warnings.
pub(crate) fn parse_property_set(
    file: &CompoundFile,
    storage: &Dirent,
    prefix: usize,
    nameid: &NameidMap,
    warnings: &mut Vec<Warning>,
) -> PropertySet {
    let mut props = PropertySet::new();

    if let Some(stream) = file.find_child(storage, PROPERTIES_STREAM) {
        let data = file.stream_bytes(stream);
        if data.len() >= prefix {
            parse_inline_records(&data[prefix..], nameid, &mut props, warnings);
        } else {
            warnings.push(
                Warning::new(
                    WarningCode::PropertyParseFailed,
                    format!("property stream shorter than its {prefix}-byte header"),
                )
                .with_context(storage.name.clone()),
            );
        }
    }

    // (code, base type) -> index -> value; a duplicate index keeps the last
    // stream seen.
    let mut multi: BTreeMap<(u16, PropertyType), BTreeMap<u32, PropertyValue>> = BTreeMap::new();

    for child in file.children(storage) {
        if child.dirent_type != DirentType::Stream {
            continue;
        }
        let Some((code, raw_type, index)) = parse_substg_name(&child.name) else {
            continue;
        };
        let (base, is_multi) = match split_type(raw_type) {
            Ok(split) => split,
            Err(err) => {
                push_decode_warning(warnings, &child.name, &err);
                continue;
            }
        };
        if base == PropertyType::Object {
            // Embedded object storages are handled by the assembler, not
            // decoded as property bytes.
            continue;
        }

        let data = file.stream_bytes(child);
        match (is_multi, index) {
            (false, _) => match PropertyValue::decode_buffer(base, &data) {
                Ok(value) => props.insert(nameid.resolve(code), value),
                Err(err) => push_decode_warning(warnings, &child.name, &err),
            },
            (true, Some(index)) => match PropertyValue::decode_buffer(base, &data) {
                Ok(value) => {
                    multi.entry((code, base)).or_default().insert(index, value);
                }
                Err(err) => push_decode_warning(warnings, &child.name, &err),
            },
            // The length stream of a multi-value group carries no payload of
            // its own.
            (true, None) => {}
        }
    }

    for ((code, _base), values) in multi {
        let ordered: Vec<PropertyValue> = values.into_values().collect();
        props.insert(nameid.resolve(code), PropertyValue::Multiple(ordered));
    }

    props
}

fn parse_inline_records(
    body: &[u8],
    nameid: &NameidMap,
    props: &mut PropertySet,
    warnings: &mut Vec<Warning>,
) {
    for record in body.chunks_exact(INLINE_RECORD_SIZE) {
        let win = ByteWindow::new(record);
        let raw_type = win.read_u16_le(0).expect("16-byte record");
        let code = win.read_u16_le(2).expect("16-byte record");
        let value: [u8; 8] = record[8..16].try_into().expect("16-byte record");

        let (base, is_multi) = match split_type(raw_type) {
            Ok(split) => split,
            Err(err) => {
                push_decode_warning(warnings, &format!("0x{code:04X}"), &err);
                continue;
            }
        };
        // Variable-size and multi-value payloads live in substg streams; the
        // inline record is only a presence marker for them.
        if is_multi || base.fixed_size().is_none() {
            continue;
        }

        match PropertyValue::decode_fixed(base, &value) {
            Ok(value) => props.insert(nameid.resolve(code), value),
            Err(err) => push_decode_warning(warnings, &format!("0x{code:04X}"), &err),
        }
    }
}

fn push_decode_warning(warnings: &mut Vec<Warning>, context: &str, err: &MapiError) {
    debug!("property decode failed at {context}: {err}");
    warnings.push(
        Warning::new(WarningCode::PropertyParseFailed, err.to_string())
            .with_context(context.to_owned()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substg_name_decode() {
        assert_eq!(
            parse_substg_name("__substg1.0_0037001F"),
            Some((0x0037, 0x001F, None))
        );
        assert_eq!(
            parse_substg_name("__substg1.0_1000001F-00000002"),
            Some((0x1000, 0x001F, Some(2)))
        );
        assert_eq!(parse_substg_name("__substg1.0_ZZZZ001F"), None);
        assert_eq!(parse_substg_name("__substg1.0_0037001F-0002"), None);
        assert_eq!(parse_substg_name("__substg1.0_0037001Fx00000002"), None);
        assert_eq!(parse_substg_name("__properties_version1.0"), None);
    }

    #[test]
    fn test_inline_records() {
        let nameid = NameidMap::default();
        let mut props = PropertySet::new();
        let mut warnings = Vec::new();

        let mut body = Vec::new();
        // pr_message_flags = 1 (PT_LONG)
        body.extend_from_slice(&0x0003_u16.to_le_bytes());
        body.extend_from_slice(&0x0E07_u16.to_le_bytes());
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&1_u64.to_le_bytes());
        // pr_subject marker (PT_UNICODE): skipped, payload is in a substg
        body.extend_from_slice(&0x001F_u16.to_le_bytes());
        body.extend_from_slice(&0x0037_u16.to_le_bytes());
        body.extend_from_slice(&[0; 12]);
        // Unknown property type: one warning, parsing continues
        body.extend_from_slice(&0x00FF_u16.to_le_bytes());
        body.extend_from_slice(&0x1234_u16.to_le_bytes());
        body.extend_from_slice(&[0; 12]);

        parse_inline_records(&body, &nameid, &mut props, &mut warnings);

        assert_eq!(props.get("pr_message_flags").unwrap().as_i32(), Some(1));
        assert!(props.get("pr_subject").is_none());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::PropertyParseFailed);
        assert_eq!(warnings[0].context.as_deref(), Some("0x1234"));
    }
}
