#![doc = include_str!("../README.md")]

use std::io;
use std::path::Path;

use log::debug;
use thiserror::Error;

use mailbag_mapi::{MapiError, Warning, WarningCode};

pub mod cfb;
pub mod message;
pub mod nameid;
pub mod properties;

#[cfg(test)]
pub(crate) mod testutil;

pub use message::{Attachment, Message, MsgOptions, Recipient, RecipientType};
pub use nameid::NameidMap;

use cfb::{CompoundFile, Dirent};

#[derive(Error, Debug)]
pub enum MsgError {
    #[error("Data too short: {0} bytes")]
    TooShort(usize),
    #[error("Invalid compound file magic")]
    InvalidMagic,
    #[error("Invalid byte-order mark: 0x{0:04X}")]
    InvalidByteOrder(u16),
    #[error("Unsupported major version: {0}")]
    UnsupportedVersion(u16),
    #[error("Invalid sector shift {shift} for version {version}")]
    InvalidSectorShift { version: u16, shift: u16 },
    #[error("Invalid mini stream cutoff: {0}")]
    InvalidMiniCutoff(u32),
    #[error("Missing root directory entry")]
    MissingRootEntry,
    #[error("Missing stream: {0}")]
    MissingStream(&'static str),
    #[error(transparent)]
    Decode(#[from] MapiError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// An open `.msg` parse session: the compound file plus the resolved named
/// property map. Immutable once constructed.
pub struct MsgFile {
    file: CompoundFile,
    nameid: NameidMap,
    warnings: Vec<Warning>,
}

impl MsgFile {
    /// Parses an in-memory blob.
    pub fn parse(blob: Vec<u8>) -> Result<Self, MsgError> {
        let file = CompoundFile::parse(blob)?;

        // Best-effort: a broken nameid storage degrades named properties to
        // their PS_MAPI pseudo-codes, it does not fail the open.
        let mut warnings = Vec::new();
        let nameid = match NameidMap::parse(&file) {
            Ok(nameid) => nameid,
            Err(err) => {
                debug!("nameid parse failed: {err}");
                warnings.push(
                    Warning::new(WarningCode::NameidParseFailed, err.to_string())
                        .with_context(nameid::NAMEID_STORAGE),
                );
                NameidMap::default()
            }
        };

        Ok(Self {
            file,
            nameid,
            warnings,
        })
    }

    /// Reads and parses a file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, MsgError> {
        Self::parse(std::fs::read(path)?)
    }

    /// Accepts either raw container bytes or a path. Input that leads with
    /// the compound-file magic is parsed directly; otherwise a name of an
    /// existing regular file is read; anything else is still treated as raw
    /// bytes so corrupted payloads surface parse errors, not file errors.
    pub fn open(input: impl AsRef<[u8]>) -> Result<Self, MsgError> {
        let input = input.as_ref();
        if input.starts_with(&cfb::CFB_MAGIC[..4]) {
            return Self::parse(input.to_vec());
        }
        if let Ok(text) = std::str::from_utf8(input) {
            if Path::new(text).is_file() {
                return Self::read(text);
            }
        }
        Self::parse(input.to_vec())
    }

    pub fn compound(&self) -> &CompoundFile {
        &self.file
    }

    pub fn nameid(&self) -> &NameidMap {
        &self.nameid
    }

    /// Warnings gathered while opening, before any assembly ran.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The properties-stream header size a given storage uses; see
    /// [properties::properties_prefix].
    pub fn properties_prefix(&self, storage: &Dirent) -> usize {
        properties::properties_prefix(&self.file, storage)
    }

    /// Assembles the message with default options.
    pub fn message(&self) -> Message {
        self.message_with_options(&MsgOptions::default())
    }

    pub fn message_with_options(&self, options: &MsgOptions) -> Message {
        message::assemble(&self.file, &self.nameid, options, self.warnings.clone())
    }
}

/// One-call convenience: open (bytes or path) and assemble.
pub fn open(input: impl AsRef<[u8]>) -> Result<Message, MsgError> {
    Ok(MsgFile::open(input)?.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutil::{
        build_container, properties_stream, root, storage, stream, utf16,
    };

    /// A version-3 container: root properties, a subject substg, a
    /// message-flags substg override, one recipient storage and one
    /// multi-value string group.
    fn synthetic_msg() -> Vec<u8> {
        build_container(&[
            root(vec![1, 2, 3, 4, 8, 9]),
            stream(
                "__properties_version1.0",
                properties_stream(
                    32,
                    &[
                        (0x0003, 0x0E07, 1),  // pr_message_flags = 1
                        (0x001F, 0x0037, 10), // pr_subject marker
                    ],
                ),
            ),
            stream("__substg1.0_0037001F", utf16("Hello")),
            stream("__substg1.0_0E070003", 2_u32.to_le_bytes().to_vec()),
            storage("__recip_version1.0_#00000000", vec![5, 6, 7]),
            stream(
                "__properties_version1.0",
                properties_stream(8, &[(0x0003, 0x0C15, 2)]), // recipient_type = cc
            ),
            stream("__substg1.0_3001001F", utf16("Alice")),
            stream("__substg1.0_39FE001F", utf16("a@b")),
            stream("__substg1.0_1234101F-00000000", utf16("one")),
            stream("__substg1.0_1234101F-00000001", utf16("two")),
        ])
    }

    #[test]
    fn test_synthetic_container_end_to_end() {
        let message = open(synthetic_msg()).unwrap();

        assert_eq!(message.subject(), Some("Hello"));
        // The substg stream overrides the inline record for the same key.
        assert_eq!(
            message.properties.get("pr_message_flags").unwrap().as_i32(),
            Some(2)
        );

        assert_eq!(message.recipients.len(), 1);
        let recipient = &message.recipients[0];
        assert_eq!(recipient.name.as_deref(), Some("Alice"));
        assert_eq!(recipient.email.as_deref(), Some("a@b"));
        assert_eq!(recipient.recipient_type, RecipientType::Cc);

        assert!(message.attachments.is_empty());

        // Multi-value group, materialized in index order.
        let Some(mailbag_mapi::PropertyValue::Multiple(values)) =
            message.properties.get_code(0x1234)
        else {
            panic!("expected a multi-value property");
        };
        let values: Vec<Option<&str>> = values.iter().map(|v| v.as_str()).collect();
        assert_eq!(values, [Some("one"), Some("two")]);

        // No nameid storage in the fixture: open degrades with a warning.
        assert!(message
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::NameidParseFailed));
    }

    #[test]
    fn test_session_surface() {
        let msg = MsgFile::parse(synthetic_msg()).unwrap();
        let root = msg.compound().root().unwrap();
        assert_eq!(msg.properties_prefix(root), 32);

        let recip = msg
            .compound()
            .find_child(root, "__recip_version1.0_#00000000")
            .unwrap();
        assert_eq!(msg.properties_prefix(recip), 8);

        let subject = msg.compound().find_child(root, "__substg1.0_0037001F").unwrap();
        assert_eq!(msg.compound().stream_bytes(subject), utf16("Hello"));
    }

    #[test]
    fn test_open_routes_magic_bytes_before_paths() {
        let blob = synthetic_msg();
        assert!(MsgFile::open(&blob).is_ok());
    }

    #[test]
    fn test_open_treats_non_paths_as_raw_bytes() {
        // Not a file, no magic: parsed as raw bytes and rejected as such.
        assert!(matches!(
            MsgFile::open(b"/no/such/file/anywhere"),
            Err(MsgError::TooShort(_))
        ));
    }

    #[test]
    fn test_mutated_header_never_panics() {
        let blob = synthetic_msg();
        for offset in [8, 26, 28, 30, 32, 44, 48, 56, 60, 68, 76, 520, 1030] {
            let mut mutated = blob.clone();
            mutated[offset] ^= 0xFF;
            // Either a session (possibly with warnings) or a defined error.
            let _ = MsgFile::parse(mutated);
        }
    }

    #[test]
    fn test_truncated_container_never_panics() {
        let blob = synthetic_msg();
        for len in [512, 600, 1024, 2000, 2560] {
            let _ = MsgFile::parse(blob[..len].to_vec());
        }
    }
}
