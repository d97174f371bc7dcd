//! Message assembly: the root property set plus
//! [recipient](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/8590d60e-e8b1-4d1b-817b-dfdc28e578e4)
//! and
//! [attachment](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/18c77024-8a47-4f1d-b9d0-b2c4bb1e730c)
//! sub-storages, recursing into embedded messages.

use log::debug;
use mailbag_mapi::{PropertySet, PropertyValue, Warning, WarningCode};

use crate::{
    cfb::{CompoundFile, Dirent, DirentType},
    nameid::NameidMap,
    properties::{
        parse_property_set, PROPERTIES_HEADER_ROOT, PROPERTIES_HEADER_SUB, PROPERTIES_STREAM,
    },
};

const ATTACH_PREFIX: &str = "__attach_version1.0_";
const RECIP_PREFIX: &str = "__recip_version1.0_";

/// Storage child holding the embedded message of an attachment
/// (`pr_attach_data_obj` as PtypObject).
const EMBEDDED_MESSAGE_STORAGE: &str = "__substg1.0_3701000D";

/// Embedded messages nest through distinct storages, but crafted child links
/// could alias; recursion is capped rather than trusted.
const MAX_NESTING_DEPTH: usize = 64;

/// Assembly knobs.
#[derive(Clone, Debug)]
pub struct MsgOptions {
    /// `pr_attach_method` values treated as embedded messages. The format
    /// itself uses 5 (`ATTACH_EMBEDDED_MSG`).
    pub embedded_message_methods: Vec<i32>,
}

impl Default for MsgOptions {
    fn default() -> Self {
        Self {
            embedded_message_methods: vec![5],
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum RecipientType {
    Originator = 0,
    #[default]
    To = 1,
    Cc = 2,
    Bcc = 3,
}

impl RecipientType {
    /// Unknown values fall back to `To`.
    fn from_property(value: Option<i32>) -> Self {
        match value {
            Some(0) => RecipientType::Originator,
            Some(2) => RecipientType::Cc,
            Some(3) => RecipientType::Bcc,
            _ => RecipientType::To,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Recipient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub recipient_type: RecipientType,
    pub properties: PropertySet,
}

#[derive(Clone, Debug)]
pub struct Attachment {
    pub filename: String,
    pub data: Option<Vec<u8>>,
    pub mime_type: Option<String>,
    pub embedded_message: Option<Message>,
    /// SID of the attachment storage, for re-reading through the session.
    pub sid: u32,
    pub properties: PropertySet,
}

#[derive(Clone, Debug, Default)]
pub struct Message {
    pub properties: PropertySet,
    pub recipients: Vec<Recipient>,
    pub attachments: Vec<Attachment>,
    pub warnings: Vec<Warning>,
}

impl Message {
    pub fn subject(&self) -> Option<&str> {
        self.properties.get("pr_subject")?.as_str()
    }

    pub fn message_class(&self) -> Option<&str> {
        self.properties.get("pr_message_class")?.as_str()
    }

    pub fn body(&self) -> Option<&str> {
        self.properties.get("pr_body")?.as_str()
    }

    pub fn body_html(&self) -> Option<&[u8]> {
        self.properties.get("pr_body_html")?.as_bytes()
    }

    /// Decompresses `pr_rtf_compressed` on demand.
    pub fn rtf_body(&self) -> Option<Vec<u8>> {
        let compressed = self.properties.get("pr_rtf_compressed")?.as_bytes()?;
        mailbag_compressed_rtf::decompress_rtf(compressed).ok()
    }
}

/// Assembles the message rooted at the container's root storage.
pub(crate) fn assemble(
    file: &CompoundFile,
    nameid: &NameidMap,
    options: &MsgOptions,
    mut warnings: Vec<Warning>,
) -> Message {
    let Some(root) = file.root() else {
        warnings.push(Warning::new(
            WarningCode::PropertyParseFailed,
            "missing root directory entry",
        ));
        return Message {
            warnings,
            ..Message::default()
        };
    };
    let mut message = assemble_storage(file, root, PROPERTIES_HEADER_ROOT, nameid, options, 0);
    message.warnings.splice(0..0, warnings);
    message
}

fn assemble_storage(
    file: &CompoundFile,
    storage: &Dirent,
    prefix: usize,
    nameid: &NameidMap,
    options: &MsgOptions,
    depth: usize,
) -> Message {
    let mut warnings = Vec::new();
    let properties = parse_property_set(file, storage, prefix, nameid, &mut warnings);

    let mut attachments = Vec::new();
    for child in named_children(file, storage, ATTACH_PREFIX) {
        match assemble_attachment(file, child, nameid, options, depth, &mut warnings) {
            Some(attachment) => attachments.push(attachment),
            None => warnings.push(
                Warning::new(WarningCode::AttachmentSkipped, "unreadable attachment storage")
                    .with_context(child.name.clone()),
            ),
        }
    }

    let mut recipients = Vec::new();
    for child in named_children(file, storage, RECIP_PREFIX) {
        let recip_props =
            parse_property_set(file, child, PROPERTIES_HEADER_SUB, nameid, &mut warnings);
        recipients.push(build_recipient(recip_props));
    }

    Message {
        properties,
        recipients,
        attachments,
        warnings,
    }
}

/// Children whose names start (case-insensitively) with `prefix`, in lexical
/// name order.
fn named_children<'a>(
    file: &'a CompoundFile,
    storage: &Dirent,
    prefix: &str,
) -> Vec<&'a Dirent> {
    let mut children: Vec<&Dirent> = file
        .children(storage)
        .into_iter()
        .filter(|child| {
            child.dirent_type == DirentType::Storage
                && child
                    .name
                    .get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
        .collect();
    children.sort_by(|a, b| a.name.cmp(&b.name));
    children
}

fn assemble_attachment(
    file: &CompoundFile,
    storage: &Dirent,
    nameid: &NameidMap,
    options: &MsgOptions,
    depth: usize,
    warnings: &mut Vec<Warning>,
) -> Option<Attachment> {
    // A storage without a property stream has nothing to offer.
    file.find_child(storage, PROPERTIES_STREAM)?;

    let properties = parse_property_set(file, storage, PROPERTIES_HEADER_SUB, nameid, warnings);

    let method = properties.get("pr_attach_method").and_then(PropertyValue::as_i32);
    let embedded_message = match method {
        Some(method) if options.embedded_message_methods.contains(&method) => {
            embedded_message(file, storage, nameid, options, depth, warnings)
        }
        _ => None,
    };

    let filename = properties
        .first_of(&["pr_attach_long_filename", "pr_attach_filename"])
        .and_then(PropertyValue::as_str)
        .unwrap_or("attachment")
        .to_owned();
    let data = properties
        .get("pr_attach_data_bin")
        .and_then(PropertyValue::as_bytes)
        .map(<[u8]>::to_vec);
    let mime_type = properties
        .get("pr_attach_mime_tag")
        .and_then(PropertyValue::as_str)
        .map(str::to_owned);

    Some(Attachment {
        filename,
        data,
        mime_type,
        embedded_message,
        sid: storage.sid,
        properties,
    })
}

fn embedded_message(
    file: &CompoundFile,
    storage: &Dirent,
    nameid: &NameidMap,
    options: &MsgOptions,
    depth: usize,
    warnings: &mut Vec<Warning>,
) -> Option<Message> {
    let nested = file.find_child(storage, EMBEDDED_MESSAGE_STORAGE)?;
    if nested.dirent_type != DirentType::Storage {
        return None;
    }
    if depth >= MAX_NESTING_DEPTH {
        debug!("embedded message nesting capped at {MAX_NESTING_DEPTH}");
        warnings.push(
            Warning::new(WarningCode::AttachmentSkipped, "embedded message nested too deeply")
                .with_context(storage.name.clone()),
        );
        return None;
    }
    Some(assemble_storage(
        file,
        nested,
        PROPERTIES_HEADER_ROOT,
        nameid,
        options,
        depth + 1,
    ))
}

fn build_recipient(properties: PropertySet) -> Recipient {
    let name = properties
        .first_of(&[
            "pr_transmittable_display_name",
            "pr_display_name",
            "pr_recipient_display_name",
        ])
        .and_then(PropertyValue::as_str)
        .map(str::to_owned);
    let email = properties
        .first_of(&["pr_smtp_address", "pr_org_email_addr", "pr_email_address"])
        .and_then(PropertyValue::as_str)
        .map(str::to_owned);
    let recipient_type = RecipientType::from_property(
        properties
            .get("pr_recipient_type")
            .and_then(PropertyValue::as_i32),
    );

    Recipient {
        name,
        email,
        recipient_type,
        properties,
    }
}
