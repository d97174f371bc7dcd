//! Compile-time property registries.
//!
//! Two static tables resolve keys to symbolic atoms: the numeric tag
//! registry for codes below 0x8000 (a subset of
//! [MS-OXPROPS](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxprops/f6ab1613-aefe-447d-a49c-18217230b148)
//! large enough for mail, folder and attachment consumers), and the
//! named-property registry keyed by (id-or-name, property set GUID).
//! Neither table is mutable at runtime.

use crate::{
    guid::{
        Guid, PSETID_ADDRESS, PSETID_APPOINTMENT, PSETID_COMMON, PSETID_LOG, PSETID_TASK,
        PS_INTERNET_HEADERS,
    },
    prop_type::PropertyType,
};

#[derive(Clone, Copy, Debug)]
pub struct TagEntry {
    pub code: u16,
    pub atom: &'static str,
    pub prop_type: PropertyType,
}

const fn tag(code: u16, atom: &'static str, prop_type: PropertyType) -> TagEntry {
    TagEntry {
        code,
        atom,
        prop_type,
    }
}

/// Sorted by code for binary search.
static TAGS: &[TagEntry] = &[
    tag(0x0017, "pr_importance", PropertyType::Integer32),
    tag(0x001A, "pr_message_class", PropertyType::Unicode),
    tag(0x0036, "pr_sensitivity", PropertyType::Integer32),
    tag(0x0037, "pr_subject", PropertyType::Unicode),
    tag(0x0039, "pr_client_submit_time", PropertyType::Time),
    tag(0x003D, "pr_subject_prefix", PropertyType::Unicode),
    tag(0x0070, "pr_conversation_topic", PropertyType::Unicode),
    tag(0x007D, "pr_transport_message_headers", PropertyType::Unicode),
    tag(0x0C15, "pr_recipient_type", PropertyType::Integer32),
    tag(0x0C1A, "pr_sender_name", PropertyType::Unicode),
    tag(0x0C1E, "pr_sender_addrtype", PropertyType::Unicode),
    tag(0x0C1F, "pr_sender_email_address", PropertyType::Unicode),
    tag(0x0E02, "pr_display_bcc", PropertyType::Unicode),
    tag(0x0E03, "pr_display_cc", PropertyType::Unicode),
    tag(0x0E04, "pr_display_to", PropertyType::Unicode),
    tag(0x0E06, "pr_message_delivery_time", PropertyType::Time),
    tag(0x0E07, "pr_message_flags", PropertyType::Integer32),
    tag(0x0E08, "pr_message_size", PropertyType::Integer32),
    tag(0x0E1D, "pr_normalized_subject", PropertyType::Unicode),
    tag(0x0E21, "pr_attach_num", PropertyType::Integer32),
    tag(0x1000, "pr_body", PropertyType::Unicode),
    tag(0x1009, "pr_rtf_compressed", PropertyType::Binary),
    tag(0x1013, "pr_body_html", PropertyType::Binary),
    tag(0x1035, "pr_internet_message_id", PropertyType::Unicode),
    tag(0x1039, "pr_internet_references", PropertyType::Unicode),
    tag(0x1042, "pr_in_reply_to_id", PropertyType::Unicode),
    tag(0x3001, "pr_display_name", PropertyType::Unicode),
    tag(0x3002, "pr_addrtype", PropertyType::Unicode),
    tag(0x3003, "pr_email_address", PropertyType::Unicode),
    tag(0x3007, "pr_creation_time", PropertyType::Time),
    tag(0x3008, "pr_last_modification_time", PropertyType::Time),
    tag(0x340D, "pr_store_support_mask", PropertyType::Integer32),
    tag(0x3602, "pr_content_count", PropertyType::Integer32),
    tag(0x3603, "pr_content_unread", PropertyType::Integer32),
    tag(0x360A, "pr_subfolders", PropertyType::Boolean),
    tag(0x3613, "pr_container_class", PropertyType::Unicode),
    tag(0x3701, "pr_attach_data_bin", PropertyType::Binary),
    tag(0x3703, "pr_attach_extension", PropertyType::Unicode),
    tag(0x3704, "pr_attach_filename", PropertyType::Unicode),
    tag(0x3705, "pr_attach_method", PropertyType::Integer32),
    tag(0x3707, "pr_attach_long_filename", PropertyType::Unicode),
    tag(0x370B, "pr_rendering_position", PropertyType::Integer32),
    tag(0x370E, "pr_attach_mime_tag", PropertyType::Unicode),
    tag(0x3712, "pr_attach_content_id", PropertyType::Unicode),
    tag(0x3713, "pr_attach_content_location", PropertyType::Unicode),
    tag(0x3716, "pr_attach_content_disposition", PropertyType::Unicode),
    tag(0x39FE, "pr_smtp_address", PropertyType::Unicode),
    tag(0x3A20, "pr_transmittable_display_name", PropertyType::Unicode),
    tag(0x3FDE, "pr_internet_cpid", PropertyType::Integer32),
    tag(0x3FFD, "pr_message_codepage", PropertyType::Integer32),
    tag(0x403E, "pr_org_email_addr", PropertyType::Unicode),
    tag(0x5D01, "pr_sender_smtp_address", PropertyType::Unicode),
    tag(0x5FF6, "pr_recipient_display_name", PropertyType::Unicode),
];

pub fn tag_by_code(code: u16) -> Option<&'static TagEntry> {
    TAGS.binary_search_by_key(&code, |entry| entry.code)
        .ok()
        .map(|index| &TAGS[index])
}

pub fn tag_by_atom(atom: &str) -> Option<&'static TagEntry> {
    TAGS.iter().find(|entry| entry.atom == atom)
}

/// Identity of a named property within its property set.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NamedId {
    Number(u32),
    Name(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct NamedEntry {
    pub id: NamedId,
    pub guid: Guid,
    pub atom: &'static str,
}

const fn lid(id: u32, guid: Guid, atom: &'static str) -> NamedEntry {
    NamedEntry {
        id: NamedId::Number(id),
        guid,
        atom,
    }
}

const fn lname(name: &'static str, guid: Guid, atom: &'static str) -> NamedEntry {
    NamedEntry {
        id: NamedId::Name(name),
        guid,
        atom,
    }
}

static NAMED: &[NamedEntry] = &[
    // PSETID_Address
    lid(0x8005, PSETID_ADDRESS, "file_under"),
    lid(0x8062, PSETID_ADDRESS, "im_address"),
    lid(0x8080, PSETID_ADDRESS, "email1_display_name"),
    lid(0x8082, PSETID_ADDRESS, "email1_addrtype"),
    lid(0x8083, PSETID_ADDRESS, "email1_email_address"),
    lid(0x8090, PSETID_ADDRESS, "email2_display_name"),
    lid(0x8093, PSETID_ADDRESS, "email2_email_address"),
    lid(0x80A0, PSETID_ADDRESS, "email3_display_name"),
    lid(0x80A3, PSETID_ADDRESS, "email3_email_address"),
    // PSETID_Appointment
    lid(0x8205, PSETID_APPOINTMENT, "busy_status"),
    lid(0x8208, PSETID_APPOINTMENT, "location"),
    lid(0x820D, PSETID_APPOINTMENT, "appointment_start_whole"),
    lid(0x820E, PSETID_APPOINTMENT, "appointment_end_whole"),
    lid(0x8213, PSETID_APPOINTMENT, "appointment_duration"),
    lid(0x8215, PSETID_APPOINTMENT, "all_day_event"),
    lid(0x8216, PSETID_APPOINTMENT, "appointment_recur"),
    lid(0x8223, PSETID_APPOINTMENT, "recurring"),
    // PSETID_Task
    lid(0x8101, PSETID_TASK, "task_status"),
    lid(0x8102, PSETID_TASK, "percent_complete"),
    lid(0x8104, PSETID_TASK, "task_start_date"),
    lid(0x8105, PSETID_TASK, "task_due_date"),
    lid(0x810F, PSETID_TASK, "task_date_completed"),
    lid(0x811C, PSETID_TASK, "task_complete"),
    // PSETID_Common
    lid(0x8501, PSETID_COMMON, "reminder_delta"),
    lid(0x8502, PSETID_COMMON, "reminder_time"),
    lid(0x8503, PSETID_COMMON, "reminder_set"),
    lid(0x8506, PSETID_COMMON, "private"),
    lid(0x8516, PSETID_COMMON, "common_start"),
    lid(0x8517, PSETID_COMMON, "common_end"),
    lid(0x8530, PSETID_COMMON, "flag_request"),
    lid(0x8539, PSETID_COMMON, "companies"),
    lid(0x853A, PSETID_COMMON, "contacts"),
    lid(0x8580, PSETID_COMMON, "internet_account_name"),
    lid(0x8581, PSETID_COMMON, "internet_account_stamp"),
    // PSETID_Log
    lid(0x8700, PSETID_LOG, "log_type"),
    lid(0x8706, PSETID_LOG, "log_start"),
    lid(0x8707, PSETID_LOG, "log_duration"),
    lid(0x8708, PSETID_LOG, "log_end"),
    // PS_INTERNET_HEADERS
    lname("content-class", PS_INTERNET_HEADERS, "content_class"),
    lname("x-mailer", PS_INTERNET_HEADERS, "x_mailer"),
    lname("x-mimeole", PS_INTERNET_HEADERS, "x_mimeole"),
];

pub fn named_by_id(id: u32, guid: &Guid) -> Option<&'static NamedEntry> {
    NAMED
        .iter()
        .find(|entry| entry.id == NamedId::Number(id) && entry.guid == *guid)
}

/// String names compare case-insensitively, like the internet headers they
/// mirror.
pub fn named_by_name(name: &str, guid: &Guid) -> Option<&'static NamedEntry> {
    NAMED.iter().find(|entry| match entry.id {
        NamedId::Name(entry_name) => entry.guid == *guid && entry_name.eq_ignore_ascii_case(name),
        NamedId::Number(_) => false,
    })
}

pub fn named_by_atom(atom: &str) -> Option<&'static NamedEntry> {
    NAMED.iter().find(|entry| entry.atom == atom)
}
