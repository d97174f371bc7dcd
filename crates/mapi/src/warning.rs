//! Structured, recoverable diagnostics.
//!
//! Parsers that can continue past a fault return partial data and push a
//! [Warning] instead of erroring out. The codes are stable identifiers;
//! callers filter or escalate on them, never on message text.

use std::fmt::{self, Display};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WarningCode {
    NameidParseFailed,
    PropertyParseFailed,
    AttachmentSkipped,
    PstIndexParseFailed,
    PstDescriptorParseFailed,
    PstBranchLoopDetected,
    // Produced by the MIME collaborator, never by the container core.
    MalformedHeaderLine,
    MultipartMissingBoundary,
    NestedPartWarning,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::NameidParseFailed => "nameid_parse_failed",
            WarningCode::PropertyParseFailed => "property_parse_failed",
            WarningCode::AttachmentSkipped => "attachment_skipped",
            WarningCode::PstIndexParseFailed => "pst_index_parse_failed",
            WarningCode::PstDescriptorParseFailed => "pst_descriptor_parse_failed",
            WarningCode::PstBranchLoopDetected => "pst_branch_loop_detected",
            WarningCode::MalformedHeaderLine => "malformed_header_line",
            WarningCode::MultipartMissingBoundary => "multipart_missing_boundary",
            WarningCode::NestedPartWarning => "nested_part_warning",
        }
    }
}

impl Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        })
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Warning {
    pub code: WarningCode,
    pub severity: Severity,
    pub message: String,
    pub context: Option<String>,
    pub recoverable: bool,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warn,
            message: message.into(),
            context: None,
            recoverable: true,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}
