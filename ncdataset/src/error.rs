use crate::dataset::DatasetState;
use crate::engine::Status;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by dataset handles. Every variant names the operation and
/// the resource (dataset path) it was attempted on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{op}: invalid byte source for '{resource}': {reason}")]
    InvalidSource {
        op: &'static str,
        resource: String,
        reason: String,
    },

    #[error("{op}: unsupported mode '{mode}' for '{resource}', expected one of r, w, w-, a, r+")]
    UnsupportedMode {
        op: &'static str,
        resource: String,
        mode: String,
    },

    #[error("{op}: '{name}' already exists in '{resource}'")]
    DuplicateName {
        op: &'static str,
        resource: String,
        name: String,
    },

    #[error("{op}: invalid size {size} for dimension '{name}' in '{resource}'")]
    InvalidSize {
        op: &'static str,
        resource: String,
        name: String,
        size: i64,
    },

    #[error("{op}: variable '{variable}' references unknown dimension '{dimension}' in '{resource}'")]
    UnknownDimension {
        op: &'static str,
        resource: String,
        variable: String,
        dimension: String,
    },

    #[error("{op}: no variable named '{name}' in '{resource}'")]
    UnknownVariable {
        op: &'static str,
        resource: String,
        name: String,
    },

    #[error("{op}: no group named '{name}' in '{resource}'")]
    UnknownGroup {
        op: &'static str,
        resource: String,
        name: String,
    },

    #[error("{op}: type '{type_name}' of '{name}' is not supported in '{resource}'")]
    UnsupportedType {
        op: &'static str,
        resource: String,
        name: String,
        type_name: String,
    },

    #[error("{op}: engine rejected operation on '{resource}': {status}")]
    FormatEngine {
        op: &'static str,
        resource: String,
        status: Status,
    },

    #[error("{op}: dataset '{resource}' is not open ({state})")]
    NotOpen {
        op: &'static str,
        resource: String,
        state: DatasetState,
    },

    #[error("{op}: cannot export '{resource}': {reason}")]
    ExportUnavailable {
        op: &'static str,
        resource: String,
        reason: String,
    },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something malformed or undeclared.
    InvalidInput,
    /// The format engine returned a non-zero status.
    EngineRejected,
    /// The handle is in the wrong lifecycle state.
    StateMisuse,
    /// The runtime cannot provide what was asked for.
    Unavailable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSource { .. }
            | Error::UnsupportedMode { .. }
            | Error::DuplicateName { .. }
            | Error::InvalidSize { .. }
            | Error::UnknownDimension { .. }
            | Error::UnknownVariable { .. }
            | Error::UnknownGroup { .. }
            | Error::UnsupportedType { .. } => ErrorKind::InvalidInput,
            Error::FormatEngine { .. } => ErrorKind::EngineRejected,
            Error::NotOpen { .. } => ErrorKind::StateMisuse,
            Error::ExportUnavailable { .. } => ErrorKind::Unavailable,
        }
    }

    /// The engine status, for [`Error::FormatEngine`].
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::FormatEngine { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            Error::InvalidSource { op, .. }
            | Error::UnsupportedMode { op, .. }
            | Error::DuplicateName { op, .. }
            | Error::InvalidSize { op, .. }
            | Error::UnknownDimension { op, .. }
            | Error::UnknownVariable { op, .. }
            | Error::UnknownGroup { op, .. }
            | Error::UnsupportedType { op, .. }
            | Error::FormatEngine { op, .. }
            | Error::NotOpen { op, .. }
            | Error::ExportUnavailable { op, .. } => op,
        }
    }

    /// The dataset path the operation was attempted on.
    pub fn resource(&self) -> &str {
        match self {
            Error::InvalidSource { resource, .. }
            | Error::UnsupportedMode { resource, .. }
            | Error::DuplicateName { resource, .. }
            | Error::InvalidSize { resource, .. }
            | Error::UnknownDimension { resource, .. }
            | Error::UnknownVariable { resource, .. }
            | Error::UnknownGroup { resource, .. }
            | Error::UnsupportedType { resource, .. }
            | Error::FormatEngine { resource, .. }
            | Error::NotOpen { resource, .. }
            | Error::ExportUnavailable { resource, .. } => resource,
        }
    }
}
