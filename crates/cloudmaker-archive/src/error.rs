// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for cloudmaker-archive.

use std::fmt;

use thiserror::Error;

use crate::archive::Artifact;

/// Result type using the archive [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Callers branch on the kind rather than on individual variants, e.g. to treat
/// "no archive yet" as a normal condition while surfacing transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid construction input. Fixable by the caller.
    Configuration,
    /// The requested key, object or instance does not exist.
    NotFound,
    /// A structured artifact could not be parsed or serialized.
    Parse,
    /// Network, auth or I/O failure reported by a backend.
    Transient,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::Transient => write!(f, "transient"),
        }
    }
}

/// Archive errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// One or more required fields were absent or empty.
    #[error("{context} is missing required fields: {}", .fields.join(", "))]
    MissingFields {
        /// What was being constructed.
        context: &'static str,
        /// Every missing field, in declaration order.
        fields: Vec<&'static str>,
    },

    /// The instance ID would escape the archive root (`/`, `\`, `.` or `..`).
    #[error("Invalid instance ID: {0:?}")]
    InvalidInstanceId(String),

    /// The archive type discriminator is not recognised.
    #[error("Unknown archive type: {0}")]
    UnknownArchiveType(String),

    /// The object storage bucket does not exist.
    #[error("The bucket {0} does not exist")]
    BucketNotFound(String),

    /// The key is absent from the backend.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A YAML document could not be parsed or produced.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Object storage request failed.
    #[error("Storage backend error for {key}: {message}")]
    Backend {
        /// Key (or bucket) the request targeted.
        key: String,
        /// Error reported by the client.
        message: String,
    },

    /// Filesystem operation failed.
    #[error("IO error for {key}: {source}")]
    Io {
        /// Key the operation targeted.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A read or write of one archive artifact failed.
    #[error("Failed to {operation} {artifact}: {source}")]
    Artifact {
        /// `read`, `write`, `parse` or `serialize`.
        operation: &'static str,
        /// Which artifact was involved.
        artifact: Artifact,
        /// The backend or parse error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Classify the error, looking through artifact wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingFields { .. }
            | Error::InvalidInstanceId(_)
            | Error::UnknownArchiveType(_)
            | Error::BucketNotFound(_) => ErrorKind::Configuration,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Yaml(_) => ErrorKind::Parse,
            Error::Backend { .. } | Error::Io { .. } => ErrorKind::Transient,
            Error::Artifact { source, .. } => source.kind(),
        }
    }

    /// True when the error is a missing key or object.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// True when the error is a caller-fixable configuration problem.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Artifact the error is attributed to, if any.
    pub fn artifact(&self) -> Option<Artifact> {
        match self {
            Error::Artifact { artifact, .. } => Some(*artifact),
            _ => None,
        }
    }

    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(key.into())
        } else {
            Error::Io {
                key: key.into(),
                source,
            }
        }
    }

    pub(crate) fn backend(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Backend {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Collects missing required fields so they can be reported together.
#[derive(Debug)]
pub(crate) struct RequiredFields {
    context: &'static str,
    missing: Vec<&'static str>,
}

impl RequiredFields {
    pub(crate) fn new(context: &'static str) -> Self {
        Self {
            context,
            missing: Vec::new(),
        }
    }

    /// Returns the trimmed value when present and non-empty, recording it as missing otherwise.
    pub(crate) fn require<'a>(&mut self, field: &'static str, value: Option<&'a str>) -> &'a str {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                self.missing.push(field);
                ""
            }
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingFields {
                context: self.context,
                fields: self.missing,
            })
        }
    }
}
