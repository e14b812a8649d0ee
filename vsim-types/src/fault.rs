//! Fault taxonomy shared by every engine

use crate::reference::ObjectRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A method fault.
///
/// Faults are ordinary values: they are returned from engine calls, stored
/// in task results and reported per-property in retrieval results.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "fault", rename_all = "camelCase")]
pub enum Fault {
    /// A filter, token, collector or task is unknown
    #[error("{what} not found")]
    NotFound { what: String },

    /// Malformed request argument
    #[error("invalid argument: {property}")]
    InvalidArgument { property: String },

    /// Unknown or malformed property path
    #[error("invalid property: {name}")]
    InvalidProperty { name: String },

    /// The object vanished or was never fully created
    #[error("the object {obj} has already been deleted or has not been completely created")]
    ManagedObjectNotFound { obj: ObjectRef },

    /// The request was explicitly canceled
    #[error("the request was canceled")]
    RequestCanceled,

    /// The operation is not allowed in the object's current state
    #[error("the operation is not allowed in the current state")]
    InvalidState,

    /// A fixed reference is already registered
    #[error("{name} already exists")]
    AlreadyExists { name: String },

    /// A caller-set wait deadline passed
    #[error("wait deadline exceeded")]
    DeadlineExceeded,

    /// Unexpected error raised by a collaborator
    #[error("runtime fault: {message}")]
    RuntimeFault { message: String },
}

impl Fault {
    pub fn not_found(what: impl Into<String>) -> Self {
        Fault::NotFound { what: what.into() }
    }

    pub fn invalid_argument(property: impl Into<String>) -> Self {
        Fault::InvalidArgument {
            property: property.into(),
        }
    }

    pub fn invalid_property(name: impl Into<String>) -> Self {
        Fault::InvalidProperty { name: name.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Fault::RuntimeFault {
            message: message.into(),
        }
    }

    /// Fault type name as clients know it
    pub fn type_name(&self) -> &'static str {
        match self {
            Fault::NotFound { .. } => "NotFound",
            Fault::InvalidArgument { .. } => "InvalidArgument",
            Fault::InvalidProperty { .. } => "InvalidProperty",
            Fault::ManagedObjectNotFound { .. } => "ManagedObjectNotFound",
            Fault::RequestCanceled => "RequestCanceled",
            Fault::InvalidState => "InvalidState",
            Fault::AlreadyExists { .. } => "AlreadyExists",
            Fault::DeadlineExceeded => "DeadlineExceeded",
            Fault::RuntimeFault { .. } => "RuntimeFault",
        }
    }
}

/// A fault paired with a human readable message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedFault {
    pub fault: Fault,
    pub localized_message: String,
}

impl LocalizedFault {
    pub fn new(fault: Fault, localized_message: impl Into<String>) -> Self {
        Self {
            fault,
            localized_message: localized_message.into(),
        }
    }
}

impl From<Fault> for LocalizedFault {
    fn from(fault: Fault) -> Self {
        let localized_message = fault.to_string();
        Self {
            fault,
            localized_message,
        }
    }
}

/// Result type using [`Fault`]
pub type Result<T> = std::result::Result<T, Fault>;
