//! Verbs, typed commands and their outcomes.
//!
//! A transport hands the core a verb and an ordered list of string
//! arguments. [`Command::parse`] checks arity and validates every field
//! once, so the handlers only ever see typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, EndpointRange};
use crate::error::{BrokerError, Result};
use crate::id::{ImageId, ObjectId, PrincipalId};

/// The operations the broker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verb {
    InsertPrincipal,
    RemovePrincipal,
    UpdateSubjectSet,
    InsertImage,
    SetImageProperty,
    AppendObjectAcl,
    CheckHasProperty,
    CheckCanAccess,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::InsertPrincipal,
        Verb::RemovePrincipal,
        Verb::UpdateSubjectSet,
        Verb::InsertImage,
        Verb::SetImageProperty,
        Verb::AppendObjectAcl,
        Verb::CheckHasProperty,
        Verb::CheckCanAccess,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertPrincipal => "insert-principal",
            Self::RemovePrincipal => "remove-principal",
            Self::UpdateSubjectSet => "update-subject-set",
            Self::InsertImage => "insert-image",
            Self::SetImageProperty => "set-image-property",
            Self::AppendObjectAcl => "append-object-acl",
            Self::CheckHasProperty => "check-has-property",
            Self::CheckCanAccess => "check-can-access",
        }
    }

    /// Route name used by existing metadata-service clients.
    pub fn route(&self) -> &'static str {
        match self {
            Self::InsertPrincipal => "postInstanceSet",
            Self::RemovePrincipal => "retractInstanceSet",
            Self::UpdateSubjectSet => "updateSubjectSet",
            Self::InsertImage => "postAttesterImage",
            Self::SetImageProperty => "postImageProperty",
            Self::AppendObjectAcl => "postObjectAcl",
            Self::CheckHasProperty => "attestAppProperty",
            Self::CheckCanAccess => "appAccessesObject",
        }
    }

    /// Exact number of positional arguments the verb takes.
    pub fn arity(&self) -> usize {
        match self {
            Self::InsertPrincipal => 5,
            Self::SetImageProperty
            | Self::AppendObjectAcl
            | Self::CheckHasProperty
            | Self::CheckCanAccess => 2,
            Self::RemovePrincipal | Self::UpdateSubjectSet | Self::InsertImage => 1,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Verb {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('/');
        Self::ALL
            .into_iter()
            .find(|verb| verb.name() == s || verb.route() == s)
            .ok_or_else(|| BrokerError::malformed(format!("unknown verb: {}", s)))
    }
}

/// A validated request, one variant per verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InsertPrincipal {
        id: PrincipalId,
        image: ImageId,
        endpoint: EndpointRange,
        config: String,
    },
    RemovePrincipal {
        id: PrincipalId,
    },
    /// Existence check only.
    UpdateSubjectSet {
        id: PrincipalId,
    },
    InsertImage {
        id: ImageId,
    },
    SetImageProperty {
        image: ImageId,
        property: String,
    },
    AppendObjectAcl {
        object: ObjectId,
        capability: String,
    },
    CheckHasProperty {
        endpoint: Endpoint,
        property: String,
    },
    CheckCanAccess {
        endpoint: Endpoint,
        object: ObjectId,
    },
}

impl Command {
    /// Build a command from positional arguments.
    ///
    /// Fails with `MalformedInput` on a wrong argument count or an
    /// unparsable endpoint. Insert-principal arguments are
    /// `[id, image, <ignored>, endpoint range, config]`.
    pub fn parse<S: AsRef<str>>(verb: Verb, args: &[S]) -> Result<Self> {
        if args.len() != verb.arity() {
            return Err(BrokerError::malformed(format!(
                "{} expects {} arguments, got {}",
                verb,
                verb.arity(),
                args.len()
            )));
        }
        let arg = |i: usize| args[i].as_ref();

        let command = match verb {
            Verb::InsertPrincipal => Self::InsertPrincipal {
                id: arg(0).into(),
                image: arg(1).into(),
                endpoint: arg(3).parse()?,
                config: arg(4).to_string(),
            },
            Verb::RemovePrincipal => Self::RemovePrincipal { id: arg(0).into() },
            Verb::UpdateSubjectSet => Self::UpdateSubjectSet { id: arg(0).into() },
            Verb::InsertImage => Self::InsertImage { id: arg(0).into() },
            Verb::SetImageProperty => Self::SetImageProperty {
                image: arg(0).into(),
                property: arg(1).to_string(),
            },
            Verb::AppendObjectAcl => Self::AppendObjectAcl {
                object: arg(0).into(),
                capability: arg(1).to_string(),
            },
            Verb::CheckHasProperty => Self::CheckHasProperty {
                endpoint: arg(0).parse()?,
                property: arg(1).to_string(),
            },
            Verb::CheckCanAccess => Self::CheckCanAccess {
                endpoint: arg(0).parse()?,
                object: arg(1).into(),
            },
        };
        Ok(command)
    }

    pub fn verb(&self) -> Verb {
        match self {
            Self::InsertPrincipal { .. } => Verb::InsertPrincipal,
            Self::RemovePrincipal { .. } => Verb::RemovePrincipal,
            Self::UpdateSubjectSet { .. } => Verb::UpdateSubjectSet,
            Self::InsertImage { .. } => Verb::InsertImage,
            Self::SetImageProperty { .. } => Verb::SetImageProperty,
            Self::AppendObjectAcl { .. } => Verb::AppendObjectAcl,
            Self::CheckHasProperty { .. } => Verb::CheckHasProperty,
            Self::CheckCanAccess { .. } => Verb::CheckCanAccess,
        }
    }
}

/// Transport-neutral result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ok,
    BadRequest,
    Conflict,
    NotFound,
    Forbidden,
}

impl Status {
    /// HTTP-style numeric code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::BadRequest => "BAD_REQUEST",
            Self::Conflict => "CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
        };
        f.write_str(name)
    }
}

/// What a handler hands back to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Status,
    pub message: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: Some(message.into()),
        }
    }

    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            message: None,
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

impl From<BrokerError> for Outcome {
    fn from(err: BrokerError) -> Self {
        Self {
            status: err.status(),
            message: Some(err.message().to_string()),
        }
    }
}

impl From<Result<Outcome>> for Outcome {
    fn from(result: Result<Outcome>) -> Self {
        result.unwrap_or_else(Outcome::from)
    }
}
