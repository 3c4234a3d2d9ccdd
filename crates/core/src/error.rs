use std::fmt;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::version::VersionId;

pub type LayoutResult<T> = Result<T, LayoutError>;

/// Namespace a member name lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Struct,
    Enum,
    Field,
    Entry,
    Version,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MemberKind::Struct => "struct",
            MemberKind::Enum => "enum",
            MemberKind::Field => "field",
            MemberKind::Entry => "entry",
            MemberKind::Version => "version",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum LayoutError {
    #[error("unknown {kind} '{name}' in {scope}")]
    #[diagnostic(code("protover.unknown_member"))]
    UnknownMember {
        kind: MemberKind,
        name: String,
        scope: String,
    },
    #[error("duplicate {kind} '{name}' in {scope}")]
    #[diagnostic(code("protover.duplicate_member"))]
    DuplicateMember {
        kind: MemberKind,
        name: String,
        scope: String,
    },
    #[error("version graph is not a single-rooted tree: {0}")]
    #[diagnostic(code("protover.cyclic_version_graph"))]
    CyclicVersionGraph(String),
    #[error("unknown version '{0}'")]
    #[diagnostic(code("protover.unknown_version"))]
    UnknownVersion(VersionId),
    #[error("no version is mapped to wire version 0x{0:02x}")]
    #[diagnostic(code("protover.unknown_wire_version"))]
    UnknownWireVersion(u8),
    #[error("{kind} script for '{name}' at version '{version}' has no ancestor layout")]
    #[diagnostic(
        code("protover.orphan_script"),
        help("introduce the member with an initial layout before deriving it")
    )]
    OrphanScript {
        kind: MemberKind,
        name: String,
        version: VersionId,
    },
    #[error("position invariant broken in {scope}: {detail}")]
    #[diagnostic(code("protover.inconsistent_position"))]
    InconsistentPosition { scope: String, detail: String },
    #[error("position {position} out of range for {scope} with {len} fields")]
    #[diagnostic(code("protover.invalid_position"))]
    InvalidPosition {
        scope: String,
        position: usize,
        len: usize,
    },
    #[error("field '{field}' of {scope} has no enum binding")]
    #[diagnostic(code("protover.no_enum_binding"))]
    NoEnumBinding { scope: String, field: String },
    #[error("enum {scope} maps '{first}' and '{second}' to the same value {value}")]
    #[diagnostic(code("protover.duplicate_enum_value"))]
    DuplicateEnumValue {
        scope: String,
        first: String,
        second: String,
        value: i64,
    },
    #[error("instance of version '{found}' used through a context for '{expected}'")]
    #[diagnostic(code("protover.version_mismatch"))]
    VersionMismatch {
        expected: VersionId,
        found: VersionId,
    },
    #[error("serialization error: {message}")]
    #[diagnostic(code("protover.serialization"))]
    Serialization {
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
    },
}

impl LayoutError {
    pub(crate) fn unknown(
        kind: MemberKind,
        name: impl Into<String>,
        scope: impl fmt::Display,
    ) -> Self {
        LayoutError::UnknownMember {
            kind,
            name: name.into(),
            scope: scope.to_string(),
        }
    }

    pub(crate) fn duplicate(
        kind: MemberKind,
        name: impl Into<String>,
        scope: impl fmt::Display,
    ) -> Self {
        LayoutError::DuplicateMember {
            kind,
            name: name.into(),
            scope: scope.to_string(),
        }
    }

    /// Internal invariant violations are programming errors, not authoring mistakes.
    pub fn is_internal(&self) -> bool {
        matches!(self, LayoutError::InconsistentPosition { .. })
    }
}
