//! Atomic edits applicable to a struct field list or an enum mapping.
//!
//! Ops are plain data. `validate` checks an op against the layout it is about
//! to be applied to; applying is the resolver's job.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::layout::{DefaultExpr, EnumLayout, StructLayout};

/// Where an added field lands relative to the current field list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PositionHint {
    AtStart,
    #[default]
    AtEnd,
    Before(String),
    After(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum StructOp {
    AddField {
        name: String,
        #[serde(default)]
        at: PositionHint,
        type_tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enum_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<DefaultExpr>,
    },
    RemoveField {
        name: String,
    },
    /// Keeps position, type, enum binding and default.
    RenameField {
        from: String,
        to: String,
    },
    ReorderField {
        name: String,
        position: usize,
    },
    ChangeFieldDefault {
        name: String,
        default: Option<DefaultExpr>,
    },
    ChangeFieldEnumRef {
        name: String,
        enum_ref: Option<String>,
    },
}

impl StructOp {
    pub fn add(
        name: impl Into<String>,
        at: PositionHint,
        type_tag: impl Into<String>,
    ) -> Self {
        StructOp::AddField {
            name: name.into(),
            at,
            type_tag: type_tag.into(),
            enum_ref: None,
            default: None,
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        StructOp::RemoveField { name: name.into() }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        StructOp::RenameField {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn reorder(name: impl Into<String>, position: usize) -> Self {
        StructOp::ReorderField {
            name: name.into(),
            position,
        }
    }

    pub fn change_default(name: impl Into<String>, default: Option<DefaultExpr>) -> Self {
        StructOp::ChangeFieldDefault {
            name: name.into(),
            default,
        }
    }

    pub fn change_enum_ref(name: impl Into<String>, enum_ref: Option<String>) -> Self {
        StructOp::ChangeFieldEnumRef {
            name: name.into(),
            enum_ref,
        }
    }

    /// Whether the op can move or create positions.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            StructOp::AddField { .. }
                | StructOp::RemoveField { .. }
                | StructOp::ReorderField { .. }
        )
    }

    pub fn validate(&self, layout: &StructLayout) -> LayoutResult<()> {
        let require = |name: &str| -> LayoutResult<()> {
            if layout.field(name).is_none() {
                return Err(LayoutError::unknown(MemberKind::Field, name, layout.scope()));
            }
            Ok(())
        };
        match self {
            StructOp::AddField { name, at, .. } => {
                if layout.field(name).is_some() {
                    return Err(LayoutError::duplicate(
                        MemberKind::Field,
                        name.as_str(),
                        layout.scope(),
                    ));
                }
                match at {
                    PositionHint::Before(anchor) | PositionHint::After(anchor) => require(anchor),
                    PositionHint::AtStart | PositionHint::AtEnd => Ok(()),
                }
            }
            StructOp::RemoveField { name }
            | StructOp::ChangeFieldDefault { name, .. }
            | StructOp::ChangeFieldEnumRef { name, .. } => require(name),
            StructOp::RenameField { from, to } => {
                require(from)?;
                if from != to && layout.field(to).is_some() {
                    return Err(LayoutError::duplicate(
                        MemberKind::Field,
                        to.as_str(),
                        layout.scope(),
                    ));
                }
                Ok(())
            }
            StructOp::ReorderField { name, position } => {
                require(name)?;
                if *position >= layout.len() {
                    return Err(LayoutError::InvalidPosition {
                        scope: layout.scope(),
                        position: *position,
                        len: layout.len(),
                    });
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum EnumOp {
    /// Appends after the existing entries.
    AddEntry { name: String, value: i64 },
    RemoveEntry { name: String },
    RenameEntry { from: String, to: String },
    ChangeEntryValue { name: String, value: i64 },
}

impl EnumOp {
    pub fn add(name: impl Into<String>, value: i64) -> Self {
        EnumOp::AddEntry {
            name: name.into(),
            value,
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        EnumOp::RemoveEntry { name: name.into() }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        EnumOp::RenameEntry {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn change_value(name: impl Into<String>, value: i64) -> Self {
        EnumOp::ChangeEntryValue {
            name: name.into(),
            value,
        }
    }

    pub fn validate(&self, layout: &EnumLayout) -> LayoutResult<()> {
        let require = |name: &str| -> LayoutResult<()> {
            if layout.entry(name).is_none() {
                return Err(LayoutError::unknown(MemberKind::Entry, name, layout.scope()));
            }
            Ok(())
        };
        match self {
            EnumOp::AddEntry { name, .. } => {
                if layout.entry(name).is_some() {
                    return Err(LayoutError::duplicate(
                        MemberKind::Entry,
                        name.as_str(),
                        layout.scope(),
                    ));
                }
                Ok(())
            }
            EnumOp::RemoveEntry { name } | EnumOp::ChangeEntryValue { name, .. } => require(name),
            EnumOp::RenameEntry { from, to } => {
                require(from)?;
                if from != to && layout.entry(to).is_some() {
                    return Err(LayoutError::duplicate(
                        MemberKind::Entry,
                        to.as_str(),
                        layout.scope(),
                    ));
                }
                Ok(())
            }
        }
    }
}
