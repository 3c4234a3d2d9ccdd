//! Resolved, version-specific struct and enum layouts.
//!
//! A layout is owned by exactly one version. Inheriting a layout means
//! rebasing a deep copy onto the child version, so later edits in the child
//! can never reach back into the parent snapshot.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::version::VersionId;

/// Default value of a field, either a literal or an enum entry named late.
///
/// `EnumEntry` stores only the entry name. The integer behind it is looked up
/// in the enum of whatever version the field is being read at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum DefaultExpr {
    Int(i64),
    Bool(bool),
    Text(String),
    EnumEntry(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct FieldDeclaration {
    pub name: String,
    /// Serialization order, contiguous from 0 within the owning layout.
    #[serde(default)]
    pub position: usize,
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultExpr>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: 0,
            type_tag: type_tag.into(),
            enum_ref: None,
            default: None,
        }
    }

    pub fn with_enum(mut self, enum_name: impl Into<String>) -> Self {
        self.enum_ref = Some(enum_name.into());
        self
    }

    pub fn with_default(mut self, default: DefaultExpr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StructLayout {
    pub owner_version: VersionId,
    pub name: String,
    pub fields: Vec<FieldDeclaration>,
}

impl StructLayout {
    /// Builds a layout from fields in declaration order, assigning positions.
    ///
    /// Positions may be left at zero. Once any field carries a position, every
    /// field must carry its own index in the list.
    pub fn from_fields(
        owner_version: VersionId,
        name: impl Into<String>,
        fields: Vec<FieldDeclaration>,
    ) -> LayoutResult<Self> {
        let len = fields.len();
        let authored = fields.iter().any(|field| field.position != 0);
        let mut layout = Self {
            owner_version,
            name: name.into(),
            fields: Vec::with_capacity(len),
        };
        let mut seen = HashSet::new();
        for (index, field) in fields.into_iter().enumerate() {
            if authored && field.position != index {
                return Err(LayoutError::InvalidPosition {
                    scope: layout.scope(),
                    position: field.position,
                    len,
                });
            }
            if !seen.insert(field.name.clone()) {
                return Err(LayoutError::duplicate(
                    MemberKind::Field,
                    field.name,
                    layout.scope(),
                ));
            }
            layout.fields.push(field);
        }
        layout.renumber();
        Ok(layout)
    }

    /// `name@version`, used in diagnostics.
    pub fn scope(&self) -> String {
        format!("{}@{}", self.name, self.owner_version)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Deep copy owned by `version`.
    pub fn rebase(&self, version: &VersionId) -> Self {
        Self {
            owner_version: version.clone(),
            name: self.name.clone(),
            fields: self.fields.clone(),
        }
    }

    pub(crate) fn renumber(&mut self) {
        for (index, field) in self.fields.iter_mut().enumerate() {
            field.position = index;
        }
    }

    /// Checks that positions are exactly `0..len` in order and names are unique.
    pub fn check_positions(&self) -> LayoutResult<()> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            if field.position != index {
                return Err(LayoutError::InconsistentPosition {
                    scope: self.scope(),
                    detail: format!(
                        "field '{}' has position {} at index {index}",
                        field.name, field.position
                    ),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(LayoutError::InconsistentPosition {
                    scope: self.scope(),
                    detail: format!("field '{}' appears twice", field.name),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct EnumEntry {
    pub name: String,
    pub value: i64,
}

impl EnumEntry {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Ordered name to value mapping. Iteration follows insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnumLayout {
    pub owner_version: VersionId,
    pub name: String,
    pub entries: Vec<EnumEntry>,
}

impl EnumLayout {
    pub fn from_entries(
        owner_version: VersionId,
        name: impl Into<String>,
        entries: Vec<EnumEntry>,
    ) -> LayoutResult<Self> {
        let mut layout = Self {
            owner_version,
            name: name.into(),
            entries: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            if layout.entry(&entry.name).is_some() {
                return Err(LayoutError::duplicate(
                    MemberKind::Entry,
                    entry.name,
                    layout.scope(),
                ));
            }
            layout.entries.push(entry);
        }
        Ok(layout)
    }

    pub fn scope(&self) -> String {
        format!("{}@{}", self.name, self.owner_version)
    }

    pub fn entry(&self, name: &str) -> Option<&EnumEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.entry(name).map(|entry| entry.value)
    }

    /// Reverse lookup; with duplicate values the first entry wins.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.value == value)
            .map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rebase(&self, version: &VersionId) -> Self {
        Self {
            owner_version: version.clone(),
            name: self.name.clone(),
            entries: self.entries.clone(),
        }
    }

    pub(crate) fn ensure_unique_values(&self) -> LayoutResult<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(other) = self.entries[..index]
                .iter()
                .find(|other| other.value == entry.value)
            {
                return Err(LayoutError::DuplicateEnumValue {
                    scope: self.scope(),
                    first: other.name.clone(),
                    second: entry.name.clone(),
                    value: entry.value,
                });
            }
        }
        Ok(())
    }
}
