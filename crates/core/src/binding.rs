//! Binding context: the `(registry, version)` pair every enum lookup and
//! default computation goes through.
//!
//! Fields carry enum references and enum-entry defaults as names. Whatever
//! version authored a field, reading it through a context for version `V`
//! resolves those names against `V`'s own enum set, including when `V`
//! inherited the struct untouched from an ancestor several levels up.

use serde::Serialize;

use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::layout::{DefaultExpr, EnumLayout, FieldDeclaration, StructLayout};
use crate::registry::{ResolvedRegistry, VersionSnapshot};
use crate::version::VersionId;

/// A default or assigned value after enum names have been bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedValue {
    Int { value: i64 },
    Bool { value: bool },
    Text { value: String },
    Enum {
        enum_name: String,
        entry: String,
        value: i64,
    },
}

impl ResolvedValue {
    /// Integer form as it would be encoded, if the value has one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ResolvedValue::Int { value } | ResolvedValue::Enum { value, .. } => Some(*value),
            ResolvedValue::Bool { value } => Some(i64::from(*value)),
            ResolvedValue::Text { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldSlot {
    pub name: String,
    pub value: Option<ResolvedValue>,
}

/// A struct value under construction, tied to the version that built it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructInstance {
    version: VersionId,
    name: String,
    slots: Vec<FieldSlot>,
}

impl StructInstance {
    pub fn version(&self) -> &VersionId {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slots in serialization order.
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn get(&self, field: &str) -> Option<&ResolvedValue> {
        self.slots
            .iter()
            .find(|slot| slot.name == field)
            .and_then(|slot| slot.value.as_ref())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BindingContext<'r> {
    snapshot: &'r VersionSnapshot,
}

impl<'r> BindingContext<'r> {
    pub fn new(registry: &'r ResolvedRegistry, version: &str) -> LayoutResult<Self> {
        Ok(Self {
            snapshot: registry.snapshot(version)?,
        })
    }

    /// Context for the version announced by a header byte.
    pub fn for_wire(registry: &'r ResolvedRegistry, wire_version: u8) -> LayoutResult<Self> {
        let version = registry
            .version_for_wire(wire_version)
            .ok_or(LayoutError::UnknownWireVersion(wire_version))?;
        Self::new(registry, version.as_str())
    }

    pub fn version(&self) -> &'r VersionId {
        &self.snapshot.id
    }

    pub fn wire_version(&self) -> Option<u8> {
        self.snapshot.wire_version
    }

    pub fn struct_layout(&self, name: &str) -> LayoutResult<&'r StructLayout> {
        self.snapshot.structs.get(name).ok_or_else(|| {
            LayoutError::unknown(MemberKind::Struct, name, format!("version '{}'", self.version()))
        })
    }

    pub fn enum_layout(&self, name: &str) -> LayoutResult<&'r EnumLayout> {
        self.snapshot.enums.get(name).ok_or_else(|| {
            LayoutError::unknown(MemberKind::Enum, name, format!("version '{}'", self.version()))
        })
    }

    pub fn enum_value(&self, enum_name: &str, entry: &str) -> LayoutResult<i64> {
        let layout = self.enum_layout(enum_name)?;
        layout
            .value_of(entry)
            .ok_or_else(|| LayoutError::unknown(MemberKind::Entry, entry, layout.scope()))
    }

    /// The enum a field is bound to, taken from this context's version.
    pub fn field_enum(
        &self,
        struct_name: &str,
        field_name: &str,
    ) -> LayoutResult<&'r EnumLayout> {
        let layout = self.struct_layout(struct_name)?;
        let field = field_of(layout, field_name)?;
        self.bound_enum(layout, field)
    }

    pub fn field_enum_value(
        &self,
        struct_name: &str,
        field_name: &str,
        entry: &str,
    ) -> LayoutResult<i64> {
        let enum_layout = self.field_enum(struct_name, field_name)?;
        enum_layout
            .value_of(entry)
            .ok_or_else(|| LayoutError::unknown(MemberKind::Entry, entry, enum_layout.scope()))
    }

    pub fn default_value(
        &self,
        struct_name: &str,
        field_name: &str,
    ) -> LayoutResult<Option<ResolvedValue>> {
        let layout = self.struct_layout(struct_name)?;
        let field = field_of(layout, field_name)?;
        field
            .default
            .as_ref()
            .map(|expr| self.evaluate(layout, field, expr))
            .transpose()
    }

    /// New instance with every field pre-filled from its default.
    pub fn instantiate(&self, struct_name: &str) -> LayoutResult<StructInstance> {
        let layout = self.struct_layout(struct_name)?;
        let slots = layout
            .fields
            .iter()
            .map(|field| {
                let value = field
                    .default
                    .as_ref()
                    .map(|expr| self.evaluate(layout, field, expr))
                    .transpose()?;
                Ok(FieldSlot {
                    name: field.name.clone(),
                    value,
                })
            })
            .collect::<LayoutResult<Vec<_>>>()?;
        Ok(StructInstance {
            version: self.version().clone(),
            name: layout.name.clone(),
            slots,
        })
    }

    /// Evaluates `expr` for `field` of `instance` through this context.
    pub fn assign(
        &self,
        instance: &mut StructInstance,
        field_name: &str,
        expr: &DefaultExpr,
    ) -> LayoutResult<()> {
        if &instance.version != self.version() {
            return Err(LayoutError::VersionMismatch {
                expected: self.version().clone(),
                found: instance.version.clone(),
            });
        }
        let layout = self.struct_layout(&instance.name)?;
        let field = field_of(layout, field_name)?;
        let value = self.evaluate(layout, field, expr)?;
        let slot = instance
            .slots
            .iter_mut()
            .find(|slot| slot.name == field_name)
            .ok_or_else(|| LayoutError::unknown(MemberKind::Field, field_name, layout.scope()))?;
        slot.value = Some(value);
        Ok(())
    }

    fn bound_enum(
        &self,
        layout: &StructLayout,
        field: &FieldDeclaration,
    ) -> LayoutResult<&'r EnumLayout> {
        let enum_name = field.enum_ref.as_deref().ok_or_else(|| LayoutError::NoEnumBinding {
            scope: layout.scope(),
            field: field.name.clone(),
        })?;
        self.enum_layout(enum_name)
    }

    fn evaluate(
        &self,
        layout: &StructLayout,
        field: &FieldDeclaration,
        expr: &DefaultExpr,
    ) -> LayoutResult<ResolvedValue> {
        Ok(match expr {
            DefaultExpr::Int(value) => ResolvedValue::Int { value: *value },
            DefaultExpr::Bool(value) => ResolvedValue::Bool { value: *value },
            DefaultExpr::Text(value) => ResolvedValue::Text {
                value: value.clone(),
            },
            DefaultExpr::EnumEntry(entry) => {
                let enum_layout = self.bound_enum(layout, field)?;
                let value = enum_layout.value_of(entry).ok_or_else(|| {
                    LayoutError::unknown(MemberKind::Entry, entry.as_str(), enum_layout.scope())
                })?;
                ResolvedValue::Enum {
                    enum_name: enum_layout.name.clone(),
                    entry: entry.clone(),
                    value,
                }
            }
        })
    }
}

fn field_of<'l>(layout: &'l StructLayout, name: &str) -> LayoutResult<&'l FieldDeclaration> {
    layout
        .field(name)
        .ok_or_else(|| LayoutError::unknown(MemberKind::Field, name, layout.scope()))
}

#[cfg(test)]
#[path = "tests/binding_tests.rs"]
mod tests;
