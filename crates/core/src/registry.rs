//! Version registry: authoring-time declarations and the resolved snapshot.
//!
//! # Contracts
//! - **Precondition**: every root member is declared with an initial layout;
//!   every script derives a member known at the parent version.
//! - **Postcondition**: each version exposes every member known at its
//!   parent plus the ones it introduces, each an independent value owned by
//!   that version. A failed build publishes nothing.

use std::collections::{btree_map, BTreeMap, HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::binding::BindingContext;
use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::graph::VersionGraph;
use crate::layout::{DefaultExpr, EnumEntry, EnumLayout, FieldDeclaration, StructLayout};
use crate::ops::{EnumOp, StructOp};
use crate::resolve::{resolve_enum, resolve_struct};
use crate::version::VersionId;

/// How a member is declared at one version: a fresh layout or a delta over
/// the parent's resolved layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Declaration<Item, Op> {
    Initial(Vec<Item>),
    Ops(Vec<Op>),
}

pub type StructDeclaration = Declaration<FieldDeclaration, StructOp>;
pub type EnumDeclaration = Declaration<EnumEntry, EnumOp>;

#[derive(Clone, Debug)]
struct Declared<D> {
    version: VersionId,
    name: String,
    body: D,
}

/// Validation switches applied during [`RegistryBuilder::build_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BuildOptions {
    /// Reject enums mapping two entries to the same value.
    pub require_unique_enum_values: bool,
    /// Check that enum-entry defaults name an entry of the field's enum.
    pub validate_default_entries: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            require_unique_enum_values: false,
            validate_default_entries: true,
        }
    }
}

/// Declaration phase. Collects graph edges and member declarations without
/// validating them; everything is checked by `build`.
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    graph: VersionGraph,
    structs: Vec<Declared<StructDeclaration>>,
    enums: Vec<Declared<EnumDeclaration>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph_mut(&mut self) -> &mut VersionGraph {
        &mut self.graph
    }

    pub fn root(&mut self, id: impl Into<VersionId>) -> &mut Self {
        self.graph.add_root(id);
        self
    }

    pub fn version(
        &mut self,
        id: impl Into<VersionId>,
        parent: impl Into<VersionId>,
    ) -> &mut Self {
        self.graph.add_child(id, parent);
        self
    }

    pub fn declare_struct(
        &mut self,
        version: impl Into<VersionId>,
        name: impl Into<String>,
        body: StructDeclaration,
    ) -> &mut Self {
        self.structs.push(Declared {
            version: version.into(),
            name: name.into(),
            body,
        });
        self
    }

    pub fn declare_enum(
        &mut self,
        version: impl Into<VersionId>,
        name: impl Into<String>,
        body: EnumDeclaration,
    ) -> &mut Self {
        self.enums.push(Declared {
            version: version.into(),
            name: name.into(),
            body,
        });
        self
    }

    pub fn initial_struct(
        &mut self,
        version: impl Into<VersionId>,
        name: impl Into<String>,
        fields: Vec<FieldDeclaration>,
    ) -> &mut Self {
        self.declare_struct(version, name, Declaration::Initial(fields))
    }

    pub fn struct_script(
        &mut self,
        version: impl Into<VersionId>,
        name: impl Into<String>,
        ops: Vec<StructOp>,
    ) -> &mut Self {
        self.declare_struct(version, name, Declaration::Ops(ops))
    }

    pub fn initial_enum(
        &mut self,
        version: impl Into<VersionId>,
        name: impl Into<String>,
        entries: Vec<EnumEntry>,
    ) -> &mut Self {
        self.declare_enum(version, name, Declaration::Initial(entries))
    }

    pub fn enum_script(
        &mut self,
        version: impl Into<VersionId>,
        name: impl Into<String>,
        ops: Vec<EnumOp>,
    ) -> &mut Self {
        self.declare_enum(version, name, Declaration::Ops(ops))
    }

    pub fn build(&self) -> LayoutResult<ResolvedRegistry> {
        self.build_with(BuildOptions::default())
    }

    /// Resolves every version, root first. Builds a fresh registry each call.
    #[instrument(skip_all, fields(versions = self.graph.len()))]
    pub fn build_with(&self, options: BuildOptions) -> LayoutResult<ResolvedRegistry> {
        let order = self.graph.topological_order()?;
        let struct_decls = index_declarations(&self.structs, &order, MemberKind::Struct)?;
        let enum_decls = index_declarations(&self.enums, &order, MemberKind::Enum)?;

        let nodes: HashMap<&VersionId, _> = self
            .graph
            .nodes()
            .iter()
            .map(|node| (&node.id, node))
            .collect();

        let mut snapshots: BTreeMap<VersionId, VersionSnapshot> = BTreeMap::new();
        let mut wire = BTreeMap::new();
        for version in &order {
            let node = nodes
                .get(version)
                .ok_or_else(|| LayoutError::UnknownVersion(version.clone()))?;
            let parent = match &node.parent {
                Some(parent_id) => Some(
                    snapshots
                        .get(parent_id)
                        .ok_or_else(|| LayoutError::UnknownVersion(parent_id.clone()))?,
                ),
                None => None,
            };

            let enums = derive_members(
                version,
                parent.map(|snapshot| &snapshot.enums),
                enum_decls.get(version).map(Vec::as_slice).unwrap_or_default(),
                MemberKind::Enum,
                |layout, ops| resolve_enum(layout, ops, version),
                |name, entries| EnumLayout::from_entries(version.clone(), name, entries.to_vec()),
            )?;
            let structs = derive_members(
                version,
                parent.map(|snapshot| &snapshot.structs),
                struct_decls.get(version).map(Vec::as_slice).unwrap_or_default(),
                MemberKind::Struct,
                |layout, ops| resolve_struct(layout, ops, version),
                |name, fields| StructLayout::from_fields(version.clone(), name, fields.to_vec()),
            )?;

            for layout in structs.values() {
                check_enum_bindings(layout, &enums, options)?;
            }
            if options.require_unique_enum_values {
                for layout in enums.values() {
                    layout.ensure_unique_values()?;
                }
            }

            debug!(
                version = %version,
                structs = structs.len(),
                enums = enums.len(),
                "resolved version"
            );
            if let Some(byte) = node.wire_version {
                wire.insert(byte, version.clone());
            }
            snapshots.insert(
                version.clone(),
                VersionSnapshot {
                    id: version.clone(),
                    parent: node.parent.clone(),
                    wire_version: node.wire_version,
                    structs,
                    enums,
                },
            );
        }

        info!(versions = order.len(), "version registry built");
        Ok(ResolvedRegistry {
            order,
            snapshots,
            wire,
        })
    }
}

fn index_declarations<'a, D>(
    declared: &'a [Declared<D>],
    order: &[VersionId],
    kind: MemberKind,
) -> LayoutResult<HashMap<VersionId, Vec<(&'a str, &'a D)>>> {
    let known: HashSet<&VersionId> = order.iter().collect();
    let mut seen = HashSet::new();
    let mut by_version: HashMap<VersionId, Vec<(&str, &D)>> = HashMap::new();
    for decl in declared {
        if !known.contains(&decl.version) {
            return Err(LayoutError::UnknownVersion(decl.version.clone()));
        }
        if !seen.insert((&decl.version, decl.name.as_str())) {
            return Err(LayoutError::duplicate(
                kind,
                decl.name.as_str(),
                format!("declarations for version '{}'", decl.version),
            ));
        }
        by_version
            .entry(decl.version.clone())
            .or_default()
            .push((decl.name.as_str(), &decl.body));
    }
    Ok(by_version)
}

/// Inherits or derives every parent member, then adds the members this
/// version introduces.
fn derive_members<L, Item, Op>(
    version: &VersionId,
    parent: Option<&BTreeMap<String, L>>,
    declared: &[(&str, &Declaration<Item, Op>)],
    kind: MemberKind,
    derive: impl Fn(&L, Option<&[Op]>) -> LayoutResult<L>,
    introduce: impl Fn(&str, &[Item]) -> LayoutResult<L>,
) -> LayoutResult<BTreeMap<String, L>> {
    let mut resolved = BTreeMap::new();
    if let Some(parent) = parent {
        for (name, layout) in parent {
            let ops = declared.iter().find_map(|(decl_name, body)| match body {
                Declaration::Ops(ops) if decl_name == name => Some(ops.as_slice()),
                _ => None,
            });
            if ops.is_some() {
                debug!(version = %version, member = %name, %kind, "applying script");
            }
            resolved.insert(name.clone(), derive(layout, ops)?);
        }
    }
    for (name, body) in declared {
        match body {
            Declaration::Initial(items) => {
                if resolved.contains_key(*name) {
                    return Err(LayoutError::duplicate(
                        kind,
                        *name,
                        format!("version '{version}' (already inherited)"),
                    ));
                }
                resolved.insert(name.to_string(), introduce(name, items.as_slice())?);
            }
            Declaration::Ops(_) => {
                if !resolved.contains_key(*name) {
                    return Err(LayoutError::OrphanScript {
                        kind,
                        name: name.to_string(),
                        version: version.clone(),
                    });
                }
            }
        }
    }
    Ok(resolved)
}

fn check_enum_bindings(
    layout: &StructLayout,
    enums: &BTreeMap<String, EnumLayout>,
    options: BuildOptions,
) -> LayoutResult<()> {
    for field in &layout.fields {
        let bound = match &field.enum_ref {
            Some(enum_name) => Some(enums.get(enum_name).ok_or_else(|| {
                LayoutError::unknown(
                    MemberKind::Enum,
                    enum_name.as_str(),
                    format!("{} field '{}'", layout.scope(), field.name),
                )
            })?),
            None => None,
        };
        if let Some(DefaultExpr::EnumEntry(entry)) = &field.default {
            let Some(enum_layout) = bound else {
                return Err(LayoutError::NoEnumBinding {
                    scope: layout.scope(),
                    field: field.name.clone(),
                });
            };
            if options.validate_default_entries && enum_layout.entry(entry).is_none() {
                return Err(LayoutError::unknown(
                    MemberKind::Entry,
                    entry.as_str(),
                    enum_layout.scope(),
                ));
            }
        }
    }
    Ok(())
}

/// Every resolved member of one version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VersionSnapshot {
    pub id: VersionId,
    pub parent: Option<VersionId>,
    pub wire_version: Option<u8>,
    pub structs: BTreeMap<String, StructLayout>,
    pub enums: BTreeMap<String, EnumLayout>,
}

/// A member name visible at some version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub kind: MemberKind,
    pub name: &'a str,
}

/// Lazy listing of a version's members: structs first, then enums, each by
/// name. Cloning restarts from the clone point.
#[derive(Clone, Debug)]
pub struct MemberNames<'a> {
    structs: btree_map::Keys<'a, String, StructLayout>,
    enums: btree_map::Keys<'a, String, EnumLayout>,
}

impl<'a> Iterator for MemberNames<'a> {
    type Item = MemberRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.structs.next() {
            return Some(MemberRef {
                kind: MemberKind::Struct,
                name,
            });
        }
        self.enums.next().map(|name| MemberRef {
            kind: MemberKind::Enum,
            name,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.structs.len() + self.enums.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for MemberNames<'_> {}

/// Immutable result of one build. Share it behind an `Arc` for concurrent
/// readers; rebuilding yields a new instance.
#[derive(Clone, Debug)]
pub struct ResolvedRegistry {
    order: Vec<VersionId>,
    snapshots: BTreeMap<VersionId, VersionSnapshot>,
    wire: BTreeMap<u8, VersionId>,
}

impl ResolvedRegistry {
    pub fn snapshot(&self, version: &str) -> LayoutResult<&VersionSnapshot> {
        self.snapshots
            .get(version)
            .ok_or_else(|| LayoutError::UnknownVersion(VersionId::new(version)))
    }

    pub fn lookup_struct(&self, version: &str, name: &str) -> LayoutResult<&StructLayout> {
        let snapshot = self.snapshot(version)?;
        snapshot
            .structs
            .get(name)
            .ok_or_else(|| {
                LayoutError::unknown(MemberKind::Struct, name, format!("version '{version}'"))
            })
    }

    pub fn lookup_enum(&self, version: &str, name: &str) -> LayoutResult<&EnumLayout> {
        let snapshot = self.snapshot(version)?;
        snapshot
            .enums
            .get(name)
            .ok_or_else(|| {
                LayoutError::unknown(MemberKind::Enum, name, format!("version '{version}'"))
            })
    }

    pub fn list_members(&self, version: &str) -> LayoutResult<MemberNames<'_>> {
        let snapshot = self.snapshot(version)?;
        Ok(MemberNames {
            structs: snapshot.structs.keys(),
            enums: snapshot.enums.keys(),
        })
    }

    /// Value of `entry` in the enum bound to `struct_name.field_name`, looked
    /// up in `version`'s own enum set.
    pub fn resolve_field_enum_value(
        &self,
        version: &str,
        struct_name: &str,
        field_name: &str,
        entry: &str,
    ) -> LayoutResult<i64> {
        BindingContext::new(self, version)?.field_enum_value(struct_name, field_name, entry)
    }

    /// Versions in build order, parents before children.
    pub fn versions(&self) -> impl Iterator<Item = &VersionId> + '_ {
        self.order.iter()
    }

    pub fn root(&self) -> Option<&VersionId> {
        self.order.first()
    }

    pub fn contains_version(&self, version: &str) -> bool {
        self.snapshots.contains_key(version)
    }

    pub fn parent_of(&self, version: &str) -> LayoutResult<Option<&VersionId>> {
        Ok(self.snapshot(version)?.parent.as_ref())
    }

    /// Resolved version announced by a header byte.
    pub fn version_for_wire(&self, wire_version: u8) -> Option<&VersionId> {
        self.wire.get(&wire_version)
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
