//! Version evolution engine for binary protocol layouts.
//!
//! Each protocol version declares its structs and enums either as an initial
//! layout or as an explicit script of edits over its parent's resolved
//! layout. [`RegistryBuilder::build`] resolves the whole version tree once,
//! root first, into an immutable [`ResolvedRegistry`]; consumers then read
//! layouts by `(version, name)` and bind enum names through a
//! [`BindingContext`] for the version they are working in.

mod binding;
mod definition;
mod error;
mod graph;
mod layout;
mod ops;
mod registry;
mod resolve;
mod version;

pub use binding::{BindingContext, FieldSlot, ResolvedValue, StructInstance};
pub use definition::{
    definition_schema, EnumDefinition, MemberDefinition, ProtocolDefinition, StructDefinition,
    VersionDefinition,
};
pub use error::{LayoutError, LayoutResult, MemberKind};
pub use graph::{VersionGraph, VersionNode};
pub use layout::{DefaultExpr, EnumEntry, EnumLayout, FieldDeclaration, StructLayout};
pub use ops::{EnumOp, PositionHint, StructOp};
pub use registry::{
    BuildOptions, Declaration, EnumDeclaration, MemberNames, MemberRef, RegistryBuilder,
    ResolvedRegistry, StructDeclaration, VersionSnapshot,
};
pub use resolve::{apply_enum_op, apply_struct_op, resolve_enum, resolve_struct};
pub use version::{VersionId, DEFINITION_FORMAT_VERSION};
