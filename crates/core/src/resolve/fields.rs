use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::layout::{FieldDeclaration, StructLayout};
use crate::ops::{PositionHint, StructOp};
use crate::version::VersionId;

/// Derives `target`'s layout from `parent`. An absent or empty script is
/// pure inheritance.
pub fn resolve_struct(
    parent: &StructLayout,
    script: Option<&[StructOp]>,
    target: &VersionId,
) -> LayoutResult<StructLayout> {
    let mut layout = parent.rebase(target);
    for op in script.unwrap_or_default() {
        apply_struct_op(&mut layout, op)?;
    }
    Ok(layout)
}

/// Validates and applies one op. Positions are contiguous again on return.
pub fn apply_struct_op(layout: &mut StructLayout, op: &StructOp) -> LayoutResult<()> {
    op.validate(layout)?;
    match op {
        StructOp::AddField {
            name,
            at,
            type_tag,
            enum_ref,
            default,
        } => {
            let index = match at {
                PositionHint::AtStart => 0,
                PositionHint::AtEnd => layout.fields.len(),
                PositionHint::Before(anchor) => locate(layout, anchor)?,
                PositionHint::After(anchor) => locate(layout, anchor)? + 1,
            };
            let field = FieldDeclaration {
                name: name.clone(),
                position: index,
                type_tag: type_tag.clone(),
                enum_ref: enum_ref.clone(),
                default: default.clone(),
            };
            layout.fields.insert(index, field);
        }
        StructOp::RemoveField { name } => {
            let index = locate(layout, name)?;
            layout.fields.remove(index);
        }
        StructOp::RenameField { from, to } => {
            let index = locate(layout, from)?;
            layout.fields[index].name = to.clone();
        }
        StructOp::ReorderField { name, position } => {
            let index = locate(layout, name)?;
            let field = layout.fields.remove(index);
            layout.fields.insert(*position, field);
        }
        StructOp::ChangeFieldDefault { name, default } => {
            let index = locate(layout, name)?;
            layout.fields[index].default = default.clone();
        }
        StructOp::ChangeFieldEnumRef { name, enum_ref } => {
            let index = locate(layout, name)?;
            layout.fields[index].enum_ref = enum_ref.clone();
        }
    }
    if op.is_structural() {
        layout.renumber();
    }
    layout.check_positions()
}

fn locate(layout: &StructLayout, name: &str) -> LayoutResult<usize> {
    layout
        .index_of(name)
        .ok_or_else(|| LayoutError::unknown(MemberKind::Field, name, layout.scope()))
}
