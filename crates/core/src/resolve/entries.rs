use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::layout::{EnumEntry, EnumLayout};
use crate::ops::EnumOp;
use crate::version::VersionId;

/// Derives `target`'s enum from `parent`, keeping insertion order.
pub fn resolve_enum(
    parent: &EnumLayout,
    script: Option<&[EnumOp]>,
    target: &VersionId,
) -> LayoutResult<EnumLayout> {
    let mut layout = parent.rebase(target);
    for op in script.unwrap_or_default() {
        apply_enum_op(&mut layout, op)?;
    }
    Ok(layout)
}

pub fn apply_enum_op(layout: &mut EnumLayout, op: &EnumOp) -> LayoutResult<()> {
    op.validate(layout)?;
    match op {
        EnumOp::AddEntry { name, value } => {
            layout.entries.push(EnumEntry::new(name.clone(), *value));
        }
        EnumOp::RemoveEntry { name } => {
            let index = locate(layout, name)?;
            layout.entries.remove(index);
        }
        EnumOp::RenameEntry { from, to } => {
            let index = locate(layout, from)?;
            layout.entries[index].name = to.clone();
        }
        EnumOp::ChangeEntryValue { name, value } => {
            let index = locate(layout, name)?;
            layout.entries[index].value = *value;
        }
    }
    Ok(())
}

fn locate(layout: &EnumLayout, name: &str) -> LayoutResult<usize> {
    layout
        .entries
        .iter()
        .position(|entry| entry.name == name)
        .ok_or_else(|| LayoutError::unknown(MemberKind::Entry, name, layout.scope()))
}
