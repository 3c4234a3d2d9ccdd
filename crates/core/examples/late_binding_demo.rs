//! Example: late-bound enum values across protocol versions
//!
//! `FlowMod` is authored once at 0x01. Only the `FlowModCommand` enum changes
//! afterwards, yet every version reads its own values through the field.

use protover::{
    BindingContext, DefaultExpr, EnumEntry, EnumOp, FieldDeclaration, PositionHint, RegistryBuilder,
    StructOp,
};

fn main() {
    println!("=== Late Binding Example ===\n");

    let mut builder = RegistryBuilder::new();
    builder.graph_mut().add_root("0x01").with_wire_version(0x01);
    builder
        .graph_mut()
        .add_child("0x04", "0x01")
        .with_wire_version(0x04);
    builder
        .graph_mut()
        .add_child("0x05", "0x04")
        .with_wire_version(0x05);

    builder
        .initial_enum(
            "0x01",
            "FlowModCommand",
            vec![EnumEntry::new("ADD", 0), EnumEntry::new("DELETE", 3)],
        )
        .initial_struct(
            "0x01",
            "FlowMod",
            vec![
                FieldDeclaration::new("cookie", "u64"),
                FieldDeclaration::new("command", "u16")
                    .with_enum("FlowModCommand")
                    .with_default(DefaultExpr::EnumEntry("DELETE".to_string())),
            ],
        )
        // Values move in 0x04, one entry arrives in 0x05
        .enum_script("0x04", "FlowModCommand", vec![EnumOp::change_value("DELETE", 4)])
        .enum_script("0x05", "FlowModCommand", vec![EnumOp::add("BUNDLE", 5)])
        .struct_script(
            "0x05",
            "FlowMod",
            vec![StructOp::add("out_group", PositionHint::AtEnd, "u32")],
        );

    let registry = match builder.build() {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("build failed: {err}");
            return;
        }
    };

    for wire in [0x01u8, 0x04, 0x05] {
        let context = BindingContext::for_wire(&registry, wire).expect("context");
        let instance = context.instantiate("FlowMod").expect("instance");
        println!(
            "wire 0x{wire:02x} ({}): command default = {:?}",
            context.version(),
            instance.get("command")
        );
    }

    println!("\nMembers at 0x05:");
    for member in registry.list_members("0x05").expect("members") {
        println!("  {} {}", member.kind, member.name);
    }
}
