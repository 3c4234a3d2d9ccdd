use super::*;
use crate::layout::EnumEntry;
use crate::ops::PositionHint;

fn field(name: &str) -> FieldDeclaration {
    FieldDeclaration::new(name, "u8").with_enum("E")
}

/// v1 <- v2 <- v3, with `M` bound to `E` and a second, untouched struct.
fn three_versions() -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();
    builder
        .root("v1")
        .version("v2", "v1")
        .version("v3", "v2")
        .initial_enum("v1", "E", vec![EnumEntry::new("ENUM_01", 1)])
        .initial_struct(
            "v1",
            "M",
            vec![field("attr_0"), field("attr_a"), field("attr_z"), field("attr_c")],
        )
        .initial_struct("v1", "Header", vec![FieldDeclaration::new("xid", "u32")])
        .enum_script(
            "v2",
            "E",
            vec![EnumOp::add("ENUM_02", 20), EnumOp::change_value("ENUM_01", 10)],
        )
        .struct_script(
            "v2",
            "M",
            vec![StructOp::remove("attr_0"), StructOp::rename("attr_z", "attr_b")],
        );
    builder
}

#[test]
fn every_version_exposes_every_root_member() {
    let registry = three_versions().build().expect("build");
    for version in ["v1", "v2", "v3"] {
        let names: Vec<_> = registry
            .list_members(version)
            .expect("members")
            .map(|member| (member.kind, member.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (MemberKind::Struct, "Header"),
                (MemberKind::Struct, "M"),
                (MemberKind::Enum, "E"),
            ],
            "members at {version}"
        );
        assert_eq!(
            registry.lookup_struct(version, "Header").expect("header").owner_version.as_str(),
            version
        );
    }
}

#[test]
fn concrete_scenario_resolves() {
    let registry = three_versions().build().expect("build");

    let e2 = registry.lookup_enum("v2", "E").expect("enum");
    assert_eq!(e2.value_of("ENUM_01"), Some(10));
    assert_eq!(e2.value_of("ENUM_02"), Some(20));

    let m2 = registry.lookup_struct("v2", "M").expect("struct");
    let layout: Vec<_> = m2.fields.iter().map(|f| (f.name.as_str(), f.position)).collect();
    assert_eq!(layout, vec![("attr_a", 0), ("attr_b", 1), ("attr_c", 2)]);

    assert_eq!(
        registry
            .resolve_field_enum_value("v2", "M", "attr_a", "ENUM_01")
            .expect("value"),
        10
    );
    assert_eq!(
        registry
            .resolve_field_enum_value("v1", "M", "attr_a", "ENUM_01")
            .expect("value"),
        1
    );
}

#[test]
fn parent_snapshot_is_not_affected_by_child_scripts() {
    let registry = three_versions().build().expect("build");
    let m1 = registry.lookup_struct("v1", "M").expect("struct");
    assert_eq!(
        m1.field_names().collect::<Vec<_>>(),
        vec!["attr_0", "attr_a", "attr_z", "attr_c"]
    );
    assert_eq!(registry.lookup_enum("v1", "E").expect("enum").len(), 1);
}

#[test]
fn grandchild_inherits_without_scripts() {
    let registry = three_versions().build().expect("build");
    let m3 = registry.lookup_struct("v3", "M").expect("struct");
    let m2 = registry.lookup_struct("v2", "M").expect("struct");
    assert_eq!(m3.fields, m2.fields);
    assert_eq!(m3.owner_version.as_str(), "v3");
    assert_eq!(
        registry.parent_of("v3").expect("parent").map(VersionId::as_str),
        Some("v2")
    );
}

#[test]
fn lookup_errors_are_explicit() {
    let registry = three_versions().build().expect("build");
    assert!(matches!(
        registry.lookup_struct("v9", "M"),
        Err(LayoutError::UnknownVersion(_))
    ));
    assert!(matches!(
        registry.lookup_enum("v1", "Missing"),
        Err(LayoutError::UnknownMember {
            kind: MemberKind::Enum,
            ..
        })
    ));
    assert!(registry.list_members("v9").is_err());
}

#[test]
fn script_renaming_missing_field_aborts_build() {
    let mut builder = three_versions();
    builder.struct_script("v3", "M", vec![StructOp::rename("attr_z", "attr_y")]);

    let err = builder.build().expect_err("attr_z no longer exists at v3");
    assert!(matches!(
        err,
        LayoutError::UnknownMember {
            kind: MemberKind::Field,
            ref name,
            ..
        } if name == "attr_z"
    ));
}

#[test]
fn script_without_ancestor_is_orphan() {
    let mut builder = three_versions();
    builder.struct_script("v2", "Ghost", vec![StructOp::remove("a")]);
    assert!(matches!(
        builder.build(),
        Err(LayoutError::OrphanScript {
            kind: MemberKind::Struct,
            ..
        })
    ));
}

#[test]
fn new_member_can_be_introduced_below_root() {
    let mut builder = three_versions();
    builder
        .initial_enum("v2", "Flags", vec![EnumEntry::new("NONE", 0)])
        .initial_struct(
            "v2",
            "Stats",
            vec![FieldDeclaration::new("flags", "u16").with_enum("Flags")],
        )
        .struct_script(
            "v3",
            "Stats",
            vec![StructOp::add("pad", PositionHint::AtStart, "u16")],
        );
    let registry = builder.build().expect("build");

    assert!(registry.lookup_struct("v1", "Stats").is_err());
    let stats = registry.lookup_struct("v3", "Stats").expect("stats");
    assert_eq!(stats.field_names().collect::<Vec<_>>(), vec!["pad", "flags"]);
}

#[test]
fn initial_layout_for_inherited_name_is_duplicate() {
    let mut builder = three_versions();
    builder.initial_struct("v2", "Header", vec![FieldDeclaration::new("xid", "u32")]);
    assert!(matches!(
        builder.build(),
        Err(LayoutError::DuplicateMember {
            kind: MemberKind::Struct,
            ..
        })
    ));
}

#[test]
fn two_scripts_for_same_member_and_version_are_duplicate() {
    let mut builder = three_versions();
    builder.enum_script("v2", "E", vec![EnumOp::add("ENUM_03", 30)]);
    assert!(matches!(
        builder.build(),
        Err(LayoutError::DuplicateMember {
            kind: MemberKind::Enum,
            ..
        })
    ));
}

#[test]
fn declaration_for_undeclared_version_fails() {
    let mut builder = three_versions();
    builder.enum_script("v7", "E", vec![EnumOp::add("X", 1)]);
    assert!(matches!(builder.build(), Err(LayoutError::UnknownVersion(_))));
}

#[test]
fn field_bound_to_undeclared_enum_fails_build() {
    let mut builder = RegistryBuilder::new();
    builder
        .root("v1")
        .initial_struct("v1", "M", vec![field("kind")]);
    assert!(matches!(
        builder.build(),
        Err(LayoutError::UnknownMember {
            kind: MemberKind::Enum,
            ..
        })
    ));
}

#[test]
fn default_entry_removed_in_child_fails_build() {
    let mut builder = RegistryBuilder::new();
    builder
        .root("v1")
        .version("v2", "v1")
        .initial_enum("v1", "E", vec![EnumEntry::new("A", 1), EnumEntry::new("B", 2)])
        .initial_struct(
            "v1",
            "M",
            vec![field("kind").with_default(DefaultExpr::EnumEntry("A".to_string()))],
        )
        .enum_script("v2", "E", vec![EnumOp::remove("A")]);

    let err = builder.build().expect_err("default names a removed entry");
    assert!(matches!(
        err,
        LayoutError::UnknownMember {
            kind: MemberKind::Entry,
            ..
        }
    ));

    let relaxed = BuildOptions {
        validate_default_entries: false,
        ..BuildOptions::default()
    };
    assert!(builder.build_with(relaxed).is_ok());
}

#[test]
fn unique_values_option_is_opt_in() {
    let mut builder = three_versions();
    builder.enum_script("v3", "E", vec![EnumOp::add("ALIAS", 10)]);

    assert!(builder.build().is_ok());
    let strict = BuildOptions {
        require_unique_enum_values: true,
        ..BuildOptions::default()
    };
    assert!(matches!(
        builder.build_with(strict),
        Err(LayoutError::DuplicateEnumValue { value: 10, .. })
    ));
}

#[test]
fn rebuild_yields_independent_registry() {
    let mut builder = three_versions();
    let first = builder.build().expect("build");
    builder.enum_script("v3", "E", vec![EnumOp::change_value("ENUM_02", 99)]);
    let second = builder.build().expect("rebuild");

    assert_eq!(first.lookup_enum("v3", "E").expect("e").value_of("ENUM_02"), Some(20));
    assert_eq!(second.lookup_enum("v3", "E").expect("e").value_of("ENUM_02"), Some(99));
}

#[test]
fn member_listing_is_restartable() {
    let registry = three_versions().build().expect("build");
    let members = registry.list_members("v2").expect("members");
    assert_eq!(members.len(), 3);
    let first: Vec<_> = members.clone().collect();
    let second: Vec<_> = members.collect();
    assert_eq!(first, second);
}

#[test]
fn wire_versions_map_to_resolved_versions() {
    let mut builder = three_versions();
    builder
        .graph_mut()
        .add_child("v4", "v3")
        .with_wire_version(0x04);
    let registry = builder.build().expect("build");

    assert_eq!(registry.version_for_wire(0x04).map(VersionId::as_str), Some("v4"));
    assert!(registry.version_for_wire(0x01).is_none());
    assert_eq!(
        registry.versions().map(VersionId::as_str).collect::<Vec<_>>(),
        vec!["v1", "v2", "v3", "v4"]
    );
    assert_eq!(registry.root().map(VersionId::as_str), Some("v1"));
    assert!(registry.contains_version("v4"));
    assert!(!registry.contains_version("v0x04"));
}

#[test]
fn registry_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ResolvedRegistry>();
}
