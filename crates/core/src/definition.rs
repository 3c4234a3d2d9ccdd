//! Declaration files: versions, edges and member declarations as data.
//!
//! JSON and TOML share one shape:
//!
//! ```json
//! {
//!   "format_version": "1.0",
//!   "versions": [
//!     { "id": "v1", "wire_version": 1,
//!       "enums":   [{ "name": "E", "initial": [{ "name": "A", "value": 1 }] }],
//!       "structs": [{ "name": "M",
//!                     "initial": [{ "name": "a", "type_tag": "u8", "enum_ref": "E" }] }] },
//!     { "id": "v2", "parent": "v1",
//!       "enums": [{ "name": "E",
//!                   "ops": [{ "op": "change_entry_value", "name": "A", "value": 10 }] }] }
//!   ]
//! }
//! ```

use miette::SourceSpan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::graph::VersionNode;
use crate::layout::{EnumEntry, FieldDeclaration};
use crate::ops::{EnumOp, StructOp};
use crate::registry::{Declaration, RegistryBuilder};
use crate::version::{VersionId, DEFINITION_FORMAT_VERSION};

/// One member of a version. Exactly one of `initial` and `ops` must be set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(
    deny_unknown_fields,
    bound(deserialize = "Item: Deserialize<'de>, Op: Deserialize<'de>")
)]
pub struct MemberDefinition<Item, Op> {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<Vec<Op>>,
}

impl<Item: Clone, Op: Clone> MemberDefinition<Item, Op> {
    pub fn initial(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            initial: Some(items),
            ops: None,
        }
    }

    pub fn ops(name: impl Into<String>, ops: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            initial: None,
            ops: Some(ops),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.initial.is_some() != self.ops.is_some()
    }

    /// `None` when both lists or neither are present.
    pub fn declaration(&self) -> Option<Declaration<Item, Op>> {
        match (&self.initial, &self.ops) {
            (Some(items), None) => Some(Declaration::Initial(items.clone())),
            (None, Some(ops)) => Some(Declaration::Ops(ops.clone())),
            _ => None,
        }
    }
}

pub type StructDefinition = MemberDefinition<FieldDeclaration, StructOp>;
pub type EnumDefinition = MemberDefinition<EnumEntry, EnumOp>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VersionDefinition {
    pub id: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<VersionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_version: Option<u8>,
    #[serde(default)]
    pub enums: Vec<EnumDefinition>,
    #[serde(default)]
    pub structs: Vec<StructDefinition>,
}

/// Whole protocol history in one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProtocolDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    pub versions: Vec<VersionDefinition>,
}

impl ProtocolDefinition {
    pub fn from_json(input: &str) -> LayoutResult<Self> {
        let definition: Self =
            serde_json::from_str(input).map_err(|err| json_deserialize_error(input, &err))?;
        definition.ensure_format()?;
        definition.ensure_members(input)?;
        Ok(definition)
    }

    pub fn from_toml(input: &str) -> LayoutResult<Self> {
        let definition: Self = toml::from_str(input).map_err(|err| {
            let span = err.span().unwrap_or(0..0);
            LayoutError::Serialization {
                message: err.message().to_string(),
                src: input.to_string(),
                span: (span.start, span.len()).into(),
            }
        })?;
        definition.ensure_format()?;
        definition.ensure_members(input)?;
        Ok(definition)
    }

    pub fn to_json(&self) -> LayoutResult<String> {
        let envelope = Self {
            format_version: Some(DEFINITION_FORMAT_VERSION.to_string()),
            versions: self.versions.clone(),
        };
        serde_json::to_string_pretty(&envelope).map_err(|err| LayoutError::Serialization {
            message: err.to_string(),
            src: String::new(),
            span: (0, 0).into(),
        })
    }

    /// A missing format version is read as the current one.
    fn ensure_format(&self) -> LayoutResult<()> {
        match self.format_version.as_deref() {
            None | Some(DEFINITION_FORMAT_VERSION) => Ok(()),
            Some(found) => Err(LayoutError::Serialization {
                message: format!(
                    "format incompatible: found {found}, expected {DEFINITION_FORMAT_VERSION}"
                ),
                src: String::new(),
                span: (0, 0).into(),
            }),
        }
    }

    /// Every member must carry exactly one of `initial` and `ops`. `src` is
    /// the document text, used to point the report at the member.
    fn ensure_members(&self, src: &str) -> LayoutResult<()> {
        for version in &self.versions {
            let enums = version
                .enums
                .iter()
                .filter(|member| !member.is_well_formed())
                .map(|member| (MemberKind::Enum, &member.name));
            let structs = version
                .structs
                .iter()
                .filter(|member| !member.is_well_formed())
                .map(|member| (MemberKind::Struct, &member.name));
            if let Some((kind, name)) = enums.chain(structs).next() {
                return Err(LayoutError::Serialization {
                    message: format!(
                        "{kind} '{name}' at version '{}' needs exactly one of `initial` or `ops`",
                        version.id
                    ),
                    src: src.to_string(),
                    span: member_span(src, version.id.as_str(), name),
                });
            }
        }
        Ok(())
    }

    /// Feeds every edge and declaration into a fresh builder, in file order.
    pub fn to_builder(&self) -> LayoutResult<RegistryBuilder> {
        self.ensure_members("")?;
        let mut builder = RegistryBuilder::new();
        for version in &self.versions {
            builder.graph_mut().push(VersionNode {
                id: version.id.clone(),
                parent: version.parent.clone(),
                wire_version: version.wire_version,
            });
            for member in &version.enums {
                if let Some(body) = member.declaration() {
                    builder.declare_enum(version.id.clone(), member.name.clone(), body);
                }
            }
            for member in &version.structs {
                if let Some(body) = member.declaration() {
                    builder.declare_struct(version.id.clone(), member.name.clone(), body);
                }
            }
        }
        Ok(builder)
    }
}

/// JSON Schema of the declaration file format.
pub fn definition_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ProtocolDefinition)
}

/// Span of the quoted member name after the quoted version id, if both occur.
fn member_span(src: &str, version: &str, name: &str) -> SourceSpan {
    let quoted_name = format!("\"{name}\"");
    src.find(&format!("\"{version}\""))
        .and_then(|start| src[start..].find(&quoted_name).map(|offset| start + offset))
        .map_or((0, 0).into(), |offset| (offset, quoted_name.len()).into())
}

#[cold]
#[inline(never)]
fn json_deserialize_error(input: &str, err: &serde_json::Error) -> LayoutError {
    let offset = json_error_offset(input, err);
    LayoutError::Serialization {
        message: err.to_string(),
        src: input.to_string(),
        span: (offset, 1).into(),
    }
}

#[cold]
#[inline(never)]
fn json_error_offset(input: &str, error: &serde_json::Error) -> usize {
    let line = error.line();
    let column = error.column();
    if line == 0 || column == 0 {
        return 0;
    }
    let mut offset = 0usize;
    for (index, chunk) in input.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let byte_index = chunk
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(idx, _)| idx)
                .unwrap_or(chunk.len().saturating_sub(1));
            return offset + byte_index;
        }
        offset += chunk.len();
    }
    input.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "format_version": "1.0",
        "versions": [
            {
                "id": "v1",
                "wire_version": 1,
                "enums": [{"name": "E", "initial": [{"name": "ENUM_01", "value": 1}]}],
                "structs": [{"name": "M", "initial": [
                    {"name": "attr_a", "type_tag": "u8", "enum_ref": "E",
                     "default": {"kind": "enum_entry", "value": "ENUM_01"}}
                ]}]
            },
            {
                "id": "v2",
                "parent": "v1",
                "enums": [{"name": "E", "ops": [
                    {"op": "change_entry_value", "name": "ENUM_01", "value": 10}
                ]}],
                "structs": [{"name": "M", "ops": [
                    {"op": "add_field", "name": "attr_b", "type_tag": "u16"}
                ]}]
            }
        ]
    }"#;

    #[test]
    fn parses_json_declarations() {
        let definition = ProtocolDefinition::from_json(SAMPLE).expect("parse");
        assert_eq!(definition.versions.len(), 2);
        let v2 = &definition.versions[1];
        assert_eq!(v2.parent.as_ref().map(VersionId::as_str), Some("v1"));
        assert_eq!(
            v2.enums[0].declaration(),
            Some(Declaration::Ops(vec![EnumOp::change_value("ENUM_01", 10)]))
        );
        assert!(matches!(
            v2.structs[0].ops.as_deref(),
            Some([StructOp::AddField { .. }])
        ));
    }

    #[test]
    fn builder_from_definition_resolves() {
        let registry = ProtocolDefinition::from_json(SAMPLE)
            .expect("parse")
            .to_builder()
            .expect("builder")
            .build()
            .expect("build");
        assert_eq!(registry.version_for_wire(1).map(VersionId::as_str), Some("v1"));
        assert_eq!(
            registry
                .resolve_field_enum_value("v2", "M", "attr_a", "ENUM_01")
                .expect("value"),
            10
        );
    }

    #[test]
    fn member_with_initial_and_ops_is_rejected() {
        let input = r#"{"versions": [{"id": "v1", "structs": [{"name": "M",
            "initial": [{"name": "a", "type_tag": "u8"}],
            "ops": [{"op": "remove_field", "name": "a"}]}]}]}"#;
        match ProtocolDefinition::from_json(input) {
            Err(LayoutError::Serialization { message, span, .. }) => {
                assert!(message.contains("struct 'M'"), "{message}");
                assert_eq!(&input[span.offset()..span.offset() + span.len()], "\"M\"");
            }
            other => panic!("expected serialization error, got {other:?}"),
        }
    }

    #[test]
    fn member_without_body_is_rejected() {
        let input = r#"
            [[versions]]
            id = "v1"

            [[versions.enums]]
            name = "E"
        "#;
        assert!(matches!(
            ProtocolDefinition::from_toml(input),
            Err(LayoutError::Serialization { ref message, .. }) if message.contains("enum 'E'")
        ));
    }

    #[test]
    fn hand_built_definition_is_checked_by_builder() {
        let mut member = StructDefinition::initial("M", vec![FieldDeclaration::new("a", "u8")]);
        member.ops = Some(vec![StructOp::remove("a")]);
        let definition = ProtocolDefinition {
            format_version: None,
            versions: vec![VersionDefinition {
                id: VersionId::new("v1"),
                parent: None,
                wire_version: None,
                enums: Vec::new(),
                structs: vec![member],
            }],
        };
        assert!(definition.to_builder().is_err());
    }

    #[test]
    fn unknown_document_keys_are_rejected() {
        let input = r#"{"versions": [{"id": "v1", "parent_id": "v0"}]}"#;
        assert!(matches!(
            ProtocolDefinition::from_json(input),
            Err(LayoutError::Serialization { .. })
        ));
    }

    #[test]
    fn rejects_unknown_format_version() {
        let input = r#"{"format_version": "9.9", "versions": []}"#;
        let err = ProtocolDefinition::from_json(input).expect_err("format");
        assert!(err.to_string().contains("format incompatible"));
    }

    #[test]
    fn json_syntax_error_points_into_source() {
        let input = "{\n  \"versions\": [,]\n}";
        match ProtocolDefinition::from_json(input) {
            Err(LayoutError::Serialization { span, src, .. }) => {
                assert_eq!(src, input);
                assert!((2..20).contains(&span.offset()), "span {span:?}");
            }
            other => panic!("expected serialization error, got {other:?}"),
        }
    }

    #[test]
    fn parses_toml_declarations() {
        let input = r#"
            [[versions]]
            id = "v1"

            [[versions.enums]]
            name = "E"
            initial = [{ name = "A", value = 1 }]

            [[versions]]
            id = "v2"
            parent = "v1"

            [[versions.enums]]
            name = "E"
            ops = [{ op = "add_entry", name = "B", value = 2 }]
        "#;
        let registry = ProtocolDefinition::from_toml(input)
            .expect("parse")
            .to_builder()
            .expect("builder")
            .build()
            .expect("build");
        assert_eq!(registry.lookup_enum("v2", "E").expect("enum").len(), 2);
    }

    #[test]
    fn json_output_carries_current_format() {
        let definition = ProtocolDefinition {
            format_version: None,
            versions: Vec::new(),
        };
        let json = definition.to_json().expect("json");
        assert!(json.contains(DEFINITION_FORMAT_VERSION));
    }
}
