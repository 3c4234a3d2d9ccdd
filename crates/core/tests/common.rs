#![allow(dead_code)]

use protover::{ProtocolDefinition, RegistryBuilder, ResolvedRegistry};

/// OpenFlow-shaped history: 0x01 -> 0x04 -> 0x05.
pub const OPENFLOW_JSON: &str = include_str!("fixtures/openflow.json");

pub fn openflow_builder() -> RegistryBuilder {
    ProtocolDefinition::from_json(OPENFLOW_JSON)
        .expect("parse fixture")
        .to_builder()
        .expect("builder")
}

pub fn openflow_registry() -> ResolvedRegistry {
    openflow_builder().build().expect("build fixture")
}
