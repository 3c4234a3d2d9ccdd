//! Version graph: protocol revisions linked by parent edges.
//!
//! # Contracts
//! - **Precondition**: every parent named by an edge is itself declared.
//! - **Postcondition**: [`VersionGraph::topological_order`] yields each
//!   version exactly once, parents strictly before children, starting at the
//!   single root.

use std::collections::{BTreeMap, HashMap, VecDeque};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult, MemberKind};
use crate::version::VersionId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VersionNode {
    pub id: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<VersionId>,
    /// Header byte identifying this revision on the wire, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_version: Option<u8>,
}

/// Declared versions in declaration order. Validation is deferred to
/// [`VersionGraph::topological_order`] so authoring never fails midway.
#[derive(Clone, Debug, Default)]
pub struct VersionGraph {
    nodes: Vec<VersionNode>,
}

impl VersionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, id: impl Into<VersionId>) -> &mut Self {
        self.push(VersionNode {
            id: id.into(),
            parent: None,
            wire_version: None,
        })
    }

    pub fn add_child(
        &mut self,
        id: impl Into<VersionId>,
        parent: impl Into<VersionId>,
    ) -> &mut Self {
        self.push(VersionNode {
            id: id.into(),
            parent: Some(parent.into()),
            wire_version: None,
        })
    }

    pub fn push(&mut self, node: VersionNode) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Tags the most recently added version with its wire byte.
    pub fn with_wire_version(&mut self, wire_version: u8) -> &mut Self {
        if let Some(node) = self.nodes.last_mut() {
            node.wire_version = Some(wire_version);
        }
        self
    }

    pub fn nodes(&self) -> &[VersionNode] {
        &self.nodes
    }

    pub fn contains(&self, id: &VersionId) -> bool {
        self.nodes.iter().any(|node| &node.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validates the graph as a single-rooted tree and returns its versions
    /// parent-first. Siblings keep declaration order.
    pub fn topological_order(&self) -> LayoutResult<Vec<VersionId>> {
        let mut by_id: HashMap<&VersionId, &VersionNode> =
            HashMap::with_capacity(self.nodes.len());
        let mut wire: BTreeMap<u8, &VersionId> = BTreeMap::new();
        for node in &self.nodes {
            if by_id.insert(&node.id, node).is_some() {
                return Err(LayoutError::duplicate(
                    MemberKind::Version,
                    node.id.as_str(),
                    "version graph",
                ));
            }
            if let Some(byte) = node.wire_version {
                if let Some(previous) = wire.insert(byte, &node.id) {
                    return Err(LayoutError::duplicate(
                        MemberKind::Version,
                        format!("wire version 0x{byte:02x}"),
                        format!("versions '{previous}' and '{}'", node.id),
                    ));
                }
            }
        }

        let mut roots = Vec::new();
        let mut children: HashMap<&VersionId, Vec<&VersionId>> = HashMap::new();
        for node in &self.nodes {
            match &node.parent {
                None => roots.push(&node.id),
                Some(parent) => {
                    if parent == &node.id {
                        return Err(LayoutError::CyclicVersionGraph(format!(
                            "version '{parent}' is its own parent"
                        )));
                    }
                    if !by_id.contains_key(parent) {
                        return Err(LayoutError::UnknownVersion(parent.clone()));
                    }
                    children.entry(parent).or_default().push(&node.id);
                }
            }
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] if self.nodes.is_empty() => {
                return Err(LayoutError::CyclicVersionGraph(
                    "no versions declared".to_string(),
                ))
            }
            [] => {
                return Err(LayoutError::CyclicVersionGraph(
                    "every version has a parent".to_string(),
                ))
            }
            many => {
                let labels: Vec<String> = many.iter().map(|id| id.to_string()).collect();
                return Err(LayoutError::CyclicVersionGraph(format!(
                    "multiple roots: {}",
                    labels.join(", ")
                )));
            }
        };

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            if let Some(kids) = children.get(id) {
                queue.extend(kids.iter().copied());
            }
        }

        // Every node has one parent, so anything unreached sits on a cycle.
        if order.len() != self.nodes.len() {
            let stranded: Vec<String> = self
                .nodes
                .iter()
                .filter(|node| !order.contains(&node.id))
                .map(|node| node.id.to_string())
                .collect();
            return Err(LayoutError::CyclicVersionGraph(format!(
                "versions not reachable from root '{root}': {}",
                stranded.join(", ")
            )));
        }
        Ok(order)
    }
}
