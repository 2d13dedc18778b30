//! Workflow graph model in the inference service's API format.
//!
//! A graph is a map of string node ids to nodes, each node carrying a
//! `class_type` and an `inputs` map. Input values are either literal
//! parameters or links to another node's output slot, serialized as a
//! two-element `[node_id, slot]` array. The whole graph serializes to
//! exactly the JSON the service's submission endpoint expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reference to another node's output slot.
///
/// Serializes as `["<node_id>", <slot>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link(pub String, pub u32);

impl Link {
    pub fn node_id(&self) -> &str {
        &self.0
    }

    pub fn slot(&self) -> u32 {
        self.1
    }
}

/// A single node input: a link or a literal parameter.
///
/// The untagged representation matches the wire format, where the value
/// shape alone distinguishes links (arrays) from literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeInput {
    Link(Link),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl NodeInput {
    /// The link target, if this input is a link.
    pub fn as_link(&self) -> Option<&Link> {
        match self {
            NodeInput::Link(link) => Some(link),
            _ => None,
        }
    }

    /// The literal text, if this input is a text parameter.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeInput::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The literal integer, if this input is an integer parameter.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            NodeInput::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for NodeInput {
    fn from(value: &str) -> Self {
        NodeInput::Text(value.to_string())
    }
}

impl From<String> for NodeInput {
    fn from(value: String) -> Self {
        NodeInput::Text(value)
    }
}

impl From<i64> for NodeInput {
    fn from(value: i64) -> Self {
        NodeInput::Int(value)
    }
}

impl From<u32> for NodeInput {
    fn from(value: u32) -> Self {
        NodeInput::Int(i64::from(value))
    }
}

impl From<f64> for NodeInput {
    fn from(value: f64) -> Self {
        NodeInput::Float(value)
    }
}

impl From<bool> for NodeInput {
    fn from(value: bool) -> Self {
        NodeInput::Bool(value)
    }
}

/// Shorthand for a link input targeting `node_id`'s output `slot`.
pub fn link(node_id: &str, slot: u32) -> NodeInput {
    NodeInput::Link(Link(node_id.to_string(), slot))
}

/// One operation in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub inputs: BTreeMap<String, NodeInput>,
    pub class_type: String,
}

impl WorkflowNode {
    pub fn new(class_type: &str) -> Self {
        Self {
            inputs: BTreeMap::new(),
            class_type: class_type.to_string(),
        }
    }

    /// Add or replace an input, returning `self` for chaining.
    pub fn input(mut self, name: &str, value: impl Into<NodeInput>) -> Self {
        self.inputs.insert(name.to_string(), value.into());
        self
    }

    /// Replace an input in place.
    pub fn set_input(&mut self, name: &str, value: impl Into<NodeInput>) {
        self.inputs.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&NodeInput> {
        self.inputs.get(name)
    }
}

/// A complete workflow graph keyed by node id.
///
/// The map is ordered so serialization is deterministic, which keeps
/// submitted payloads reproducible and testable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: BTreeMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, node: WorkflowNode) {
        self.nodes.insert(id.to_string(), node);
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &WorkflowNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    /// Ids of all nodes with the given `class_type`, in id order.
    pub fn find_by_class(&self, class_type: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.class_type == class_type)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Every link input in the graph, in node-id order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.nodes
            .values()
            .flat_map(|node| node.inputs.values())
            .filter_map(NodeInput::as_link)
    }

    /// Link targets that do not name a node in this graph.
    pub fn dangling_links(&self) -> Vec<&Link> {
        self.links()
            .filter(|target| !self.nodes.contains_key(target.node_id()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_in_api_format() {
        let node = WorkflowNode::new("CLIPTextEncode")
            .input("text", "a cat")
            .input("clip", link("3", 1));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inputs": {"text": "a cat", "clip": ["3", 1]},
                "class_type": "CLIPTextEncode",
            })
        );
    }

    #[test]
    fn graph_serializes_as_plain_node_map() {
        let mut graph = WorkflowGraph::new();
        graph.insert("7", WorkflowNode::new("EmptyLatentImage").input("width", 512u32));
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "7": {"inputs": {"width": 512}, "class_type": "EmptyLatentImage"},
            })
        );
    }

    #[test]
    fn literal_inputs_round_trip_by_shape() {
        let json = r#"{
            "6": {
                "inputs": {
                    "seed": 12345,
                    "cfg": 7.0,
                    "sampler_name": "euler",
                    "add_noise": true,
                    "model": ["5", 0]
                },
                "class_type": "KSampler"
            }
        }"#;
        let graph: WorkflowGraph = serde_json::from_str(json).unwrap();
        let node = graph.node("6").unwrap();
        assert_eq!(node.get("seed"), Some(&NodeInput::Int(12345)));
        assert_eq!(node.get("cfg"), Some(&NodeInput::Float(7.0)));
        assert_eq!(
            node.get("sampler_name"),
            Some(&NodeInput::Text("euler".to_string()))
        );
        assert_eq!(node.get("add_noise"), Some(&NodeInput::Bool(true)));
        assert_eq!(
            node.get("model").and_then(NodeInput::as_link),
            Some(&Link("5".to_string(), 0))
        );
    }

    #[test]
    fn float_literals_stay_floats_through_serialization() {
        let node = WorkflowNode::new("KSampler").input("denoise", 1.0);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"denoise\":1.0"), "got: {json}");
    }

    #[test]
    fn find_by_class_returns_ids_in_order() {
        let mut graph = WorkflowGraph::new();
        graph.insert("2", WorkflowNode::new("CLIPTextEncode"));
        graph.insert("1", WorkflowNode::new("CLIPTextEncode"));
        graph.insert("3", WorkflowNode::new("CheckpointLoaderSimple"));
        assert_eq!(graph.find_by_class("CLIPTextEncode"), vec!["1", "2"]);
        assert_eq!(graph.find_by_class("KSampler"), Vec::<&str>::new());
    }

    #[test]
    fn dangling_links_reports_unresolved_targets() {
        let mut graph = WorkflowGraph::new();
        graph.insert("1", WorkflowNode::new("CLIPTextEncode").input("clip", link("3", 1)));
        assert_eq!(graph.dangling_links().len(), 1);
        assert_eq!(graph.dangling_links()[0].node_id(), "3");

        graph.insert("3", WorkflowNode::new("CheckpointLoaderSimple"));
        assert!(graph.dangling_links().is_empty());
    }
}
