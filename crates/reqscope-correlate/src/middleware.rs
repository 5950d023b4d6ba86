//! Middleware execution tree

use crate::nesting::{build_hierarchy, GroupRole, HierarchyNode, SequencedMessage};
use reqscope_core::messages::{MessageType, MiddlewarePayload};
use reqscope_core::{ClockNormalizer, DiagnosticsSink, Message, MessageLookup};
use serde::Serialize;
use std::collections::HashSet;

/// One middleware invocation and the middleware it called into
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareNode {
    pub event_id: String,
    pub name: String,
    pub package_name: Option<String>,
    pub offset: f64,
    pub duration: Option<f64>,
    pub depth: usize,
    pub children: Vec<MiddlewareNode>,
}

impl MiddlewareNode {
    /// Depth-first iteration over this node and its descendants
    pub fn walk(&self) -> Vec<&MiddlewareNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Rebuild the middleware call tree of one context
pub fn middleware_tree(
    index: &impl MessageLookup,
    normalizer: &ClockNormalizer,
    diagnostics: &dyn DiagnosticsSink,
) -> Vec<MiddlewareNode> {
    let mut seen = HashSet::new();
    let items: Vec<SequencedMessage> = [MessageType::MiddlewareStart, MessageType::MiddlewareEnd]
        .iter()
        .flat_map(|tag| index.messages_by_type(tag.as_str()))
        .filter(|m| seen.insert(m.id.clone()))
        .map(|m| SequencedMessage::new(m.clone(), normalizer.offset_of(m)))
        .collect();

    build_hierarchy(items, |m| classify(m, diagnostics))
        .iter()
        .map(|node| to_middleware(node, diagnostics))
        .collect()
}

fn classify(message: &Message, diagnostics: &dyn DiagnosticsSink) -> GroupRole {
    let Some(correlation_id) = message.correlation_id_or_report(diagnostics) else {
        return GroupRole::Item;
    };
    let correlation_id = correlation_id.to_string();
    if message.has_type(MessageType::MiddlewareStart.as_str()) {
        GroupRole::Begin {
            correlation_id,
            collapsed_by_default: false,
        }
    } else {
        GroupRole::End { correlation_id }
    }
}

fn to_middleware(node: &HierarchyNode, diagnostics: &dyn DiagnosticsSink) -> MiddlewareNode {
    let payload = node.begin.decode_or_report::<MiddlewarePayload>(diagnostics);
    let (name, package_name) = match payload {
        Some(p) => (p.name.unwrap_or_else(|| "anonymous".to_string()), p.package_name),
        None => ("anonymous".to_string(), None),
    };

    MiddlewareNode {
        event_id: node.begin.id.clone(),
        name,
        package_name,
        offset: node.offset,
        duration: node.duration(),
        depth: node.depth,
        children: node
            .children
            .iter()
            .map(|child| to_middleware(child, diagnostics))
            .collect(),
    }
}
