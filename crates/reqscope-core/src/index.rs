//! Message index - per-context lookup of messages by type tag
//!
//! Messages arrive unordered and possibly more than once. The index keeps each
//! type's list sorted by ordinal and ignores repeated deliveries, so every stage
//! can be re-run on a grown index without seeing a different ordering.

use crate::messages::Message;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Context id used for messages that carry no context block
pub const DEFAULT_CONTEXT: &str = "default";

/// Lookup interface the reconstruction stages consume
pub trait MessageLookup {
    /// Messages carrying `type_tag`, ordered by ordinal
    fn messages_by_type(&self, type_tag: &str) -> &[Arc<Message>];

    /// First message carrying `type_tag`
    fn single_message_by_type(&self, type_tag: &str) -> Option<&Arc<Message>> {
        self.messages_by_type(type_tag).first()
    }

    /// Grows whenever a new message is indexed
    fn revision(&self) -> u64;
}

/// In-memory index over the messages of one request context
#[derive(Debug, Clone, Default)]
pub struct MessageIndex {
    context_id: String,
    by_type: HashMap<String, Vec<Arc<Message>>>,
    seen: HashSet<String>,
    revision: u64,
}

impl MessageIndex {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            ..Default::default()
        }
    }

    /// Build an index from a batch of messages
    pub fn from_messages(
        context_id: impl Into<String>,
        messages: impl IntoIterator<Item = Message>,
    ) -> Self {
        let mut index = Self::new(context_id);
        index.extend(messages);
        index
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Index a message. Returns false if a message with the same id was already seen.
    pub fn insert(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id.clone()) {
            debug!(message_id = %message.id, "Ignoring repeated delivery");
            return false;
        }

        let message = Arc::new(message);
        let mut tags = HashSet::new();
        for tag in message.types.iter().filter(|t| tags.insert(t.as_str())) {
            let list = self.by_type.entry(tag.clone()).or_default();
            let position = list.partition_point(|m| m.ordinal <= message.ordinal);
            list.insert(position, message.clone());
        }
        self.revision += 1;
        true
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.insert(message);
        }
    }

    /// Number of distinct messages indexed
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Every indexed message once, ordered by ordinal
    pub fn all_messages(&self) -> Vec<Arc<Message>> {
        let mut emitted = HashSet::new();
        let mut all: Vec<Arc<Message>> = self
            .by_type
            .values()
            .flatten()
            .filter(|m| emitted.insert(m.id.clone()))
            .cloned()
            .collect();
        all.sort_by_key(|m| m.ordinal);
        all
    }

    /// Type tags present in the index, sorted
    pub fn type_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl MessageLookup for MessageIndex {
    fn messages_by_type(&self, type_tag: &str) -> &[Arc<Message>] {
        self.by_type
            .get(type_tag)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// Partitions an arriving message stream into per-context indexes
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    contexts: BTreeMap<String, MessageIndex>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut store = Self::new();
        for message in messages {
            store.insert(message);
        }
        store
    }

    /// Route a message to its context's index
    pub fn insert(&mut self, message: Message) -> bool {
        let context_id = message
            .context
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
        self.contexts
            .entry(context_id.clone())
            .or_insert_with(|| MessageIndex::new(context_id))
            .insert(message)
    }

    pub fn context(&self, context_id: &str) -> Option<&MessageIndex> {
        self.contexts.get(context_id)
    }

    /// Context ids, sorted
    pub fn context_ids(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    pub fn contexts(&self) -> impl Iterator<Item = &MessageIndex> {
        self.contexts.values()
    }

    pub fn into_contexts(self) -> impl Iterator<Item = MessageIndex> {
        self.contexts.into_values()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Agent, MessageType};

    fn msg(id: &str, ordinal: u64, message_type: MessageType) -> Message {
        Message::new(id, ordinal, ordinal as f64, Agent::Server, message_type)
    }

    #[test]
    fn test_messages_sorted_by_ordinal_despite_arrival_order() {
        let mut index = MessageIndex::new("ctx");
        index.insert(msg("c", 3, MessageType::LogWrite));
        index.insert(msg("a", 1, MessageType::LogWrite));
        index.insert(msg("b", 2, MessageType::LogWrite));

        let ids: Vec<&str> = index
            .messages_by_type("log-write")
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(index.single_message_by_type("log-write").unwrap().id, "a");
    }

    #[test]
    fn test_repeated_delivery_ignored() {
        let mut index = MessageIndex::new("ctx");
        assert!(index.insert(msg("a", 1, MessageType::LogWrite)));
        assert!(!index.insert(msg("a", 1, MessageType::LogWrite)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.revision(), 1);
    }

    #[test]
    fn test_unknown_type_is_empty() {
        let index = MessageIndex::new("ctx");
        assert!(index.messages_by_type("web-request").is_empty());
        assert!(index.single_message_by_type("web-request").is_none());
    }

    #[test]
    fn test_multi_tag_message_indexed_under_each_tag() {
        let mut index = MessageIndex::new("ctx");
        index.insert(msg("a", 1, MessageType::LogWrite).with_type("custom"));
        assert_eq!(index.messages_by_type("custom").len(), 1);
        assert_eq!(index.messages_by_type("log-write").len(), 1);
        assert_eq!(index.all_messages().len(), 1);
        assert_eq!(index.type_tags(), vec!["custom", "log-write"]);
    }

    #[test]
    fn test_repeated_tag_indexed_once() {
        let mut index = MessageIndex::new("ctx");
        index.insert(
            msg("a", 1, MessageType::DataStoreBegin)
                .with_type("data-store-begin")
                .with_type("custom")
                .with_type("custom"),
        );
        assert_eq!(index.messages_by_type("data-store-begin").len(), 1);
        assert_eq!(index.messages_by_type("custom").len(), 1);
        assert_eq!(index.all_messages().len(), 1);
    }

    #[test]
    fn test_store_partitions_by_context() {
        let store = MessageStore::from_messages(vec![
            msg("a", 1, MessageType::WebRequest).with_context("one"),
            msg("b", 2, MessageType::WebRequest).with_context("two"),
            msg("c", 3, MessageType::WebResponse),
        ]);
        assert_eq!(store.context_ids(), vec!["default", "one", "two"]);
        assert_eq!(store.context("one").unwrap().len(), 1);
        assert_eq!(store.context(DEFAULT_CONTEXT).unwrap().len(), 1);
    }
}
