//! Correlation engine - pairs begin and end messages by correlation id
//!
//! A begin without an end is not an error: the pair stays open and its span
//! has no duration. Ends without a begin are dropped.

use reqscope_core::{ClockNormalizer, Message, MessageLookup};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A begin message and the end that closed it, if one arrived
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationPair {
    pub correlation_id: Option<String>,
    pub start: Arc<Message>,
    pub end: Option<Arc<Message>>,
}

impl CorrelationPair {
    /// Normalized `end - start`, clamped at zero; `None` while still open
    pub fn duration(&self, normalizer: &ClockNormalizer) -> Option<f64> {
        self.end.as_ref().map(|end| {
            (normalizer.offset_of(end) - normalizer.offset_of(&self.start)).max(0.0)
        })
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// A begin message with every end that referenced it
///
/// Used where one begin legitimately has several ends, such as a debug timer
/// that is read more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiCorrelationPair {
    pub correlation_id: Option<String>,
    pub start: Arc<Message>,
    pub ends: Vec<Arc<Message>>,
}

/// Pair begins with ends using the payload `correlationId`
pub fn correlate(begins: &[Arc<Message>], ends: &[Arc<Message>]) -> Vec<CorrelationPair> {
    correlate_with(begins, ends, |m| m.correlation_id().map(str::to_string))
}

/// Pair begins with ends using a caller-supplied key
///
/// Ends are indexed by key with last-write-wins on duplicates. Output follows
/// begin order by ordinal.
pub fn correlate_with<F>(
    begins: &[Arc<Message>],
    ends: &[Arc<Message>],
    key: F,
) -> Vec<CorrelationPair>
where
    F: Fn(&Message) -> Option<String>,
{
    let mut ends_by_key: HashMap<String, Arc<Message>> = HashMap::new();
    for end in ends {
        if let Some(k) = key(end) {
            ends_by_key.insert(k, end.clone());
        }
    }

    let mut sorted: Vec<&Arc<Message>> = begins.iter().collect();
    sorted.sort_by_key(|m| m.ordinal);

    let pairs: Vec<CorrelationPair> = sorted
        .into_iter()
        .map(|start| {
            let correlation_id = key(start);
            let end = correlation_id
                .as_ref()
                .and_then(|k| ends_by_key.get(k))
                .cloned();
            CorrelationPair {
                correlation_id,
                start: start.clone(),
                end,
            }
        })
        .collect();

    let begin_keys: HashSet<&str> = pairs
        .iter()
        .filter_map(|p| p.correlation_id.as_deref())
        .collect();
    let unmatched_ends = ends_by_key
        .keys()
        .filter(|k| !begin_keys.contains(k.as_str()))
        .count();
    if unmatched_ends > 0 {
        debug!(unmatched_ends, "Dropping end messages without a begin");
    }

    pairs
}

/// Pair begins with all of their ends, keeping every end in ordinal order
pub fn correlate_all(
    begins: &[Arc<Message>],
    ends: &[Arc<Message>],
) -> Vec<MultiCorrelationPair> {
    let mut ends_by_key: HashMap<&str, Vec<Arc<Message>>> = HashMap::new();
    for end in ends {
        if let Some(k) = end.correlation_id() {
            ends_by_key.entry(k).or_default().push(end.clone());
        }
    }
    for list in ends_by_key.values_mut() {
        list.sort_by_key(|m| m.ordinal);
    }

    let mut sorted: Vec<&Arc<Message>> = begins.iter().collect();
    sorted.sort_by_key(|m| m.ordinal);

    sorted
        .into_iter()
        .map(|start| {
            let correlation_id = start.correlation_id();
            MultiCorrelationPair {
                correlation_id: correlation_id.map(str::to_string),
                start: start.clone(),
                ends: correlation_id
                    .and_then(|k| ends_by_key.get(k))
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Correlate two message types of one context
pub fn correlate_types(
    index: &impl MessageLookup,
    begin_tag: &str,
    end_tag: &str,
) -> Vec<CorrelationPair> {
    correlate(
        index.messages_by_type(begin_tag),
        index.messages_by_type(end_tag),
    )
}
