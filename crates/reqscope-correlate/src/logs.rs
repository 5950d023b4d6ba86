//! Log stream reconstruction
//!
//! Collects every log-tagged message of a context, places it on the normalized
//! timeline, runs group nesting and table state, and resolves debug timers to
//! their elapsed time.

use crate::correlation::correlate_all;
use crate::nesting::{
    calculate_table_state, reconstruct_groups, GroupFrame, GroupRole, SequencedMessage,
};
use reqscope_core::messages::{
    LogGroupBeginPayload, LogLevel, LogTimePayload, LogTimestampPayload, LogWritePayload,
    MessageType,
};
use reqscope_core::{ClockNormalizer, DiagnosticsSink, Message, MessageLookup};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Caller-held expansion overrides, keyed by message id
///
/// Group begins fall back to their own default, tables default to expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    overrides: HashMap<String, bool>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(&mut self, message_id: impl Into<String>) {
        self.overrides.insert(message_id.into(), true);
    }

    pub fn collapse(&mut self, message_id: impl Into<String>) {
        self.overrides.insert(message_id.into(), false);
    }

    /// Drop any override for `message_id`
    pub fn reset(&mut self, message_id: &str) {
        self.overrides.remove(message_id);
    }

    pub fn is_expanded(&self, message_id: &str) -> Option<bool> {
        self.overrides.get(message_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// What a log entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Write,
    Group,
    Timestamp,
    TimerStart,
    TimerEnd,
}

/// One displayable log entry
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub message: Arc<Message>,
    pub offset: f64,
    pub kind: LogKind,
    pub level: LogLevel,
    pub text: String,
    pub table: Option<serde_json::Value>,
    pub group: Vec<GroupFrame>,
    pub depth: usize,
    pub is_visible: bool,
    /// Collapse state of the group this entry opens
    pub is_collapsed: bool,
    /// Collapse state of the table, when the entry carries one
    pub is_table_collapsed: Option<bool>,
    /// Elapsed time for timer ends
    pub elapsed: Option<f64>,
}

impl LogEntry {
    /// This entry is the last one displayed inside its innermost group
    pub fn closes_group(&self) -> bool {
        self.group
            .iter()
            .rev()
            .find(|f| f.is_active)
            .is_some_and(|f| f.is_ending)
    }

    /// Number of enclosing groups this entry is the last displayed child of
    pub fn closed_groups(&self) -> usize {
        self.group
            .iter()
            .filter(|f| f.is_active && f.is_ending)
            .count()
    }
}

const LOG_TAGS: [MessageType; 6] = [
    MessageType::LogWrite,
    MessageType::LogGroupBegin,
    MessageType::LogGroupEnd,
    MessageType::LogTimestamp,
    MessageType::LogTimeBegin,
    MessageType::LogTimeEnd,
];

/// Reconstruct the log view of one context
pub fn reconstruct_logs(
    index: &impl MessageLookup,
    normalizer: &ClockNormalizer,
    expansion: &ExpansionState,
    diagnostics: &dyn DiagnosticsSink,
) -> Vec<LogEntry> {
    let mut seen = HashSet::new();
    let items: Vec<SequencedMessage> = LOG_TAGS
        .iter()
        .flat_map(|tag| index.messages_by_type(tag.as_str()))
        .filter(|m| seen.insert(m.id.clone()))
        .map(|m| SequencedMessage::new(m.clone(), normalizer.offset_of(m)))
        .collect();

    let elapsed = timer_elapsed(index, normalizer);

    let grouped = reconstruct_groups(
        items,
        |m| classify_log(m, diagnostics),
        |m| expansion.is_expanded(&m.id),
    );

    let writes: HashMap<&str, LogWritePayload> = grouped
        .iter()
        .filter(|g| g.message.has_type(MessageType::LogWrite.as_str()))
        .filter_map(|g| {
            g.message
                .decode_or_report::<LogWritePayload>(diagnostics)
                .map(|payload| (g.message.id.as_str(), payload))
        })
        .collect();

    let tables = calculate_table_state(
        &grouped,
        |m| writes.get(m.id.as_str()).is_some_and(|w| w.table.is_some()),
        |m| expansion.is_expanded(&m.id),
    );

    grouped
        .iter()
        .map(|g| {
            let message = &g.message;
            let write = writes.get(message.id.as_str());
            let (kind, text) = describe(message, write, elapsed.get(message.id.as_str()));
            LogEntry {
                message: message.clone(),
                offset: g.offset,
                kind,
                level: write.map(|w| w.level).unwrap_or_default(),
                text,
                table: write.and_then(|w| w.table.clone()),
                group: g.group.clone(),
                depth: g.depth(),
                is_visible: g.is_visible,
                is_collapsed: g.is_collapsed,
                is_table_collapsed: tables.get(&message.id).copied(),
                elapsed: elapsed.get(message.id.as_str()).copied(),
            }
        })
        .collect()
}

fn classify_log(message: &Message, diagnostics: &dyn DiagnosticsSink) -> GroupRole {
    if message.has_type(MessageType::LogGroupBegin.as_str()) {
        match message.decode_or_report::<LogGroupBeginPayload>(diagnostics) {
            Some(payload) => GroupRole::Begin {
                correlation_id: payload.correlation_id,
                collapsed_by_default: payload.is_collapsed,
            },
            None => GroupRole::Item,
        }
    } else if message.has_type(MessageType::LogGroupEnd.as_str()) {
        match message.correlation_id_or_report(diagnostics) {
            Some(id) => GroupRole::End {
                correlation_id: id.to_string(),
            },
            // Without an id the end can never close anything
            None => GroupRole::End {
                correlation_id: String::new(),
            },
        }
    } else {
        GroupRole::Item
    }
}

/// Elapsed milliseconds for every timer end, keyed by end message id
fn timer_elapsed<'a>(
    index: &'a impl MessageLookup,
    normalizer: &ClockNormalizer,
) -> HashMap<&'a str, f64> {
    let pairs = correlate_all(
        index.messages_by_type(MessageType::LogTimeBegin.as_str()),
        index.messages_by_type(MessageType::LogTimeEnd.as_str()),
    );

    let by_id: HashMap<&str, &Arc<Message>> = index
        .messages_by_type(MessageType::LogTimeEnd.as_str())
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();

    let mut elapsed = HashMap::new();
    for pair in pairs {
        let start = normalizer.offset_of(&pair.start);
        for end in &pair.ends {
            if let Some((id, message)) = by_id.get_key_value(end.id.as_str()) {
                elapsed.insert(*id, (normalizer.offset_of(message) - start).max(0.0));
            }
        }
    }
    elapsed
}

fn describe(
    message: &Message,
    write: Option<&LogWritePayload>,
    elapsed: Option<&f64>,
) -> (LogKind, String) {
    let label = || {
        message
            .decode::<LogTimePayload>()
            .map(|p| p.label)
            .unwrap_or_default()
    };

    if let Some(write) = write {
        (LogKind::Write, write.message.clone())
    } else if message.has_type(MessageType::LogGroupBegin.as_str()) {
        let text = message
            .decode::<LogGroupBeginPayload>()
            .map(|p| p.label)
            .unwrap_or_default();
        (LogKind::Group, text)
    } else if message.has_type(MessageType::LogTimestamp.as_str()) {
        let text = message
            .decode::<LogTimestampPayload>()
            .map(|p| p.label)
            .unwrap_or_default();
        (LogKind::Timestamp, text)
    } else if message.has_type(MessageType::LogTimeBegin.as_str()) {
        (LogKind::TimerStart, format!("{}: timer started", label()))
    } else if message.has_type(MessageType::LogTimeEnd.as_str()) {
        let text = match elapsed {
            Some(ms) => format!("{}: {:.3}ms", label(), ms),
            None => format!("{}: timer does not exist", label()),
        };
        (LogKind::TimerEnd, text)
    } else {
        (LogKind::Write, String::new())
    }
}
