//! Timeline event types

use reqscope_core::{Agent, Category};
use serde::Serialize;
use std::collections::HashMap;

/// A reconstructed time interval on the normalized timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSpan {
    /// Id of the message that opened the span
    pub event_id: String,

    pub ordinal: u64,

    /// 1-based position after the final sort, stable only within one pass
    pub index: usize,

    /// Start in the browser clock domain
    pub offset: f64,

    /// `None` while no end has been matched
    pub duration: Option<f64>,

    /// Vertical ordering key, may differ from `offset`
    pub sort_offset: f64,

    pub category: Category,

    pub agent: Agent,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

impl TimelineSpan {
    pub fn new(
        event_id: impl Into<String>,
        ordinal: u64,
        offset: f64,
        duration: Option<f64>,
        category: Category,
        agent: Agent,
        title: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            ordinal,
            index: 0,
            offset,
            duration,
            sort_offset: offset,
            category,
            agent,
            title: title.into(),
            subtitle: None,
        }
    }

    pub fn with_sort_offset(mut self, sort_offset: f64) -> Self {
        self.sort_offset = sort_offset;
        self
    }

    pub fn with_subtitle(mut self, subtitle: Option<String>) -> Self {
        self.subtitle = subtitle;
        self
    }

    /// Offset where the span ends, or its start while still open
    pub fn end_offset(&self) -> f64 {
        self.offset + self.duration.unwrap_or(0.0)
    }

    pub fn is_open(&self) -> bool {
        self.duration.is_none()
    }
}

/// What an instantaneous marker stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    /// The server sent its response
    Response,
    /// A debug timestamp was written
    Timestamp,
    /// A console error was logged
    ConsoleError,
}

impl PointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Response => "response",
            PointKind::Timestamp => "timestamp",
            PointKind::ConsoleError => "console_error",
        }
    }
}

/// An instantaneous marker on the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointInTimeEvent {
    pub event_id: String,
    pub ordinal: u64,
    pub index: usize,
    pub offset: f64,
    pub category: Category,
    pub agent: Agent,
    pub kind: PointKind,
    pub title: String,
}

impl PointInTimeEvent {
    pub fn new(
        event_id: impl Into<String>,
        ordinal: u64,
        offset: f64,
        category: Category,
        agent: Agent,
        kind: PointKind,
        title: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            ordinal,
            index: 0,
            offset,
            category,
            agent,
            kind,
            title: title.into(),
        }
    }
}

/// Merged spans and point events of one context
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvents {
    pub spans: Vec<TimelineSpan>,
    pub point_in_time_events: Vec<PointInTimeEvent>,
}

impl TimelineEvents {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.point_in_time_events.is_empty()
    }

    pub fn span(&self, event_id: &str) -> Option<&TimelineSpan> {
        self.spans.iter().find(|s| s.event_id == event_id)
    }
}

/// Events left after the agent and category filters, with slowness ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredTimelineEvents {
    pub spans: Vec<TimelineSpan>,
    pub point_in_time_events: Vec<PointInTimeEvent>,
    /// Filtered spans, longest first
    pub spans_by_duration: Vec<TimelineSpan>,
    /// Dense slowness rank per span, 1 for the slowest
    pub event_id_to_slowness: HashMap<String, u32>,
}

/// Events inside the selected time window, plus the window's axis bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedTimelineEvents {
    pub spans: Vec<TimelineSpan>,
    pub point_in_time_events: Vec<PointInTimeEvent>,
    pub spans_by_duration: Vec<TimelineSpan>,
    pub event_id_to_slowness: HashMap<String, u32>,
    pub min_offset: f64,
    pub max_offset: f64,
}

/// A bounded view of the timeline for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Kept spans, in index order
    pub spans: Vec<TimelineSpan>,
    /// Spans were dropped to respect the cap
    pub is_truncated: bool,
}
