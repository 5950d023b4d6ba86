//! Memoized per-context engine
//!
//! Every stage is a pure function of the index and caller state, so caching is
//! only an optimization: each stage keeps its last input key and output, and a
//! grown index (new revision) or changed caller state recomputes from scratch.

use parking_lot::Mutex;
use reqscope_core::config::TimelineSettings;
use reqscope_core::{
    ClockNormalizer, DiagnosticsSink, Message, MessageIndex, MessageLookup, TracingDiagnostics,
};
use reqscope_correlate::{middleware_tree, reconstruct_logs, ExpansionState, LogEntry, MiddlewareNode};
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::{
    overview, slowest_event_ids, timeline_events, DEFAULT_OVERVIEW_CAP,
    DEFAULT_SLOWEST_RANK_LIMIT,
};
use crate::events::{FilteredTimelineEvents, Overview, SelectedTimelineEvents, TimelineEvents};
use crate::filter::{
    filter_summary, filter_timeline_events, select_timeline_events, FilterSummary,
    TimelineFilters,
};

/// Last input key and output of one stage
pub struct Memo<K, V> {
    last: Mutex<Option<(K, Arc<V>)>>,
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Cached output for `key`, computing and storing it on a miss
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        let mut last = self.last.lock();
        if let Some((cached_key, value)) = last.as_ref() {
            if *cached_key == key {
                return value.clone();
            }
        }
        let value = Arc::new(compute());
        *last = Some((key, value.clone()));
        value
    }

    pub fn clear(&self) {
        *self.last.lock() = None;
    }
}

impl<K: PartialEq, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconstruction engine for one request context
pub struct TimelineEngine {
    index: MessageIndex,
    diagnostics: Arc<dyn DiagnosticsSink>,
    overview_cap: usize,
    slowest_rank_limit: u32,

    normalizer: Memo<u64, ClockNormalizer>,
    events: Memo<u64, TimelineEvents>,
    filtered: Memo<(u64, TimelineFilters), FilteredTimelineEvents>,
    selected: Memo<(u64, TimelineFilters), SelectedTimelineEvents>,
    logs: Memo<(u64, ExpansionState), Vec<LogEntry>>,
    middleware: Memo<u64, Vec<MiddlewareNode>>,
}

impl TimelineEngine {
    pub fn new(index: MessageIndex) -> Self {
        Self {
            index,
            diagnostics: Arc::new(TracingDiagnostics),
            overview_cap: DEFAULT_OVERVIEW_CAP,
            slowest_rank_limit: DEFAULT_SLOWEST_RANK_LIMIT,
            normalizer: Memo::new(),
            events: Memo::new(),
            filtered: Memo::new(),
            selected: Memo::new(),
            logs: Memo::new(),
            middleware: Memo::new(),
        }
    }

    /// Route malformed-message reports to `diagnostics`
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_settings(mut self, settings: &TimelineSettings) -> Self {
        self.overview_cap = settings.overview_cap;
        self.slowest_rank_limit = settings.slowest_rank_limit;
        self
    }

    pub fn index(&self) -> &MessageIndex {
        &self.index
    }

    pub fn context_id(&self) -> &str {
        self.index.context_id()
    }

    /// Append a newly arrived message. Returns false for repeated deliveries.
    pub fn insert(&mut self, message: Message) -> bool {
        let inserted = self.index.insert(message);
        if inserted {
            debug!(
                context = %self.index.context_id(),
                revision = self.index.revision(),
                "Context grew"
            );
        }
        inserted
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.insert(message);
        }
    }

    pub fn normalizer(&self) -> ClockNormalizer {
        *self.normalizer.get_or_compute(self.index.revision(), || {
            ClockNormalizer::for_context(&self.index, self.diagnostics.as_ref())
        })
    }

    pub fn timeline_events(&self) -> Arc<TimelineEvents> {
        self.events.get_or_compute(self.index.revision(), || {
            timeline_events(&self.index, self.normalizer(), self.diagnostics.as_ref())
        })
    }

    pub fn filtered_events(&self, filters: &TimelineFilters) -> Arc<FilteredTimelineEvents> {
        self.filtered
            .get_or_compute((self.index.revision(), *filters), || {
                filter_timeline_events(&self.timeline_events(), filters)
            })
    }

    pub fn selected_events(&self, filters: &TimelineFilters) -> Arc<SelectedTimelineEvents> {
        self.selected
            .get_or_compute((self.index.revision(), *filters), || {
                select_timeline_events(&self.filtered_events(filters), &filters.time_window)
            })
    }

    pub fn filter_summary(&self, filters: &TimelineFilters) -> FilterSummary {
        filter_summary(&self.timeline_events(), filters)
    }

    /// Capped view of the unfiltered timeline
    pub fn overview(&self) -> Overview {
        overview(&self.timeline_events().spans, self.overview_cap)
    }

    /// Spans ranked within the slowest-rank limit, after filtering
    pub fn slowest_event_ids(&self, filters: &TimelineFilters) -> Vec<String> {
        let filtered = self.filtered_events(filters);
        slowest_event_ids(
            &filtered.spans_by_duration,
            &filtered.event_id_to_slowness,
            self.slowest_rank_limit,
        )
    }

    pub fn logs(&self, expansion: &ExpansionState) -> Arc<Vec<LogEntry>> {
        self.logs
            .get_or_compute((self.index.revision(), expansion.clone()), || {
                reconstruct_logs(
                    &self.index,
                    &self.normalizer(),
                    expansion,
                    self.diagnostics.as_ref(),
                )
            })
    }

    pub fn middleware(&self) -> Arc<Vec<MiddlewareNode>> {
        self.middleware.get_or_compute(self.index.revision(), || {
            middleware_tree(&self.index, &self.normalizer(), self.diagnostics.as_ref())
        })
    }
}
