//! reqscope timeline - aggregation, slowness ranking and filtering
//!
//! - **Selectors**: turn each subsystem's messages into spans and point events
//! - **Aggregate**: merge, sort and re-index; axis boundary; slowness; overview
//! - **Filter**: agent, category and time window filters with summary counts
//! - **Engine**: memoized per-context entry point over all stages

pub mod aggregate;
pub mod engine;
pub mod events;
pub mod filter;
pub mod selectors;

pub use aggregate::{
    max_offset, merge, overview, slowest_event_ids, slowness_ranks, spans_by_duration,
    timeline_events, DEFAULT_OVERVIEW_CAP, DEFAULT_SLOWEST_RANK_LIMIT,
};
pub use engine::{Memo, TimelineEngine};
pub use events::{
    FilteredTimelineEvents, Overview, PointInTimeEvent, PointKind, SelectedTimelineEvents,
    TimelineEvents, TimelineSpan,
};
pub use filter::{
    apply_filters, filter_summary, filter_timeline_events, select_timeline_events, FilterKey,
    FilterSet, FilterSummary, Segment, TimeWindow, TimelineFilters,
};
