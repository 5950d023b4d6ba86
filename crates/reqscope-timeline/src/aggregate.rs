//! Timeline aggregation
//!
//! Merges every selector's output into one sorted, re-indexed timeline and
//! derives the axis boundary, slowness ranking and the capped overview.

use reqscope_core::{ClockNormalizer, DiagnosticsSink, MessageLookup};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::events::{Overview, PointInTimeEvent, TimelineEvents, TimelineSpan};
use crate::selectors::{self, SelectorContext};

/// Default number of spans kept by [`overview`]
pub const DEFAULT_OVERVIEW_CAP: usize = 45;

/// Default highest rank counted as "slowest"
pub const DEFAULT_SLOWEST_RANK_LIMIT: u32 = 3;

/// Run every selector over one context and merge the results
pub fn timeline_events(
    index: &impl MessageLookup,
    normalizer: ClockNormalizer,
    diagnostics: &dyn DiagnosticsSink,
) -> TimelineEvents {
    let ctx = SelectorContext::new(index, normalizer, diagnostics);

    let spans = vec![
        selectors::request_spans(&ctx),
        selectors::middleware_spans(&ctx),
        selectors::web_service_spans(&ctx),
        selectors::data_store_spans(&ctx),
        selectors::page_load_spans(&ctx),
        selectors::debug_timer_spans(&ctx),
    ];
    let points = vec![
        selectors::response_points(&ctx),
        selectors::timestamp_points(&ctx),
        selectors::console_error_points(&ctx),
    ];

    let events = merge(spans, points);
    debug!(
        spans = events.spans.len(),
        points = events.point_in_time_events.len(),
        "Aggregated timeline"
    );
    events
}

/// Concatenate, sort and re-index span and point event lists
///
/// Spans sort by `(sort_offset, offset)`, point events by `offset`. Ties fall
/// back to ordinal and event id so the order is total. Indices are reassigned
/// `1..=N` on fresh copies.
pub fn merge(
    spans: Vec<Vec<TimelineSpan>>,
    points: Vec<Vec<PointInTimeEvent>>,
) -> TimelineEvents {
    let mut spans: Vec<TimelineSpan> = spans.into_iter().flatten().collect();
    spans.sort_by(compare_spans);
    for (i, span) in spans.iter_mut().enumerate() {
        span.index = i + 1;
    }

    let mut points: Vec<PointInTimeEvent> = points.into_iter().flatten().collect();
    points.sort_by(|a, b| {
        a.offset
            .total_cmp(&b.offset)
            .then(a.ordinal.cmp(&b.ordinal))
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
    for (i, point) in points.iter_mut().enumerate() {
        point.index = i + 1;
    }

    TimelineEvents {
        spans,
        point_in_time_events: points,
    }
}

fn compare_spans(a: &TimelineSpan, b: &TimelineSpan) -> Ordering {
    a.sort_offset
        .total_cmp(&b.sort_offset)
        .then(a.offset.total_cmp(&b.offset))
        .then(a.ordinal.cmp(&b.ordinal))
        .then_with(|| a.event_id.cmp(&b.event_id))
}

/// Right edge of the timeline axis, never below 1
pub fn max_offset(spans: &[TimelineSpan], points: &[PointInTimeEvent]) -> f64 {
    spans
        .iter()
        .map(TimelineSpan::end_offset)
        .chain(points.iter().map(|p| p.offset))
        .fold(1.0, f64::max)
}

/// Copy of `spans`, longest first; open spans sort last
pub fn spans_by_duration(spans: &[TimelineSpan]) -> Vec<TimelineSpan> {
    let mut sorted = spans.to_vec();
    sorted.sort_by(|a, b| match (a.duration, b.duration) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sorted
}

/// Dense slowness ranks over spans already sorted by [`spans_by_duration`]
///
/// The rank only grows when the duration differs from the previous span, so
/// equal durations share a rank.
pub fn slowness_ranks(sorted_by_duration: &[TimelineSpan]) -> HashMap<String, u32> {
    let mut ranks = HashMap::with_capacity(sorted_by_duration.len());
    let mut rank = 0u32;
    let mut previous: Option<Option<f64>> = None;

    for span in sorted_by_duration {
        if previous != Some(span.duration) {
            rank += 1;
            previous = Some(span.duration);
        }
        ranks.insert(span.event_id.clone(), rank);
    }
    ranks
}

/// Ids of spans ranked `1..=limit`, slowest first
pub fn slowest_event_ids(
    sorted_by_duration: &[TimelineSpan],
    ranks: &HashMap<String, u32>,
    limit: u32,
) -> Vec<String> {
    sorted_by_duration
        .iter()
        .filter(|s| s.duration.is_some())
        .filter(|s| ranks.get(&s.event_id).is_some_and(|r| *r <= limit))
        .map(|s| s.event_id.clone())
        .collect()
}

/// Keep at most `cap` spans, preferring the longest, in index order
pub fn overview(spans: &[TimelineSpan], cap: usize) -> Overview {
    if spans.len() <= cap {
        return Overview {
            spans: spans.to_vec(),
            is_truncated: false,
        };
    }

    let mut kept: Vec<TimelineSpan> = spans_by_duration(spans).into_iter().take(cap).collect();
    kept.sort_by_key(|s| s.index);
    debug!(total = spans.len(), kept = kept.len(), "Truncated timeline overview");
    Overview {
        spans: kept,
        is_truncated: true,
    }
}
