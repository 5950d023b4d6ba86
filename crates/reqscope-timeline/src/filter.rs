//! Filter engine
//!
//! Filters run as a fixed pipeline: agent, then category, then time window.
//! Counts reported for a stage only reflect the stages before it.

use reqscope_core::config::FilterSettings;
use reqscope_core::{Agent, Category};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::aggregate::{max_offset, slowness_ranks, spans_by_duration};
use crate::events::{
    FilteredTimelineEvents, PointInTimeEvent, SelectedTimelineEvents, TimelineEvents,
    TimelineSpan,
};

/// A closed enumeration usable as a filter dimension
pub trait FilterKey: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Every key, in ordinal order
    const ALL: &'static [Self];

    fn ordinal(self) -> usize;

    /// Keys that can never be hidden
    fn always_shown(self) -> bool {
        false
    }
}

impl FilterKey for Agent {
    const ALL: &'static [Self] = &[Agent::Server, Agent::Browser, Agent::Other];

    fn ordinal(self) -> usize {
        match self {
            Agent::Server => 0,
            Agent::Browser => 1,
            Agent::Other => 2,
        }
    }

    fn always_shown(self) -> bool {
        self == Agent::Other
    }
}

impl FilterKey for Category {
    const ALL: &'static [Self] = &Category::ALL;

    fn ordinal(self) -> usize {
        match self {
            Category::Request => 0,
            Category::Middleware => 1,
            Category::WebService => 2,
            Category::DataStore => 3,
            Category::PageLoad => 4,
            Category::Log => 5,
        }
    }
}

/// Shown/hidden state for every key of one dimension
///
/// Stored as a bitset of hidden keys, so every key starts explicitly shown.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterSet<K: FilterKey> {
    hidden: u64,
    _key: PhantomData<K>,
}

impl<K: FilterKey> FilterSet<K> {
    /// Every key shown
    pub fn new() -> Self {
        Self {
            hidden: 0,
            _key: PhantomData,
        }
    }

    /// Start with `keys` hidden
    pub fn hiding(keys: impl IntoIterator<Item = K>) -> Self {
        let mut set = Self::new();
        for key in keys {
            set.set(key, false);
        }
        set
    }

    fn bit(key: K) -> u64 {
        1 << key.ordinal()
    }

    pub fn is_shown(&self, key: K) -> bool {
        key.always_shown() || self.hidden & Self::bit(key) == 0
    }

    /// Set one key. Returns whether the state changed.
    pub fn set(&mut self, key: K, shown: bool) -> bool {
        if key.always_shown() {
            return false;
        }
        let before = self.hidden;
        if shown {
            self.hidden &= !Self::bit(key);
        } else {
            self.hidden |= Self::bit(key);
        }
        before != self.hidden
    }

    /// Flip one key. Returns whether the state changed.
    pub fn toggle(&mut self, key: K) -> bool {
        let shown = self.is_shown(key);
        self.set(key, !shown)
    }

    /// Show every key. Returns false and leaves the set alone if nothing was hidden.
    pub fn show_all(&mut self) -> bool {
        if self.all_shown() {
            return false;
        }
        self.hidden = 0;
        true
    }

    pub fn all_shown(&self) -> bool {
        self.hidden == 0
    }

    pub fn hidden_keys(&self) -> Vec<K> {
        K::ALL.iter().copied().filter(|k| !self.is_shown(*k)).collect()
    }
}

impl<K: FilterKey> Default for FilterSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: FilterKey> fmt::Debug for FilterSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(K::ALL.iter().map(|k| (k, self.is_shown(*k))))
            .finish()
    }
}

/// Highlighted sub-range inside the time window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }
}

/// Axis window plus an optional highlighted segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub min_offset: Option<f64>,
    pub max_offset: Option<f64>,
    pub segment: Option<Segment>,
}

impl TimeWindow {
    pub fn is_unbounded(&self) -> bool {
        self.min_offset.is_none() && self.max_offset.is_none() && self.segment.is_none()
    }

    /// Range events must intersect, narrowed by the segment when present
    fn selection(&self, axis_min: f64, axis_max: f64) -> (f64, f64) {
        match self.segment {
            Some(segment) => (segment.start.max(axis_min), segment.end.min(axis_max)),
            None => (axis_min, axis_max),
        }
    }
}

/// Filter state across every dimension
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimelineFilters {
    pub agent: FilterSet<Agent>,
    pub category: FilterSet<Category>,
    pub time_window: TimeWindow,
}

impl TimelineFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state from configured hidden agents and categories
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            agent: FilterSet::hiding(settings.hidden_agents()),
            category: FilterSet::hiding(settings.hidden_categories()),
            time_window: TimeWindow::default(),
        }
    }

    fn passes_agent_and_category(&self, agent: Agent, category: Category) -> bool {
        self.agent.is_shown(agent) && self.category.is_shown(category)
    }
}

/// Agent and category filters with slowness ranked over what remains
pub fn filter_timeline_events(
    events: &TimelineEvents,
    filters: &TimelineFilters,
) -> FilteredTimelineEvents {
    let spans: Vec<TimelineSpan> = events
        .spans
        .iter()
        .filter(|s| filters.passes_agent_and_category(s.agent, s.category))
        .cloned()
        .collect();
    let point_in_time_events: Vec<PointInTimeEvent> = events
        .point_in_time_events
        .iter()
        .filter(|p| filters.passes_agent_and_category(p.agent, p.category))
        .cloned()
        .collect();

    let spans_by_duration = spans_by_duration(&spans);
    let event_id_to_slowness = slowness_ranks(&spans_by_duration);

    FilteredTimelineEvents {
        spans,
        point_in_time_events,
        spans_by_duration,
        event_id_to_slowness,
    }
}

/// Time window over already filtered events
///
/// `min_offset`/`max_offset` default to `0` and the filtered timeline's extent.
/// Slowness ranks are carried over from the filtered view so scrubbing the
/// window does not re-rank spans.
pub fn select_timeline_events(
    filtered: &FilteredTimelineEvents,
    window: &TimeWindow,
) -> SelectedTimelineEvents {
    let axis_min = window.min_offset.unwrap_or(0.0);
    let axis_max = window
        .max_offset
        .unwrap_or_else(|| max_offset(&filtered.spans, &filtered.point_in_time_events));
    let (from, to) = window.selection(axis_min, axis_max);

    let span_in_range = |s: &TimelineSpan| {
        let end = if s.is_open() { f64::INFINITY } else { s.end_offset() };
        end >= from && s.offset <= to
    };

    let spans: Vec<TimelineSpan> = filtered
        .spans
        .iter()
        .filter(|s| span_in_range(s))
        .cloned()
        .collect();
    let point_in_time_events: Vec<PointInTimeEvent> = filtered
        .point_in_time_events
        .iter()
        .filter(|p| p.offset >= from && p.offset <= to)
        .cloned()
        .collect();
    let spans_by_duration: Vec<TimelineSpan> = filtered
        .spans_by_duration
        .iter()
        .filter(|s| span_in_range(s))
        .cloned()
        .collect();
    let event_id_to_slowness = spans
        .iter()
        .filter_map(|s| {
            filtered
                .event_id_to_slowness
                .get(&s.event_id)
                .map(|rank| (s.event_id.clone(), *rank))
        })
        .collect();

    SelectedTimelineEvents {
        spans,
        point_in_time_events,
        spans_by_duration,
        event_id_to_slowness,
        min_offset: axis_min,
        max_offset: axis_max,
    }
}

/// Run the whole filter pipeline
pub fn apply_filters(events: &TimelineEvents, filters: &TimelineFilters) -> SelectedTimelineEvents {
    select_timeline_events(&filter_timeline_events(events, filters), &filters.time_window)
}

/// Per-dimension counts for summary badges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSummary {
    /// Events per agent, before any filter
    pub agents: BTreeMap<String, usize>,
    /// Events per category, after the agent filter
    pub categories: BTreeMap<String, usize>,
    /// Events inside the time window, after the category filter
    pub in_window: usize,
    /// Events before any filter
    pub total: usize,
}

/// Count events at each pipeline stage
pub fn filter_summary(events: &TimelineEvents, filters: &TimelineFilters) -> FilterSummary {
    let all: Vec<(Agent, Category)> = events
        .spans
        .iter()
        .map(|s| (s.agent, s.category))
        .chain(events.point_in_time_events.iter().map(|p| (p.agent, p.category)))
        .collect();

    let mut agents: BTreeMap<String, usize> = <Agent as FilterKey>::ALL
        .iter()
        .map(|a| (a.to_string(), 0))
        .collect();
    for (agent, _) in &all {
        *agents.entry(agent.to_string()).or_default() += 1;
    }

    let mut categories: BTreeMap<String, usize> = <Category as FilterKey>::ALL
        .iter()
        .map(|c| (c.to_string(), 0))
        .collect();
    for (_, category) in all.iter().filter(|(a, _)| filters.agent.is_shown(*a)) {
        *categories.entry(category.to_string()).or_default() += 1;
    }

    let selected = apply_filters(events, filters);

    FilterSummary {
        agents,
        categories,
        in_window: selected.spans.len() + selected.point_in_time_events.len(),
        total: all.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::merge;
    use crate::events::PointKind;

    fn span(id: &str, offset: f64, duration: Option<f64>, agent: Agent, category: Category) -> TimelineSpan {
        TimelineSpan::new(id, 0, offset, duration, category, agent, id)
    }

    fn sample() -> TimelineEvents {
        merge(
            vec![vec![
                span("req", 0.0, Some(100.0), Agent::Server, Category::Request),
                span("mw", 5.0, Some(40.0), Agent::Server, Category::Middleware),
                span("db", 10.0, Some(20.0), Agent::Server, Category::DataStore),
                span("dns", 2.0, Some(3.0), Agent::Browser, Category::PageLoad),
                span("other", 50.0, Some(1.0), Agent::Other, Category::Log),
            ]],
            vec![vec![PointInTimeEvent::new(
                "err",
                9,
                120.0,
                Category::Log,
                Agent::Browser,
                PointKind::ConsoleError,
                "boom",
            )]],
        )
    }

    fn ids(spans: &[TimelineSpan]) -> Vec<&str> {
        spans.iter().map(|s| s.event_id.as_str()).collect()
    }

    #[test]
    fn test_toggle_and_show_all() {
        let mut set: FilterSet<Category> = FilterSet::new();
        assert!(set.all_shown());
        assert!(set.toggle(Category::Middleware));
        assert!(!set.is_shown(Category::Middleware));
        assert_eq!(set.hidden_keys(), vec![Category::Middleware]);

        assert!(set.show_all());
        let once = set;
        assert!(!set.show_all());
        assert_eq!(set, once);
        assert!(set.all_shown());
    }

    #[test]
    fn test_other_agent_always_shown() {
        let mut set: FilterSet<Agent> = FilterSet::new();
        assert!(!set.toggle(Agent::Other));
        assert!(set.is_shown(Agent::Other));
        assert!(set.all_shown());

        let set = FilterSet::hiding([Agent::Server, Agent::Other]);
        assert_eq!(set.hidden_keys(), vec![Agent::Server]);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let events = sample();
        let mut filters = TimelineFilters::new();
        filters.agent.toggle(Agent::Browser);
        filters.category.toggle(Category::DataStore);

        let filtered = filter_timeline_events(&events, &filters);
        assert_eq!(ids(&filtered.spans), vec!["req", "mw", "other"]);
        assert!(filtered.point_in_time_events.is_empty());
        assert_eq!(filtered.event_id_to_slowness["req"], 1);
        assert_eq!(filtered.event_id_to_slowness["other"], 3);
        assert!(!filtered.event_id_to_slowness.contains_key("db"));
    }

    #[test]
    fn test_time_window_and_segment() {
        let events = sample();
        let mut filters = TimelineFilters::new();
        filters.time_window = TimeWindow {
            min_offset: Some(0.0),
            max_offset: Some(60.0),
            segment: Some(Segment::new(25.0, 12.0)),
        };

        let selected = apply_filters(&events, &filters);
        assert_eq!(selected.min_offset, 0.0);
        assert_eq!(selected.max_offset, 60.0);
        assert_eq!(ids(&selected.spans), vec!["req", "mw", "db"]);
        assert!(selected.point_in_time_events.is_empty());
        assert_eq!(ids(&selected.spans_by_duration), vec!["req", "mw", "db"]);
        assert_eq!(selected.event_id_to_slowness["db"], 3);
    }

    #[test]
    fn test_unbounded_window_uses_timeline_extent() {
        let events = sample();
        let selected = apply_filters(&events, &TimelineFilters::new());
        assert_eq!(selected.max_offset, 120.0);
        assert_eq!(selected.spans.len(), events.spans.len());
        assert_eq!(selected.point_in_time_events.len(), 1);
    }

    #[test]
    fn test_summary_counts_follow_pipeline_order() {
        let events = sample();
        let mut filters = TimelineFilters::new();
        filters.agent.toggle(Agent::Server);
        filters.category.toggle(Category::Log);

        let summary = filter_summary(&events, &filters);
        assert_eq!(summary.total, 6);
        // Agent counts ignore the agent filter itself
        assert_eq!(summary.agents["server"], 3);
        assert_eq!(summary.agents["browser"], 2);
        assert_eq!(summary.agents["other"], 1);
        // Category counts see the agent filter but not the category filter
        assert_eq!(summary.categories["request"], 0);
        assert_eq!(summary.categories["log"], 2);
        assert_eq!(summary.categories["page_load"], 1);
        assert_eq!(summary.in_window, 1);
    }

    #[test]
    fn test_filters_from_settings() {
        let settings = FilterSettings {
            hidden_agents: vec!["browser".to_string()],
            hidden_categories: vec!["page-load".to_string(), "bogus".to_string()],
        };
        let filters = TimelineFilters::from_settings(&settings);
        assert!(!filters.agent.is_shown(Agent::Browser));
        assert!(!filters.category.is_shown(Category::PageLoad));
        assert_eq!(filters.category.hidden_keys().len(), 1);
    }
}
