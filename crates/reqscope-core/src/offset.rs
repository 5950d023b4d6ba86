//! Clock normalization between the server and browser agents
//!
//! Both agents run monotonic clocks zeroed at different instants. The browser's
//! navigation timing tells us how long after navigation the request was sent,
//! which is the only bridge between the two. The factor is computed once per
//! context and shared by every downstream stage.

use crate::diagnostics::DiagnosticsSink;
use crate::index::MessageLookup;
use crate::messages::{Agent, Message, MessageType, NavigationTimingPayload};
use tracing::debug;

/// Offset factor for a context, `0` when no usable navigation timing exists
pub fn offset_factor(index: &impl MessageLookup, diagnostics: &dyn DiagnosticsSink) -> f64 {
    let timing = index
        .single_message_by_type(MessageType::BrowserNavigationTiming.as_str())
        .and_then(|m| m.decode_or_report::<NavigationTimingPayload>(diagnostics));

    let factor = offset_factor_from_timing(timing.as_ref());
    debug!(factor, "Computed clock offset factor");
    factor
}

/// `max(0, requestStart - navigationStart)`, or `0` if either mark is absent
pub fn offset_factor_from_timing(timing: Option<&NavigationTimingPayload>) -> f64 {
    match timing {
        Some(NavigationTimingPayload {
            request_start: Some(request_start),
            navigation_start: Some(navigation_start),
            ..
        }) => (request_start - navigation_start).max(0.0),
        _ => 0.0,
    }
}

/// Projects agent-local offsets onto the browser clock
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockNormalizer {
    factor: f64,
}

impl ClockNormalizer {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Normalizer for the context behind `index`
    pub fn for_context(index: &impl MessageLookup, diagnostics: &dyn DiagnosticsSink) -> Self {
        Self::new(offset_factor(index, diagnostics))
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Offset of `message` in the browser clock domain
    pub fn offset_of(&self, message: &Message) -> f64 {
        self.normalize(message.source(), message.offset)
    }

    /// Server offsets are shifted by the factor; all others are unchanged
    pub fn normalize(&self, agent: Agent, offset: f64) -> f64 {
        match agent {
            Agent::Server => offset + self.factor,
            Agent::Browser | Agent::Other => offset,
        }
    }
}
