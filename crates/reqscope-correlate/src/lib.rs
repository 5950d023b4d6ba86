//! reqscope correlate - begin/end pairing and nesting reconstruction
//!
//! - **Correlation**: pairs begin and end messages by correlation id
//! - **Nesting**: rebuilds group nesting, visibility and collapse state from a
//!   flat begin/end stream, tolerating criss-crossed ranges
//! - **Logs**: the grouped log view of a context
//! - **Middleware**: the middleware call tree of a context

pub mod correlation;
pub mod logs;
pub mod middleware;
pub mod nesting;

pub use correlation::{
    correlate, correlate_all, correlate_types, correlate_with, CorrelationPair,
    MultiCorrelationPair,
};
pub use logs::{reconstruct_logs, ExpansionState, LogEntry, LogKind};
pub use middleware::{middleware_tree, MiddlewareNode};
pub use nesting::{
    build_hierarchy, calculate_table_state, is_visible_in, reconstruct_groups, GroupFrame,
    GroupRole, GroupedMessage, HierarchyNode, SequencedMessage,
};
