//! Nesting reconstruction - turns a flat begin/end stream into groups
//!
//! Messages are visited once in `(offset, ordinal)` order against a single
//! stack of group frames. Each visited message receives a copy of the stack as
//! it stood before the message was applied, plus a visibility flag derived from
//! the collapse state of its enclosing groups.
//!
//! Ranges from different correlation chains may criss-cross instead of nesting
//! properly. Such a frame is marked inactive when its end arrives while other
//! frames sit above it, and is removed once it reaches the top of the stack.

use reqscope_core::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Role a message plays in grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRole {
    /// Opens a group
    Begin {
        correlation_id: String,
        collapsed_by_default: bool,
    },
    /// Closes the group with the same correlation id
    End { correlation_id: String },
    /// Ordinary content
    Item,
}

/// A message positioned on the normalized timeline
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedMessage {
    pub message: Arc<Message>,
    pub offset: f64,
}

impl SequencedMessage {
    pub fn new(message: Arc<Message>, offset: f64) -> Self {
        Self { message, offset }
    }
}

/// One entry of a group-stack snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFrame {
    pub correlation_id: String,
    pub begin: Arc<Message>,
    pub end: Option<Arc<Message>>,
    /// Normalized offset of `begin`
    pub begin_offset: f64,
    /// Normalized offset of `end`
    pub end_offset: Option<f64>,
    /// False once the end has been seen but the frame is still buried
    pub is_active: bool,
    /// The group is collapsed
    pub is_closed: bool,
    /// The owning message is the last one displayed before this group ends
    pub is_ending: bool,
    /// Position of `end` in the visiting order
    end_position: Option<usize>,
}

impl GroupFrame {
    fn reach(&self) -> usize {
        self.end_position.unwrap_or(usize::MAX)
    }
}

/// A visited message with its group context
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMessage {
    pub message: Arc<Message>,
    pub offset: f64,
    /// Snapshot of the group stack, outermost first
    pub group: Vec<GroupFrame>,
    pub is_visible: bool,
    /// This message opened a group
    pub opens_group: bool,
    /// Collapse state of the group this message opened
    pub is_collapsed: bool,
    /// Correlated end of the group this message opened
    pub end: Option<Arc<Message>>,
    pub end_offset: Option<f64>,
}

impl GroupedMessage {
    /// Number of groups that enclose this message
    pub fn depth(&self) -> usize {
        self.group.iter().filter(|f| f.is_active).count()
    }

    /// Innermost enclosing group
    pub fn parent(&self) -> Option<&GroupFrame> {
        self.group.iter().rev().find(|f| f.is_active)
    }
}

/// Stable handle into the frame arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHandle(usize);

#[derive(Default)]
struct FrameArena {
    frames: Vec<GroupFrame>,
    stack: Vec<FrameHandle>,
}

impl FrameArena {
    fn get(&self, handle: FrameHandle) -> &GroupFrame {
        &self.frames[handle.0]
    }

    fn get_mut(&mut self, handle: FrameHandle) -> &mut GroupFrame {
        &mut self.frames[handle.0]
    }

    fn push(&mut self, frame: GroupFrame) {
        self.frames.push(frame);
        self.stack.push(FrameHandle(self.frames.len() - 1));
    }

    fn snapshot(&self) -> Vec<GroupFrame> {
        self.stack.iter().map(|h| self.get(*h).clone()).collect()
    }

    fn position_of(&self, correlation_id: &str) -> Option<usize> {
        self.stack
            .iter()
            .rposition(|h| self.get(*h).correlation_id == correlation_id)
    }

    fn is_active_at(&self, position: usize) -> bool {
        self.get(self.stack[position]).is_active
    }

    /// Close the frame at `position`, popping it and any inactive frames it uncovers
    fn close(&mut self, position: usize) {
        if position + 1 == self.stack.len() {
            self.stack.pop();
            while let Some(top) = self.stack.last().copied() {
                if self.get(top).is_active {
                    break;
                }
                self.stack.pop();
            }
        } else {
            let handle = self.stack[position];
            self.get_mut(handle).is_active = false;
        }
    }
}

/// Whether a message with the given group snapshot is displayed
///
/// Walks from the innermost frame outwards. A collapsed frame hides the
/// message unless a more deeply nested open frame reaches past the collapsed
/// frame's end, which only happens when the two ranges criss-cross.
pub fn is_visible_in(group: &[GroupFrame]) -> bool {
    let mut bottom_open_index: Option<usize> = None;
    let mut bottom_close_index: Option<usize> = None;

    for frame in group.iter().rev().filter(|f| f.is_active) {
        let reach = frame.reach();
        if frame.is_closed {
            bottom_close_index = bottom_close_index.max(Some(reach));
            if bottom_close_index > bottom_open_index {
                return false;
            }
        } else {
            bottom_open_index = bottom_open_index.max(Some(reach));
        }
    }
    true
}

/// Reconstruct group nesting and visibility
///
/// `classify` assigns each message its role; `is_expanded` returns the caller's
/// expansion override for a group begin, falling back to the begin's default.
/// End markers drive the stack but are not part of the returned list.
pub fn reconstruct_groups<C, E>(
    mut items: Vec<SequencedMessage>,
    classify: C,
    is_expanded: E,
) -> Vec<GroupedMessage>
where
    C: Fn(&Message) -> GroupRole,
    E: Fn(&Message) -> Option<bool>,
{
    items.sort_by(|a, b| {
        a.offset
            .total_cmp(&b.offset)
            .then(a.message.ordinal.cmp(&b.message.ordinal))
    });

    let roles: Vec<GroupRole> = items.iter().map(|i| classify(&i.message)).collect();
    let ends_of = pair_group_ends(&items, &roles);

    let mut arena = FrameArena::default();
    let mut output: Vec<GroupedMessage> = Vec::with_capacity(items.len());

    for (item, role) in items.iter().zip(roles) {
        let group = arena.snapshot();

        match role {
            GroupRole::End { correlation_id } => {
                let position = arena
                    .position_of(&correlation_id)
                    .filter(|p| arena.is_active_at(*p));
                let Some(position) = position else {
                    debug!(
                        message_id = %item.message.id,
                        correlation_id = %correlation_id,
                        "Group end without a matching open begin"
                    );
                    continue;
                };

                if let Some(previous) = output.iter_mut().rev().find(|g| g.is_visible) {
                    if let Some(frame) = previous
                        .group
                        .iter_mut()
                        .rev()
                        .find(|f| f.correlation_id == correlation_id)
                    {
                        frame.is_ending = true;
                    }
                }

                arena.close(position);
            }
            GroupRole::Begin {
                correlation_id,
                collapsed_by_default,
            } => {
                let is_visible = is_visible_in(&group);
                if arena.position_of(&correlation_id).is_some() {
                    debug!(
                        message_id = %item.message.id,
                        correlation_id = %correlation_id,
                        "Group id still on the stack, treating begin as content"
                    );
                    output.push(GroupedMessage {
                        message: item.message.clone(),
                        offset: item.offset,
                        group,
                        is_visible,
                        opens_group: false,
                        is_collapsed: false,
                        end: None,
                        end_offset: None,
                    });
                    continue;
                }

                let is_collapsed =
                    !is_expanded(&item.message).unwrap_or(!collapsed_by_default);
                let (end, end_offset, end_position) = ends_of
                    .get(item.message.id.as_str())
                    .map(|(position, end)| {
                        (Some(end.message.clone()), Some(end.offset), Some(*position))
                    })
                    .unwrap_or((None, None, None));

                arena.push(GroupFrame {
                    correlation_id,
                    begin: item.message.clone(),
                    end: end.clone(),
                    begin_offset: item.offset,
                    end_offset,
                    is_active: true,
                    is_closed: is_collapsed,
                    is_ending: false,
                    end_position,
                });

                output.push(GroupedMessage {
                    message: item.message.clone(),
                    offset: item.offset,
                    group,
                    is_visible,
                    opens_group: true,
                    is_collapsed,
                    end,
                    end_offset,
                });
            }
            GroupRole::Item => {
                let is_visible = is_visible_in(&group);
                output.push(GroupedMessage {
                    message: item.message.clone(),
                    offset: item.offset,
                    group,
                    is_visible,
                    opens_group: false,
                    is_collapsed: false,
                    end: None,
                    end_offset: None,
                });
            }
        }
    }

    output
}

/// Map each group begin's id to the position and item of its correlated end
///
/// Walks in visiting order; an end closes the oldest unpaired begin with its id.
/// Ends that arrive before any begin with their id are left unpaired.
fn pair_group_ends<'a>(
    items: &'a [SequencedMessage],
    roles: &[GroupRole],
) -> HashMap<&'a str, (usize, &'a SequencedMessage)> {
    let mut pending: HashMap<&str, VecDeque<&'a str>> = HashMap::new();
    let mut ends_of = HashMap::new();

    for (position, (item, role)) in items.iter().zip(roles).enumerate() {
        match role {
            GroupRole::Begin { correlation_id, .. } => {
                pending
                    .entry(correlation_id.as_str())
                    .or_default()
                    .push_back(item.message.id.as_str());
            }
            GroupRole::End { correlation_id } => {
                let begin_id = pending
                    .get_mut(correlation_id.as_str())
                    .and_then(VecDeque::pop_front);
                if let Some(begin_id) = begin_id {
                    ends_of.insert(begin_id, (position, item));
                }
            }
            GroupRole::Item => {}
        }
    }
    ends_of
}

/// Collapse state of tabular content, keyed by message id
///
/// Independent of group nesting. Tables are expanded unless the caller's
/// expansion lookup says otherwise.
pub fn calculate_table_state<T, E>(
    items: &[GroupedMessage],
    has_table: T,
    is_expanded: E,
) -> HashMap<String, bool>
where
    T: Fn(&Message) -> bool,
    E: Fn(&Message) -> Option<bool>,
{
    items
        .iter()
        .filter(|item| has_table(&item.message))
        .map(|item| {
            let is_collapsed = !is_expanded(&item.message).unwrap_or(true);
            (item.message.id.clone(), is_collapsed)
        })
        .collect()
}

/// A node of a reconstructed begin/end hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub begin: Arc<Message>,
    pub end: Option<Arc<Message>>,
    pub offset: f64,
    pub end_offset: Option<f64>,
    pub depth: usize,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn duration(&self) -> Option<f64> {
        self.end_offset.map(|end| (end - self.offset).max(0.0))
    }

    /// Number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::size).sum::<usize>()
    }
}

/// Build a parent/child tree from begin/end pairs
///
/// A begin's parent is the innermost group still active when it opened.
pub fn build_hierarchy<C>(items: Vec<SequencedMessage>, classify: C) -> Vec<HierarchyNode>
where
    C: Fn(&Message) -> GroupRole,
{
    let grouped = reconstruct_groups(items, classify, |_| Some(true));

    let mut nodes: Vec<HierarchyNode> = Vec::new();
    let mut parents: Vec<Option<usize>> = Vec::new();
    let mut node_of: HashMap<&str, usize> = HashMap::new();

    for entry in grouped.iter().filter(|e| e.opens_group) {
        let parent = entry
            .parent()
            .and_then(|frame| node_of.get(frame.begin.id.as_str()).copied());
        node_of.insert(entry.message.id.as_str(), nodes.len());
        parents.push(parent);
        nodes.push(HierarchyNode {
            begin: entry.message.clone(),
            end: entry.end.clone(),
            offset: entry.offset,
            end_offset: entry.end_offset,
            depth: entry.depth(),
            children: Vec::new(),
        });
    }

    // Children always come after their parent, so attach from the back
    let mut slots: Vec<Option<HierarchyNode>> = nodes.into_iter().map(Some).collect();
    for index in (0..slots.len()).rev() {
        if let Some(parent) = parents[index] {
            if let Some(node) = slots[index].take() {
                if let Some(parent_node) = slots[parent].as_mut() {
                    parent_node.children.insert(0, node);
                }
            }
        }
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqscope_core::messages::MessageType;
    use reqscope_core::Agent;
    use serde_json::json;

    fn item(id: &str, ordinal: u64, message_type: MessageType, payload: serde_json::Value) -> SequencedMessage {
        let message = Message::new(id, ordinal, ordinal as f64, Agent::Browser, message_type)
            .with_payload(payload);
        SequencedMessage::new(Arc::new(message), ordinal as f64)
    }

    fn group_begin(id: &str, ordinal: u64, corr: &str, collapsed: bool) -> SequencedMessage {
        item(
            id,
            ordinal,
            MessageType::LogGroupBegin,
            json!({ "correlationId": corr, "label": id, "isCollapsed": collapsed }),
        )
    }

    fn group_end(id: &str, ordinal: u64, corr: &str) -> SequencedMessage {
        item(id, ordinal, MessageType::LogGroupEnd, json!({ "correlationId": corr }))
    }

    fn write(id: &str, ordinal: u64) -> SequencedMessage {
        item(id, ordinal, MessageType::LogWrite, json!({ "message": id }))
    }

    fn classify(message: &Message) -> GroupRole {
        let corr = message.correlation_id().unwrap_or_default().to_string();
        if message.has_type("log-group-begin") {
            GroupRole::Begin {
                correlation_id: corr,
                collapsed_by_default: message.payload["isCollapsed"].as_bool().unwrap_or(false),
            }
        } else if message.has_type("log-group-end") {
            GroupRole::End { correlation_id: corr }
        } else {
            GroupRole::Item
        }
    }

    fn no_overrides(_: &Message) -> Option<bool> {
        None
    }

    fn visible_ids(grouped: &[GroupedMessage]) -> Vec<&str> {
        grouped
            .iter()
            .filter(|g| g.is_visible)
            .map(|g| g.message.id.as_str())
            .collect()
    }

    #[test]
    fn test_unrelated_pair_inside_group_has_depth_one() {
        let items = vec![
            group_begin("m1", 1, "g1", false),
            item("m2", 2, MessageType::LogTimeBegin, json!({ "correlationId": "t1" })),
            item("m3", 3, MessageType::LogTimeEnd, json!({ "correlationId": "t1" })),
            group_end("m4", 4, "g1"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);

        let ids: Vec<&str> = grouped.iter().map(|g| g.message.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(grouped[0].depth(), 0);
        assert_eq!(grouped[1].depth(), 1);
        assert_eq!(grouped[2].depth(), 1);
    }

    #[test]
    fn test_collapsed_group_hides_children_but_not_header() {
        let items = vec![
            group_begin("g", 1, "g1", true),
            write("a", 2),
            write("b", 3),
            group_end("ge", 4, "g1"),
            write("after", 5),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(visible_ids(&grouped), vec!["g", "after"]);
        assert!(grouped[0].is_collapsed);
    }

    #[test]
    fn test_expansion_override_wins_over_default() {
        let items = vec![
            group_begin("g", 1, "g1", true),
            write("a", 2),
            group_end("ge", 3, "g1"),
        ];

        let grouped = reconstruct_groups(items, classify, |m| {
            (m.id == "g").then_some(true)
        });
        assert_eq!(visible_ids(&grouped), vec!["g", "a"]);
        assert!(!grouped[0].is_collapsed);
    }

    #[test]
    fn test_nested_collapsed_inner_group() {
        let items = vec![
            group_begin("outer", 1, "o", false),
            group_begin("inner", 2, "i", true),
            write("hidden", 3),
            group_end("ie", 4, "i"),
            write("shown", 5),
            group_end("oe", 6, "o"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(visible_ids(&grouped), vec!["outer", "inner", "shown"]);
        assert_eq!(grouped[2].depth(), 2);
        assert_eq!(grouped[3].depth(), 1);
    }

    #[test]
    fn test_criss_cross_open_group_rescues_messages() {
        // A (collapsed) opens, B (open) opens, A ends, B ends
        let items = vec![
            group_begin("a", 1, "A", true),
            write("inside-a", 2),
            group_begin("b", 3, "B", false),
            write("inside-both", 4),
            group_end("ae", 5, "A"),
            write("inside-b", 6),
            group_end("be", 7, "B"),
            write("after", 8),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(
            visible_ids(&grouped),
            vec!["a", "inside-both", "inside-b", "after"]
        );
        // B is popped together with the buried, already-ended A
        let after = grouped.iter().find(|g| g.message.id == "after").unwrap();
        assert!(after.group.is_empty());
        let inside_b = grouped.iter().find(|g| g.message.id == "inside-b").unwrap();
        assert_eq!(inside_b.depth(), 1);
        assert_eq!(inside_b.group.len(), 2);
        assert!(!inside_b.group[0].is_active);
    }

    #[test]
    fn test_criss_cross_collapsed_inner_hides() {
        // A (open) opens, B (collapsed) opens, A ends, B ends
        let items = vec![
            group_begin("a", 1, "A", false),
            group_begin("b", 2, "B", true),
            write("inside-both", 3),
            group_end("ae", 4, "A"),
            write("inside-b", 5),
            group_end("be", 6, "B"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(visible_ids(&grouped), vec!["a", "b"]);
    }

    #[test]
    fn test_group_end_marks_previous_message_as_ending() {
        let items = vec![
            group_begin("g", 1, "g1", false),
            write("a", 2),
            write("b", 3),
            group_end("ge", 4, "g1"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert!(!grouped[1].group[0].is_ending);
        assert!(grouped[2].group[0].is_ending);
    }

    #[test]
    fn test_snapshots_are_copies() {
        let items = vec![
            group_begin("g", 1, "g1", false),
            write("a", 2),
            group_end("ge", 3, "g1"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        // The frame was popped after "a" was visited, but a's copy still shows it active
        assert!(grouped[1].group[0].is_active);
        assert_eq!(grouped[1].group[0].end.as_ref().unwrap().id, "ge");
    }

    #[test]
    fn test_duplicate_group_id_not_pushed_twice() {
        let items = vec![
            group_begin("g", 1, "g1", false),
            group_begin("dup", 2, "g1", false),
            write("a", 3),
            group_end("ge", 4, "g1"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        let a = grouped.iter().find(|g| g.message.id == "a").unwrap();
        assert_eq!(a.group.len(), 1);
        assert!(!grouped[1].opens_group);
    }

    #[test]
    fn test_reused_id_while_ended_frame_is_buried() {
        // A ends while B still sits above it, then A is reused before B closes
        let items = vec![
            group_begin("a1", 1, "A", false),
            group_begin("b", 2, "B", false),
            group_end("ae", 3, "A"),
            group_begin("a2", 4, "A", false),
            write("x", 5),
            group_end("be", 6, "B"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        let x = grouped.iter().find(|g| g.message.id == "x").unwrap();
        let a_frames = x.group.iter().filter(|f| f.correlation_id == "A").count();
        assert_eq!(a_frames, 1);
        assert_eq!(x.group.len(), 2);

        let a2 = grouped.iter().find(|g| g.message.id == "a2").unwrap();
        assert!(!a2.opens_group);
        let a1 = grouped.iter().find(|g| g.message.id == "a1").unwrap();
        assert_eq!(a1.end.as_ref().unwrap().id, "ae");
    }

    #[test]
    fn test_reused_id_pairs_each_begin_with_its_own_end() {
        let items = vec![
            group_begin("g1", 1, "A", false),
            group_end("e1", 2, "A"),
            group_begin("g2", 3, "A", false),
            write("w", 4),
            group_end("e2", 5, "A"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(grouped[0].end.as_ref().unwrap().id, "e1");
        assert_eq!(grouped[1].end.as_ref().unwrap().id, "e2");
        assert!(grouped[1].opens_group);
        assert_eq!(grouped[2].group[0].end_offset, Some(5.0));
    }

    #[test]
    fn test_ending_lands_on_last_visible_message() {
        let items = vec![
            group_begin("outer", 1, "o", false),
            group_begin("inner", 2, "i", true),
            write("hidden", 3),
            group_end("ie", 4, "i"),
            group_end("oe", 5, "o"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(visible_ids(&grouped), vec!["outer", "inner"]);

        let inner = &grouped[1];
        assert!(inner.group[0].is_ending);
        let hidden = &grouped[2];
        assert!(!hidden.is_visible);
        assert!(hidden.group.iter().all(|f| !f.is_ending));
    }

    #[test]
    fn test_repeated_end_after_close_is_ignored() {
        let items = vec![
            group_begin("a", 1, "A", false),
            group_begin("b", 2, "B", false),
            group_end("ae", 3, "A"),
            write("x", 4),
            group_end("ae-again", 5, "A"),
            write("y", 6),
            group_end("be", 7, "B"),
        ];

        let grouped = reconstruct_groups(items, classify, no_overrides);
        let y = grouped.iter().find(|g| g.message.id == "y").unwrap();
        assert_eq!(y.depth(), 1);
        assert_eq!(y.parent().unwrap().correlation_id, "B");
    }

    #[test]
    fn test_end_without_begin_ignored() {
        let items = vec![write("a", 1), group_end("stray", 2, "zz"), write("b", 3)];
        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(visible_ids(&grouped), vec!["a", "b"]);
    }

    #[test]
    fn test_unclosed_collapsed_group_hides_to_the_end() {
        let items = vec![group_begin("g", 1, "g1", true), write("a", 2), write("b", 3)];
        let grouped = reconstruct_groups(items, classify, no_overrides);
        assert_eq!(visible_ids(&grouped), vec!["g"]);
    }

    #[test]
    fn test_sorted_by_offset_then_ordinal() {
        let mut late = write("late-ordinal", 9);
        late.offset = 0.5;
        let items = vec![write("a", 1), late, write("b", 2)];
        let grouped = reconstruct_groups(items, classify, no_overrides);
        let ids: Vec<&str> = grouped.iter().map(|g| g.message.id.as_str()).collect();
        assert_eq!(ids, vec!["late-ordinal", "a", "b"]);
    }

    #[test]
    fn test_table_state_defaults_to_expanded() {
        let items = vec![
            item("t1", 1, MessageType::LogWrite, json!({ "table": [1, 2] })),
            item("t2", 2, MessageType::LogWrite, json!({ "table": [3] })),
            write("plain", 3),
        ];
        let grouped = reconstruct_groups(items, classify, no_overrides);

        let state = calculate_table_state(
            &grouped,
            |m| m.payload.get("table").is_some(),
            |m| (m.id == "t2").then_some(false),
        );
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("t1"), Some(&false));
        assert_eq!(state.get("t2"), Some(&true));
    }

    #[test]
    fn test_hierarchy_children_contained_in_parent() {
        let items = vec![
            group_begin("root", 1, "r", false),
            group_begin("child-1", 2, "c1", false),
            group_end("c1e", 3, "c1"),
            group_begin("child-2", 4, "c2", false),
            group_begin("grandchild", 5, "gc", false),
            group_end("gce", 6, "gc"),
            group_end("c2e", 7, "c2"),
            group_end("re", 8, "r"),
        ];

        let tree = build_hierarchy(items, classify);
        assert_eq!(tree.len(), 1);
        let root = &tree[0];
        assert_eq!(root.size(), 4);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].children[0].begin.id, "grandchild");
        assert_eq!(root.children[1].children[0].depth, 2);

        fn check(node: &HierarchyNode) {
            for child in &node.children {
                assert!(child.offset >= node.offset);
                assert!(child.end_offset.unwrap() <= node.end_offset.unwrap());
                check(child);
            }
        }
        check(root);
    }

    #[test]
    fn test_hierarchy_open_node_has_no_duration() {
        let items = vec![group_begin("root", 1, "r", false)];
        let tree = build_hierarchy(items, classify);
        assert_eq!(tree[0].duration(), None);
    }
}
