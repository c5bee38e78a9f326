use serde::Deserialize;

use super::ValidationError;
use crate::model::{CallTree, FrameIndex, NodeId, Profile, ProfileMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EventKind {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "C")]
    Close,
}

/// One open or close event in an evented trace.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Positional id into the accompanying frame index.
    pub frame: usize,
    pub at: f64,
}

/// Evented trace: an ordered open/close event stream bounded by
/// `startValue`/`endValue`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventedTrace {
    #[serde(default)]
    pub name: String,
    pub unit: String,
    #[serde(rename = "startValue")]
    pub start_value: f64,
    #[serde(rename = "endValue")]
    pub end_value: f64,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

/// Reconstruct a profile from an evented trace.
///
/// Maintains an explicit stack of open nodes. An `Open` pushes a child
/// under the stack top (or the synthetic root); a `Close` pops it,
/// finalizing `total_weight` from the open/close timestamps and
/// `self_weight` as the remainder after the children's totals. One sample
/// is recorded per event: the instant's deepest open node, or the root
/// sentinel once the stack empties.
pub fn parse_evented(trace: &EventedTrace, index: &FrameIndex) -> Result<Profile, ValidationError> {
    let mut tree = CallTree::new();
    // Open nodes with their open timestamps, outermost first.
    let mut open: Vec<(NodeId, f64)> = Vec::new();
    let mut samples = Vec::with_capacity(trace.events.len());
    let mut weights = Vec::with_capacity(trace.events.len());
    let mut min_duration = f64::INFINITY;
    let mut last_at: Option<f64> = None;

    for event in &trace.events {
        if let Some(previous) = last_at
            && event.at < previous
        {
            return Err(ValidationError::NonMonotonicTime);
        }
        let frame = index
            .get(event.frame)
            .ok_or(ValidationError::DanglingReference { frame: event.frame })?;

        match event.kind {
            EventKind::Open => {
                let parent = open.last().map(|&(node, _)| node).unwrap_or(NodeId::ROOT);
                let node = tree.push_child(parent, frame);
                open.push((node, event.at));
            }
            EventKind::Close => {
                let Some((node, opened_at)) = open.pop() else {
                    return Err(ValidationError::UnbalancedStack);
                };
                if tree[node].frame != frame {
                    return Err(ValidationError::UnbalancedStack);
                }

                // Stack discipline guarantees every child already closed.
                let total = event.at - opened_at;
                let children_total: f64 = tree[node]
                    .children
                    .iter()
                    .map(|&child| tree[child].total_weight)
                    .sum();
                let entry = tree.node_mut(node);
                entry.total_weight = total;
                entry.self_weight = total - children_total;

                if total > 0.0 {
                    min_duration = min_duration.min(total);
                }
            }
        }

        weights.push(match last_at {
            Some(previous) => event.at - previous,
            None => (event.at - trace.start_value).max(0.0),
        });
        samples.push(open.last().map(|&(node, _)| node).unwrap_or(NodeId::ROOT));
        last_at = Some(event.at);
    }

    if !open.is_empty() {
        return Err(ValidationError::UnbalancedStack);
    }

    let root_total: f64 = tree
        .root()
        .children
        .iter()
        .map(|&child| tree[child].total_weight)
        .sum();
    tree.node_mut(NodeId::ROOT).total_weight = root_total;

    Ok(Profile::new(
        ProfileMetadata {
            name: trace.name.clone(),
            unit: trace.unit.clone(),
            started_at: trace.start_value,
            ended_at: trace.end_value,
        },
        index.to_frames(),
        tree,
        samples,
        weights,
        min_duration,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawFrame;

    fn index(names: &[&str]) -> FrameIndex {
        let descriptors: Vec<RawFrame> = names
            .iter()
            .map(|name| RawFrame {
                name: (*name).to_owned(),
                ..RawFrame::default()
            })
            .collect();
        FrameIndex::build(&descriptors, None)
    }

    fn open(frame: usize, at: f64) -> TraceEvent {
        TraceEvent {
            kind: EventKind::Open,
            frame,
            at,
        }
    }

    fn close(frame: usize, at: f64) -> TraceEvent {
        TraceEvent {
            kind: EventKind::Close,
            frame,
            at,
        }
    }

    fn trace(start: f64, end: f64, events: Vec<TraceEvent>) -> EventedTrace {
        EventedTrace {
            name: "test".to_owned(),
            unit: "milliseconds".to_owned(),
            start_value: start,
            end_value: end,
            events,
        }
    }

    #[test]
    fn nested_events_produce_weighted_tree() {
        let index = index(&["a", "b"]);
        let trace = trace(
            0.0,
            10.0,
            vec![open(0, 0.0), open(1, 2.0), close(1, 8.0), close(0, 10.0)],
        );
        let profile = parse_evented(&trace, &index).unwrap();

        let a_id = profile.root().children[0];
        let a = profile.node(a_id).unwrap();
        assert_eq!(profile.frame(a.frame).unwrap().name, "a");
        assert_eq!(a.total_weight, 10.0);
        assert_eq!(a.self_weight, 4.0);

        let b = profile.node(a.children[0]).unwrap();
        assert_eq!(b.total_weight, 6.0);
        assert_eq!(b.self_weight, 6.0);

        assert_eq!(profile.root().total_weight, 10.0);
        assert_eq!(profile.samples().len(), 4);
    }

    #[test]
    fn fully_covered_trace_conserves_duration() {
        let index = index(&["a", "b"]);
        let trace = trace(
            0.0,
            10.0,
            vec![open(0, 0.0), close(0, 4.0), open(1, 4.0), close(1, 10.0)],
        );
        let profile = parse_evented(&trace, &index).unwrap();

        let children_total: f64 = profile
            .root()
            .children
            .iter()
            .map(|&child| profile.node(child).unwrap().total_weight)
            .sum();
        assert_eq!(children_total, profile.duration());
    }

    #[test]
    fn direct_recursion_is_flagged_on_the_inner_node() {
        let index = index(&["f0"]);
        let trace = trace(
            0.0,
            4.0,
            vec![open(0, 0.0), open(0, 1.0), close(0, 2.0), close(0, 3.0)],
        );
        let profile = parse_evented(&trace, &index).unwrap();

        let outer = profile.root().children[0];
        let inner = profile.node(outer).unwrap().children[0];
        assert!(profile.is_recursive(inner));
        assert!(!profile.is_recursive(outer));
    }

    #[test]
    fn indirect_recursion_is_flagged_across_the_chain() {
        let index = index(&["f0", "f1"]);
        let trace = trace(
            0.0,
            6.0,
            vec![
                open(0, 0.0),
                open(1, 1.0),
                open(0, 2.0),
                close(0, 3.0),
                close(1, 4.0),
                close(0, 5.0),
            ],
        );
        let profile = parse_evented(&trace, &index).unwrap();

        let outer_f0 = profile.root().children[0];
        let f1 = profile.node(outer_f0).unwrap().children[0];
        let inner_f0 = profile.node(f1).unwrap().children[0];
        assert!(profile.is_recursive(inner_f0));
        assert!(!profile.is_recursive(f1));
        assert!(!profile.is_recursive(outer_f0));
    }

    #[test]
    fn missing_final_close_is_unbalanced() {
        let index = index(&["f0", "f1"]);
        let trace = trace(0.0, 3.0, vec![open(0, 0.0), open(1, 1.0), close(1, 2.0)]);
        assert_eq!(
            parse_evented(&trace, &index).unwrap_err(),
            ValidationError::UnbalancedStack
        );
    }

    #[test]
    fn close_not_matching_stack_top_is_unbalanced() {
        let index = index(&["f0", "f1"]);
        let trace = trace(0.0, 3.0, vec![open(0, 0.0), open(1, 1.0), close(0, 2.0)]);
        assert_eq!(
            parse_evented(&trace, &index).unwrap_err(),
            ValidationError::UnbalancedStack
        );
    }

    #[test]
    fn close_on_empty_stack_is_unbalanced() {
        let index = index(&["f0"]);
        let trace = trace(0.0, 1.0, vec![close(0, 1.0)]);
        assert_eq!(
            parse_evented(&trace, &index).unwrap_err(),
            ValidationError::UnbalancedStack
        );
    }

    #[test]
    fn time_going_backwards_is_rejected() {
        let index = index(&["f0", "f1"]);
        let trace = trace(0.0, 10.0, vec![open(0, 5.0), open(1, 2.0)]);
        assert_eq!(
            parse_evented(&trace, &index).unwrap_err(),
            ValidationError::NonMonotonicTime
        );
    }

    #[test]
    fn unknown_frame_id_is_dangling() {
        let index = index(&["f0"]);
        let trace = trace(0.0, 1.0, vec![open(7, 0.0)]);
        assert_eq!(
            parse_evented(&trace, &index).unwrap_err(),
            ValidationError::DanglingReference { frame: 7 }
        );
    }

    #[test]
    fn min_frame_duration_tracks_smallest_nonzero_span() {
        let index = index(&["f0", "f1"]);
        let trace = trace(
            0.0,
            10.0,
            vec![open(0, 0.0), open(1, 5.0), close(1, 5.5), close(0, 10.0)],
        );
        let profile = parse_evented(&trace, &index).unwrap();
        assert_eq!(profile.min_frame_duration, 0.5);
    }

    #[test]
    fn zero_length_frames_do_not_poison_min_duration() {
        let index = index(&["f0", "f1"]);
        let trace = trace(
            0.0,
            10.0,
            vec![open(0, 0.0), open(1, 3.0), close(1, 3.0), close(0, 10.0)],
        );
        let profile = parse_evented(&trace, &index).unwrap();
        assert_eq!(profile.min_frame_duration, 10.0);
    }

    #[test]
    fn empty_event_stream_keeps_bounds_and_sentinel() {
        let index = index(&[]);
        let trace = trace(5.0, 15.0, Vec::new());
        let profile = parse_evented(&trace, &index).unwrap();

        assert_eq!(profile.duration(), 10.0);
        assert_eq!(profile.min_frame_duration, 100_000.0);
        assert!(profile.samples().is_empty());
    }
}
