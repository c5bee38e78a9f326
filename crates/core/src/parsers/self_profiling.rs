use serde::Deserialize;

use super::ValidationError;
use crate::model::call_tree::TreeBuilder;
use crate::model::{FrameId, FrameIndex, Profile, ProfileMetadata, RawFrame};

/// One node of the trace's stack forest; a stack is reconstructed by
/// walking `parent_id` from leaf to root.
#[derive(Debug, Clone, Deserialize)]
pub struct StackNode {
    #[serde(rename = "frameId")]
    pub frame_id: usize,
    #[serde(default, rename = "parentId")]
    pub parent_id: Option<usize>,
}

/// One captured instant. A missing `stack_id` denotes an idle instant,
/// attributed to the root sentinel.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceSample {
    pub timestamp: f64,
    #[serde(default, rename = "stackId")]
    pub stack_id: Option<usize>,
}

/// Self-profiling trace: a flat frame table resolved through a resource
/// table, a stack forest linked by parent ids, and timestamped samples.
#[derive(Debug, Clone, Deserialize)]
pub struct SelfProfilingTrace {
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub frames: Vec<RawFrame>,
    #[serde(default)]
    pub samples: Vec<TraceSample>,
    #[serde(default)]
    pub stacks: Vec<StackNode>,
}

/// Reconstruct a profile from a self-profiling trace.
///
/// Weight is attributed retroactively: the delta between consecutive
/// timestamps is credited to the stack recorded at the *later* sample.
/// The first sample therefore contributes zero weight but still opens the
/// initial stack, so later closes balance.
pub fn parse_self_profiling(trace: &SelfProfilingTrace) -> Result<Profile, ValidationError> {
    let index = FrameIndex::build(&trace.frames, Some(&trace.resources));

    if trace.samples.is_empty() {
        let mut profile = Profile::empty();
        profile.metadata.name = "self-profiling".to_owned();
        return Ok(profile);
    }

    let mut builder = TreeBuilder::new();
    let mut stack: Vec<FrameId> = Vec::new();
    let mut last_timestamp: Option<f64> = None;

    for sample in &trace.samples {
        if let Some(previous) = last_timestamp
            && sample.timestamp < previous
        {
            return Err(ValidationError::NonMonotonicTime);
        }
        let delta = match last_timestamp {
            Some(previous) => sample.timestamp - previous,
            None => 0.0,
        };

        match sample.stack_id {
            Some(stack_id) => resolve_stack(&trace.stacks, &index, stack_id, &mut stack)?,
            None => stack.clear(),
        }
        builder.advance(&stack, delta);
        last_timestamp = Some(sample.timestamp);
    }

    let started_at = trace.samples[0].timestamp;
    let ended_at = trace.samples[trace.samples.len() - 1].timestamp;

    let built = builder.finish();
    Ok(Profile::new(
        ProfileMetadata {
            name: "self-profiling".to_owned(),
            unit: "milliseconds".to_owned(),
            started_at,
            ended_at,
        },
        index.to_frames(),
        built.tree,
        built.samples,
        built.weights,
        built.min_frame_duration,
    ))
}

/// Walk the parent chain from `stack_id` to its root, leaving the
/// resolved frames in `stack` ordered root→leaf.
///
/// The hop count is bounded by the stack table size; exceeding it means
/// the chain loops.
fn resolve_stack(
    stacks: &[StackNode],
    index: &FrameIndex,
    stack_id: usize,
    stack: &mut Vec<FrameId>,
) -> Result<(), ValidationError> {
    stack.clear();
    let mut cursor = Some(stack_id);
    let mut hops = 0usize;

    while let Some(current) = cursor {
        let node = stacks
            .get(current)
            .ok_or(ValidationError::BrokenStackChain { stack: stack_id })?;
        let frame = index
            .get(node.frame_id)
            .ok_or(ValidationError::DanglingReference {
                frame: node.frame_id,
            })?;
        stack.push(frame);

        hops += 1;
        if hops > stacks.len() {
            return Err(ValidationError::BrokenStackChain { stack: stack_id });
        }
        cursor = node.parent_id;
    }

    stack.reverse();
    Ok(())
}
