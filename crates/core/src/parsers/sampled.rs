use serde::Deserialize;

use super::ValidationError;
use crate::model::call_tree::TreeBuilder;
use crate::model::{FrameId, FrameIndex, Profile, ProfileMetadata};

/// Sampled trace: parallel arrays of root→leaf stacks and the weight
/// attributable to each captured leaf state.
#[derive(Debug, Clone, Deserialize)]
pub struct SampledTrace {
    #[serde(default)]
    pub name: String,
    pub unit: String,
    #[serde(rename = "startValue")]
    pub start_value: f64,
    #[serde(rename = "endValue")]
    pub end_value: f64,
    #[serde(default)]
    pub samples: Vec<Vec<usize>>,
    #[serde(default)]
    pub weights: Vec<f64>,
}

/// Reconstruct a profile from a sampled trace.
///
/// Each sample's stack is diffed against the previous one; nodes along
/// the shared prefix are reused, the diverging suffix gets fresh nodes.
/// Weights accumulate on the leaf's `self_weight` and on every path
/// node's `total_weight` — there are no per-frame timestamps in this
/// format.
pub fn parse_sampled(trace: &SampledTrace, index: &FrameIndex) -> Result<Profile, ValidationError> {
    if trace.samples.len() != trace.weights.len() {
        return Err(ValidationError::LengthMismatch {
            samples: trace.samples.len(),
            weights: trace.weights.len(),
        });
    }

    let mut builder = TreeBuilder::new();
    let mut stack: Vec<FrameId> = Vec::new();

    for (sample, &weight) in trace.samples.iter().zip(&trace.weights) {
        if weight < 0.0 {
            return Err(ValidationError::NonMonotonicTime);
        }
        stack.clear();
        for &raw in sample {
            stack.push(
                index
                    .get(raw)
                    .ok_or(ValidationError::DanglingReference { frame: raw })?,
            );
        }
        builder.advance(&stack, weight);
    }

    let built = builder.finish();
    Ok(Profile::new(
        ProfileMetadata {
            name: trace.name.clone(),
            unit: trace.unit.clone(),
            started_at: trace.start_value,
            ended_at: trace.end_value,
        },
        index.to_frames(),
        built.tree,
        built.samples,
        built.weights,
        built.min_frame_duration,
    ))
}
