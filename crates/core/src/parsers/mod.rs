pub mod evented;
pub mod sampled;
pub mod self_profiling;

pub use evented::{EventKind, EventedTrace, TraceEvent, parse_evented};
pub use sampled::{SampledTrace, parse_sampled};
pub use self_profiling::{SelfProfilingTrace, StackNode, TraceSample, parse_self_profiling};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::{FrameIndex, Profile, RawFrame};

/// Construction-time invariant violation in a raw trace.
///
/// Raised synchronously while a parser runs; the transform is
/// deterministic, so identical malformed input can never be retried into
/// success. No partially built profile is ever exposed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A close event does not match the currently open top of stack, or a
    /// frame was still open when the trace ended.
    #[error("unbalanced append-order stack")]
    UnbalancedStack,
    /// A timestamp went backwards, or a sample carried a negative weight.
    #[error("sample delta cannot be negative, samples may be corrupt or out of order")]
    NonMonotonicTime,
    /// An event or stack references a frame id absent from the frame index.
    #[error("frame {frame} is not present in the frame index")]
    DanglingReference { frame: usize },
    /// `samples` and `weights` are parallel arrays and must pair up.
    #[error("{samples} samples do not pair with {weights} weights")]
    LengthMismatch { samples: usize, weights: usize },
    /// A stack's parent chain is cyclic or points at a missing stack node.
    #[error("stack {stack} does not resolve to a root")]
    BrokenStackChain { stack: usize },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unable to detect trace format")]
    UnknownFormat,
}

/// Envelope carrying a shared frame table and one or more profiles.
#[derive(Debug, Deserialize)]
struct TraceEnvelope {
    #[serde(default)]
    shared: SharedFrames,
    profiles: Vec<ProfilePayload>,
}

#[derive(Debug, Default, Deserialize)]
struct SharedFrames {
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ProfilePayload {
    #[serde(rename = "evented")]
    Evented(EventedTrace),
    #[serde(rename = "sampled")]
    Sampled(SampledTrace),
}

/// Auto-detect the trace format and reconstruct its profiles.
///
/// Detection strategy:
/// 1. An object with a `profiles` array is an envelope; its
///    `shared.frames` table feeds one frame index reused across every
///    contained evented/sampled profile.
/// 2. An object with `frames` + `stacks` + `samples` is a self-profiling
///    trace carrying its own frame table.
/// 3. A bare object tagged `"type": "evented"|"sampled"` is a single
///    profile, with an optional inline `frames` table.
pub fn parse_auto(data: &[u8]) -> Result<Vec<Profile>, ImportError> {
    let value: Value = serde_json::from_slice(data)?;
    let Some(object) = value.as_object() else {
        return Err(ImportError::UnknownFormat);
    };

    if object.contains_key("profiles") {
        log::debug!("detected profile envelope");
        let envelope: TraceEnvelope = serde_json::from_value(value)?;
        let index = FrameIndex::build(&envelope.shared.frames, None);
        let mut profiles = Vec::with_capacity(envelope.profiles.len());
        for payload in &envelope.profiles {
            profiles.push(parse_payload(payload, &index)?);
        }
        return Ok(profiles);
    }

    if object.contains_key("stacks")
        && object.contains_key("samples")
        && object.contains_key("frames")
    {
        log::debug!("detected self-profiling trace");
        let trace: SelfProfilingTrace = serde_json::from_value(value)?;
        return Ok(vec![parse_self_profiling(&trace)?]);
    }

    if matches!(
        object.get("type").and_then(Value::as_str),
        Some("evented" | "sampled")
    ) {
        log::debug!("detected bare profile object");
        let raw_frames: Vec<RawFrame> = match object.get("frames") {
            Some(frames) => serde_json::from_value(frames.clone())?,
            None => Vec::new(),
        };
        let index = FrameIndex::build(&raw_frames, None);
        let payload: ProfilePayload = serde_json::from_value(value)?;
        return Ok(vec![parse_payload(&payload, &index)?]);
    }

    Err(ImportError::UnknownFormat)
}

fn parse_payload(payload: &ProfilePayload, index: &FrameIndex) -> Result<Profile, ValidationError> {
    match payload {
        ProfilePayload::Evented(trace) => parse_evented(trace, index),
        ProfilePayload::Sampled(trace) => parse_sampled(trace, index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_envelope_with_both_profile_kinds() {
        let json = r#"{
            "shared": {
                "frames": [{"name": "main"}, {"name": "work", "file": "work.js"}]
            },
            "profiles": [
                {
                    "type": "evented",
                    "name": "thread 0",
                    "unit": "milliseconds",
                    "startValue": 0,
                    "endValue": 10,
                    "events": [
                        {"type": "O", "frame": 0, "at": 0},
                        {"type": "C", "frame": 0, "at": 10}
                    ]
                },
                {
                    "type": "sampled",
                    "name": "thread 1",
                    "unit": "milliseconds",
                    "startValue": 0,
                    "endValue": 20,
                    "samples": [[0, 1], [0]],
                    "weights": [10, 10]
                }
            ]
        }"#;

        let profiles = parse_auto(json.as_bytes()).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].metadata.name, "thread 0");
        assert_eq!(profiles[1].metadata.name, "thread 1");

        let top = profiles[1].root().children[0];
        let top = &profiles[1].call_tree()[top];
        assert_eq!(top.total_weight, 20.0);
    }

    #[test]
    fn detects_self_profiling_trace() {
        let json = r#"{
            "resources": ["app.js"],
            "frames": [{"name": "main", "resourceId": 0}],
            "stacks": [{"frameId": 0}],
            "samples": [
                {"timestamp": 0, "stackId": 0},
                {"timestamp": 8, "stackId": 0}
            ]
        }"#;

        let profiles = parse_auto(json.as_bytes()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].duration(), 8.0);
    }

    #[test]
    fn detects_bare_profile_with_inline_frames() {
        let json = r#"{
            "type": "sampled",
            "name": "bare",
            "unit": "milliseconds",
            "startValue": 0,
            "endValue": 5,
            "frames": [{"name": "main"}],
            "samples": [[0]],
            "weights": [5]
        }"#;

        let profiles = parse_auto(json.as_bytes()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].root().total_weight, 5.0);
    }

    #[test]
    fn unknown_shape_errors() {
        let err = parse_auto(br#"{"traceEvents": []}"#).unwrap_err();
        assert!(matches!(err, ImportError::UnknownFormat));

        let err = parse_auto(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ImportError::UnknownFormat));
    }

    #[test]
    fn validation_failures_surface_whole() {
        let json = r#"{
            "shared": {"frames": [{"name": "main"}]},
            "profiles": [{
                "type": "evented",
                "name": "broken",
                "unit": "milliseconds",
                "startValue": 0,
                "endValue": 10,
                "events": [{"type": "O", "frame": 0, "at": 0}]
            }]
        }"#;

        let err = parse_auto(json.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Validation(ValidationError::UnbalancedStack)
        ));
    }
}
