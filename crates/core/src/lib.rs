//! Reconstructs raw performance-profiling traces into a canonical call
//! tree that downstream visualizers consume by traversal alone.
//!
//! Three wire formats are accepted (evented open/close streams, sampled
//! stack arrays, and self-profiling stack-linked samples); all of them
//! reduce to one [`model::Profile`] replayed chronologically through
//! [`model::Profile::for_each`].

pub mod model;
pub mod parsers;

pub use model::{CallTree, CallTreeNode, Frame, FrameId, FrameIndex, NodeId, Profile, ProfileMetadata, RawFrame};
pub use parsers::{ImportError, ValidationError, parse_auto};
