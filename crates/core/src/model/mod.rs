pub mod call_tree;
pub mod frame;
pub mod profile;

pub use call_tree::{CallTree, CallTreeNode, NodeId};
pub use frame::{Frame, FrameId, FrameIndex, RawFrame};
pub use profile::{EMPTY_PROFILE_SPAN, Profile, ProfileMetadata};
