use serde::{Deserialize, Serialize};

/// Index of an interned [`Frame`] within one profile's frame table.
///
/// Two frames carry the same identity iff their ids are equal; identity is
/// positional, so two byte-identical descriptors at different positions in
/// the raw table stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u32);

impl FrameId {
    /// The root sentinel, stored at slot 0 of every frame table.
    pub const ROOT: FrameId = FrameId(0);
}

/// Identity of one call-stack position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Stable id within the owning profile.
    pub key: FrameId,
    /// Display name (function, method, site).
    pub name: String,
    /// Originating module or file, when known.
    pub resource: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Whether this is user code as opposed to library/system code.
    pub is_application: bool,
}

impl Frame {
    /// The sentinel standing in for "no active frame" (an idle gap).
    pub fn root() -> Self {
        Self {
            key: FrameId::ROOT,
            name: "(root)".to_owned(),
            resource: None,
            line: None,
            column: None,
            is_application: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.key == FrameId::ROOT
    }
}

/// Raw frame descriptor as it appears in a trace payload, before resource
/// resolution and interning into a [`FrameIndex`].
///
/// Field aliases absorb the naming differences between the wire formats
/// (`file` vs `resourceId`, `col` vs `column`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFrame {
    pub name: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, alias = "col")]
    pub column: Option<u32>,
    /// Inline resource name; takes precedence over `resource_id`.
    #[serde(default, alias = "file")]
    pub resource: Option<String>,
    /// Index into a separate resource-name table.
    #[serde(default, rename = "resourceId")]
    pub resource_id: Option<usize>,
    #[serde(default, rename = "isApplication")]
    pub is_application: bool,
}

/// Maps the positional raw frame ids of one trace payload to interned
/// [`Frame`]s.
///
/// Slot 0 always holds the root sentinel; raw id `i` resolves to
/// `FrameId(i + 1)`. Scoped to a single payload: the index is absorbed
/// into the profile once a parser finishes.
#[derive(Debug, Clone)]
pub struct FrameIndex {
    frames: Vec<Frame>,
}

impl FrameIndex {
    /// Intern a raw descriptor table, resolving resource-table references.
    ///
    /// An out-of-range `resource_id` leaves the resource unset rather than
    /// failing; the frame itself is still usable.
    pub fn build(descriptors: &[RawFrame], resources: Option<&[String]>) -> Self {
        let mut frames = Vec::with_capacity(descriptors.len() + 1);
        frames.push(Frame::root());

        for (position, raw) in descriptors.iter().enumerate() {
            let resource = raw.resource.clone().or_else(|| match raw.resource_id {
                Some(id) => {
                    let resolved = resources.and_then(|table| table.get(id));
                    if resolved.is_none() {
                        log::warn!("frame {position} references resource {id} outside the resource table");
                    }
                    resolved.cloned()
                }
                None => None,
            });

            frames.push(Frame {
                key: FrameId(position as u32 + 1),
                name: raw.name.clone(),
                resource,
                line: raw.line,
                column: raw.column,
                is_application: raw.is_application,
            });
        }

        Self { frames }
    }

    /// Resolve a positional raw frame id from the trace payload.
    pub fn get(&self, raw_id: usize) -> Option<FrameId> {
        // The table always holds at least the sentinel.
        if raw_id < self.frames.len() - 1 {
            Some(FrameId(raw_id as u32 + 1))
        } else {
            None
        }
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0 as usize)
    }

    /// The interned table, sentinel first, ready to move into a profile.
    pub fn to_frames(&self) -> Vec<Frame> {
        self.frames.clone()
    }
}
