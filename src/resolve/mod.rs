//! Relative pose resolution between agents.

pub mod frame_graph;
pub mod resolver;

pub use frame_graph::{FrameGraph, FrameIndex, FrameNames, LookupError, StoreFrameGraph};
pub use resolver::{RelativePoseResolver, RelativeTransform, Resolution};
