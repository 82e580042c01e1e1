//! Annotation & Publish Pipeline.
//!
//! Per publish tick and agent: the track frame built from the projections,
//! a marked-up copy of the latest camera frame, and the hand-off of raw frame,
//! camera info, annotated frame and track to an [`OutputSink`].

pub mod annotate;
pub mod output;
pub mod track;

pub use annotate::{MarkerStyle, annotate};
pub use output::{AgentOutput, ChannelNames, OutputSink, TraceSink};
pub use track::{TrackFrame, TrackPoint};
