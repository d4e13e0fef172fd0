//! Ports (trait seams) between the pipeline and its collaborators.

pub mod outbound;

pub use outbound::{ManualTimeSource, SystemTimeSource, TimeSource, UpstreamClient};
