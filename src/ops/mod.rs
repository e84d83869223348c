//! Operations over timed objects and score files.
//!
//! Three engines: the splitter cuts lengthed objects at computed points,
//! the rest detector infers the silence between them, and the merger
//! coalesces adjacent objects and concatenates or stacks whole files.

pub mod merger;
pub mod rests;
pub mod splitter;

pub use merger::{
    merge_objects, merge_sequentially, merge_simultaneously, MergeError, MergeSettings,
    SequentialMergeSettings, SimultaneousMergeSettings, TrackChunkPolicy, VelocityPolicy,
};
pub use rests::{rests, rests_by_policy, with_rests, with_rests_by_policy, RestDetectionPolicy};
pub use splitter::{
    split_at_distance, split_at_ratio, split_by_grid, split_by_parts, split_by_step, Grid,
    SplitAnchor, SplitError,
};
