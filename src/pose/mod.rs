pub mod keypoint;
pub mod normalize;

pub use keypoint::{FramePose, Keypoint, Landmark, PoseSequence, TRACKED_JOINTS};
pub use normalize::{NormalizedSequence, Normalizer};
