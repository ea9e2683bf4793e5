pub mod frame;
pub mod sampler;
pub mod source;

pub use frame::Frame;
pub use sampler::{FrameSampler, DEFAULT_FPS};
pub use source::{FrameSequence, ImageSequenceSource, SourceFrame, VideoSource};
