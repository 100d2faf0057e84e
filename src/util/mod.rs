pub mod jobs;
pub mod log;
pub mod misc;
