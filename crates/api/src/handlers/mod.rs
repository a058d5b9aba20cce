pub mod catalog;
pub mod pipelines;
pub mod video_status;
