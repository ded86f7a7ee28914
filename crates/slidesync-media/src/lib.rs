//! FFmpeg-backed frame sampling for slide alignment.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout/cancellation
//! - FFprobe media inspection
//! - The stateful frame decoder seam and its FFmpeg implementation
//! - Frame downscaling and JPEG encoding
//! - The frame sampler that turns a recording into time-stamped frames
//! - The slide rasterizer seam for reference documents

pub mod command;
pub mod decoder;
pub mod encode;
pub mod error;
pub mod probe;
pub mod rasterize;
pub mod sampler;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use decoder::{FfmpegFrameDecoder, FrameDecoder};
pub use encode::encode_frame;
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use rasterize::{validate_slides, SlideRasterizer};
pub use sampler::FrameSampler;
