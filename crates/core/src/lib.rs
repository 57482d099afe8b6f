//! Domain logic for the video hook detector.
//!
//! Everything here is free of HTTP and provider concerns: upload validation
//! and temp-file ownership, ffmpeg probing and decoding, the frame sampler,
//! the verdict contract, and the result assembler.

pub mod cache;
pub mod error;
pub mod ffmpeg;
pub mod hook;
pub mod media;
pub mod sampler;
