//! Media handling: WAV containers, ffmpeg conversion, YouTube audio download.

pub mod convert;
pub mod wav;
pub mod youtube;
