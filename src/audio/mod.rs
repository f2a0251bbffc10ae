pub mod decoder;
pub mod pause_detector;
pub mod resample;
pub mod transcode;
