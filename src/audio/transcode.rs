//! Conversion of containers symphonia cannot read (webm/opus uploads, mostly)
//! into canonical WAV before decoding.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use super::decoder::{decode_bytes, is_native_extension};
use crate::error::{Result, SpeechError};
use crate::types::{AudioData, ANALYSIS_SAMPLE_RATE};

/// External capability that turns an encoded clip into WAV bytes.
///
/// Implementations report failure explicitly; callers never retry.
pub trait Transcoder: Send + Sync {
    fn to_wav(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>>;
}

/// Shells out to an `ffmpeg` binary, staging files in a per-call scratch directory.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    scratch_root: Option<PathBuf>,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            scratch_root: None,
        }
    }
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("speech-coach-");
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn run(&self, input: &Path, output: &Path, extension: &str) -> Result<()> {
        let result = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-ac", "1", "-ar"])
            .arg(ANALYSIS_SAMPLE_RATE.to_string())
            .args(["-f", "wav"])
            .arg(output)
            .output()
            .map_err(|err| SpeechError::Transcode {
                extension: extension.to_string(),
                message: format!("failed to launch {}: {err}", self.program.display()),
            })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(SpeechError::Transcode {
                extension: extension.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    result.status,
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }
}

impl Transcoder for FfmpegTranscoder {
    fn to_wav(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>> {
        let extension = sanitize_extension(extension);
        // Dropping `scratch` removes both files on every return path.
        let scratch = self.scratch_dir()?;
        let input = scratch.path().join(format!("input.{extension}"));
        let output = scratch.path().join("canonical.wav");
        fs::write(&input, bytes)?;

        self.run(&input, &output, &extension)?;
        let wav = fs::read(&output)?;
        debug!(
            extension = %extension,
            input_bytes = bytes.len(),
            output_bytes = wav.len(),
            "transcoded clip to wav"
        );
        Ok(wav)
    }
}

/// Decode `bytes`, transcoding first when `extension` is not natively readable.
pub fn decode_with_fallback(
    bytes: &[u8],
    extension: &str,
    transcoder: &dyn Transcoder,
) -> Result<AudioData> {
    if is_native_extension(extension) {
        return decode_bytes(bytes, Some(extension));
    }
    info!(extension, "container is not natively decodable; transcoding");
    let wav = transcoder.to_wav(bytes, extension)?;
    decode_bytes(&wav, Some("wav"))
}

fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_sanitized_for_scratch_names() {
        assert_eq!(sanitize_extension(".WebM"), "webm");
        assert_eq!(sanitize_extension("../../x"), "x");
        assert_eq!(sanitize_extension(""), "bin");
    }

    #[test]
    fn scratch_directory_is_removed_after_failure() {
        let root = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new()
            .with_program(root.path().join("no-such-ffmpeg"))
            .with_scratch_root(root.path());

        let err = transcoder.to_wav(b"not really webm", "webm").unwrap_err();
        assert!(matches!(err, SpeechError::Transcode { .. }));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    struct Rejecting;

    impl Transcoder for Rejecting {
        fn to_wav(&self, _bytes: &[u8], extension: &str) -> Result<Vec<u8>> {
            Err(SpeechError::Transcode {
                extension: extension.to_string(),
                message: "rejected".into(),
            })
        }
    }

    #[test]
    fn non_native_containers_go_through_transcoder() {
        let err = decode_with_fallback(b"....", "webm", &Rejecting).unwrap_err();
        assert!(matches!(err, SpeechError::Transcode { .. }));

        let err = decode_with_fallback(b"....", "wav", &Rejecting).unwrap_err();
        assert!(matches!(err, SpeechError::Decode { .. }));
    }
}
