use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{Result, SpeechError};
use crate::types::AudioData;

/// Container/codec extensions symphonia decodes without outside help.
pub const NATIVE_EXTENSIONS: &[&str] = &[
    "wav", "wave", "mp3", "flac", "ogg", "oga", "m4a", "mp4", "aac", "mkv", "caf", "aif", "aiff",
];

pub fn is_native_extension(extension: &str) -> bool {
    let lower = extension.trim_start_matches('.').to_ascii_lowercase();
    NATIVE_EXTENSIONS.contains(&lower.as_str())
}

/// Decode an audio file to raw PCM samples (mono, f32)
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|err| {
        SpeechError::decode(format!("failed to open {}: {err}", path.display()))
    })?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), extension)
}

/// Decode an in-memory encoded clip, using `extension` as a container hint.
pub fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> Result<AudioData> {
    if bytes.is_empty() {
        return Err(SpeechError::decode("audio payload is empty"));
    }
    decode_source(Box::new(Cursor::new(bytes.to_vec())), extension)
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<AudioData> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension.trim_start_matches('.'));
    }

    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| SpeechError::decode(format!("failed to probe audio format: {err}")))?;
    let mut format = probe_result.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SpeechError::decode("no audio tracks found"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SpeechError::decode("sample rate not specified in stream"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| SpeechError::decode(format!("failed to create decoder: {err}")))?;

    let mut samples = Vec::new();
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(SpeechError::decode(format!("failed to read packet: {err}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frames are skipped; the stream as a whole stays decodable.
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!(reason, "skipping undecodable packet");
                skipped += 1;
                continue;
            }
            Err(err) => return Err(SpeechError::decode(format!("failed to decode packet: {err}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        downmix_into(buffer.samples(), channels, &mut samples);
    }

    debug!(samples = samples.len(), skipped, sample_rate, "decoded audio stream");
    finish_stream(samples, skipped, sample_rate)
}

/// A stream whose every packet failed to decode is undecodable, not empty.
fn finish_stream(samples: Vec<f32>, skipped: usize, sample_rate: u32) -> Result<AudioData> {
    if samples.is_empty() && skipped > 0 {
        return Err(SpeechError::decode(format!(
            "none of {skipped} audio packets could be decoded"
        )));
    }
    Ok(AudioData {
        samples,
        sample_rate,
    })
}

/// Average interleaved channels into a mono stream.
fn downmix_into(interleaved: &[f32], channels: usize, mono: &mut Vec<f32>) {
    if channels == 1 {
        mono.extend_from_slice(interleaved);
        return;
    }
    mono.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}
