use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::{VoiceError, VoiceResult};

/// A synthesized clip decoded into interleaved PCM
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
}

impl DecodedAudio {
    pub fn from_samples(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        let frames = samples.len() as f64 / channels.max(1) as f64;
        let duration = Duration::from_secs_f64(frames / sample_rate.max(1) as f64);
        Self {
            samples,
            sample_rate,
            channels,
            duration,
        }
    }
}

/// Decode a waveform container (WAV from the backend, or anything symphonia probes)
///
/// Failures are reported as [`VoiceError::PlaybackRejected`]: an undecodable
/// clip is something the playback device refuses, not a transport error.
pub fn decode_audio(bytes: &[u8]) -> VoiceResult<DecodedAudio> {
    if bytes.is_empty() {
        return Err(VoiceError::PlaybackRejected("empty audio payload".into()));
    }

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if bytes.starts_with(b"RIFF") {
        hint.with_extension("wav");
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| VoiceError::PlaybackRejected(format!("unrecognized audio: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VoiceError::PlaybackRejected("no audio track".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| VoiceError::PlaybackRejected(format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<i16> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(VoiceError::PlaybackRejected(format!(
                    "failed to read packet: {}",
                    e
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => {
                return Err(VoiceError::PlaybackRejected(format!("decode failed: {}", e)));
            }
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(VoiceError::PlaybackRejected(
            "audio track has no sample rate or channel layout".into(),
        ));
    }

    let clip = DecodedAudio::from_samples(samples, sample_rate, channels);
    debug!(
        "Decoded clip: {:.2}s, {}Hz, {} channels",
        clip.duration.as_secs_f64(),
        clip.sample_rate,
        clip.channels
    );

    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav_reports_duration() {
        let bytes = wav_bytes(&vec![0i16; 16000], 16000, 1);
        let clip = decode_audio(&bytes).unwrap();

        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.samples.len(), 16000);
        assert!((clip.duration.as_secs_f64() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_decode_stereo_duration_counts_frames() {
        let bytes = wav_bytes(&vec![100i16; 48000], 24000, 2);
        let clip = decode_audio(&bytes).unwrap();

        assert_eq!(clip.channels, 2);
        assert!((clip.duration.as_secs_f64() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = decode_audio(b"definitely not audio").unwrap_err();
        assert!(matches!(err, VoiceError::PlaybackRejected(_)));
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        assert!(matches!(
            decode_audio(&[]),
            Err(VoiceError::PlaybackRejected(_))
        ));
    }
}
