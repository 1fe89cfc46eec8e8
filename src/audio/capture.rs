use std::io::Cursor;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::backend::{AudioFrame, CaptureConstraints, Microphone};
use crate::error::{VoiceError, VoiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

/// A finished capture, encoded as a WAV container
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_count: usize,
    pub duration: Duration,
}

impl AudioClip {
    pub const FILE_NAME: &'static str = "audio.wav";
    pub const MIME_TYPE: &'static str = "audio/wav";

    /// Encode interleaved 16-bit samples as a WAV clip
    pub fn encode(samples: &[i16], sample_rate: u32, channels: u16) -> VoiceResult<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        let frames = samples.len() as f64 / channels.max(1) as f64;
        Ok(Self {
            bytes: cursor.into_inner(),
            sample_rate,
            channels,
            sample_count: samples.len(),
            duration: Duration::from_secs_f64(frames / sample_rate.max(1) as f64),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// One microphone-recording lifecycle
///
/// Holds at most one hardware stream. Frames are conformed to the capture
/// constraints as they arrive and accumulated until [`CaptureSession::stop`].
pub struct CaptureSession {
    microphone: Box<dyn Microphone>,
    constraints: CaptureConstraints,
    state: CaptureState,
    collector: Option<JoinHandle<Vec<AudioFrame>>>,
}

impl CaptureSession {
    pub fn new(microphone: Box<dyn Microphone>, constraints: CaptureConstraints) -> Self {
        Self {
            microphone,
            constraints,
            state: CaptureState::Idle,
            collector: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Open the microphone and start accumulating frames
    pub async fn start(&mut self) -> VoiceResult<()> {
        if self.is_recording() {
            warn!("Capture already recording on {}", self.microphone.name());
            return Ok(());
        }

        info!(
            "Opening microphone {} ({}Hz, {} ch, echo_cancellation={}, noise_suppression={})",
            self.microphone.name(),
            self.constraints.sample_rate,
            self.constraints.channels,
            self.constraints.echo_cancellation,
            self.constraints.noise_suppression
        );

        let audio_rx = match self.microphone.open(&self.constraints).await {
            Ok(rx) => rx,
            Err(e) => {
                // A failed open may still have grabbed the device
                self.microphone.close();
                warn!("Microphone open failed: {}", e);
                return Err(e);
            }
        };

        let sample_rate = self.constraints.sample_rate;
        let channels = self.constraints.channels;
        self.collector = Some(tokio::spawn(collect_frames(audio_rx, sample_rate, channels)));
        self.state = CaptureState::Recording;

        info!("Capture started");
        Ok(())
    }

    /// Release the microphone and finalize the accumulated chunks.
    ///
    /// Returns `None` when nothing was recording.
    pub async fn stop(&mut self) -> VoiceResult<Option<AudioClip>> {
        if !self.is_recording() {
            return Ok(None);
        }

        // Hardware first: closing the device also closes the frame channel
        self.microphone.close();
        self.state = CaptureState::Idle;

        let frames = match self.collector.take() {
            Some(task) => match task.await {
                Ok(frames) => frames,
                Err(e) => {
                    error!("Capture collector panicked: {}", e);
                    return Err(VoiceError::Audio("capture collector failed".into()));
                }
            },
            None => Vec::new(),
        };

        // Devices below the target rate are not upsampled, so take the format from the frames
        let (sample_rate, channels) = frames
            .first()
            .map(|f| (f.sample_rate, f.channels))
            .unwrap_or((self.constraints.sample_rate, self.constraints.channels));
        let samples: Vec<i16> = frames.into_iter().flat_map(|f| f.samples).collect();
        let clip = AudioClip::encode(&samples, sample_rate, channels)?;

        info!(
            "Capture stopped: {:.1}s ({} samples, {} bytes)",
            clip.duration.as_secs_f64(),
            clip.sample_count,
            clip.bytes.len()
        );

        Ok(Some(clip))
    }

    /// Release everything and discard the accumulated audio
    pub fn teardown(&mut self) {
        if self.microphone.is_open() {
            self.microphone.close();
        }
        if let Some(task) = self.collector.take() {
            task.abort();
        }
        if self.state == CaptureState::Recording {
            info!("Capture discarded on teardown");
        }
        self.state = CaptureState::Idle;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn collect_frames(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    sample_rate: u32,
    channels: u16,
) -> Vec<AudioFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = audio_rx.recv().await {
        if frame.samples.is_empty() {
            continue;
        }
        frames.push(conform_frame(frame, sample_rate, channels));
    }
    frames
}

/// Downsample and mix down a frame to the capture constraints
pub fn conform_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    if processed.channels != target_channels && target_channels == 1 {
        processed = stereo_to_mono(processed);
    }

    if processed.sample_rate != target_sample_rate {
        processed = downsample_frame(processed, target_sample_rate);
    }

    processed
}

/// Downsample by decimation. Upsampling is not attempted.
fn downsample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    let ratio = frame.sample_rate / target_rate.max(1);
    if ratio <= 1 {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;
    let samples: Vec<i16> = frame
        .samples
        .chunks_exact(channels)
        .step_by(ratio as usize)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate / ratio,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Average left and right channels
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame;
    }

    let samples = frame
        .samples
        .chunks_exact(2)
        .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}
