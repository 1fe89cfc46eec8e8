use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::decode::DecodedAudio;
use crate::error::{VoiceError, VoiceResult};
use crate::playback::PlaybackId;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Fixed parameters requested when opening the microphone
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    /// Target sample rate (frames are downsampled to this if needed)
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
    /// Best-effort; devices that cannot honour it still open
    pub echo_cancellation: bool,
    /// Best-effort; devices that cannot honour it still open
    pub noise_suppression: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz for speech-to-text
            channels: 1,        // Mono
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Microphone capture device
///
/// `open` is the permission suspension point: it either yields a frame
/// receiver or fails with [`VoiceError::PermissionDenied`]. `close` must
/// release the hardware stream synchronously so it can run from `Drop`.
#[async_trait::async_trait]
pub trait Microphone: Send {
    /// Request access and start streaming frames
    async fn open(&mut self, constraints: &CaptureConstraints)
        -> VoiceResult<mpsc::Receiver<AudioFrame>>;

    /// Stop streaming and release the device. Closing the frame channel ends capture.
    fn close(&mut self);

    /// Whether a hardware stream is currently held
    fn is_open(&self) -> bool;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Speech output device
///
/// Each started clip is a transient resource owned by the device until
/// `release` is called for its id.
#[async_trait::async_trait]
pub trait AudioOutput: Send {
    /// Allocate the clip and begin sounding it. May be rejected by the host.
    async fn start(&mut self, id: PlaybackId, clip: Arc<DecodedAudio>) -> VoiceResult<()>;

    /// Pause without releasing
    fn pause(&mut self, id: PlaybackId);

    /// Continue a paused clip from where it stopped
    async fn resume(&mut self, id: PlaybackId) -> VoiceResult<()>;

    /// Stop and free the clip's resources
    fn release(&mut self, id: PlaybackId);

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Where microphone frames come from
#[derive(Debug, Clone)]
pub enum MicrophoneSource {
    /// Stream a WAV file as if it were spoken live
    File(PathBuf),
    /// No capture device available; every open is refused
    Unavailable,
}

/// Audio device factory
pub struct AudioDeviceFactory;

impl AudioDeviceFactory {
    pub fn microphone(source: MicrophoneSource) -> Box<dyn Microphone> {
        match source {
            MicrophoneSource::File(path) => Box::new(super::file::FileMicrophone::new(path)),
            MicrophoneSource::Unavailable => Box::new(UnavailableMicrophone),
        }
    }

    /// Output that dumps each clip as a WAV file into `dir`, or only logs when `None`
    pub fn output(dir: Option<PathBuf>) -> Box<dyn AudioOutput> {
        Box::new(super::file::FileOutput::new(dir))
    }
}

struct UnavailableMicrophone;

#[async_trait::async_trait]
impl Microphone for UnavailableMicrophone {
    async fn open(
        &mut self,
        _constraints: &CaptureConstraints,
    ) -> VoiceResult<mpsc::Receiver<AudioFrame>> {
        Err(VoiceError::PermissionDenied(
            "Microphone access denied. Please allow microphone access.".to_string(),
        ))
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
