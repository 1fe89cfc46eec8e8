use hound::WavReader;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, AudioOutput, CaptureConstraints, Microphone};
use super::decode::DecodedAudio;
use crate::error::{VoiceError, VoiceResult};
use crate::playback::PlaybackId;

/// Length of each frame streamed by [`FileMicrophone`]
const FRAME_MS: u64 = 100;

/// Microphone that replays a WAV file in real time, 100ms per frame
pub struct FileMicrophone {
    path: PathBuf,
    stream_task: Option<JoinHandle<()>>,
}

impl FileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stream_task: None,
        }
    }
}

/// Read all samples of a 16-bit WAV file
pub fn read_wav(path: &Path) -> VoiceResult<(hound::WavSpec, Vec<i16>)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        "Audio file loaded: {} ({:.1}s, {}Hz, {} channels)",
        path.display(),
        samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64),
        spec.sample_rate,
        spec.channels
    );

    Ok((spec, samples))
}

#[async_trait::async_trait]
impl Microphone for FileMicrophone {
    async fn open(
        &mut self,
        _constraints: &CaptureConstraints,
    ) -> VoiceResult<mpsc::Receiver<AudioFrame>> {
        if self.stream_task.is_some() {
            self.close();
        }

        let (spec, samples) = read_wav(&self.path)?;
        let (tx, rx) = mpsc::channel(64);

        let frame_len =
            (spec.sample_rate as u64 * FRAME_MS / 1000) as usize * spec.channels as usize;
        let frame_len = frame_len.max(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_MS));
            for (i, chunk) in samples.chunks(frame_len).enumerate() {
                ticker.tick().await;
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms: i as u64 * FRAME_MS,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            debug!("File microphone reached end of input");
        });

        self.stream_task = Some(task);
        Ok(rx)
    }

    fn close(&mut self) {
        if let Some(task) = self.stream_task.take() {
            // Aborting drops the sender, which ends the capture stream
            task.abort();
            info!("File microphone released: {}", self.path.display());
        }
    }

    fn is_open(&self) -> bool {
        self.stream_task.is_some()
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileMicrophone {
    fn drop(&mut self) {
        self.close();
    }
}

/// Output that writes each started clip to `dir` as `response-<id>.wav`.
///
/// With no directory it only logs. Tracks live clips so leaks show up in logs.
pub struct FileOutput {
    dir: Option<PathBuf>,
    live: HashSet<PlaybackId>,
}

impl FileOutput {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            live: HashSet::new(),
        }
    }

    pub fn live_clips(&self) -> usize {
        self.live.len()
    }

    fn dump(&self, id: PlaybackId, clip: &DecodedAudio) -> VoiceResult<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("response-{:03}.wav", id.value()));
        let spec = hound::WavSpec {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)?;
        for &sample in &clip.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        Ok(Some(path))
    }
}

#[async_trait::async_trait]
impl AudioOutput for FileOutput {
    async fn start(&mut self, id: PlaybackId, clip: Arc<DecodedAudio>) -> VoiceResult<()> {
        match self.dump(id, &clip) {
            Ok(Some(path)) => info!(
                "Playing {} ({:.1}s) -> {}",
                id,
                clip.duration.as_secs_f64(),
                path.display()
            ),
            Ok(None) => info!("Playing {} ({:.1}s)", id, clip.duration.as_secs_f64()),
            Err(e) => {
                return Err(VoiceError::PlaybackRejected(format!(
                    "could not write clip: {}",
                    e
                )))
            }
        }

        self.live.insert(id);
        Ok(())
    }

    fn pause(&mut self, id: PlaybackId) {
        debug!("Paused {}", id);
    }

    async fn resume(&mut self, id: PlaybackId) -> VoiceResult<()> {
        if !self.live.contains(&id) {
            return Err(VoiceError::PlaybackRejected(format!("{} was released", id)));
        }
        debug!("Resumed {}", id);
        Ok(())
    }

    fn release(&mut self, id: PlaybackId) {
        if !self.live.remove(&id) {
            warn!("Release requested for unknown clip {}", id);
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
