//! Still-frame sources for object identification

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::VoiceResult;

/// A camera that can hand over the current frame as JPEG bytes
///
/// `Ok(None)` means the camera is off; it is not an error by itself.
#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    async fn capture_frame(&self) -> VoiceResult<Option<Vec<u8>>>;

    fn name(&self) -> &str;
}

/// Serves a JPEG file from disk as every frame
pub struct JpegFileCamera {
    path: PathBuf,
}

impl JpegFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Camera for JpegFileCamera {
    async fn capture_frame(&self) -> VoiceResult<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => {
                warn!("Camera frame {} is empty", self.path.display());
                Ok(None)
            }
            Ok(bytes) => {
                debug!("Captured frame from {} ({} bytes)", self.path.display(), bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "jpeg-file"
    }
}

/// A camera that is never turned on
pub struct NoCamera;

#[async_trait::async_trait]
impl Camera for NoCamera {
    async fn capture_frame(&self) -> VoiceResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "none"
    }
}
