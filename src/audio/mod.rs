pub mod backend;
pub mod capture;
pub mod decode;
pub mod file;

pub use backend::{
    AudioDeviceFactory, AudioFrame, AudioOutput, CaptureConstraints, Microphone, MicrophoneSource,
};
pub use capture::{AudioClip, CaptureSession, CaptureState};
pub use decode::{decode_audio, DecodedAudio};
pub use file::{read_wav, FileMicrophone, FileOutput};
