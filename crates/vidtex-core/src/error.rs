// crates/vidtex-core/src/error.rs
//
// Error taxonomy for the playback core.
//
// Policy lives with the caller, not here:
//   construct  → NotFound, UnsupportedBuild, InvalidConfig
//   play()     → ContainerOpenFailed, NoVideoStream, DecoderOpenFailed, ResamplerInitFailed
//   advance()  → DecodeError, ResampleFailed, UnexpectedPixelFormat (after an implicit stop)
//   publish    → ImageEncode, TextureHost (logged, frame skipped)
//
// End-of-stream is not an error at this level; demuxers report it as a read
// outcome and the controller turns it into an implicit stop.

use std::path::PathBuf;

use crate::media_types::PixelFormat;

/// Backend-side cause carried as the `source` of a `PlaybackError`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("video file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("media backend cannot convert pixel formats to bgr24")]
    UnsupportedBuild,

    #[error("invalid playback config: {0}")]
    InvalidConfig(String),

    #[error("could not open container {}", path.display())]
    ContainerOpenFailed {
        path:   PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("no video stream in container {}", path.display())]
    NoVideoStream { path: PathBuf },

    #[error("could not open decoder for stream {stream_index}")]
    DecoderOpenFailed {
        stream_index: usize,
        #[source]
        source:       BoxError,
    },

    #[error("could not create {from} -> bgr24 resampler")]
    ResamplerInitFailed {
        from:   PixelFormat,
        #[source]
        source: BoxError,
    },

    #[error("error decoding packet on stream {stream_index} at byte {offset}")]
    DecodeError {
        stream_index: usize,
        offset:       usize,
        #[source]
        source:       BoxError,
    },

    #[error("could not resample picture at {timestamp_us}us")]
    ResampleFailed {
        timestamp_us: i64,
        #[source]
        source:       BoxError,
    },

    #[error("picture is {found} after conversion, expected bgr24")]
    UnexpectedPixelFormat { found: PixelFormat },

    #[error("picture payload is {found} bytes, expected {expected}")]
    MalformedPicture { expected: usize, found: usize },

    #[error("could not encode frame bitmap")]
    ImageEncode {
        #[source]
        source: BoxError,
    },

    #[error("host rejected frame bitmap")]
    TextureHost {
        #[source]
        source: BoxError,
    },

    #[error("player has been disposed")]
    Disposed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Publish-time failures: the frame is dropped and playback continues.
    pub fn is_frame_skip(&self) -> bool {
        matches!(self, PlaybackError::ImageEncode { .. } | PlaybackError::TextureHost { .. })
    }
}
