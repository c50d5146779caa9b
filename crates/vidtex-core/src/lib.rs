// crates/vidtex-core/src/lib.rs
//
// Plain data shared by the playback pipeline and its host. No ffmpeg here;
// vidtex-media owns every decode library dependency.

pub mod config;
pub mod error;
pub mod helpers;
pub mod media_types;

pub use config::{BitmapFormat, PlaybackConfig};
pub use error::{BoxError, PlaybackError};
pub use media_types::{
    CanonicalPicture, PixelFormat, PlayState, StreamInfo, StreamKind, StreamSelection,
};
