// crates/vidtex-media/src/lib.rs
//
// Decode pipeline and playback controller.
//
//   source → demux → decode → convert → exchange
//                  ╰──────── player ────────╯
//
// `player::TexturePlayer` is the only type most hosts need. Backends plug in
// through the traits in `backend`; `ffmpeg_backend` is the production one,
// `synthetic` a decode-free stand-in.

pub mod backend;
pub mod convert;
pub mod decode;
pub mod demux;
pub mod exchange;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_backend;
pub(crate) mod helpers;
pub mod player;
pub mod source;
pub mod synthetic;

pub use backend::{Converter, Decoder, Demuxer, MediaBackend, MediaPacket, MediaPicture};
pub use exchange::{ImageTextureHost, TextureHost};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg_backend::FfmpegBackend;
pub use player::TexturePlayer;
pub use source::{FileSystem, LocalFs, MemoryFs};
pub use synthetic::{SyntheticBackend, SyntheticClip, SyntheticFaults, SyntheticFormat};

pub use vidtex_core::{BitmapFormat, PlayState, PlaybackConfig, PlaybackError};
