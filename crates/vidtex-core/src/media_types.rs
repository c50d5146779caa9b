// crates/vidtex-core/src/media_types.rs
//
// Plain data that flows between the decode pipeline and the host.
// No ffmpeg and no image crate, only pixels, timestamps and stream metadata.

use std::fmt;

use crate::error::PlaybackError;

/// Bytes per pixel of the canonical layout.
pub const BGR24_BYTES_PER_PIXEL: usize = 3;

/// Playback state machine position. A player is in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayState::Stopped => "stopped",
            PlayState::Playing => "playing",
            PlayState::Paused  => "paused",
        };
        f.write_str(s)
    }
}

/// Pixel layouts the pipeline needs to tell apart.
///
/// Only `Bgr24` is publishable; everything else goes through the colorspace
/// stage first. Backend formats without a dedicated variant land in `Other`
/// with the backend's own name for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgr24,
    Rgb24,
    Rgba,
    Bgra,
    Gray8,
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Nv12,
    Other(String),
}

impl PixelFormat {
    pub fn is_canonical(&self) -> bool {
        matches!(self, PixelFormat::Bgr24)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Bgr24   => f.write_str("bgr24"),
            PixelFormat::Rgb24   => f.write_str("rgb24"),
            PixelFormat::Rgba    => f.write_str("rgba"),
            PixelFormat::Bgra    => f.write_str("bgra"),
            PixelFormat::Gray8   => f.write_str("gray8"),
            PixelFormat::Yuv420p => f.write_str("yuv420p"),
            PixelFormat::Yuv422p => f.write_str("yuv422p"),
            PixelFormat::Yuv444p => f.write_str("yuv444p"),
            PixelFormat::Nv12    => f.write_str("nv12"),
            PixelFormat::Other(name) => f.write_str(name),
        }
    }
}

/// Coarse codec type of a container stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// One entry of a container's stream table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub kind:  StreamKind,
}

/// The video stream a play session decodes, resolved on the first `play()`
/// after a stop and stable until the next stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSelection {
    pub stream_index: usize,
    pub width:        u32,
    pub height:       u32,
    pub pixel_format: PixelFormat,
}

/// A decoded picture in the canonical layout: BGR24 packed, row-major,
/// top-down, no row padding. `data.len() == width * height * 3` always holds.
#[derive(Clone, PartialEq, Eq)]
pub struct CanonicalPicture {
    width:        u32,
    height:       u32,
    timestamp_us: i64,
    data:         Vec<u8>,
}

impl CanonicalPicture {
    pub fn new(width: u32, height: u32, timestamp_us: i64, data: Vec<u8>) -> Result<Self, PlaybackError> {
        let expected = canonical_len(width, height);
        if data.len() != expected {
            return Err(PlaybackError::MalformedPicture { expected, found: data.len() });
        }
        Ok(Self { width, height, timestamp_us, data })
    }

    /// Solid opaque black, used for the stopped-state placeholder.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            timestamp_us: 0,
            data: vec![0u8; canonical_len(width, height)],
        }
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn timestamp_us(&self) -> i64 { self.timestamp_us }
    pub fn data(&self) -> &[u8] { &self.data }
    pub fn into_data(self) -> Vec<u8> { self.data }

    /// `[b, g, r]` at `(x, y)`, or `None` outside the picture.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BGR24_BYTES_PER_PIXEL;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }
}

// Pixel payloads are large; keep Debug output readable.
impl fmt::Debug for CanonicalPicture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalPicture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp_us", &self.timestamp_us)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Byte length of a `width` x `height` canonical picture.
pub fn canonical_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BGR24_BYTES_PER_PIXEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_is_all_zero() {
        let p = CanonicalPicture::black(4, 2);
        assert_eq!(p.data().len(), 24);
        assert!(p.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = CanonicalPicture::new(2, 2, 0, vec![0; 11]).unwrap_err();
        assert!(matches!(err, PlaybackError::MalformedPicture { expected: 12, found: 11 }));
    }

    #[test]
    fn pixel_reads_bgr_triplet() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let p = CanonicalPicture::new(2, 1, 0, data).unwrap();
        assert_eq!(p.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(p.pixel(2, 0), None);
    }

    #[test]
    fn only_bgr24_is_canonical() {
        assert!(PixelFormat::Bgr24.is_canonical());
        assert!(!PixelFormat::Rgb24.is_canonical());
        assert!(!PixelFormat::Other("p010le".into()).is_canonical());
    }
}
