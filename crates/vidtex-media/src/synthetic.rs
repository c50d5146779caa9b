// crates/vidtex-media/src/synthetic.rs
//
// SyntheticBackend: a decode-free backend over a tiny self-describing
// container. Used by the test suite and by hosts that want deterministic
// playback without shipping media files.
//
// Container layout:
//   "VTXSYN1\n" ++ JSON(SyntheticClip)
//
// Each frame becomes `packets_per_picture` video packets of PACKET_BYTES
// bytes; the decoder eats DECODE_STEP_BYTES per step and completes a picture
// on the step that finishes the frame's last packet. Pictures are solid
// fills, so tests can check exactly which frame reached the host.
//
// Stream table: when the clip has audio (audio_every > 0) or no video at all,
// stream 0 is audio and video follows at 1; otherwise video is stream 0.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use vidtex_core::{BoxError, CanonicalPicture, PixelFormat, PlaybackError, StreamInfo, StreamKind};

use crate::backend::{
    Converter, DecodeStep, DemuxError, Decoder, Demuxer, MediaBackend, MediaPacket, MediaPicture,
    ReadOutcome,
};
use crate::helpers::bgr::{gray_to_bgr, swap_red_blue};
use crate::source::SourceStream;

pub const SYNTHETIC_MAGIC: &[u8] = b"VTXSYN1\n";

const PACKET_BYTES: usize = 12;
const DECODE_STEP_BYTES: usize = 5;
const AUDIO_PACKET_BYTES: usize = 4;

// ── Clip description ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticFormat {
    Bgr24,
    Rgb24,
    /// Luma only; the frame's fill is its red channel.
    Gray8,
}

impl SyntheticFormat {
    pub fn pixel_format(self) -> PixelFormat {
        match self {
            SyntheticFormat::Bgr24 => PixelFormat::Bgr24,
            SyntheticFormat::Rgb24 => PixelFormat::Rgb24,
            SyntheticFormat::Gray8 => PixelFormat::Gray8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticFrame {
    /// Container-clock presentation time.
    pub timestamp_us: i64,
    /// Fill color as `[r, g, b]`.
    pub color:        [u8; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticFaults {
    pub no_video_stream:              bool,
    /// Decoding this frame index fails.
    pub decode_error_at:              Option<usize>,
    /// Reading this frame's first packet fails for good.
    pub demux_error_at:               Option<usize>,
    /// Reading this frame's first packet fails `transient_error_count` times.
    pub transient_errors_at:          Option<usize>,
    pub transient_error_count:        u32,
    pub converter_init_fails:         bool,
    /// The converter hands back its input untouched.
    pub converter_emits_wrong_format: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticClip {
    pub width:         u32,
    pub height:        u32,
    pub pixel_format:  SyntheticFormat,
    #[serde(default)]
    pub start_time_us: Option<i64>,
    pub frames:        Vec<SyntheticFrame>,
    #[serde(default = "one")]
    pub packets_per_picture: u32,
    /// Interleave one audio packet before every Nth frame. 0 = no audio.
    #[serde(default)]
    pub audio_every:   u32,
    #[serde(default)]
    pub faults:        SyntheticFaults,
}

fn one() -> u32 {
    1
}

impl SyntheticClip {
    pub fn new(width: u32, height: u32, pixel_format: SyntheticFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
            start_time_us: Some(0),
            frames: Vec::new(),
            packets_per_picture: 1,
            audio_every: 0,
            faults: SyntheticFaults::default(),
        }
    }

    /// Frames at the given container times (ms), colored by index.
    pub fn with_frames_at_ms(self, times_ms: &[i64]) -> Self {
        let times_us: Vec<i64> = times_ms.iter().map(|ms| ms * 1_000).collect();
        self.with_frames_at_us(&times_us)
    }

    /// Frames at the given container times (µs), colored by index.
    pub fn with_frames_at_us(mut self, times_us: &[i64]) -> Self {
        self.frames = times_us
            .iter()
            .enumerate()
            .map(|(i, &us)| SyntheticFrame { timestamp_us: us, color: frame_color(i) })
            .collect();
        self
    }

    /// `fps` frames per second for `seconds`, starting at container time 0.
    pub fn constant_rate(mut self, fps: u32, seconds: f64) -> Self {
        let count = (fps as f64 * seconds).round() as usize;
        self.frames = (0..count)
            .map(|i| SyntheticFrame {
                timestamp_us: (i as f64 * 1_000_000.0 / fps.max(1) as f64).round() as i64,
                color:        frame_color(i),
            })
            .collect();
        self
    }

    /// Declare `start_us` as the container start and shift every frame by it.
    pub fn anchored_at(mut self, start_us: i64) -> Self {
        let shift = start_us - self.start_time_us.unwrap_or(0);
        for f in &mut self.frames {
            f.timestamp_us += shift;
        }
        self.start_time_us = Some(start_us);
        self
    }

    pub fn without_start_time(mut self) -> Self {
        self.start_time_us = None;
        self
    }

    pub fn split_packets(mut self, packets_per_picture: u32) -> Self {
        self.packets_per_picture = packets_per_picture.max(1);
        self
    }

    pub fn with_audio_every(mut self, n: u32) -> Self {
        self.audio_every = n;
        self
    }

    pub fn with_faults(mut self, faults: SyntheticFaults) -> Self {
        self.faults = faults;
        self
    }

    /// The BGR triplet a host should see for frame `i`.
    pub fn expected_bgr(&self, i: usize) -> Option<[u8; 3]> {
        let [r, g, b] = self.frames.get(i)?.color;
        Some(match self.pixel_format {
            SyntheticFormat::Gray8 => [r, r, r],
            _ => [b, g, r],
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = SYNTHETIC_MAGIC.to_vec();
        // Plain data with string keys; serialization cannot fail.
        out.extend(serde_json::to_vec(self).unwrap_or_default());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BoxError> {
        let body = bytes
            .strip_prefix(SYNTHETIC_MAGIC)
            .ok_or("not a synthetic clip (bad magic)")?;
        Ok(serde_json::from_slice(body)?)
    }

    fn has_audio(&self) -> bool {
        self.audio_every > 0 || self.faults.no_video_stream
    }

    fn video_index(&self) -> usize {
        if self.has_audio() { 1 } else { 0 }
    }
}

/// Deterministic, mostly distinct fill per frame index.
pub fn frame_color(i: usize) -> [u8; 3] {
    [(i * 37 % 256) as u8, (i * 91 % 256) as u8, (i * 13 % 256 + 1) as u8]
}

// ── Packets and pictures ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyntheticPacket {
    stream_index: usize,
    data:         Vec<u8>,
    frame:        usize,
    timestamp_us: i64,
    color:        [u8; 3],
    /// This is the last packet of `frame`'s picture.
    completes:    bool,
}

impl MediaPacket for SyntheticPacket {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn pts_us(&self) -> Option<i64> {
        Some(self.timestamp_us)
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticPicture {
    format:       PixelFormat,
    width:        u32,
    height:       u32,
    timestamp_us: i64,
    data:         Vec<u8>,
}

impl SyntheticPicture {
    fn solid(format: SyntheticFormat, width: u32, height: u32, timestamp_us: i64, [r, g, b]: [u8; 3]) -> Self {
        let n = width as usize * height as usize;
        let data = match format {
            SyntheticFormat::Bgr24 => [b, g, r].repeat(n),
            SyntheticFormat::Rgb24 => [r, g, b].repeat(n),
            SyntheticFormat::Gray8 => vec![r; n],
        };
        Self { format: format.pixel_format(), width, height, timestamp_us, data }
    }
}

impl MediaPicture for SyntheticPicture {
    fn pixel_format(&self) -> PixelFormat {
        self.format.clone()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    fn to_canonical(&self) -> Result<CanonicalPicture, PlaybackError> {
        if !self.format.is_canonical() {
            return Err(PlaybackError::UnexpectedPixelFormat { found: self.format.clone() });
        }
        CanonicalPicture::new(self.width, self.height, self.timestamp_us, self.data.clone())
    }
}

// ── Demuxer ───────────────────────────────────────────────────────────────────

pub struct SyntheticDemuxer {
    streams:        Vec<StreamInfo>,
    start_time_us:  Option<i64>,
    queue:          VecDeque<SyntheticPacket>,
    faults:         SyntheticFaults,
    transient_left: u32,
    picture_shape:  (u32, u32, SyntheticFormat),
}

impl SyntheticDemuxer {
    fn new(clip: SyntheticClip) -> Self {
        let video_index = clip.video_index();
        let mut streams = Vec::new();
        if clip.has_audio() {
            streams.push(StreamInfo { index: 0, kind: StreamKind::Audio });
        }
        if !clip.faults.no_video_stream {
            streams.push(StreamInfo { index: video_index, kind: StreamKind::Video });
        }

        let mut queue = VecDeque::new();
        for (i, f) in clip.frames.iter().enumerate() {
            if clip.audio_every > 0 && i % clip.audio_every as usize == 0 {
                queue.push_back(SyntheticPacket {
                    stream_index: 0,
                    data:         vec![0xA0; AUDIO_PACKET_BYTES],
                    frame:        i,
                    timestamp_us: f.timestamp_us,
                    color:        f.color,
                    completes:    false,
                });
            }
            if clip.faults.no_video_stream {
                continue;
            }
            let parts = clip.packets_per_picture.max(1);
            for part in 0..parts {
                queue.push_back(SyntheticPacket {
                    stream_index: video_index,
                    data:         vec![i as u8; PACKET_BYTES],
                    frame:        i,
                    timestamp_us: f.timestamp_us,
                    color:        f.color,
                    completes:    part + 1 == parts,
                });
            }
        }

        Self {
            streams,
            start_time_us:  clip.start_time_us,
            queue,
            transient_left: clip.faults.transient_error_count,
            faults:         clip.faults,
            picture_shape:  (clip.width, clip.height, clip.pixel_format),
        }
    }

    fn video_index(&self) -> Option<usize> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video).map(|s| s.index)
    }
}

impl Demuxer for SyntheticDemuxer {
    type Packet = SyntheticPacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn start_time_us(&self) -> Option<i64> {
        self.start_time_us
    }

    fn read_next(&mut self) -> Result<ReadOutcome<SyntheticPacket>, DemuxError> {
        let Some(front) = self.queue.front() else {
            return Ok(ReadOutcome::EndOfStream);
        };
        let frame = front.frame;
        if self.faults.transient_errors_at == Some(frame) && self.transient_left > 0 {
            self.transient_left -= 1;
            return Err(DemuxError::transient(format!("frame {frame}: source not ready")));
        }
        if self.faults.demux_error_at == Some(frame) {
            return Err(DemuxError::fatal(format!("frame {frame}: corrupt packet header")));
        }
        Ok(self.queue.pop_front().map_or(ReadOutcome::EndOfStream, ReadOutcome::Packet))
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

pub struct SyntheticDecoder {
    width:           u32,
    height:          u32,
    format:          SyntheticFormat,
    decode_error_at: Option<usize>,
}

impl Decoder for SyntheticDecoder {
    type Packet = SyntheticPacket;
    type Picture = SyntheticPicture;

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format.pixel_format()
    }

    fn decode_step(&mut self, packet: &SyntheticPacket, offset: usize)
        -> Result<DecodeStep<SyntheticPicture>, BoxError>
    {
        if self.decode_error_at == Some(packet.frame) {
            return Err(format!("frame {}: invalid bitstream", packet.frame).into());
        }
        let consumed = DECODE_STEP_BYTES.min(packet.size().saturating_sub(offset));
        let finished = offset + consumed == packet.size();
        let picture = (finished && packet.completes).then(|| {
            SyntheticPicture::solid(self.format, self.width, self.height, packet.timestamp_us, packet.color)
        });
        Ok(DecodeStep { consumed, picture })
    }
}

// ── Converter ─────────────────────────────────────────────────────────────────

pub struct SyntheticConverter {
    passthrough: bool,
}

impl Converter for SyntheticConverter {
    type Picture = SyntheticPicture;

    fn convert(&mut self, picture: &SyntheticPicture) -> Result<SyntheticPicture, BoxError> {
        if self.passthrough {
            return Ok(picture.clone());
        }
        let data = match picture.format {
            PixelFormat::Bgr24 => picture.data.clone(),
            PixelFormat::Rgb24 => swap_red_blue(&picture.data),
            PixelFormat::Gray8 => gray_to_bgr(&picture.data),
            ref other => return Err(format!("cannot convert {other}").into()),
        };
        Ok(SyntheticPicture { format: PixelFormat::Bgr24, data, ..picture.clone() })
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    colorspace_supported: bool,
    demuxers_opened:      u32,
    decoders_opened:      u32,
    converters_opened:    u32,
    faults:               SyntheticFaults,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            colorspace_supported: true,
            demuxers_opened:      0,
            decoders_opened:      0,
            converters_opened:    0,
            faults:               SyntheticFaults::default(),
        }
    }

    /// A build that cannot convert colorspaces, for the `UnsupportedBuild` path.
    pub fn without_colorspace_support() -> Self {
        Self { colorspace_supported: false, ..Self::new() }
    }

    pub fn demuxers_opened(&self) -> u32 {
        self.demuxers_opened
    }

    pub fn decoders_opened(&self) -> u32 {
        self.decoders_opened
    }

    pub fn converters_opened(&self) -> u32 {
        self.converters_opened
    }
}

impl MediaBackend for SyntheticBackend {
    type Packet = SyntheticPacket;
    type Picture = SyntheticPicture;
    type Demuxer = SyntheticDemuxer;
    type Decoder = SyntheticDecoder;
    type Converter = SyntheticConverter;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn supports_colorspace_conversion(&self) -> bool {
        self.colorspace_supported
    }

    fn open_demuxer(&mut self, stream: SourceStream) -> Result<SyntheticDemuxer, BoxError> {
        let bytes = stream.read_all()?;
        let clip = SyntheticClip::from_bytes(&bytes)?;
        self.faults = clip.faults.clone();
        self.demuxers_opened += 1;
        Ok(SyntheticDemuxer::new(clip))
    }

    fn open_decoder(&mut self, demuxer: &SyntheticDemuxer, stream_index: usize)
        -> Result<SyntheticDecoder, BoxError>
    {
        if demuxer.video_index() != Some(stream_index) {
            return Err(format!("stream {stream_index} is not a video stream").into());
        }
        let (width, height, format) = demuxer.picture_shape;
        self.decoders_opened += 1;
        Ok(SyntheticDecoder { width, height, format, decode_error_at: demuxer.faults.decode_error_at })
    }

    fn open_converter(&mut self, decoder: &SyntheticDecoder) -> Result<SyntheticConverter, BoxError> {
        if self.faults.converter_init_fails {
            return Err(format!("no {} -> bgr24 path", decoder.pixel_format()).into());
        }
        self.converters_opened += 1;
        Ok(SyntheticConverter { passthrough: self.faults.converter_emits_wrong_format })
    }
}
