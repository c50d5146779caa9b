// crates/vidtex-media/src/ffmpeg_backend.rs
//
// FfmpegBackend: the production backend, on ffmpeg-the-third.
//
// Opening: ffmpeg opens containers by name. When the host filesystem can give
// a real path we hand that over; otherwise the source stream is spooled to a
// temp file first (read once, front to back, no seeking).
//
// Decoding: libavcodec's send/receive API does not report bytes consumed, so
// each decode step consumes the whole packet. If the decoder refuses input
// because a picture is still waiting, the packet goes on a small backlog and
// is re-sent on the next step after that picture has been received.
//
// Timestamps: packet and frame pts are in the stream time base and are
// rescaled to µs here; the container start time is already in AV_TIME_BASE
// (µs).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context as _;
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::error::EAGAIN;
use ffmpeg::util::frame::video::Video as VideoFrame;

use vidtex_core::helpers::time::rescale_to_micros;
use vidtex_core::{BoxError, CanonicalPicture, PixelFormat, PlaybackError, StreamInfo, StreamKind};

use crate::backend::{
    Converter, DecodeStep, DemuxError, Decoder, Demuxer, MediaBackend, MediaPacket, MediaPicture,
    ReadOutcome,
};
use crate::helpers::bgr::pack_rows;
use crate::source::SourceStream;

/// Run `ffmpeg_the_third::init` once per process.
fn ensure_init() -> Result<(), BoxError> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    INIT.get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| format!("ffmpeg init failed: {e}").into())
}

/// Our name for an ffmpeg pixel format.
pub fn pixel_format_of(p: Pixel) -> PixelFormat {
    match p {
        Pixel::BGR24   => PixelFormat::Bgr24,
        Pixel::RGB24   => PixelFormat::Rgb24,
        Pixel::RGBA    => PixelFormat::Rgba,
        Pixel::BGRA    => PixelFormat::Bgra,
        Pixel::GRAY8   => PixelFormat::Gray8,
        Pixel::YUV420P => PixelFormat::Yuv420p,
        Pixel::YUV422P => PixelFormat::Yuv422p,
        Pixel::YUV444P => PixelFormat::Yuv444p,
        Pixel::NV12    => PixelFormat::Nv12,
        other          => PixelFormat::Other(format!("{other:?}").to_lowercase()),
    }
}

fn is_again(e: &ffmpeg::Error) -> bool {
    matches!(e, ffmpeg::Error::Other { errno } if *errno == EAGAIN)
}

// ── Packets and pictures ──────────────────────────────────────────────────────

pub struct FfmpegPacket {
    inner:        ffmpeg::Packet,
    stream_index: usize,
    pts_us:       Option<i64>,
}

impl MediaPacket for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn pts_us(&self) -> Option<i64> {
        self.pts_us
    }
}

pub struct FfmpegPicture {
    frame:        VideoFrame,
    timestamp_us: i64,
}

impl MediaPicture for FfmpegPicture {
    fn pixel_format(&self) -> PixelFormat {
        pixel_format_of(self.frame.format())
    }

    fn width(&self) -> u32 {
        self.frame.width()
    }

    fn height(&self) -> u32 {
        self.frame.height()
    }

    fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    fn to_canonical(&self) -> Result<CanonicalPicture, PlaybackError> {
        if self.frame.format() != Pixel::BGR24 {
            return Err(PlaybackError::UnexpectedPixelFormat { found: self.pixel_format() });
        }
        let (w, h) = (self.frame.width(), self.frame.height());
        let row_bytes = w as usize * 3;
        // Destripe: copy only visible pixels, not stride padding.
        let data = pack_rows(self.frame.data(0), self.frame.stride(0), row_bytes, h as usize)
            .ok_or(PlaybackError::MalformedPicture {
                expected: row_bytes * h as usize,
                found:    self.frame.data(0).len(),
            })?;
        CanonicalPicture::new(w, h, self.timestamp_us, data)
    }
}

// ── Demuxer ───────────────────────────────────────────────────────────────────

pub struct FfmpegDemuxer {
    ictx:          ffmpeg::format::context::Input,
    streams:       Vec<StreamInfo>,
    time_bases:    Vec<(i32, i32)>,
    start_time_us: Option<i64>,
    // Keeps a spooled copy of a non-native source alive while ffmpeg reads it.
    _spool:        Option<tempfile::NamedTempFile>,
}

impl FfmpegDemuxer {
    fn open(mut stream: SourceStream) -> Result<Self, BoxError> {
        ensure_init()?;

        let (path, spool): (PathBuf, _) = match stream.native_path() {
            Some(p) => (p.to_path_buf(), None),
            None => {
                let mut tmp = tempfile::NamedTempFile::new()?;
                let n = std::io::copy(&mut stream, &mut tmp)?;
                log::debug!("spooled {} ({n} bytes) to {}", stream.path().display(), tmp.path().display());
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };

        let ictx = input(&path).with_context(|| format!("avformat could not open {}", path.display()))?;

        let mut streams = Vec::new();
        let mut time_bases = Vec::new();
        for s in ictx.streams() {
            let kind = match s.parameters().medium() {
                Type::Video => StreamKind::Video,
                Type::Audio => StreamKind::Audio,
                _           => StreamKind::Other,
            };
            let tb = s.time_base();
            streams.push(StreamInfo { index: s.index(), kind });
            time_bases.push((tb.numerator(), tb.denominator()));
        }

        let raw_start = unsafe { (*ictx.as_ptr()).start_time };
        let start_time_us = (raw_start != ffmpeg::ffi::AV_NOPTS_VALUE).then_some(raw_start);

        Ok(Self { ictx, streams, time_bases, start_time_us, _spool: spool })
    }

    fn time_base(&self, index: usize) -> (i32, i32) {
        self.time_bases.get(index).copied().unwrap_or((1, 1_000_000))
    }
}

impl Demuxer for FfmpegDemuxer {
    type Packet = FfmpegPacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn start_time_us(&self) -> Option<i64> {
        self.start_time_us
    }

    fn read_next(&mut self) -> Result<ReadOutcome<FfmpegPacket>, DemuxError> {
        let next = self.ictx.packets().next().map(|r| r.map(|(stream, packet)| (stream.index(), packet)));
        match next {
            None => Ok(ReadOutcome::EndOfStream),
            Some(Ok((stream_index, packet))) => {
                let (num, den) = self.time_base(stream_index);
                let pts_us = packet.pts().map(|p| rescale_to_micros(p, num, den));
                Ok(ReadOutcome::Packet(FfmpegPacket { inner: packet, stream_index, pts_us }))
            }
            Some(Err(ffmpeg::Error::Eof)) => Ok(ReadOutcome::EndOfStream),
            Some(Err(e)) if is_again(&e) => Err(DemuxError::transient(e)),
            Some(Err(e)) => Err(DemuxError::fatal(e)),
        }
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

pub struct FfmpegDecoder {
    inner:      ffmpeg::decoder::Video,
    time_base:  (i32, i32),
    last_ts_us: i64,
    backlog:    VecDeque<ffmpeg::Packet>,
}

impl FfmpegDecoder {
    /// Push backlogged packets into the decoder until it asks us to drain.
    fn flush_backlog(&mut self) -> Result<(), BoxError> {
        while let Some(front) = self.backlog.front() {
            match self.inner.send_packet(front) {
                Ok(()) => { self.backlog.pop_front(); }
                Err(e) if is_again(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<FfmpegPicture>, BoxError> {
        let mut frame = VideoFrame::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => {
                let (num, den) = self.time_base;
                let timestamp_us = frame
                    .pts()
                    .or_else(|| frame.timestamp())
                    .map(|t| rescale_to_micros(t, num, den))
                    .unwrap_or(self.last_ts_us + 1);
                self.last_ts_us = timestamp_us;
                Ok(Some(FfmpegPicture { frame, timestamp_us }))
            }
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) if is_again(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Decoder for FfmpegDecoder {
    type Packet = FfmpegPacket;
    type Picture = FfmpegPicture;

    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn pixel_format(&self) -> PixelFormat {
        pixel_format_of(self.inner.format())
    }

    fn decode_step(&mut self, packet: &FfmpegPacket, offset: usize)
        -> Result<DecodeStep<FfmpegPicture>, BoxError>
    {
        if offset == 0 {
            if self.backlog.is_empty() {
                match self.inner.send_packet(&packet.inner) {
                    Ok(()) => {}
                    Err(e) if is_again(&e) => self.backlog.push_back(packet.inner.clone()),
                    Err(e) => return Err(e.into()),
                }
            } else {
                self.backlog.push_back(packet.inner.clone());
            }
        }

        let picture = self.receive()?;
        self.flush_backlog()?;
        Ok(DecodeStep { consumed: packet.size() - offset, picture })
    }
}

// ── Converter ─────────────────────────────────────────────────────────────────

pub struct FfmpegConverter {
    scaler: SwsContext,
}

impl Converter for FfmpegConverter {
    type Picture = FfmpegPicture;

    fn convert(&mut self, picture: &FfmpegPicture) -> Result<FfmpegPicture, BoxError> {
        let mut out = VideoFrame::empty();
        self.scaler.run(&picture.frame, &mut out)?;
        Ok(FfmpegPicture { frame: out, timestamp_us: picture.timestamp_us })
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    type Packet = FfmpegPacket;
    type Picture = FfmpegPicture;
    type Demuxer = FfmpegDemuxer;
    type Decoder = FfmpegDecoder;
    type Converter = FfmpegConverter;

    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn supports_colorspace_conversion(&self) -> bool {
        ensure_init().is_ok() && ffmpeg::software::scaling::support::output(Pixel::BGR24)
    }

    fn open_demuxer(&mut self, stream: SourceStream) -> Result<FfmpegDemuxer, BoxError> {
        FfmpegDemuxer::open(stream)
    }

    fn open_decoder(&mut self, demuxer: &FfmpegDemuxer, stream_index: usize)
        -> Result<FfmpegDecoder, BoxError>
    {
        let stream = demuxer
            .ictx
            .stream(stream_index)
            .ok_or_else(|| format!("stream {stream_index} gone"))?;
        let ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("codec context from stream parameters")?;
        let inner = ctx
            .decoder()
            .video()
            .with_context(|| format!("no video decoder for stream {stream_index}"))?;
        Ok(FfmpegDecoder {
            inner,
            time_base:  demuxer.time_base(stream_index),
            last_ts_us: demuxer.start_time_us.unwrap_or(0),
            backlog:    VecDeque::new(),
        })
    }

    fn open_converter(&mut self, decoder: &FfmpegDecoder) -> Result<FfmpegConverter, BoxError> {
        let (w, h) = (decoder.inner.width(), decoder.inner.height());
        let scaler = SwsContext::get(
            decoder.inner.format(), w, h,
            Pixel::BGR24, w, h,
            Flags::BILINEAR,
        )?;
        Ok(FfmpegConverter { scaler })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_formats_map_to_named_variants() {
        assert_eq!(pixel_format_of(Pixel::BGR24), PixelFormat::Bgr24);
        assert_eq!(pixel_format_of(Pixel::YUV420P), PixelFormat::Yuv420p);
        assert_eq!(pixel_format_of(Pixel::NV12), PixelFormat::Nv12);
    }

    #[test]
    fn unnamed_formats_keep_ffmpeg_name() {
        match pixel_format_of(Pixel::YUV420P10LE) {
            PixelFormat::Other(name) => assert_eq!(name, "yuv420p10le"),
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn again_is_recognised() {
        assert!(is_again(&ffmpeg::Error::Other { errno: EAGAIN }));
        assert!(!is_again(&ffmpeg::Error::Eof));
    }
}
