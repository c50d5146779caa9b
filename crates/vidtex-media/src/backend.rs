// crates/vidtex-media/src/backend.rs
//
// The seam between the playback controller and a decode library.
//
// A backend supplies four cooperating objects that share packet and picture
// types: a demuxer over the source stream, a decoder for the chosen video
// stream, and an optional colorspace converter. Backend methods return raw
// `BoxError` causes; the pipeline stages (demux.rs, decode.rs, convert.rs)
// wrap them into `PlaybackError` with the context the host needs.

use vidtex_core::{BoxError, CanonicalPicture, PixelFormat, PlaybackError, StreamInfo};

use crate::source::SourceStream;

/// A compressed packet as read from the container.
pub trait MediaPacket {
    fn stream_index(&self) -> usize;
    /// Payload length in bytes. Decode offsets run from 0 to this value.
    fn size(&self) -> usize;
    fn pts_us(&self) -> Option<i64>;
}

/// A decoded picture in whatever layout the decoder (or converter) produced.
pub trait MediaPicture {
    fn pixel_format(&self) -> PixelFormat;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Presentation timestamp in µs, in the container's clock (not anchored).
    fn timestamp_us(&self) -> i64;

    /// Repack into the canonical layout. Must fail with
    /// `UnexpectedPixelFormat` unless the picture is BGR24.
    fn to_canonical(&self) -> Result<CanonicalPicture, PlaybackError>;
}

/// Result of one demuxer read.
#[derive(Debug)]
pub enum ReadOutcome<P> {
    Packet(P),
    EndOfStream,
}

#[derive(Debug, thiserror::Error)]
#[error("demux read failed (transient: {transient})")]
pub struct DemuxError {
    /// The backend believes a later read may succeed.
    pub transient: bool,
    #[source]
    pub source:    BoxError,
}

impl DemuxError {
    pub fn fatal(source: impl Into<BoxError>) -> Self {
        Self { transient: false, source: source.into() }
    }

    pub fn transient(source: impl Into<BoxError>) -> Self {
        Self { transient: true, source: source.into() }
    }
}

/// One decode step: how many packet bytes were consumed and the picture, if
/// that step completed one.
#[derive(Debug)]
pub struct DecodeStep<P> {
    pub consumed: usize,
    pub picture:  Option<P>,
}

pub trait Demuxer {
    type Packet: MediaPacket;

    fn streams(&self) -> &[StreamInfo];

    /// Container start time in µs, if the container declares one.
    fn start_time_us(&self) -> Option<i64>;

    /// Blocking read of the next packet from any stream.
    fn read_next(&mut self) -> Result<ReadOutcome<Self::Packet>, DemuxError>;
}

pub trait Decoder {
    type Packet: MediaPacket;
    type Picture: MediaPicture;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel_format(&self) -> PixelFormat;

    /// Feed `packet` starting at byte `offset`. Called repeatedly with the
    /// offset advanced by `consumed` until the whole packet is used.
    fn decode_step(&mut self, packet: &Self::Packet, offset: usize)
        -> Result<DecodeStep<Self::Picture>, BoxError>;
}

pub trait Converter {
    type Picture: MediaPicture;

    /// Same-size conversion into the canonical pixel format.
    fn convert(&mut self, picture: &Self::Picture) -> Result<Self::Picture, BoxError>;
}

pub trait MediaBackend {
    type Packet: MediaPacket;
    type Picture: MediaPicture;
    type Demuxer: Demuxer<Packet = Self::Packet>;
    type Decoder: Decoder<Packet = Self::Packet, Picture = Self::Picture>;
    type Converter: Converter<Picture = Self::Picture>;

    fn name(&self) -> &'static str;

    /// Whether this build can convert arbitrary decoder output to BGR24.
    fn supports_colorspace_conversion(&self) -> bool;

    fn open_demuxer(&mut self, stream: SourceStream) -> Result<Self::Demuxer, BoxError>;

    fn open_decoder(&mut self, demuxer: &Self::Demuxer, stream_index: usize)
        -> Result<Self::Decoder, BoxError>;

    /// Converter from the decoder's native format to BGR24 at the decoder's size.
    fn open_converter(&mut self, decoder: &Self::Decoder) -> Result<Self::Converter, BoxError>;
}
