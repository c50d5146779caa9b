// crates/vidtex-media/src/decode.rs
//
// Decoder stage: drives a backend decoder across one packet.
//
// A packet may take several decode steps, each producing zero or one
// complete picture. The stage advances an offset until it reaches the packet
// size and hands back each picture as soon as it appears. The controller
// stops at the first picture of a tick, so the rest of that packet is
// released with it.

use vidtex_core::{PixelFormat, PlaybackError};

use crate::backend::{Decoder, MediaBackend, MediaPacket};

pub struct PacketDecoder<D> {
    inner:        D,
    stream_index: usize,
}

impl<D: Decoder> PacketDecoder<D> {
    pub fn open<B>(backend: &mut B, demuxer: &B::Demuxer, stream_index: usize) -> Result<Self, PlaybackError>
    where
        B: MediaBackend<Decoder = D>,
    {
        let inner = backend
            .open_decoder(demuxer, stream_index)
            .map_err(|source| PlaybackError::DecoderOpenFailed { stream_index, source })?;
        log::debug!(
            "decoder open: stream #{stream_index} {}x{} {}",
            inner.width(), inner.height(), inner.pixel_format(),
        );
        Ok(Self { inner, stream_index })
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.inner.pixel_format()
    }

    /// Decode from the start of `packet` until a picture completes or the
    /// packet is used up. `Ok(None)` means the packet held no full picture.
    pub fn first_picture(&mut self, packet: &D::Packet) -> Result<Option<D::Picture>, PlaybackError> {
        let size = packet.size();
        let mut offset = 0usize;

        while offset < size {
            let step = self.inner.decode_step(packet, offset).map_err(|source| {
                PlaybackError::DecodeError { stream_index: self.stream_index, offset, source }
            })?;

            if step.consumed > size - offset {
                return Err(self.stalled(offset, "decoder consumed past end of packet"));
            }
            if step.consumed == 0 && step.picture.is_none() {
                return Err(self.stalled(offset, "decoder made no progress"));
            }
            offset += step.consumed;

            if step.picture.is_some() {
                return Ok(step.picture);
            }
        }
        Ok(None)
    }

    fn stalled(&self, offset: usize, why: &'static str) -> PlaybackError {
        PlaybackError::DecodeError { stream_index: self.stream_index, offset, source: why.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DecodeStep, MediaPicture};
    use vidtex_core::{BoxError, CanonicalPicture};

    struct Pkt(usize);
    impl MediaPacket for Pkt {
        fn stream_index(&self) -> usize { 0 }
        fn size(&self) -> usize { self.0 }
        fn pts_us(&self) -> Option<i64> { None }
    }

    #[derive(Debug, PartialEq)]
    struct Pic(i64);
    impl MediaPicture for Pic {
        fn pixel_format(&self) -> PixelFormat { PixelFormat::Bgr24 }
        fn width(&self) -> u32 { 1 }
        fn height(&self) -> u32 { 1 }
        fn timestamp_us(&self) -> i64 { self.0 }
        fn to_canonical(&self) -> Result<CanonicalPicture, PlaybackError> {
            Ok(CanonicalPicture::black(1, 1))
        }
    }

    /// Replays a fixed list of steps and records the offsets it was given.
    struct Steps {
        steps:   Vec<Result<(usize, Option<i64>), &'static str>>,
        offsets: Vec<usize>,
    }

    impl Decoder for Steps {
        type Packet = Pkt;
        type Picture = Pic;
        fn width(&self) -> u32 { 1 }
        fn height(&self) -> u32 { 1 }
        fn pixel_format(&self) -> PixelFormat { PixelFormat::Bgr24 }
        fn decode_step(&mut self, _packet: &Pkt, offset: usize) -> Result<DecodeStep<Pic>, BoxError> {
            self.offsets.push(offset);
            let (consumed, ts) = self.steps.remove(0)?;
            Ok(DecodeStep { consumed, picture: ts.map(Pic) })
        }
    }

    fn decoder(steps: Vec<Result<(usize, Option<i64>), &'static str>>) -> PacketDecoder<Steps> {
        PacketDecoder { inner: Steps { steps, offsets: Vec::new() }, stream_index: 3 }
    }

    #[test]
    fn offset_advances_until_picture() {
        let mut d = decoder(vec![Ok((4, None)), Ok((4, None)), Ok((2, Some(40)))]);
        let pic = d.first_picture(&Pkt(10)).unwrap();
        assert_eq!(pic, Some(Pic(40)));
        assert_eq!(d.inner.offsets, vec![0, 4, 8]);
    }

    #[test]
    fn packet_without_picture_yields_none() {
        let mut d = decoder(vec![Ok((6, None)), Ok((4, None))]);
        assert_eq!(d.first_picture(&Pkt(10)).unwrap(), None);
    }

    #[test]
    fn picture_with_zero_consumed_is_allowed() {
        let mut d = decoder(vec![Ok((0, Some(7)))]);
        assert_eq!(d.first_picture(&Pkt(5)).unwrap(), Some(Pic(7)));
    }

    #[test]
    fn step_error_is_decode_error_with_offset() {
        let mut d = decoder(vec![Ok((3, None)), Err("bitstream")]);
        let err = d.first_picture(&Pkt(10)).unwrap_err();
        assert!(matches!(err, PlaybackError::DecodeError { stream_index: 3, offset: 3, .. }));
    }

    #[test]
    fn stalled_decoder_is_an_error() {
        let mut d = decoder(vec![Ok((0, None))]);
        assert!(matches!(d.first_picture(&Pkt(10)), Err(PlaybackError::DecodeError { .. })));
    }

    #[test]
    fn overrun_is_an_error() {
        let mut d = decoder(vec![Ok((11, None))]);
        assert!(matches!(d.first_picture(&Pkt(10)), Err(PlaybackError::DecodeError { .. })));
    }

    #[test]
    fn empty_packet_is_skipped() {
        let mut d = decoder(vec![]);
        assert_eq!(d.first_picture(&Pkt(0)).unwrap(), None);
    }
}
