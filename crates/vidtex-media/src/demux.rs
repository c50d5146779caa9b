// crates/vidtex-media/src/demux.rs
//
// Demuxer stage: open the container over the source stream, pick the first
// video stream, and read packets with the transient-error retry policy.

use std::path::PathBuf;

use vidtex_core::{PlaybackError, StreamInfo, StreamKind};

use crate::backend::{DemuxError, Demuxer, MediaBackend, ReadOutcome};
use crate::source::SourceStream;

/// A freshly opened container with its video stream chosen.
pub struct OpenedContainer<D> {
    pub demuxer:     D,
    pub video_index: usize,
    /// First-timestamp anchor in µs. Containers without a declared start
    /// time anchor at 0.
    pub anchor_us:   i64,
}

pub fn open_container<B: MediaBackend>(
    backend: &mut B,
    stream:  SourceStream,
) -> Result<OpenedContainer<B::Demuxer>, PlaybackError> {
    let path: PathBuf = stream.path().to_path_buf();

    let demuxer = backend
        .open_demuxer(stream)
        .map_err(|source| PlaybackError::ContainerOpenFailed { path: path.clone(), source })?;

    let video_index = first_video_stream(demuxer.streams())
        .ok_or_else(|| PlaybackError::NoVideoStream { path: path.clone() })?;

    let anchor_us = match demuxer.start_time_us() {
        Some(t) => t,
        None => {
            log::debug!("{} declares no start time, anchoring at 0", path.display());
            0
        }
    };

    log::debug!(
        "opened {} via {}: {} streams, video #{video_index}, anchor {anchor_us}us",
        path.display(), backend.name(), demuxer.streams().len(),
    );
    Ok(OpenedContainer { demuxer, video_index, anchor_us })
}

/// Index of the first stream whose codec type is video.
pub fn first_video_stream(streams: &[StreamInfo]) -> Option<usize> {
    streams.iter().find(|s| s.kind == StreamKind::Video).map(|s| s.index)
}

/// Read the next packet, retrying up to `retry_limit` transient errors.
///
/// A fatal error, or a transient one past the limit, is returned as-is; the
/// controller treats it exactly like end-of-stream.
pub fn read_packet<D: Demuxer>(
    demuxer:     &mut D,
    retry_limit: u32,
) -> Result<ReadOutcome<D::Packet>, DemuxError> {
    let mut retries = 0;
    loop {
        match demuxer.read_next() {
            Err(e) if e.transient && retries < retry_limit => {
                retries += 1;
                log::warn!("transient demux error, retry {retries}/{retry_limit}: {}", e.source);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        streams: Vec<StreamInfo>,
        script:  Vec<Result<ReadOutcome<FakePacket>, DemuxError>>,
    }

    #[derive(Debug)]
    struct FakePacket;

    impl crate::backend::MediaPacket for FakePacket {
        fn stream_index(&self) -> usize { 0 }
        fn size(&self) -> usize { 1 }
        fn pts_us(&self) -> Option<i64> { None }
    }

    impl Demuxer for Scripted {
        type Packet = FakePacket;
        fn streams(&self) -> &[StreamInfo] { &self.streams }
        fn start_time_us(&self) -> Option<i64> { None }
        fn read_next(&mut self) -> Result<ReadOutcome<FakePacket>, DemuxError> {
            if self.script.is_empty() {
                return Ok(ReadOutcome::EndOfStream);
            }
            self.script.remove(0)
        }
    }

    fn scripted(script: Vec<Result<ReadOutcome<FakePacket>, DemuxError>>) -> Scripted {
        Scripted { streams: Vec::new(), script }
    }

    #[test]
    fn picks_first_video_stream() {
        let streams = vec![
            StreamInfo { index: 0, kind: StreamKind::Audio },
            StreamInfo { index: 1, kind: StreamKind::Video },
            StreamInfo { index: 2, kind: StreamKind::Video },
        ];
        assert_eq!(first_video_stream(&streams), Some(1));
        assert_eq!(first_video_stream(&streams[..1]), None);
    }

    #[test]
    fn transient_errors_are_retried_within_limit() {
        let mut d = scripted(vec![
            Err(DemuxError::transient("again")),
            Err(DemuxError::transient("again")),
            Ok(ReadOutcome::Packet(FakePacket)),
        ]);
        assert!(matches!(read_packet(&mut d, 2), Ok(ReadOutcome::Packet(_))));
    }

    #[test]
    fn transient_errors_past_limit_surface() {
        let mut d = scripted(vec![
            Err(DemuxError::transient("again")),
            Ok(ReadOutcome::Packet(FakePacket)),
        ]);
        let err = read_packet(&mut d, 0).unwrap_err();
        assert!(err.transient);
    }

    #[test]
    fn fatal_errors_are_never_retried() {
        let mut d = scripted(vec![
            Err(DemuxError::fatal("corrupt")),
            Ok(ReadOutcome::Packet(FakePacket)),
        ]);
        assert!(read_packet(&mut d, 5).is_err());
    }
}
