// crates/vidtex-media/src/player.rs
//
// TexturePlayer: the playback controller.
//
// Owns the state machine (STOPPED / PLAYING / PAUSED), the playhead clock and
// the per-tick pacing that decides whether to pull another packet or wait.
// Everything runs inline on the host's render tick; there is no decode thread
// and no frame queue.
//
// Pacing, per tick while PLAYING:
//   playhead += dt; sleep_debt = max(0, sleep_debt - dt)
//   sleep_debt > 0            → keep showing the last frame
//   otherwise read packets until a video picture completes:
//     relative = ts - anchor; delta = relative_ms - playhead_ms
//     delta > 0               → future frame: sleep_debt = delta + tolerance,
//                               frame dropped, nothing published
//     delta <= 0              → convert, publish, report a change
//   end of stream / demux error → implicit stop, report a change
//
// The playhead and sleep debt accumulate in µs so sub-millisecond `dt` values
// still move the clock, but the due/future decision and the debt it sets are
// whole milliseconds, both sides truncated.

use std::path::Path;
use std::time::Duration;

use vidtex_core::helpers::time::{
    dt_seconds_to_micros, format_playhead, micros_to_duration, micros_to_millis, relative_micros,
    MICROS_PER_MILLI,
};
use vidtex_core::{CanonicalPicture, PlayState, PlaybackConfig, PlaybackError, StreamSelection};

use crate::backend::{MediaBackend, MediaPacket, MediaPicture, ReadOutcome};
use crate::convert::ColorStage;
use crate::decode::PacketDecoder;
use crate::demux::{open_container, read_packet};
use crate::exchange::{encode_bitmap, FrameExchange, ImageTextureHost, TextureHost};
use crate::source::{FileSystem, Source};

// ── Play session ──────────────────────────────────────────────────────────────

/// Everything opened by STOPPED → PLAYING and closed by stop.
struct Session<B: MediaBackend> {
    demuxer:   B::Demuxer,
    decoder:   PacketDecoder<B::Decoder>,
    color:     ColorStage<B::Converter>,
    selection: StreamSelection,
    anchor_us: i64,
}

/// What one read loop ended with.
enum Tick {
    EndOfStream,
    Future { delta_ms: i64 },
    Due { picture: CanonicalPicture, relative_us: i64 },
}

impl<B: MediaBackend> Session<B> {
    fn open(backend: &mut B, source: &mut Source) -> Result<Self, PlaybackError> {
        let stream = source.take_stream()?;
        let opened = open_container(backend, stream)?;
        let decoder = PacketDecoder::open(backend, &opened.demuxer, opened.video_index)?;
        let color = ColorStage::prepare(backend, decoder.inner())?;

        let selection = StreamSelection {
            stream_index: opened.video_index,
            width:        decoder.width(),
            height:       decoder.height(),
            pixel_format: decoder.pixel_format(),
        };
        Ok(Self { demuxer: opened.demuxer, decoder, color, selection, anchor_us: opened.anchor_us })
    }

    fn pump(&mut self, playhead_us: i64, retry_limit: u32) -> Result<Tick, PlaybackError> {
        loop {
            let packet = match read_packet(&mut self.demuxer, retry_limit) {
                Ok(ReadOutcome::Packet(p)) => p,
                Ok(ReadOutcome::EndOfStream) => return Ok(Tick::EndOfStream),
                Err(e) => {
                    log::warn!("{e}: {}; treating as end of stream", e.source);
                    return Ok(Tick::EndOfStream);
                }
            };
            if packet.stream_index() != self.selection.stream_index {
                continue;
            }
            let Some(picture) = self.decoder.first_picture(&packet)? else {
                continue;
            };

            let relative_us = relative_micros(picture.timestamp_us(), self.anchor_us);
            let delta_ms = micros_to_millis(relative_us).saturating_sub(micros_to_millis(playhead_us));
            if delta_ms > 0 {
                log::trace!(
                    "dropping frame {delta_ms}ms ahead (pts {:?}us, playhead {})",
                    packet.pts_us(), format_playhead(playhead_us),
                );
                return Ok(Tick::Future { delta_ms });
            }
            let canonical = self.color.canonicalize(&picture)?;
            return Ok(Tick::Due { picture: canonical, relative_us });
        }
    }
}

// ── TexturePlayer ─────────────────────────────────────────────────────────────

pub struct TexturePlayer<B: MediaBackend, H: TextureHost> {
    source:        Option<Source>,
    backend:       B,
    exchange:      FrameExchange<H>,
    config:        PlaybackConfig,
    /// Encoded stopped-state image, built once at construction.
    placeholder:   Vec<u8>,
    session:       Option<Session<B>>,
    state:         PlayState,
    playhead_us:   i64,
    sleep_debt_us: i64,
    last_frame_us: Option<i64>,
    disposed:      bool,
}

impl<B: MediaBackend> TexturePlayer<B, ImageTextureHost> {
    /// Player with the default CPU texture host and default config.
    pub fn open(fs: impl FileSystem + 'static, path: impl AsRef<Path>, backend: B) -> Result<Self, PlaybackError> {
        Self::new(fs, path, backend, ImageTextureHost::new(), PlaybackConfig::default())
    }
}

impl<B: MediaBackend, H: TextureHost> TexturePlayer<B, H> {
    /// Verify the source exists and the build can convert colorspaces, then
    /// publish the placeholder. Nothing is demuxed until the first `play()`.
    pub fn new(
        fs:      impl FileSystem + 'static,
        path:    impl AsRef<Path>,
        backend: B,
        host:    H,
        config:  PlaybackConfig,
    ) -> Result<Self, PlaybackError> {
        config.validate()?;
        if !backend.supports_colorspace_conversion() {
            return Err(PlaybackError::UnsupportedBuild);
        }
        let source = Source::open(Box::new(fs), path.as_ref())?;

        let placeholder = match &config.placeholder_asset {
            Some(asset) => source.read_sibling(asset)?,
            None => encode_bitmap(
                &CanonicalPicture::black(config.placeholder_width, config.placeholder_height),
                config.bitmap_format,
            )?,
        };

        let mut exchange = FrameExchange::new(host, config.bitmap_format);
        exchange.publish_placeholder(&placeholder)?;

        log::debug!(
            "player ready: {} via {} ({:?} frames, tolerance {}ms)",
            source.path().display(), backend.name(), config.bitmap_format, config.sleep_tolerance_ms,
        );

        Ok(Self {
            source: Some(source),
            backend,
            exchange,
            config,
            placeholder,
            session:       None,
            state:         PlayState::Stopped,
            playhead_us:   0,
            sleep_debt_us: 0,
            last_frame_us: None,
            disposed:      false,
        })
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// STOPPED → PLAYING opens demuxer, decoder and converter; PAUSED → PLAYING
    /// resumes where it left off; PLAYING is a no-op.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::Disposed);
        }
        match self.state {
            PlayState::Playing => Ok(()),
            PlayState::Paused => {
                self.state = PlayState::Playing;
                log::debug!("resume at {}", format_playhead(self.playhead_us));
                Ok(())
            }
            PlayState::Stopped => {
                let source = self.source.as_mut().ok_or(PlaybackError::Disposed)?;
                let session = Session::open(&mut self.backend, source)?;
                log::info!(
                    "play {}: stream #{} {}x{} {}{}",
                    source.path().display(),
                    session.selection.stream_index,
                    session.selection.width,
                    session.selection.height,
                    session.selection.pixel_format,
                    if session.color.is_converting() { " (converting)" } else { "" },
                );
                self.session = Some(session);
                self.state = PlayState::Playing;
                Ok(())
            }
        }
    }

    /// PLAYING → PAUSED. Playhead and sleep debt freeze; decoder state is left alone.
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            log::debug!("pause at {}", format_playhead(self.playhead_us));
        }
    }

    /// Pause when playing, play otherwise.
    pub fn toggle(&mut self) -> Result<(), PlaybackError> {
        if self.state == PlayState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Any → STOPPED: close the session, rewind the source, zero the clock and
    /// show the placeholder.
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::Disposed);
        }
        self.stop_inner()
    }

    /// Advance the clock by `dt_seconds` of host time. Returns whether the
    /// published frame changed and should be re-read.
    pub fn advance(&mut self, dt_seconds: f32) -> Result<bool, PlaybackError> {
        if self.disposed || self.state != PlayState::Playing {
            return Ok(false);
        }

        let dt_us = dt_seconds_to_micros(dt_seconds);
        self.playhead_us = self.playhead_us.saturating_add(dt_us);
        self.sleep_debt_us = (self.sleep_debt_us - dt_us).max(0);
        if self.sleep_debt_us > 0 {
            return Ok(false);
        }

        let retry_limit = self.config.transient_retry_limit;
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };

        match session.pump(self.playhead_us, retry_limit) {
            Ok(Tick::Due { picture, relative_us }) => Ok(self.publish(&picture, relative_us)),
            Ok(Tick::Future { delta_ms }) => {
                self.sleep_debt_us = delta_ms
                    .saturating_mul(MICROS_PER_MILLI)
                    .saturating_add(self.config.sleep_tolerance_us());
                Ok(false)
            }
            Ok(Tick::EndOfStream) => {
                log::info!("end of stream at {}", format_playhead(self.playhead_us));
                if let Err(e) = self.stop_inner() {
                    log::warn!("implicit stop at end of stream: {e}");
                }
                Ok(true)
            }
            Err(e) => {
                log::warn!("playback failed at {}: {e}", format_playhead(self.playhead_us));
                if let Err(stop_err) = self.stop_inner() {
                    log::warn!("implicit stop after failure also failed: {stop_err}");
                }
                Err(e)
            }
        }
    }

    /// Release every resource. Safe to call more than once; later calls to
    /// `play`/`stop` fail with `Disposed`, queries return their stopped values.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.session = None;
        self.source = None;
        self.exchange.clear();
        self.state = PlayState::Stopped;
        self.reset_clock();
        log::debug!("player disposed");
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Latest published texture: the placeholder while stopped, `None` after dispose.
    pub fn current_frame(&self) -> Option<&H::Texture> {
        if self.disposed {
            return None;
        }
        self.exchange.current()
    }

    pub fn is_showing_placeholder(&self) -> bool {
        !self.disposed && self.exchange.is_showing_placeholder()
    }

    pub fn playhead(&self) -> Duration {
        micros_to_duration(self.playhead_us)
    }

    pub fn playhead_ms(&self) -> i64 {
        micros_to_millis(self.playhead_us)
    }

    pub fn playhead_us(&self) -> i64 {
        self.playhead_us
    }

    pub fn sleep_debt(&self) -> Duration {
        micros_to_duration(self.sleep_debt_us)
    }

    /// Stream-relative time of the frame on screen, if a decoded one is.
    pub fn last_frame_time_us(&self) -> Option<i64> {
        self.last_frame_us
    }

    /// The chosen video stream; only while a session is open.
    pub fn selection(&self) -> Option<&StreamSelection> {
        self.session.as_ref().map(|s| &s.selection)
    }

    pub fn source_epoch(&self) -> Option<u64> {
        self.source.as_ref().map(Source::epoch)
    }

    pub fn frames_published(&self) -> u64 {
        self.exchange.published()
    }

    pub fn path(&self) -> Option<&Path> {
        self.source.as_ref().map(Source::path)
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn host(&self) -> &H {
        self.exchange.host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.exchange.host_mut()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn stop_inner(&mut self) -> Result<(), PlaybackError> {
        let was = self.state;
        self.session = None;
        self.state = PlayState::Stopped;
        self.reset_clock();
        let shown = self.exchange.publish_placeholder(&self.placeholder);

        // A failed reopen leaves no stream held; the next play() opens one.
        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.reopen() {
                log::warn!("could not reopen {} after stop: {e}", source.path().display());
            }
        }
        log::debug!("stop (was {was})");
        shown
    }

    fn reset_clock(&mut self) {
        self.playhead_us = 0;
        self.sleep_debt_us = 0;
        self.last_frame_us = None;
    }

    /// Hand a due picture to the host. Encode and host failures skip the frame.
    fn publish(&mut self, picture: &CanonicalPicture, relative_us: i64) -> bool {
        match self.exchange.publish(picture) {
            Ok(()) => {
                self.last_frame_us = Some(relative_us);
                log::debug!(
                    "frame {} at playhead {}",
                    format_playhead(relative_us), format_playhead(self.playhead_us),
                );
                true
            }
            Err(e) if e.is_frame_skip() => {
                log::warn!("skipping frame at {}: {e}", format_playhead(relative_us));
                false
            }
            Err(e) => {
                log::warn!("unexpected publish failure, frame skipped: {e}");
                false
            }
        }
    }
}

impl<B: MediaBackend, H: TextureHost> Drop for TexturePlayer<B, H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
