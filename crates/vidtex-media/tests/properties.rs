// crates/vidtex-media/tests/properties.rs
//
// Property tests for the controller: the state table holds for any command
// sequence, the playhead only moves forward while playing, and published
// frames never go back in time within a play session.

use proptest::prelude::*;

use vidtex_core::PlayState;
use vidtex_media::{
    ImageTextureHost, MemoryFs, SyntheticBackend, SyntheticClip, SyntheticFormat, TexturePlayer,
};

type Player = TexturePlayer<SyntheticBackend, ImageTextureHost>;

fn player(clip: &SyntheticClip) -> Player {
    let fs = MemoryFs::new().with_file("clip.vtx", clip.to_bytes());
    TexturePlayer::open(fs, "clip.vtx", SyntheticBackend::new()).unwrap()
}

#[derive(Debug, Clone)]
enum Command {
    Play,
    Pause,
    Stop,
    Toggle,
    Advance(f32),
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        2 => Just(Command::Play),
        1 => Just(Command::Pause),
        1 => Just(Command::Stop),
        1 => Just(Command::Toggle),
        5 => (-0.05f32..0.5).prop_map(Command::Advance),
    ]
}

/// Sorted frame times in ms, at least two frames.
fn frame_times() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..2_000, 2..40).prop_map(|mut v| {
        v.sort_unstable();
        v
    })
}

proptest! {
    #[test]
    fn state_follows_transition_table(
        times in frame_times(),
        commands in prop::collection::vec(command(), 1..60),
    ) {
        let clip = SyntheticClip::new(2, 2, SyntheticFormat::Rgb24).with_frames_at_ms(&times);
        let mut p = player(&clip);

        for cmd in commands {
            let before = p.state();
            match cmd {
                Command::Play => {
                    p.play().unwrap();
                    prop_assert_eq!(p.state(), PlayState::Playing);
                }
                Command::Pause => {
                    p.pause();
                    let expected = if before == PlayState::Playing { PlayState::Paused } else { before };
                    prop_assert_eq!(p.state(), expected);
                }
                Command::Stop => {
                    p.stop().unwrap();
                    prop_assert_eq!(p.state(), PlayState::Stopped);
                    prop_assert!(p.is_showing_placeholder());
                    prop_assert_eq!(p.playhead_us(), 0);
                }
                Command::Toggle => {
                    p.toggle().unwrap();
                    let expected = if before == PlayState::Playing { PlayState::Paused } else { PlayState::Playing };
                    prop_assert_eq!(p.state(), expected);
                }
                Command::Advance(dt) => {
                    let changed = p.advance(dt).unwrap();
                    let after = p.state();
                    if before == PlayState::Playing && after == PlayState::Stopped {
                        prop_assert!(changed, "implicit stop must report a change");
                    } else {
                        prop_assert_eq!(after, before);
                    }
                    if before != PlayState::Playing {
                        prop_assert!(!changed);
                    }
                }
            }
            prop_assert_eq!(p.selection().is_some(), p.state() != PlayState::Stopped);
        }
    }

    #[test]
    fn playhead_strictly_increases_while_playing(
        times in frame_times(),
        dts in prop::collection::vec(0.001f32..0.2, 1..80),
    ) {
        let clip = SyntheticClip::new(2, 2, SyntheticFormat::Bgr24).with_frames_at_ms(&times);
        let mut p = player(&clip);
        p.play().unwrap();

        for dt in dts {
            let before = p.playhead_us();
            p.advance(dt).unwrap();
            if p.state() != PlayState::Playing {
                break;
            }
            prop_assert!(p.playhead_us() > before);
        }
    }

    #[test]
    fn published_frames_never_go_back_in_time(
        times in frame_times(),
        dts in prop::collection::vec(0.0f32..0.3, 1..120),
    ) {
        let clip = SyntheticClip::new(2, 2, SyntheticFormat::Gray8).with_frames_at_ms(&times);
        let mut p = player(&clip);
        p.play().unwrap();

        let mut last_seen: Option<i64> = None;
        for dt in dts {
            let changed = p.advance(dt).unwrap();
            if p.state() != PlayState::Playing {
                break;
            }
            if changed {
                let ts = p.last_frame_time_us().unwrap();
                prop_assert!(ts <= p.playhead_us());
                if let Some(prev) = last_seen {
                    prop_assert!(ts >= prev, "published {} after {}", ts, prev);
                }
                last_seen = Some(ts);
            }
        }
    }
}
