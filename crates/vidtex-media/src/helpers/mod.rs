// crates/vidtex-media/src/helpers/mod.rs
//
// Internal helper modules for vidtex-media.
// Not re-exported from lib.rs; these are pixel-layout details of the
// backends and the frame exchange, not part of the host-facing API.

pub mod bgr;
