// crates/vidtex-core/src/helpers/mod.rs
//
// Small pure helpers shared by vidtex-media and hosts.

pub mod time;
