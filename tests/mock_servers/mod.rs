//! Mock servers for protocol integration testing
//!
//! The mock MPD speaks the real line protocol on a local TCP port,
//! allowing full integration testing without a running daemon.

pub mod mpd;

pub use mpd::{MockMpdServer, MockSong};
