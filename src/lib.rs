//! mpd-control - MPD protocol engine
//!
//! Client-side engine for the Music Player Daemon control protocol.
//!
//! This library provides:
//! - A command dispatcher over TCP or a local socket, with reconnect
//!   and password handshake
//! - A dedicated idle connection translating server-side change
//!   notifications into re-fetches
//! - Typed records parsed from the line protocol (songs, status,
//!   stats, outputs, playlists, directory listings)
//! - Incremental play-queue reconciliation against the server's
//!   positional delta
//! - A broadcast event bus carrying every state change to consumers

pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
