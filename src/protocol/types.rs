//! Typed records decoded from MPD replies.
//!
//! Every record has a total, order-preserving parse from raw text (see
//! `parse`); a malformed block is dropped rather than partially
//! populated, so a constructed record is always coherent.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol version packed from the `OK MPD maj.min.patch` greeting.
///
/// Stored as `(major << 16) | (minor << 8) | patch`, each component
/// masked to 8 bits. Used to gate feature availability; `0` means the
/// version is not yet known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self(((major as u32) << 16) | ((minor as u32) << 8) | patch as u32)
    }

    /// Decode the version from a greeting line such as `OK MPD 0.19.0`.
    pub fn from_greeting(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("OK MPD ")?;
        let mut parts = rest.trim_end().splitn(3, '.');
        let major: u8 = parts.next()?.parse().ok()?;
        let minor: u8 = parts.next()?.parse().ok()?;
        let patch: u8 = parts.next()?.parse().ok()?;
        Some(Self::new(major, minor, patch))
    }

    pub fn major(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub fn minor(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    pub fn patch(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn is_known(self) -> bool {
        self.0 != 0
    }

    /// Feature gate: true when the server speaks at least the given
    /// protocol revision.
    pub fn at_least(self, major: u8, minor: u8, patch: u8) -> bool {
        self >= Self::new(major, minor, patch)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// A single track, either a queue slot or a library entry.
///
/// A song with only `id` set is a placeholder: the slot's content is
/// unchanged and the consumer already holds the full record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Queue id assigned by the server; `0` outside the queue.
    pub id: u32,
    /// Queue position; `0` outside the queue.
    pub pos: u32,
    pub file: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    pub performer: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    /// Duration in whole seconds (the `Time` field).
    pub duration: Option<u32>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Song {
    /// Placeholder carrying just the queue id.
    pub fn placeholder(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.file.is_empty()
    }
}

/// Playback state reported by `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl From<&str> for PlayState {
    fn from(s: &str) -> Self {
        match s {
            "play" => Self::Playing,
            "pause" => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// Decoded `status` reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusValues {
    /// Volume 0-100, or -1 when the server has no mixer.
    pub volume: i8,
    pub repeat: bool,
    pub random: bool,
    pub single: bool,
    pub consume: bool,
    /// Monotonic play-queue version; drives delta requests.
    pub playlist: u32,
    pub playlist_length: u32,
    pub crossfade: u32,
    pub state: PlayState,
    /// Queue position of the current song, if any.
    pub song: Option<u32>,
    /// Queue id of the current song, if any.
    pub song_id: Option<u32>,
    /// Elapsed seconds within the current song.
    pub time_elapsed: u32,
    /// Total seconds of the current song.
    pub time_total: u32,
    pub bitrate: u32,
    /// Decoded sample rate / bits / channels of the `audio` field.
    pub sample_rate: u32,
    pub bits: u8,
    pub channels: u8,
    /// Job id of a database update in progress, if any.
    pub updating_db: Option<u32>,
    pub error: Option<String>,
}

/// Decoded `stats` reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub artists: u32,
    pub albums: u32,
    pub songs: u32,
    /// Daemon uptime in seconds.
    pub uptime: u64,
    /// Accumulated play time in seconds.
    pub playtime: u64,
    /// Total duration of the database in seconds.
    pub db_playtime: u64,
    /// Last database update.
    pub db_update: Option<DateTime<Utc>>,
}

/// One audio output device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
}

/// One stored playlist from `listplaylists`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Kind of a `listall` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirEntryKind {
    Directory,
    File,
    Playlist,
}

/// One entry of the server's music directory listing, in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntry {
    pub kind: DirEntryKind,
    pub path: String,
}

/// One `(position, id)` pair of a `plchangesposid` delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPos {
    pub pos: u32,
    pub id: u32,
}
