//! Typed change events published by the protocol engine.
//!
//! Consumers (queue models, library views, status displays) never read
//! engine state directly; they observe it through these events, which
//! carry the already-parsed records.

use serde::{Deserialize, Serialize};

use crate::protocol::types::{
    DirEntry, Output, Playlist, ProtocolVersion, Song, Stats, StatusValues,
};

/// All events that can be published on the event bus.
///
/// Events are organized into categories:
/// - Connectivity: connection and protocol-version changes
/// - State: status, stats, queue and current-song updates
/// - Collections: outputs, stored playlists, library and directory data
/// - Mutations: acknowledgements of queue/playlist edits
/// - Errors: cleaned protocol error messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum MpdEvent {
    // =========================================================================
    // Connectivity
    // =========================================================================
    /// Connection established or lost (also the outcome of `configure`)
    ConnectivityChanged { connected: bool },

    /// The server greeting announced a different protocol version
    VersionChanged { version: ProtocolVersion },

    // =========================================================================
    // State
    // =========================================================================
    /// Parsed `status` reply
    StatusUpdated { status: StatusValues },

    /// Parsed `stats` reply
    StatsUpdated { stats: Stats },

    /// Coherent replacement batch for the play queue. Placeholder songs
    /// (id only) mark slots whose content the consumer already holds.
    QueueUpdated { songs: Vec<Song> },

    /// Parsed `currentsong` reply
    CurrentSongUpdated { song: Song },

    /// Current replay-gain mode, empty when it could not be determined
    ReplayGainMode { mode: String },

    // =========================================================================
    // Collections
    // =========================================================================
    /// Parsed `outputs` reply
    OutputsUpdated { outputs: Vec<Output> },

    /// Parsed `listplaylists` reply
    PlaylistsRetrieved { playlists: Vec<Playlist> },

    /// Contents of one stored playlist
    PlaylistInfoRetrieved { name: String, songs: Vec<Song> },

    /// Full library listing (`listallinfo`)
    LibraryUpdated { songs: Vec<Song> },

    /// Full directory listing (`listall`)
    DirViewUpdated { entries: Vec<DirEntry> },

    /// Supported URL scheme handlers
    UrlHandlers { handlers: Vec<String> },

    /// A library fetch is starting / has finished
    UpdatingLibrary,
    UpdatedLibrary,

    /// A directory-listing fetch is starting / has finished
    UpdatingFileList,
    UpdatedFileList,

    // =========================================================================
    // Server-side changes
    // =========================================================================
    /// The server finished a database rescan
    DatabaseUpdated,

    /// The set of stored playlists changed on the server
    StoredPlaylistsChanged,

    // =========================================================================
    // Mutation acknowledgements
    // =========================================================================
    /// Files were queued successfully
    Added { files: Vec<String> },

    /// A stored playlist was loaded into the queue
    PlaylistLoaded { name: String },

    /// A stored playlist was renamed
    PlaylistRenamed { from: String, to: String },

    /// Positions were removed from a stored playlist
    RemovedFromPlaylist { name: String, positions: Vec<u32> },

    /// Items were repositioned inside a stored playlist
    MovedInPlaylist {
        name: String,
        items: Vec<u32>,
        pos: u32,
    },

    // =========================================================================
    // Errors
    // =========================================================================
    /// Human-readable error, envelope already stripped
    Error { message: String },
}

impl MpdEvent {
    /// Get the event type as a string (for logging/filtering)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectivityChanged { .. } => "connectivity_changed",
            Self::VersionChanged { .. } => "version_changed",
            Self::StatusUpdated { .. } => "status_updated",
            Self::StatsUpdated { .. } => "stats_updated",
            Self::QueueUpdated { .. } => "queue_updated",
            Self::CurrentSongUpdated { .. } => "current_song_updated",
            Self::ReplayGainMode { .. } => "replay_gain_mode",
            Self::OutputsUpdated { .. } => "outputs_updated",
            Self::PlaylistsRetrieved { .. } => "playlists_retrieved",
            Self::PlaylistInfoRetrieved { .. } => "playlist_info_retrieved",
            Self::LibraryUpdated { .. } => "library_updated",
            Self::DirViewUpdated { .. } => "dir_view_updated",
            Self::UrlHandlers { .. } => "url_handlers",
            Self::UpdatingLibrary => "updating_library",
            Self::UpdatedLibrary => "updated_library",
            Self::UpdatingFileList => "updating_file_list",
            Self::UpdatedFileList => "updated_file_list",
            Self::DatabaseUpdated => "database_updated",
            Self::StoredPlaylistsChanged => "stored_playlists_changed",
            Self::Added { .. } => "added",
            Self::PlaylistLoaded { .. } => "playlist_loaded",
            Self::PlaylistRenamed { .. } => "playlist_renamed",
            Self::RemovedFromPlaylist { .. } => "removed_from_playlist",
            Self::MovedInPlaylist { .. } => "moved_in_playlist",
            Self::Error { .. } => "error",
        }
    }

    /// Check if this is a connectivity-related event
    pub fn is_connectivity_event(&self) -> bool {
        matches!(
            self,
            Self::ConnectivityChanged { .. } | Self::VersionChanged { .. }
        )
    }

    /// Check if this event carries play-queue data
    pub fn is_queue_event(&self) -> bool {
        matches!(
            self,
            Self::QueueUpdated { .. } | Self::CurrentSongUpdated { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = MpdEvent::QueueUpdated { songs: Vec::new() };
        assert_eq!(event.event_type(), "queue_updated");
        assert!(event.is_queue_event());
        assert!(!event.is_connectivity_event());
    }

    #[test]
    fn test_event_serialization() {
        let event = MpdEvent::VersionChanged {
            version: ProtocolVersion::new(0, 19, 0),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("VersionChanged"));
    }

    #[test]
    fn test_error_event_round_trip() {
        let event = MpdEvent::Error {
            message: "No such playlist".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: MpdEvent = serde_json::from_str(&json).unwrap();
        match back {
            MpdEvent::Error { message } => assert_eq!(message, "No such playlist"),
            other => panic!("wrong event: {:?}", other),
        }
    }
}
