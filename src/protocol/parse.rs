//! Parsers for the multi-line `key: value` reply bodies.
//!
//! All parsers are total and order-preserving: they walk the reply
//! line by line, skip the terminating `OK` marker and anything they do
//! not recognize, and drop malformed blocks instead of emitting
//! partially populated records.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::protocol::types::{
    DirEntry, DirEntryKind, IdPos, Output, Playlist, Song, Stats, StatusValues,
};

/// Split a reply line into key and value.
fn key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(": ")
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Lines that never carry data: blank lines and the `OK` terminators.
fn is_marker(line: &str) -> bool {
    line.is_empty() || line == "OK" || line.starts_with("OK MPD ")
}

/// Parse every song block of a `playlistinfo` / `listplaylistinfo` /
/// `listallinfo` reply. Blocks are delimited by `file:` lines; a block
/// without a file path is dropped.
pub fn parse_songs(data: &str) -> Vec<Song> {
    let mut songs = Vec::new();
    let mut current: Option<Song> = None;

    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            warn!("unparseable song line: {}", line);
            continue;
        };
        if key == "file" {
            if let Some(song) = current.take() {
                songs.push(song);
            }
            current = Some(Song {
                file: value.to_string(),
                ..Song::default()
            });
            continue;
        }
        let Some(song) = current.as_mut() else {
            // Tag line before any file line; nothing to attach it to.
            continue;
        };
        match key {
            "Id" => song.id = value.parse().unwrap_or(0),
            "Pos" => song.pos = value.parse().unwrap_or(0),
            "Time" => song.duration = value.parse().ok(),
            "Title" => song.title = Some(value.to_string()),
            "Artist" => song.artist = Some(value.to_string()),
            "Album" => song.album = Some(value.to_string()),
            "AlbumArtist" => song.album_artist = Some(value.to_string()),
            "Composer" => song.composer = Some(value.to_string()),
            "Performer" => song.performer = Some(value.to_string()),
            "Genre" => song.genre = Some(value.to_string()),
            "Date" => song.date = Some(value.to_string()),
            "Track" => song.track = parse_leading_number(value),
            "Disc" => song.disc = parse_leading_number(value),
            "Last-Modified" => song.last_modified = parse_timestamp(value),
            _ => {}
        }
    }
    songs.extend(current);
    songs
}

/// Parse the first (usually only) song block of a reply, e.g.
/// `currentsong` or `playlistinfo <pos>`.
pub fn parse_song(data: &str) -> Option<Song> {
    parse_songs(data).into_iter().next()
}

/// Track and disc numbers may arrive as `5` or `5/12`.
fn parse_leading_number(value: &str) -> Option<u32> {
    value.split('/').next()?.parse().ok()
}

/// Parse a `status` reply.
pub fn parse_status(data: &str) -> StatusValues {
    let mut status = StatusValues {
        volume: -1,
        ..StatusValues::default()
    };
    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            continue;
        };
        match key {
            "volume" => status.volume = value.parse().unwrap_or(-1),
            "repeat" => status.repeat = value == "1",
            "random" => status.random = value == "1",
            "single" => status.single = value == "1",
            "consume" => status.consume = value == "1",
            "playlist" => status.playlist = value.parse().unwrap_or(0),
            "playlistlength" => status.playlist_length = value.parse().unwrap_or(0),
            "xfade" => status.crossfade = value.parse().unwrap_or(0),
            "state" => status.state = value.into(),
            "song" => status.song = value.parse().ok(),
            "songid" => status.song_id = value.parse().ok(),
            "time" => {
                if let Some((elapsed, total)) = value.split_once(':') {
                    status.time_elapsed = elapsed.parse().unwrap_or(0);
                    status.time_total = total.parse().unwrap_or(0);
                }
            }
            "bitrate" => status.bitrate = value.parse().unwrap_or(0),
            "audio" => {
                let mut parts = value.splitn(3, ':');
                status.sample_rate = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
                status.bits = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
                status.channels = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            }
            "updating_db" => status.updating_db = value.parse().ok(),
            "error" => status.error = Some(value.to_string()),
            _ => {}
        }
    }
    status
}

/// Parse a `stats` reply.
pub fn parse_stats(data: &str) -> Stats {
    let mut stats = Stats::default();
    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            continue;
        };
        match key {
            "artists" => stats.artists = value.parse().unwrap_or(0),
            "albums" => stats.albums = value.parse().unwrap_or(0),
            "songs" => stats.songs = value.parse().unwrap_or(0),
            "uptime" => stats.uptime = value.parse().unwrap_or(0),
            "playtime" => stats.playtime = value.parse().unwrap_or(0),
            "db_playtime" => stats.db_playtime = value.parse().unwrap_or(0),
            "db_update" => {
                stats.db_update = value
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));
            }
            _ => {}
        }
    }
    stats
}

/// Parse an `outputs` reply. Blocks are delimited by `outputid` lines;
/// a block without an id is dropped.
pub fn parse_outputs(data: &str) -> Vec<Output> {
    let mut outputs = Vec::new();
    let mut current: Option<Output> = None;
    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            continue;
        };
        match key {
            "outputid" => {
                outputs.extend(current.take());
                current = value.parse().ok().map(|id| Output {
                    id,
                    ..Output::default()
                });
            }
            "outputname" => {
                if let Some(output) = current.as_mut() {
                    output.name = value.to_string();
                }
            }
            "outputenabled" => {
                if let Some(output) = current.as_mut() {
                    output.enabled = value == "1";
                }
            }
            _ => {}
        }
    }
    outputs.extend(current);
    outputs
}

/// Parse a `listplaylists` reply.
pub fn parse_playlists(data: &str) -> Vec<Playlist> {
    let mut playlists = Vec::new();
    let mut current: Option<Playlist> = None;
    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            continue;
        };
        match key {
            "playlist" => {
                playlists.extend(current.take());
                current = Some(Playlist {
                    name: value.to_string(),
                    last_modified: None,
                });
            }
            "Last-Modified" => {
                if let Some(playlist) = current.as_mut() {
                    playlist.last_modified = parse_timestamp(value);
                }
            }
            _ => {}
        }
    }
    playlists.extend(current);
    playlists
}

/// Parse a `plchangesposid` reply into `(position, id)` pairs in
/// server order. A `cpos` line without a following `Id` is dropped.
pub fn parse_changes(data: &str) -> Vec<IdPos> {
    let mut changes = Vec::new();
    let mut pending_pos: Option<u32> = None;
    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            continue;
        };
        match key {
            "cpos" => pending_pos = value.parse().ok(),
            "Id" => {
                if let (Some(pos), Ok(id)) = (pending_pos.take(), value.parse()) {
                    changes.push(IdPos { pos, id });
                }
            }
            _ => {}
        }
    }
    changes
}

/// Parse a `listall` reply into directory entries in server order.
pub fn parse_dir_entries(data: &str) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    for line in data.lines() {
        if is_marker(line) {
            continue;
        }
        let Some((key, value)) = key_value(line) else {
            warn!("unparseable listing line: {}", line);
            continue;
        };
        let kind = match key {
            "directory" => DirEntryKind::Directory,
            "file" => DirEntryKind::File,
            "playlist" => DirEntryKind::Playlist,
            _ => continue,
        };
        entries.push(DirEntry {
            kind,
            path: value.to_string(),
        });
    }
    entries
}

/// Parse a `urlhandlers` reply.
pub fn parse_url_handlers(data: &str) -> Vec<String> {
    data.lines()
        .filter_map(key_value)
        .filter(|(key, _)| *key == "handler")
        .map(|(_, value)| value.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::PlayState;

    const QUEUE_REPLY: &str = "file: albums/one.flac\n\
        Last-Modified: 2011-09-18T16:09:50Z\n\
        Time: 202\n\
        Artist: First Artist\n\
        Album: First Album\n\
        Title: Opening\n\
        Track: 1\n\
        Pos: 0\n\
        Id: 17\n\
        file: albums/two.flac\n\
        Time: 315\n\
        Artist: Second Artist\n\
        Title: Closing\n\
        Track: 2/12\n\
        Pos: 1\n\
        Id: 18\n\
        OK\n";

    #[test]
    fn songs_parse_in_order() {
        let songs = parse_songs(QUEUE_REPLY);
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].id, 17);
        assert_eq!(songs[0].pos, 0);
        assert_eq!(songs[0].file, "albums/one.flac");
        assert_eq!(songs[0].title.as_deref(), Some("Opening"));
        assert_eq!(songs[0].duration, Some(202));
        assert!(songs[0].last_modified.is_some());
        assert_eq!(songs[1].id, 18);
        assert_eq!(songs[1].track, Some(2));
        assert!(!songs[1].is_placeholder());
    }

    #[test]
    fn song_block_without_file_is_dropped() {
        let songs = parse_songs("Title: Orphan\nArtist: Nobody\nOK\n");
        assert!(songs.is_empty());
    }

    #[test]
    fn first_song_only() {
        let song = parse_song(QUEUE_REPLY).unwrap();
        assert_eq!(song.id, 17);
        assert!(parse_song("OK\n").is_none());
    }

    #[test]
    fn status_exposes_queue_version() {
        let status = parse_status(
            "volume: 50\nrepeat: 0\nrandom: 1\nsingle: 0\nconsume: 0\n\
             playlist: 7\nplaylistlength: 12\nxfade: 0\nstate: play\n\
             song: 3\nsongid: 20\ntime: 61:202\nbitrate: 928\n\
             audio: 44100:16:2\nOK\n",
        );
        assert_eq!(status.playlist, 7);
        assert_eq!(status.playlist_length, 12);
        assert_eq!(status.state, PlayState::Playing);
        assert!(status.random);
        assert!(!status.repeat);
        assert_eq!(status.song, Some(3));
        assert_eq!(status.song_id, Some(20));
        assert_eq!((status.time_elapsed, status.time_total), (61, 202));
        assert_eq!(
            (status.sample_rate, status.bits, status.channels),
            (44100, 16, 2)
        );
    }

    #[test]
    fn status_without_mixer_reports_no_volume() {
        let status = parse_status("state: stop\nplaylist: 2\nplaylistlength: 0\nOK\n");
        assert_eq!(status.volume, -1);
        assert_eq!(status.song, None);
        assert_eq!(status.error, None);
    }

    #[test]
    fn stats_parse() {
        let stats = parse_stats(
            "artists: 12\nalbums: 34\nsongs: 567\nuptime: 8900\n\
             playtime: 1234\ndb_playtime: 99999\ndb_update: 1316362190\nOK\n",
        );
        assert_eq!(stats.songs, 567);
        assert_eq!(stats.db_playtime, 99999);
        assert_eq!(
            stats.db_update.unwrap().timestamp(),
            1316362190,
        );
    }

    #[test]
    fn outputs_parse() {
        let outputs = parse_outputs(
            "outputid: 0\noutputname: ALSA\noutputenabled: 1\n\
             outputid: 1\noutputname: HTTP stream\noutputenabled: 0\nOK\n",
        );
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].enabled);
        assert_eq!(outputs[1].name, "HTTP stream");
        assert!(!outputs[1].enabled);
    }

    #[test]
    fn playlists_parse() {
        let playlists = parse_playlists(
            "playlist: morning\nLast-Modified: 2012-01-15T08:00:00Z\n\
             playlist: evening\nOK\n",
        );
        assert_eq!(playlists.len(), 2);
        assert_eq!(playlists[0].name, "morning");
        assert!(playlists[0].last_modified.is_some());
        assert!(playlists[1].last_modified.is_none());
    }

    #[test]
    fn changes_parse_pairs() {
        let changes = parse_changes("cpos: 2\nId: 120\ncpos: 3\nId: 119\nOK\n");
        assert_eq!(
            changes,
            vec![IdPos { pos: 2, id: 120 }, IdPos { pos: 3, id: 119 }]
        );
    }

    #[test]
    fn dangling_cpos_is_dropped() {
        let changes = parse_changes("cpos: 2\nOK\n");
        assert!(changes.is_empty());
    }

    #[test]
    fn dir_entries_keep_server_order() {
        let entries = parse_dir_entries(
            "directory: Albums\nfile: Albums/one.flac\nplaylist: favourites\nOK\n",
        );
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, DirEntryKind::Directory);
        assert_eq!(entries[1].path, "Albums/one.flac");
        assert_eq!(entries[2].kind, DirEntryKind::Playlist);
    }

    #[test]
    fn url_handlers_parse() {
        let handlers = parse_url_handlers("handler: http://\nhandler: mms://\nOK\n");
        assert_eq!(handlers, vec!["http://", "mms://"]);
    }
}
