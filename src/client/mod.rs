//! MPD command dispatcher
//!
//! `MpdClient` owns the two protocol connections: the command socket,
//! serialized behind a mutex so requests and replies stay in strict
//! half-duplex turns, and the idle socket, handed to a background
//! notification loop. All state changes reach consumers as typed
//! events on the bus; nothing here is fatal — failures degrade to a
//! retry, a fallback or a reported event.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{MpdEvent, SharedBus};
use crate::config::Config;
use crate::error::{MpdError, Result};
use crate::protocol::encode_name;
use crate::protocol::parse::{
    parse_changes, parse_dir_entries, parse_outputs, parse_playlists, parse_song, parse_songs,
    parse_stats, parse_status, parse_url_handlers,
};
use crate::protocol::reply::Response;
use crate::protocol::types::{
    DirEntry, Output, Playlist, ProtocolVersion, Song, Stats, StatusValues,
};

pub mod idle;
pub mod queue;
pub mod socket;

use queue::{QueueMirror, SlotSource};
use socket::{MpdSocket, SocketState};

/// Connection settings; identity comparison on this triple (plus the
/// current connection state) decides whether a reconnect is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDetails {
    /// Host name, or a Unix socket path starting with `/`.
    pub host: String,
    /// TCP port; not part of the identity for socket paths.
    pub port: u16,
    pub password: Option<String>,
}

impl ConnectionDetails {
    pub fn is_local(&self) -> bool {
        self.host.starts_with('/')
    }

    pub fn endpoint(&self) -> String {
        if self.is_local() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl From<&Config> for ConnectionDetails {
    fn from(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            password: config.password.clone(),
        }
    }
}

/// Dispatcher connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Blank,
    Connecting,
    Connected,
    Disconnected,
}

/// Internal state
#[derive(Default)]
struct ClientState {
    details: Option<ConnectionDetails>,
    connection: ConnectionState,
    version: ProtocolVersion,
    queue: QueueMirror,
    /// Whether an idle loop task currently owns an idle socket.
    idle_running: bool,
}

/// The MPD protocol engine.
///
/// Cheap to clone; clones share the same connections and state. The
/// host application constructs one and passes it to whoever issues
/// commands.
#[derive(Clone)]
pub struct MpdClient {
    state: Arc<RwLock<ClientState>>,
    command: Arc<Mutex<MpdSocket>>,
    bus: SharedBus,
    /// Wrapped in RwLock to allow creating a fresh token on reconnect
    shutdown: Arc<RwLock<CancellationToken>>,
}

impl MpdClient {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            state: Arc::new(RwLock::new(ClientState::default())),
            command: Arc::new(Mutex::new(MpdSocket::new())),
            bus,
            shutdown: Arc::new(RwLock::new(CancellationToken::new())),
        }
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    /// Protocol version from the server greeting; unknown before the
    /// first successful connect.
    pub async fn version(&self) -> ProtocolVersion {
        self.state.read().await.version
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Adopt connection details, reconnecting when they differ from
    /// the current configuration or the connection is down.
    ///
    /// Emits `ConnectivityChanged` with the outcome; returns whether
    /// the connection is established.
    pub async fn configure(&self, details: ConnectionDetails) -> bool {
        let (unchanged, was_connected) = {
            let st = self.state.read().await;
            let connected = st.connection == ConnectionState::Connected;
            let same = st.details.as_ref().is_some_and(|cur| {
                cur.host == details.host
                    && (details.is_local() || cur.port == details.port)
                    && cur.password == details.password
            });
            (same && connected, connected)
        };
        if unchanged {
            return true;
        }

        debug!(endpoint = %details.endpoint(), "adopting connection details");
        self.disconnect_all().await;
        self.state.write().await.details = Some(details);

        if self.connect_to_mpd().await {
            if !was_connected {
                self.bus
                    .publish(MpdEvent::ConnectivityChanged { connected: true });
            }
            true
        } else {
            self.bus
                .publish(MpdEvent::ConnectivityChanged { connected: false });
            false
        }
    }

    /// Tear down both connections.
    pub async fn disconnect_all(&self) {
        self.shutdown.read().await.cancel();
        self.command.lock().await.disconnect();
        let mut st = self.state.write().await;
        st.connection = ConnectionState::Disconnected;
        st.idle_running = false;
    }

    /// Establish (or re-establish) the command and idle connections.
    ///
    /// Returned as a boxed, concretely-`Send` future rather than an opaque
    /// `async fn`. `connect_to_mpd` spawns the idle loop, which calls back
    /// into this method (directly via `on_connection_lost` and indirectly via
    /// the command re-fetches in `dispatch_changes`). That makes the `Send`
    /// auto-trait inference self-referential through `tokio::spawn`; a concrete
    /// return type gives the solver a fixed point and breaks the cycle.
    fn connect_to_mpd(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let details = {
                let mut st = self.state.write().await;
                if st.connection == ConnectionState::Connected {
                    return true;
                }
                let Some(details) = st.details.clone() else {
                    debug!("no connection details supplied");
                    st.connection = ConnectionState::Disconnected;
                    return false;
                };
                st.connection = ConnectionState::Connecting;
                details
            };

            {
                let mut sock = self.command.lock().await;
                if sock.state() != SocketState::Connected {
                    if let Err(e) = self.connect_socket(&mut sock, &details, false).await {
                        warn!("command connection failed: {}", e);
                        sock.disconnect();
                        self.state.write().await.connection = ConnectionState::Disconnected;
                        return false;
                    }
                    // A fresh command connection invalidates the mirror.
                    self.state.write().await.queue.reset();
                }
            }

            let idle_needed = !self.state.read().await.idle_running;
            if idle_needed {
                let mut idle_sock = MpdSocket::new();
                if let Err(e) = self.connect_socket(&mut idle_sock, &details, true).await {
                    warn!("idle connection failed: {}", e);
                    self.command.lock().await.disconnect();
                    self.state.write().await.connection = ConnectionState::Disconnected;
                    return false;
                }
                let token = {
                    let mut guard = self.shutdown.write().await;
                    *guard = CancellationToken::new();
                    guard.clone()
                };
                self.state.write().await.idle_running = true;
                tokio::spawn(idle::run_idle_loop(self.clone(), idle_sock, token));
            }

            self.state.write().await.connection = ConnectionState::Connected;
            true
        })
    }

    /// Connect one socket and run the greeting / password handshake.
    /// For the idle role, the long poll is started before returning.
    async fn connect_socket(
        &self,
        socket: &mut MpdSocket,
        details: &ConnectionDetails,
        enable_idle: bool,
    ) -> Result<()> {
        debug!(idle = enable_idle, endpoint = %details.endpoint(), "connecting");
        socket.connect(&details.host, details.port).await?;

        let raw = socket.read_raw().await;
        if socket.state() != SocketState::Connected {
            return Err(MpdError::ConnectionLost);
        }
        let greeting = String::from_utf8_lossy(&raw);
        let greeting = greeting.trim_end();
        if let Some(version) = ProtocolVersion::from_greeting(greeting) {
            let changed = {
                let mut st = self.state.write().await;
                let changed = st.version != version;
                st.version = version;
                changed
            };
            if changed {
                info!(%version, "server protocol version");
                self.bus.publish(MpdEvent::VersionChanged { version });
            }
        } else {
            warn!("unrecognized greeting: {:?}", greeting);
        }

        if let Some(password) = &details.password {
            debug!("setting password");
            socket
                .write_command(format!("password {}", password).as_bytes())
                .await?;
            if !socket.read_reply().await.ok {
                debug!("password rejected");
                socket.disconnect();
                return Err(MpdError::AuthRejected);
            }
            debug!("password accepted");
        }

        if enable_idle {
            socket.write_command(b"idle").await?;
        }
        Ok(())
    }

    /// React to a socket moving to `Closing`: tear everything down and
    /// retry once; a failed retry is reported as lost connectivity and
    /// retried lazily on the next command.
    pub(crate) async fn on_connection_lost(&self) {
        let was_connected =
            { self.state.read().await.connection == ConnectionState::Connected };
        debug!("connection lost, tearing down");
        self.disconnect_all().await;
        if was_connected && !self.connect_to_mpd().await {
            self.bus
                .publish(MpdEvent::ConnectivityChanged { connected: false });
        }
    }

    // =========================================================================
    // Command plumbing
    // =========================================================================

    /// Send one command (or command list) and block for the reply.
    ///
    /// Ensures the connection first. On an unsuccessful reply and
    /// `report_errors`, an `Error` event with the cleaned message is
    /// published.
    pub async fn send_command(&self, command: &str, report_errors: bool) -> Response {
        if !self.connect_to_mpd().await {
            return Response::failed();
        }

        let (response, closing) = {
            let mut sock = self.command.lock().await;
            let response = Self::exchange(&mut sock, command).await;
            (response, sock.state() == SocketState::Closing)
        };
        if closing {
            self.on_connection_lost().await;
        }

        if !response.ok {
            debug!(command, "command failed");
            if report_errors {
                self.report_error(command, &response).await;
            }
        }
        response
    }

    /// One request/reply turn on an already-locked socket.
    async fn exchange(sock: &mut MpdSocket, command: &str) -> Response {
        debug!(command, "sending");
        if sock.write_command(command.as_bytes()).await.is_err() {
            return Response::failed();
        }
        sock.read_reply().await
    }

    async fn report_error(&self, command: &str, response: &Response) {
        let is_add =
            command.starts_with("add ") || command.starts_with("command_list_begin\nadd ");
        let message = if is_add && command.contains("\"file:///") {
            let local = {
                let st = self.state.read().await;
                st.details.as_ref().is_some_and(ConnectionDetails::is_local)
            };
            if local && response.data == "Permission denied" {
                "Failed to load. Please check user \"mpd\" has read permission.".to_string()
            } else if !local && response.data == "Access denied" {
                "Failed to load. MPD can only play local files if connected via a local socket."
                    .to_string()
            } else {
                response.data.clone()
            }
        } else {
            response.data.clone()
        };
        self.bus.publish(MpdEvent::Error { message });
    }

    /// Map an unsuccessful response to the error taxonomy.
    async fn command_failed(&self, response: Response) -> MpdError {
        if !response.data.is_empty() {
            return MpdError::Protocol(response.data);
        }
        if self.state.read().await.details.is_none() {
            MpdError::NotConfigured
        } else {
            MpdError::ConnectionLost
        }
    }

    /// Send a command whose reply carries no payload.
    async fn simple_command(&self, command: &str) -> Result<()> {
        let response = self.send_command(command, true).await;
        if response.ok {
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    // =========================================================================
    // Queue commands
    // =========================================================================

    /// Append files to the play queue, optionally replacing it.
    pub async fn add(&self, files: &[String], replace: bool) -> Result<()> {
        if replace {
            self.clear().await?;
            let _ = self.get_status().await;
        }

        let mut send = String::from("command_list_begin\n");
        for file in files {
            send.push_str("add ");
            send.push_str(&encode_name(file));
            send.push('\n');
        }
        send.push_str("command_list_end");

        let response = self.send_command(&send, true).await;
        if response.ok {
            self.bus.publish(MpdEvent::Added {
                files: files.to_vec(),
            });
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    /// Queue files at `pos`; `queue_len` is the current queue length.
    ///
    /// Each `add` appends at the tail and is immediately followed by a
    /// `move` into place, batched as one command list (positional
    /// insertion is not available on older servers).
    pub async fn add_at_position(
        &self,
        files: &[String],
        pos: u32,
        queue_len: u32,
        replace: bool,
    ) -> Result<()> {
        if replace {
            self.clear().await?;
            let _ = self.get_status().await;
        }

        let mut send = String::from("command_list_begin\n");
        let mut cur = queue_len;
        for file in files {
            send.push_str("add ");
            send.push_str(&encode_name(file));
            send.push('\n');
            send.push_str(&format!("move {} {}\n", cur, pos));
            cur += 1;
        }
        send.push_str("command_list_end");

        let response = self.send_command(&send, true).await;
        if response.ok {
            self.bus.publish(MpdEvent::Added {
                files: files.to_vec(),
            });
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let response = self.send_command("clear", true).await;
        if response.ok {
            let mut st = self.state.write().await;
            st.queue.last_update_version = 0;
            st.queue.ids.clear();
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    /// Remove songs from the queue by id.
    pub async fn remove_songs(&self, ids: &[u32]) -> Result<()> {
        let mut send = String::from("command_list_begin\n");
        for id in ids {
            send.push_str(&format!("deleteid {}\n", id));
        }
        send.push_str("command_list_end");
        let response = self.send_command(&send, true).await;
        if response.ok {
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    pub async fn move_song(&self, from: u32, to: u32) -> Result<()> {
        self.simple_command(&format!("move {} {}", from, to)).await
    }

    /// Relocate the queue slots `items` to `pos`; `queue_len` is the
    /// current queue length.
    pub async fn move_songs(&self, items: &[u32], pos: u32, queue_len: u32) -> Result<()> {
        self.do_move(None, items, pos, queue_len).await
    }

    pub async fn shuffle(&self) -> Result<()> {
        self.simple_command("shuffle").await
    }

    /// Shuffle the inclusive slot range `from..=to`.
    pub async fn shuffle_range(&self, from: u32, to: u32) -> Result<()> {
        self.simple_command(&format!("shuffle {}:{}", from, to + 1))
            .await
    }

    /// The two-phase reposition shared by the queue and stored
    /// playlists, parameterized only by the move-command prefix.
    async fn do_move(
        &self,
        playlist: Option<&str>,
        items: &[u32],
        pos: u32,
        size: u32,
    ) -> Result<()> {
        let prefix = match playlist {
            Some(name) => format!("playlistmove {} ", encode_name(name)),
            None => "move ".to_string(),
        };
        let mut send = String::from("command_list_begin\n");
        for (from, to) in queue::plan_move(items, pos, size) {
            send.push_str(&prefix);
            send.push_str(&format!("{} {}\n", from, to));
        }
        send.push_str("command_list_end");
        let response = self.send_command(&send, true).await;
        if response.ok {
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    // =========================================================================
    // Queue synchronization
    // =========================================================================

    /// Full queue refresh: fetch every item and replace the mirror.
    pub async fn refresh_queue(&self) -> Result<Vec<Song>> {
        let response = self.send_command("playlistinfo", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let songs = parse_songs(&response.data);
        {
            let mut st = self.state.write().await;
            st.queue.last_update_version = st.queue.last_status_version;
            st.queue.ids = songs.iter().map(|s| s.id).collect();
        }
        self.bus.publish(MpdEvent::QueueUpdated {
            songs: songs.clone(),
        });
        Ok(songs)
    }

    /// Reconcile the queue mirror against the server's minimal
    /// "changed positions since version" delta.
    ///
    /// Known ids become placeholders (the consumer already holds the
    /// track data); new ids are fetched individually. Whenever the
    /// delta alone cannot rebuild a coherent mirror, the incremental
    /// path is abandoned for a full refresh.
    pub async fn queue_changes(&self) -> Result<Vec<Song>> {
        let (last_version, mirror_empty) = {
            let st = self.state.read().await;
            (st.queue.last_update_version, st.queue.ids.is_empty())
        };
        if last_version == 0 || mirror_empty {
            return self.refresh_queue().await;
        }

        if !self.connect_to_mpd().await {
            return Err(MpdError::ConnectionLost);
        }
        let (outcome, closing) = {
            let mut sock = self.command.lock().await;
            let outcome = self.try_incremental_update(&mut sock, last_version).await;
            (outcome, sock.state() == SocketState::Closing)
        };
        if closing {
            self.on_connection_lost().await;
        }

        match outcome {
            Some(songs) => Ok(songs),
            None => self.refresh_queue().await,
        }
    }

    /// The incremental path; `None` means "fall back to a full
    /// refresh". Runs entirely on one socket lock so the transaction
    /// does not interleave with other commands.
    async fn try_incremental_update(
        &self,
        sock: &mut MpdSocket,
        last_version: u32,
    ) -> Option<Vec<Song>> {
        let response =
            Self::exchange(sock, &format!("plchangesposid {}", last_version)).await;
        if !response.ok {
            return None;
        }

        // An up-to-date status is needed to detect deletes at the end
        // of the queue, which the delta does not report.
        let status_response = Self::exchange(sock, "status").await;
        if !status_response.ok {
            return None;
        }
        let status = parse_status(&status_response.data);
        {
            let mut st = self.state.write().await;
            st.queue.last_update_version = status.playlist;
            st.queue.last_status_version = status.playlist;
        }
        self.bus.publish(MpdEvent::StatusUpdated {
            status: status.clone(),
        });

        let changes = parse_changes(&response.data);
        let prior = { self.state.read().await.queue.ids.clone() };
        let plan = queue::plan_rebuild(&prior, &changes, status.playlist_length)?;

        let mut songs = Vec::with_capacity(plan.len());
        let mut ids = Vec::with_capacity(plan.len());
        for slot in plan {
            match slot {
                SlotSource::Carry { id } => {
                    songs.push(Song::placeholder(id));
                    ids.push(id);
                }
                SlotSource::Fetch { pos, id } => {
                    let response =
                        Self::exchange(sock, &format!("playlistinfo {}", pos)).await;
                    if !response.ok {
                        return None;
                    }
                    let mut song = parse_song(&response.data)?;
                    song.id = id;
                    songs.push(song);
                    ids.push(id);
                }
            }
        }

        self.state.write().await.queue.ids = ids;
        self.bus.publish(MpdEvent::QueueUpdated {
            songs: songs.clone(),
        });
        Some(songs)
    }

    // =========================================================================
    // Playback commands
    // =========================================================================

    pub async fn play(&self, pos: u32) -> Result<()> {
        self.simple_command(&format!("play {}", pos)).await
    }

    pub async fn play_id(&self, id: u32) -> Result<()> {
        self.simple_command(&format!("playid {}", id)).await
    }

    pub async fn set_pause(&self, pause: bool) -> Result<()> {
        self.simple_command(if pause { "pause 1" } else { "pause 0" })
            .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.simple_command("stop").await
    }

    pub async fn next(&self) -> Result<()> {
        self.simple_command("next").await
    }

    pub async fn previous(&self) -> Result<()> {
        self.simple_command("previous").await
    }

    pub async fn seek(&self, song: u32, seconds: u32) -> Result<()> {
        self.simple_command(&format!("seek {} {}", song, seconds))
            .await
    }

    pub async fn seek_id(&self, id: u32, seconds: u32) -> Result<()> {
        self.simple_command(&format!("seekid {} {}", id, seconds))
            .await
    }

    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        self.simple_command(&format!("setvol {}", volume)).await
    }

    pub async fn set_repeat(&self, on: bool) -> Result<()> {
        self.simple_command(if on { "repeat 1" } else { "repeat 0" })
            .await
    }

    pub async fn set_random(&self, on: bool) -> Result<()> {
        self.simple_command(if on { "random 1" } else { "random 0" })
            .await
    }

    pub async fn set_single(&self, on: bool) -> Result<()> {
        self.simple_command(if on { "single 1" } else { "single 0" })
            .await
    }

    pub async fn set_consume(&self, on: bool) -> Result<()> {
        self.simple_command(if on { "consume 1" } else { "consume 0" })
            .await
    }

    pub async fn set_crossfade(&self, seconds: u32) -> Result<()> {
        self.simple_command(&format!("crossfade {}", seconds)).await
    }

    pub async fn set_replay_gain(&self, mode: &str) -> Result<()> {
        self.simple_command(&format!("replay_gain_mode {}", mode))
            .await
    }

    /// Query the replay-gain mode; an empty mode means it could not be
    /// determined.
    pub async fn replay_gain(&self) -> Result<String> {
        let response = self.send_command("replay_gain_status", true).await;
        let lines: Vec<&str> = response.data.lines().filter(|l| !l.is_empty()).collect();
        let mode = if lines.len() == 2 && lines[1] == "OK" {
            lines[0]
                .strip_prefix("replay_gain_mode: ")
                .unwrap_or("")
                .to_string()
        } else {
            String::new()
        };
        self.bus.publish(MpdEvent::ReplayGainMode { mode: mode.clone() });
        Ok(mode)
    }

    // =========================================================================
    // Read commands
    // =========================================================================

    pub async fn get_status(&self) -> Result<StatusValues> {
        let response = self.send_command("status", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let status = parse_status(&response.data);
        self.state.write().await.queue.last_status_version = status.playlist;
        self.bus.publish(MpdEvent::StatusUpdated {
            status: status.clone(),
        });
        Ok(status)
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        let response = self.send_command("stats", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let stats = parse_stats(&response.data);
        self.bus.publish(MpdEvent::StatsUpdated {
            stats: stats.clone(),
        });
        Ok(stats)
    }

    /// Fetch the current song; an empty (default) song means nothing
    /// is playing.
    pub async fn current_song(&self) -> Result<Song> {
        let response = self.send_command("currentsong", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let song = parse_song(&response.data).unwrap_or_default();
        self.bus.publish(MpdEvent::CurrentSongUpdated {
            song: song.clone(),
        });
        Ok(song)
    }

    pub async fn outputs(&self) -> Result<Vec<Output>> {
        let response = self.send_command("outputs", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let outputs = parse_outputs(&response.data);
        self.bus.publish(MpdEvent::OutputsUpdated {
            outputs: outputs.clone(),
        });
        Ok(outputs)
    }

    pub async fn enable_output(&self, id: u32) -> Result<()> {
        self.simple_command(&format!("enableoutput {}", id)).await
    }

    pub async fn disable_output(&self, id: u32) -> Result<()> {
        self.simple_command(&format!("disableoutput {}", id)).await
    }

    /// Trigger a server-side database rescan.
    pub async fn update(&self) -> Result<()> {
        self.simple_command("update").await
    }

    /// Fetch the whole library with full tag records.
    pub async fn list_all_info(&self) -> Result<Vec<Song>> {
        self.bus.publish(MpdEvent::UpdatingLibrary);
        let response = self.send_command("listallinfo", true).await;
        let result = if response.ok {
            let songs = parse_songs(&response.data);
            self.bus.publish(MpdEvent::LibraryUpdated {
                songs: songs.clone(),
            });
            Ok(songs)
        } else {
            Err(self.command_failed(response).await)
        };
        self.bus.publish(MpdEvent::UpdatedLibrary);
        result
    }

    /// Fetch the music directory listing.
    pub async fn list_all(&self) -> Result<Vec<DirEntry>> {
        self.bus.publish(MpdEvent::UpdatingFileList);
        let response = self.send_command("listall", true).await;
        let result = if response.ok {
            let entries = parse_dir_entries(&response.data);
            self.bus.publish(MpdEvent::DirViewUpdated {
                entries: entries.clone(),
            });
            Ok(entries)
        } else {
            Err(self.command_failed(response).await)
        };
        self.bus.publish(MpdEvent::UpdatedFileList);
        result
    }

    pub async fn get_url_handlers(&self) -> Result<Vec<String>> {
        let response = self.send_command("urlhandlers", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let handlers = parse_url_handlers(&response.data);
        self.bus.publish(MpdEvent::UrlHandlers {
            handlers: handlers.clone(),
        });
        Ok(handlers)
    }

    // =========================================================================
    // Stored playlist commands
    // =========================================================================

    pub async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let response = self.send_command("listplaylists", true).await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let playlists = parse_playlists(&response.data);
        self.bus.publish(MpdEvent::PlaylistsRetrieved {
            playlists: playlists.clone(),
        });
        Ok(playlists)
    }

    /// Fetch the contents of one stored playlist.
    pub async fn playlist_info(&self, name: &str) -> Result<Vec<Song>> {
        let response = self
            .send_command(&format!("listplaylistinfo {}", encode_name(name)), true)
            .await;
        if !response.ok {
            return Err(self.command_failed(response).await);
        }
        let songs = parse_songs(&response.data);
        self.bus.publish(MpdEvent::PlaylistInfoRetrieved {
            name: name.to_string(),
            songs: songs.clone(),
        });
        Ok(songs)
    }

    pub async fn load_playlist(&self, name: &str, replace: bool) -> Result<()> {
        if replace {
            self.clear().await?;
            let _ = self.get_status().await;
        }
        let response = self
            .send_command(&format!("load {}", encode_name(name)), true)
            .await;
        if response.ok {
            self.bus.publish(MpdEvent::PlaylistLoaded {
                name: name.to_string(),
            });
            Ok(())
        } else {
            Err(self.command_failed(response).await)
        }
    }

    pub async fn save_playlist(&self, name: &str) -> Result<()> {
        let response = self
            .send_command(&format!("save {}", encode_name(name)), false)
            .await;
        if response.ok {
            Ok(())
        } else {
            self.bus.publish(MpdEvent::Error {
                message: format!("Failed to save {}", name),
            });
            Err(self.command_failed(response).await)
        }
    }

    pub async fn rename_playlist(&self, old_name: &str, new_name: &str) -> Result<()> {
        let response = self
            .send_command(
                &format!("rename {} {}", encode_name(old_name), encode_name(new_name)),
                false,
            )
            .await;
        if response.ok {
            self.bus.publish(MpdEvent::PlaylistRenamed {
                from: old_name.to_string(),
                to: new_name.to_string(),
            });
            Ok(())
        } else {
            self.bus.publish(MpdEvent::Error {
                message: format!("Failed to rename {} to {}", old_name, new_name),
            });
            Err(self.command_failed(response).await)
        }
    }

    pub async fn remove_playlist(&self, name: &str) -> Result<()> {
        self.simple_command(&format!("rm {}", encode_name(name)))
            .await
    }

    /// Append songs to a stored playlist, then reposition them to
    /// `pos`; `size` is the playlist length before the append.
    pub async fn add_to_playlist(
        &self,
        name: &str,
        songs: &[String],
        pos: u32,
        size: u32,
    ) -> Result<()> {
        if songs.is_empty() {
            return Ok(());
        }
        let encoded_name = encode_name(name);
        let mut added = 0u32;
        for song in songs {
            let command = format!("playlistadd {} {}", encoded_name, encode_name(song));
            if self.send_command(&command, true).await.ok {
                added += 1;
            } else {
                break;
            }
        }
        if added > 0 && size > 0 {
            let items: Vec<u32> = (0..added).map(|i| size + i).collect();
            self.do_move(Some(name), &items, pos, size + added).await?;
        }
        Ok(())
    }

    pub async fn remove_from_playlist(&self, name: &str, positions: &[u32]) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }
        let encoded_name = encode_name(name);
        let mut sorted = positions.to_vec();
        sorted.sort_unstable();
        for (i, pos) in sorted.iter().enumerate() {
            // Earlier deletions shift the later positions down.
            let fixed = pos - i as u32;
            let response = self
                .send_command(&format!("playlistdelete {} {}", encoded_name, fixed), true)
                .await;
            if !response.ok {
                return Err(self.command_failed(response).await);
            }
        }
        self.bus.publish(MpdEvent::RemovedFromPlaylist {
            name: name.to_string(),
            positions: positions.to_vec(),
        });
        Ok(())
    }

    pub async fn move_in_playlist(
        &self,
        name: &str,
        items: &[u32],
        pos: u32,
        size: u32,
    ) -> Result<()> {
        self.do_move(Some(name), items, pos, size).await?;
        self.bus.publish(MpdEvent::MovedInPlaylist {
            name: name.to_string(),
            items: items.to_vec(),
            pos,
        });
        Ok(())
    }
}
