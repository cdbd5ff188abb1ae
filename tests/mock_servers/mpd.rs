//! Mock MPD server for testing
//!
//! Simulates the line protocol: greeting, `OK\n` / `ACK` terminators,
//! command lists, a password handshake, a mutable play queue with a
//! version counter, canned `plchangesposid` deltas and idle-socket
//! change notifications.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// One queue entry of the mock server.
#[derive(Debug, Clone)]
pub struct MockSong {
    pub id: u32,
    pub file: String,
    pub title: String,
    pub artist: String,
    pub duration: u32,
}

impl MockSong {
    pub fn new(id: u32, file: &str) -> Self {
        Self {
            id,
            file: file.to_string(),
            title: format!("Title of {}", file),
            artist: "Mock Artist".to_string(),
            duration: 180,
        }
    }
}

/// Mock MPD server state
struct MockMpdState {
    version: String,
    password: Option<String>,
    queue: Vec<MockSong>,
    queue_version: u32,
    /// Canned `plchangesposid` reply.
    changes: Vec<(u32, u32)>,
    play_state: &'static str,
    volume: i32,
    /// Every received command line, for assertions.
    commands: Vec<String>,
}

/// Mock MPD Server
pub struct MockMpdServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockMpdState>>,
    notify: broadcast::Sender<String>,
    handle: JoinHandle<()>,
}

impl MockMpdServer {
    /// Start a mock MPD server on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockMpdState {
            version: "0.19.0".to_string(),
            password: None,
            queue: Vec::new(),
            queue_version: 1,
            changes: Vec::new(),
            play_state: "stop",
            volume: 50,
            commands: Vec::new(),
        }));
        let (notify, _) = broadcast::channel(16);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_state = state.clone();
        let accept_notify = notify.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(handle_connection(
                    stream,
                    accept_state.clone(),
                    accept_notify.subscribe(),
                ));
            }
        });

        Self {
            addr,
            state,
            notify,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Require a password from clients
    pub async fn set_password(&self, password: &str) {
        self.state.write().await.password = Some(password.to_string());
    }

    /// Replace the play queue
    pub async fn set_queue(&self, songs: Vec<MockSong>) {
        self.state.write().await.queue = songs;
    }

    /// Set the queue version reported by `status`
    pub async fn set_queue_version(&self, version: u32) {
        self.state.write().await.queue_version = version;
    }

    /// Set the canned `plchangesposid` reply
    pub async fn set_changes(&self, changes: &[(u32, u32)]) {
        self.state.write().await.changes = changes.to_vec();
    }

    /// Push a change notification to every parked idle connection
    pub fn notify(&self, subsystem: &str) {
        let _ = self.notify.send(subsystem.to_string());
    }

    /// Every command line received so far
    pub async fn commands(&self) -> Vec<String> {
        self.state.read().await.commands.clone()
    }

    /// Current queue length
    pub async fn queue_len(&self) -> usize {
        self.state.read().await.queue.len()
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<RwLock<MockMpdState>>,
    mut notifications: broadcast::Receiver<String>,
) {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let greeting = {
        let st = state.read().await;
        format!("OK MPD {}\n", st.version)
    };
    if writer.write_all(greeting.as_bytes()).await.is_err() {
        return;
    }

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim_end().to_string();
        state.write().await.commands.push(command.clone());

        let reply = if command == "idle" {
            // Park until something changes; deliver one notification
            // per idle round like the real daemon.
            match notifications.recv().await {
                Ok(subsystem) => format!("changed: {}\nOK\n", subsystem),
                Err(_) => return,
            }
        } else if command == "command_list_begin" {
            let mut batch = Vec::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                let inner = line.trim_end().to_string();
                state.write().await.commands.push(inner.clone());
                if inner == "command_list_end" {
                    break;
                }
                batch.push(inner);
            }
            run_command_list(&state, &batch).await
        } else {
            run_command(&state, &command).await
        };

        if writer.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Execute a command list: stop at the first failure, answer with one
/// terminator for the whole batch.
async fn run_command_list(state: &Arc<RwLock<MockMpdState>>, batch: &[String]) -> String {
    for command in batch {
        let reply = run_command(state, command).await;
        if reply.starts_with("ACK") {
            return reply;
        }
    }
    "OK\n".to_string()
}

async fn run_command(state: &Arc<RwLock<MockMpdState>>, command: &str) -> String {
    let (verb, args) = match command.split_once(' ') {
        Some((verb, args)) => (verb, args),
        None => (command, ""),
    };

    match verb {
        "password" => {
            let st = state.read().await;
            match &st.password {
                Some(expected) if expected == args => "OK\n".to_string(),
                Some(_) => "ACK [3@0] {password} incorrect password\n".to_string(),
                None => "OK\n".to_string(),
            }
        }
        "status" => {
            let st = state.read().await;
            format!(
                "volume: {}\nrepeat: 0\nrandom: 0\nsingle: 0\nconsume: 0\n\
                 playlist: {}\nplaylistlength: {}\nxfade: 0\nstate: {}\nOK\n",
                st.volume,
                st.queue_version,
                st.queue.len(),
                st.play_state,
            )
        }
        "stats" => "artists: 3\nalbums: 5\nsongs: 42\nuptime: 500\nplaytime: 100\n\
             db_playtime: 9000\ndb_update: 1316362190\nOK\n"
            .to_string(),
        "currentsong" => {
            let st = state.read().await;
            match st.queue.first() {
                Some(song) => format!("{}OK\n", render_song(song, 0)),
                None => "OK\n".to_string(),
            }
        }
        "playlistinfo" => {
            let st = state.read().await;
            if args.is_empty() {
                let mut out = String::new();
                for (pos, song) in st.queue.iter().enumerate() {
                    out.push_str(&render_song(song, pos as u32));
                }
                out.push_str("OK\n");
                out
            } else {
                match args
                    .parse::<usize>()
                    .ok()
                    .and_then(|pos| st.queue.get(pos).map(|song| (pos, song)))
                {
                    Some((pos, song)) => format!("{}OK\n", render_song(song, pos as u32)),
                    None => "ACK [50@0] {playlistinfo} Bad song index\n".to_string(),
                }
            }
        }
        "plchangesposid" => {
            let st = state.read().await;
            let mut out = String::new();
            for (pos, id) in &st.changes {
                out.push_str(&format!("cpos: {}\nId: {}\n", pos, id));
            }
            out.push_str("OK\n");
            out
        }
        "outputs" => "outputid: 0\noutputname: ALSA\noutputenabled: 1\n\
             outputid: 1\noutputname: HTTP stream\noutputenabled: 0\nOK\n"
            .to_string(),
        "urlhandlers" => "handler: http://\nhandler: mms://\nOK\n".to_string(),
        "listplaylists" => "playlist: morning\nLast-Modified: 2012-01-15T08:00:00Z\nOK\n".to_string(),
        "add" => {
            let file = unquote(args);
            if file.starts_with("file:///") {
                return "ACK [4@0] {add} Access denied\n".to_string();
            }
            let mut st = state.write().await;
            let id = st.queue.iter().map(|s| s.id).max().unwrap_or(0) + 1;
            st.queue.push(MockSong::new(id, &file));
            st.queue_version += 1;
            "OK\n".to_string()
        }
        "clear" => {
            let mut st = state.write().await;
            st.queue.clear();
            st.queue_version += 1;
            "OK\n".to_string()
        }
        "deleteid" => {
            let mut st = state.write().await;
            if let Ok(id) = args.parse::<u32>() {
                st.queue.retain(|s| s.id != id);
                st.queue_version += 1;
            }
            "OK\n".to_string()
        }
        "move" => {
            let mut st = state.write().await;
            if let Some((from, to)) = args.split_once(' ') {
                if let (Ok(from), Ok(to)) = (from.parse::<usize>(), to.parse::<usize>()) {
                    if from < st.queue.len() {
                        let song = st.queue.remove(from);
                        let to = to.min(st.queue.len());
                        st.queue.insert(to, song);
                        st.queue_version += 1;
                    }
                }
            }
            "OK\n".to_string()
        }
        "load" => "ACK [50@0] {load} No such playlist\n".to_string(),
        // Playback and option commands succeed without side effects
        // the tests care about.
        "play" | "playid" | "pause" | "stop" | "next" | "previous" | "seek" | "seekid"
        | "setvol" | "repeat" | "random" | "single" | "consume" | "crossfade" | "shuffle"
        | "update" | "enableoutput" | "disableoutput" => "OK\n".to_string(),
        _ => format!("ACK [5@0] {{}} unknown command \"{}\"\n", verb),
    }
}

fn render_song(song: &MockSong, pos: u32) -> String {
    format!(
        "file: {}\nTime: {}\nArtist: {}\nTitle: {}\nPos: {}\nId: {}\n",
        song.file, song.duration, song.artist, song.title, pos, song.id
    )
}

/// Undo the client's quote-escaping of one argument.
fn unquote(arg: &str) -> String {
    let inner = arg
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(arg);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn mock_mpd_greets_and_answers_status() {
        let server = MockMpdServer::start().await;

        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"OK MPD 0.19.0\n");

        stream.write_all(b"status\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        let reply = String::from_utf8_lossy(&buf[..n]);
        assert!(reply.contains("playlist: 1"));
        assert!(reply.ends_with("OK\n"));

        server.stop().await;
    }

    #[tokio::test]
    async fn mock_mpd_rejects_wrong_password() {
        let server = MockMpdServer::start().await;
        server.set_password("secret").await;

        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        let mut buf = [0u8; 256];
        let _ = stream.read(&mut buf).await.unwrap();

        stream.write_all(b"password wrong\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"ACK [3@0] {password}"));

        server.stop().await;
    }

    #[tokio::test]
    async fn mock_mpd_applies_add_and_bumps_version() {
        let server = MockMpdServer::start().await;

        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        let mut buf = [0u8; 256];
        let _ = stream.read(&mut buf).await.unwrap();

        stream.write_all(b"add \"albums/x.flac\"\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"OK\n");
        assert_eq!(server.queue_len().await, 1);

        server.stop().await;
    }
}
