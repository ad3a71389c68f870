/// [`MediaEngine`] backed by an external `mpv` process.
///
/// mpv owns the video window.  We talk to it over its JSON IPC socket
/// (`--input-ipc-server`): a writer task serialises queued commands as
/// newline-delimited JSON, and a reader task turns `property-change`
/// notifications for `time-pos` and `duration` into [`PlayerEvent`]s.
///
/// Position reports arrive every frame and each one supersedes the last, so
/// they are dropped rather than queued when the event loop falls behind.
/// That keeps queue slots free for hotkeys, which are never retried.
///
/// When the socket reaches EOF (the window was closed or mpv exited), the
/// reader posts [`PlayerEvent::PlayerClosed`].
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use crate::event::PlayerEvent;
use crate::media::MediaEngine;

const COMMAND_QUEUE: usize = 64;
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY: Duration = Duration::from_millis(100);
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

const OBSERVE_TIME_POS: u64 = 1;
const OBSERVE_DURATION: u64 = 2;

/// Launch parameters for the mpv process.
#[derive(Debug, Clone)]
pub struct MpvSettings {
    pub mpv_path: String,
    pub window_title: String,
}

pub struct MpvEngine {
    commands: mpsc::Sender<Value>,
    /// Latest duration reported by mpv, in ms; 0 while unknown.
    duration_ms: Arc<AtomicU64>,
    child: Option<Child>,
    ipc_path: PathBuf,
}

impl MpvEngine {
    /// Spawns mpv, connects to its IPC socket and starts the reader/writer tasks.
    /// Position and duration notifications are forwarded to `events`.
    pub async fn launch(settings: &MpvSettings, events: mpsc::Sender<PlayerEvent>) -> Result<Self> {
        let ipc_path = ipc_path();
        let mut child = Command::new(&settings.mpv_path)
            .args([
                "--idle=yes",
                "--keep-open=yes",
                "--force-window=yes",
                "--pause",
                "--hr-seek=yes",
                "--no-terminal",
                "--geometry=640x480",
            ])
            .arg(format!("--title={}", settings.window_title))
            .arg(format!("--input-ipc-server={}", ipc_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start mpv ({})", settings.mpv_path))?;

        let stream = connect(&ipc_path, &mut child).await?;
        info!("[mpv] Connected on {}", ipc_path.display());

        let (reader, writer) = tokio::io::split(stream);
        let (cmd_tx, cmd_rx) = mpsc::channel::<Value>(COMMAND_QUEUE);
        let duration_ms = Arc::new(AtomicU64::new(0));

        tokio::spawn(write_commands(writer, cmd_rx));
        tokio::spawn(read_events(reader, Arc::clone(&duration_ms), events));

        let engine = Self {
            commands: cmd_tx,
            duration_ms,
            child: Some(child),
            ipc_path,
        };
        engine.send(json!(["observe_property", OBSERVE_TIME_POS, "time-pos"]));
        engine.send(json!(["observe_property", OBSERVE_DURATION, "duration"]));
        Ok(engine)
    }

    /// Asks mpv to quit and waits briefly for it, killing it if it lingers.
    pub async fn shutdown(&mut self) {
        self.send(json!(["quit"]));
        if let Some(mut child) = self.child.take() {
            match timeout(QUIT_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => debug!("[mpv] Exited with {status}"),
                Ok(Err(e)) => warn!("[mpv] Failed to wait for exit: {e}"),
                Err(_) => {
                    warn!("[mpv] Did not quit in time; killing");
                    let _ = child.kill().await;
                }
            }
        }
        #[cfg(unix)]
        let _ = std::fs::remove_file(&self.ipc_path);
    }

    fn send(&self, command: Value) {
        if let Err(e) = self.commands.try_send(json!({ "command": command })) {
            warn!("[mpv] Command queue unavailable; dropped {}", e.into_inner());
        }
    }
}

impl MediaEngine for MpvEngine {
    fn set_source(&mut self, path: &Path) {
        self.duration_ms.store(0, Ordering::Relaxed);
        self.send(json!(["loadfile", path.to_string_lossy(), "replace"]));
    }

    fn play(&mut self) {
        self.send(json!(["set_property", "pause", false]));
    }

    fn pause(&mut self) {
        self.send(json!(["set_property", "pause", true]));
    }

    fn stop(&mut self) {
        // mpv's own `stop` unloads the file; pause and rewind instead.
        self.pause();
        self.send(json!(["seek", 0, "absolute+exact"]));
    }

    fn set_position(&mut self, position_ms: u64) {
        self.send(json!(["seek", position_ms as f64 / 1000.0, "absolute+exact"]));
    }

    fn duration(&self) -> u64 {
        self.duration_ms.load(Ordering::Relaxed)
    }
}

// ── IPC transport ─────────────────────────────────────────────────────────────

#[cfg(unix)]
type IpcStream = tokio::net::UnixStream;
#[cfg(windows)]
type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(unix)]
fn ipc_path() -> PathBuf {
    std::env::temp_dir().join(format!("livesplit-player-{}.sock", std::process::id()))
}

#[cfg(windows)]
fn ipc_path() -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\livesplit-player-{}", std::process::id()))
}

#[cfg(unix)]
async fn open_ipc(path: &Path) -> std::io::Result<IpcStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
async fn open_ipc(path: &Path) -> std::io::Result<IpcStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

/// Retries the IPC connection while mpv starts up, giving up early if it exits.
async fn connect(path: &Path, child: &mut Child) -> Result<IpcStream> {
    let mut last_err = None;
    for _ in 0..CONNECT_ATTEMPTS {
        if let Some(status) = child.try_wait().context("Failed to poll mpv process")? {
            bail!("mpv exited during startup ({status})");
        }
        match open_ipc(path).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
        sleep(CONNECT_RETRY).await;
    }
    let reason = last_err.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
    bail!("Could not connect to mpv IPC at {}: {reason}", path.display())
}

async fn write_commands<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::Receiver<Value>) {
    while let Some(message) = rx.recv().await {
        let mut line = message.to_string();
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("[mpv] IPC write failed: {e}");
            break;
        }
    }
}

async fn read_events<R: AsyncRead + Unpin>(
    reader: R,
    duration_ms: Arc<AtomicU64>,
    events: mpsc::Sender<PlayerEvent>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("[mpv] IPC read failed: {e}");
                break;
            }
        };

        let message: MpvMessage = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(e) => {
                debug!("[mpv] Ignoring malformed IPC line ({e}): {line}");
                continue;
            }
        };

        if let Some(err) = message.error.as_deref().filter(|e| *e != "success") {
            debug!("[mpv] Command failed: {err}");
            continue;
        }

        let delivered = match message.notification() {
            Some(Notification::Position(ms)) => {
                match events.try_send(PlayerEvent::PositionChanged(ms)) {
                    Ok(()) | Err(TrySendError::Full(_)) => true,
                    Err(TrySendError::Closed(_)) => false,
                }
            }
            Some(Notification::Duration(ms)) => {
                duration_ms.store(ms, Ordering::Relaxed);
                events.send(PlayerEvent::DurationChanged(ms)).await.is_ok()
            }
            None => continue,
        };
        if !delivered {
            return;
        }
    }

    info!("[mpv] Player window closed");
    let _ = events.send(PlayerEvent::PlayerClosed).await;
}

// ── Protocol ──────────────────────────────────────────────────────────────────

/// One line received from mpv: either a command reply or an async event.
#[derive(Debug, Deserialize)]
struct MpvMessage {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Notification {
    Position(u64),
    Duration(u64),
}

impl MpvMessage {
    fn notification(&self) -> Option<Notification> {
        if self.event.as_deref() != Some("property-change") {
            return None;
        }
        let ms = seconds_to_ms(self.data.as_ref()?.as_f64()?);
        match self.name.as_deref()? {
            "time-pos" => Some(Notification::Position(ms)),
            "duration" => Some(Notification::Duration(ms)),
            _ => None,
        }
    }
}

/// mpv reports times as float seconds; tiny negative values occur around seeks.
fn seconds_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> MpvMessage {
        serde_json::from_str(line).unwrap()
    }

    fn detached() -> (MpvEngine, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(16);
        let engine = MpvEngine {
            commands: tx,
            duration_ms: Arc::new(AtomicU64::new(0)),
            child: None,
            ipc_path: PathBuf::from("unused"),
        };
        (engine, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Value>) -> Vec<Value> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    // ── notifications ─────────────────────────────────────────────────────────

    #[test]
    fn time_pos_change_is_a_position() {
        let m = parse(r#"{"event":"property-change","id":1,"name":"time-pos","data":65.4321}"#);
        assert_eq!(m.notification(), Some(Notification::Position(65_432)));
    }

    #[test]
    fn duration_change_is_a_duration() {
        let m = parse(r#"{"event":"property-change","id":2,"name":"duration","data":125.0}"#);
        assert_eq!(m.notification(), Some(Notification::Duration(125_000)));
    }

    #[test]
    fn null_data_is_ignored() {
        let m = parse(r#"{"event":"property-change","id":1,"name":"time-pos","data":null}"#);
        assert_eq!(m.notification(), None);
        let m = parse(r#"{"event":"property-change","id":1,"name":"time-pos"}"#);
        assert_eq!(m.notification(), None);
    }

    #[test]
    fn other_events_and_replies_are_ignored() {
        assert_eq!(parse(r#"{"event":"end-file","reason":"eof"}"#).notification(), None);
        assert_eq!(parse(r#"{"data":null,"error":"success"}"#).notification(), None);
        let m = parse(r#"{"event":"property-change","id":3,"name":"volume","data":100}"#);
        assert_eq!(m.notification(), None);
    }

    #[test]
    fn negative_and_non_finite_seconds_clamp_to_zero() {
        assert_eq!(seconds_to_ms(-0.02), 0);
        assert_eq!(seconds_to_ms(f64::NAN), 0);
        assert_eq!(seconds_to_ms(1.0005), 1_001);
    }

    // ── commands ──────────────────────────────────────────────────────────────

    #[test]
    fn engine_commands_map_to_mpv_ipc() {
        let (mut engine, mut rx) = detached();
        engine.set_source(Path::new("/videos/pb.mp4"));
        engine.play();
        engine.pause();
        engine.set_position(1_500);
        engine.stop();

        assert_eq!(
            drain(&mut rx),
            vec![
                json!({"command": ["loadfile", "/videos/pb.mp4", "replace"]}),
                json!({"command": ["set_property", "pause", false]}),
                json!({"command": ["set_property", "pause", true]}),
                json!({"command": ["seek", 1.5, "absolute+exact"]}),
                json!({"command": ["set_property", "pause", true]}),
                json!({"command": ["seek", 0, "absolute+exact"]}),
            ]
        );
    }

    #[test]
    fn set_source_clears_cached_duration() {
        let (mut engine, _rx) = detached();
        engine.duration_ms.store(90_000, Ordering::Relaxed);
        assert_eq!(engine.duration(), 90_000);
        engine.set_source(Path::new("/videos/other.mp4"));
        assert_eq!(engine.duration(), 0);
    }

    // ── reader / writer tasks ─────────────────────────────────────────────────

    #[tokio::test]
    async fn reader_forwards_notifications_then_reports_close() {
        let input = concat!(
            r#"{"event":"property-change","id":2,"name":"duration","data":10.0}"#, "\n",
            "not json\n",
            r#"{"error":"property unavailable","data":null}"#, "\n",
            r#"{"event":"property-change","id":1,"name":"time-pos","data":2.5}"#, "\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let duration = Arc::new(AtomicU64::new(0));

        read_events(input.as_bytes(), Arc::clone(&duration), tx).await;

        assert!(matches!(rx.recv().await, Some(PlayerEvent::DurationChanged(10_000))));
        assert!(matches!(rx.recv().await, Some(PlayerEvent::PositionChanged(2_500))));
        assert!(matches!(rx.recv().await, Some(PlayerEvent::PlayerClosed)));
        assert_eq!(duration.load(Ordering::Relaxed), 10_000);
    }

    #[tokio::test]
    async fn reader_drops_positions_instead_of_waiting_for_a_slot() {
        let input = concat!(
            r#"{"event":"property-change","id":1,"name":"time-pos","data":1.0}"#, "\n",
            r#"{"event":"property-change","id":1,"name":"time-pos","data":1.1}"#, "\n",
        );
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(PlayerEvent::PauseRequested).unwrap();
        let reader = read_events(input.as_bytes(), Arc::new(AtomicU64::new(0)), tx);

        let drain = async {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                seen.push(event);
            }
            seen
        };
        let ((), seen) = tokio::join!(reader, drain);

        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], PlayerEvent::PauseRequested));
        assert!(matches!(seen[1], PlayerEvent::PlayerClosed));
    }

    #[tokio::test]
    async fn writer_emits_newline_delimited_json() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(json!({"command": ["quit"]})).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        write_commands(&mut out, rx).await;
        assert_eq!(String::from_utf8(out).unwrap(), "{\"command\":[\"quit\"]}\n");
    }
}
