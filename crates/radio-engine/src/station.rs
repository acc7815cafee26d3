//! Station playback loop.
//!
//! A station loops its playlist on a dedicated thread, reads each track in
//! fixed chunks, fans every chunk out to its listeners and waits between chunks
//! so the stream leaves at playback speed.
//!
//! ## Locking
//! The current track and the listener registry live under one mutex. The
//! playlist and tuning are immutable after construction and read without it.
//!
//! ## Lifecycle
//! `Created -> Running -> Stopped`. A stop request is terminal and idempotent:
//! it wakes any pacing or idle wait and closes every listener queue. The state
//! reads `Stopped` only once the playback loop has exited.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use crate::config::StationConfig;
use crate::listener::{Detach, Listener, ListenerId, ListenerRegistry};
use crate::pacing::Pacer;

/// Lifecycle state of a station's playback loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StationState {
    Created,
    Running,
    Stopped,
}

impl StationState {
    fn as_u8(self) -> u8 {
        match self {
            StationState::Created => 0,
            StationState::Running => 1,
            StationState::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => StationState::Created,
            1 => StationState::Running,
            _ => StationState::Stopped,
        }
    }
}

/// Point-in-time counters for a station.
#[derive(Clone, Debug, Serialize)]
pub struct StationStats {
    pub name: String,
    pub now_playing: String,
    pub state: StationState,
    pub tracks: usize,
    pub listeners: usize,
    pub bytes_per_second: u64,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub chunks_dropped: u64,
    pub tracks_failed: u64,
}

#[derive(Debug, Default)]
struct StationInner {
    current: String,
    listeners: ListenerRegistry,
}

/// How a single track ended.
enum TrackEnd {
    /// Track finished, failed to open, or hit a read error; carries bytes emitted.
    Done(u64),
    Stopped,
}

/// A looping playlist with its own listener fan-out.
pub struct Station {
    name: String,
    playlist: Vec<PathBuf>,
    config: StationConfig,
    inner: Mutex<StationInner>,
    state: AtomicU8,
    stop_requested: AtomicBool,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
    next_listener_id: AtomicU64,
    chunks_sent: AtomicU64,
    bytes_sent: AtomicU64,
    chunks_dropped: AtomicU64,
    tracks_failed: AtomicU64,
}

impl Station {
    pub(crate) fn new(name: impl Into<String>, playlist: Vec<PathBuf>, config: StationConfig) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        Self {
            name: name.into(),
            playlist,
            config,
            inner: Mutex::new(StationInner::default()),
            state: AtomicU8::new(StationState::Created.as_u8()),
            stop_requested: AtomicBool::new(false),
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            thread: Mutex::new(None),
            next_listener_id: AtomicU64::new(1),
            chunks_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            chunks_dropped: AtomicU64::new(0),
            tracks_failed: AtomicU64::new(0),
        }
    }

    /// Create a station and launch its playback thread.
    pub fn start(
        name: impl Into<String>,
        playlist: Vec<PathBuf>,
        config: StationConfig,
    ) -> Arc<Self> {
        let station = Arc::new(Self::new(name, playlist, config));
        station.spawn();
        station
    }

    fn spawn(self: &Arc<Self>) {
        let moved = self.state.compare_exchange(
            StationState::Created.as_u8(),
            StationState::Running.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if moved.is_err() {
            return;
        }

        let station = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name(format!("station-{}", self.name))
            .spawn(move || station.run());
        match spawned {
            Ok(handle) => {
                *lock(&self.thread) = Some(handle);
            }
            Err(e) => {
                tracing::error!(station = %self.name, error = %e, "failed to spawn station thread");
                self.stop();
                self.mark_stopped();
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn playlist(&self) -> &[PathBuf] {
        &self.playlist
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.config.bytes_per_second
    }

    pub fn buffer_window(&self) -> usize {
        self.config.buffer_window
    }

    pub fn state(&self) -> StationState {
        StationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once the playback loop has exited (or never ran).
    pub fn is_stopped(&self) -> bool {
        self.state() == StationState::Stopped
    }

    /// True once [`Self::stop`] has been called, even if the loop is still winding down.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Base name of the track being read, or an empty string before playback.
    pub fn now_playing(&self) -> String {
        self.lock_inner().current.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.lock_inner().listeners.len()
    }

    /// Attach a new listener with a bounded chunk queue.
    ///
    /// On a stopped station the queue is returned already closed.
    pub fn add_listener(self: &Arc<Self>) -> Listener {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = tokio::sync::mpsc::channel(self.config.listener_capacity);
        let count = {
            let mut inner = self.lock_inner();
            if !self.is_stop_requested() {
                inner.listeners.insert(id, tx);
            }
            inner.listeners.len()
        };
        tracing::debug!(station = %self.name, listener = %id, listeners = count, "listener attached");
        Listener::new(id, rx, Detach::new(Arc::downgrade(self), id))
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) {
        let (removed, count) = {
            let mut inner = self.lock_inner();
            let removed = inner.listeners.remove(id);
            (removed, inner.listeners.len())
        };
        if removed {
            tracing::debug!(station = %self.name, listener = %id, listeners = count, "listener detached");
        }
    }

    /// Offer a chunk to every listener; full queues drop it.
    pub(crate) fn broadcast(&self, chunk: Bytes) {
        let outcome = self.lock_inner().listeners.broadcast(&chunk);
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        if outcome.dropped > 0 {
            self.chunks_dropped
                .fetch_add(outcome.dropped as u64, Ordering::Relaxed);
        }
        tracing::trace!(
            station = %self.name,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            bytes = chunk.len(),
            "chunk broadcast"
        );
        if outcome.pruned > 0 {
            tracing::debug!(station = %self.name, pruned = outcome.pruned, "pruned closed listeners");
        }
    }

    /// Signal the playback loop to exit and close every listener queue.
    /// Safe to call any number of times.
    pub fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        // Never launched: nothing will run to mark the end.
        let _ = self.state.compare_exchange(
            StationState::Created.as_u8(),
            StationState::Stopped.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        // Dropping the sender wakes any wait on `stop_rx`.
        lock(&self.stop_tx).take();
        let closed = self.close_listeners();
        tracing::info!(station = %self.name, closed, "station stop requested");
    }

    fn close_listeners(&self) -> usize {
        self.lock_inner().listeners.close_all()
    }

    fn mark_stopped(&self) {
        self.state
            .store(StationState::Stopped.as_u8(), Ordering::Release);
    }

    /// Wait for the playback thread to exit.
    pub fn join(&self) {
        let handle = lock(&self.thread).take();
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!(station = %self.name, "station thread panicked");
        }
    }

    pub fn stats(&self) -> StationStats {
        let (now_playing, listeners) = {
            let inner = self.lock_inner();
            (inner.current.clone(), inner.listeners.len())
        };
        StationStats {
            name: self.name.clone(),
            now_playing,
            state: self.state(),
            tracks: self.playlist.len(),
            listeners,
            bytes_per_second: self.config.bytes_per_second,
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            tracks_failed: self.tracks_failed.load(Ordering::Relaxed),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, StationInner> {
        lock(&self.inner)
    }

    /// Sleep for `timeout` unless stopped first; returns `false` when stopped.
    fn wait(&self, timeout: Duration) -> bool {
        match self.stop_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => !self.is_stop_requested(),
            _ => false,
        }
    }

    fn run(&self) {
        tracing::info!(
            station = %self.name,
            tracks = self.playlist.len(),
            bytes_per_second = self.config.bytes_per_second,
            "station started"
        );
        let mut pacer = Pacer::new(self.config.bytes_per_second);
        let mut buf = vec![0u8; self.config.chunk_size];
        let mut index = 0usize;
        let mut emitted_this_cycle = 0u64;

        loop {
            if self.is_stop_requested() {
                break;
            }
            if self.playlist.is_empty() {
                if !self.wait(self.config.idle_wait) {
                    break;
                }
                continue;
            }

            match self.play_track(&self.playlist[index], &mut pacer, &mut buf) {
                TrackEnd::Stopped => break,
                TrackEnd::Done(bytes) => emitted_this_cycle += bytes,
            }

            index = (index + 1) % self.playlist.len();
            if index == 0 {
                if emitted_this_cycle == 0 {
                    tracing::warn!(station = %self.name, "no playable tracks; idling");
                    if !self.wait(self.config.idle_wait) {
                        break;
                    }
                }
                emitted_this_cycle = 0;
            }
        }

        self.close_listeners();
        self.mark_stopped();
        tracing::info!(station = %self.name, "station stopped");
    }

    fn play_track(&self, track: &Path, pacer: &mut Pacer, buf: &mut [u8]) -> TrackEnd {
        self.lock_inner().current = display_name(track);
        tracing::info!(station = %self.name, track = %track.display(), "playing track");

        let file = match File::open(track) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(
                    station = %self.name,
                    track = %track.display(),
                    error = %e,
                    "open track failed"
                );
                self.tracks_failed.fetch_add(1, Ordering::Relaxed);
                return TrackEnd::Done(0);
            }
        };
        let mut reader = BufReader::with_capacity(self.config.buffer_window, file);
        let mut emitted = 0u64;
        pacer.reset();

        loop {
            if self.is_stop_requested() {
                return TrackEnd::Stopped;
            }
            match reader.read(buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.broadcast(Bytes::copy_from_slice(&buf[..n]));
                    emitted += n as u64;
                    let delay = pacer.delay_after(n);
                    if !delay.is_zero() && !self.wait(delay) {
                        return TrackEnd::Stopped;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!(
                        station = %self.name,
                        track = %track.display(),
                        error = %e,
                        "read track failed"
                    );
                    break;
                }
            }
        }
        TrackEnd::Done(emitted)
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("name", &self.name)
            .field("tracks", &self.playlist.len())
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn display_name(track: &Path) -> String {
    track
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| track.to_string_lossy().to_string())
}
