//! Stream session engine (Component E): the state machine that drives a
//! long-lived socket carrying either live video, replayed video, or a bulk
//! file download, interleaving inbound frames with outbound heartbeats.
//!
//! One camera instance can have at most one active stream; the guard below
//! is the CAS-style lock that enforces it (§5: one mutex over a
//! `(streaming, last_hb_ts)` pair).

use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use md5::{Digest, Md5};

use crate::command::{
    Command, CommandType, HDR_ARG_STREAM_DEC1, HDR_ARG_STREAM_DEC2, HDR_ARG_STREAM_TYPE, HDR_LEN,
};
use crate::config::ClientConfig;
use crate::error::{CamError, Result};
use crate::net::{self, is_read_timeout};
use crate::records::{FileFrame, FileFrameFlag, ReplayFrame, VideoFrame};
use crate::unmunge;

/// At most one heartbeat is sent per this interval of stream activity.
const STREAM_HB_PERIOD: Duration = Duration::from_secs(1);

/// Shared `(streaming, last_hb_ts)` pair for one camera instance. Guards the
/// single-stream-at-a-time invariant with a compare-and-set; a concurrent
/// start attempt while a stream is active fails fast rather than blocking.
#[derive(Debug)]
pub(crate) struct StreamGuard {
    streaming: Mutex<bool>,
}

impl StreamGuard {
    pub fn new() -> Self {
        Self { streaming: Mutex::new(false) }
    }

    /// Attempt the `Idle -> Streaming` transition. `false` means a stream is
    /// already active.
    pub fn try_start(&self) -> bool {
        let mut guard = self.streaming.lock().unwrap();
        if *guard {
            false
        } else {
            *guard = true;
            true
        }
    }

    /// `Streaming -> Idle`, idempotent. Returns whether a stream was active.
    pub fn stop(&self) -> bool {
        let mut guard = self.streaming.lock().unwrap();
        let was = *guard;
        *guard = false;
        was
    }

    pub fn is_streaming(&self) -> bool {
        *self.streaming.lock().unwrap()
    }
}

/// Maps a frame-kind type parameter to the `stopXXX` command it sends on
/// exit, and to how the shared [`VideoFrame`] subheader finishes parsing
/// into the caller-visible record.
pub trait StreamKind {
    type Frame;

    fn stop_cmd_type() -> CommandType;

    fn from_video(video: VideoFrame) -> Result<Self::Frame>;
}

/// Live H.264 video streamed from the camera.
pub struct LiveVideoKind;

impl StreamKind for LiveVideoKind {
    type Frame = VideoFrame;

    fn stop_cmd_type() -> CommandType {
        CommandType::StopStream
    }

    fn from_video(video: VideoFrame) -> Result<VideoFrame> {
        Ok(video)
    }
}

/// Replayed H.264 video read back from a saved recording.
pub struct ReplayKind;

impl StreamKind for ReplayKind {
    type Frame = ReplayFrame;

    fn stop_cmd_type() -> CommandType {
        CommandType::StopReplay
    }

    fn from_video(video: VideoFrame) -> Result<ReplayFrame> {
        ReplayFrame::from_video(video)
    }
}

/// A lazy, restartable-per-call sequence of frames from a live or replayed
/// video stream.
///
/// Each call to [`Camera::start_video_stream`](crate::camera::Camera::start_video_stream)
/// (or `start_recording_replay`) returns a fresh instance of this iterator.
/// Consuming it paces the underlying socket reads — a slow consumer simply
/// leaves frames buffered on the camera. Errors encountered mid-stream
/// (`Network`, `Framing`, an unrecognized unmunge `stream_type`) terminate
/// the sequence silently, matching the contract's "swallowed as
/// end-of-stream" rule; the caller observes this only as the iterator
/// ending early.
pub struct StreamFrames<T: StreamKind> {
    sock: Option<TcpStream>,
    guard: Arc<StreamGuard>,
    last_hb: Instant,
    done: bool,
    _marker: PhantomData<T>,
}

impl<T: StreamKind> StreamFrames<T> {
    pub(crate) fn start(
        addr: std::net::SocketAddr,
        cfg: &ClientConfig,
        initial_cmd: &Command,
        guard: Arc<StreamGuard>,
    ) -> Result<Self> {
        if !guard.try_start() {
            log::debug!("stream start rejected: another stream is already active");
            return Ok(Self::empty(guard));
        }
        let connect = (|| -> Result<TcpStream> {
            let mut sock = net::connect_stream(addr, cfg)?;
            sock.write_all(&initial_cmd.encode())?;
            Ok(sock)
        })();
        let sock = match connect {
            Ok(s) => s,
            Err(e) => {
                guard.stop();
                return Err(e);
            }
        };
        log::debug!("stream started, cmd_type={:?}", initial_cmd.cmd_type);
        Ok(Self { sock: Some(sock), guard, last_hb: Instant::now(), done: false, _marker: PhantomData })
    }

    fn empty(guard: Arc<StreamGuard>) -> Self {
        Self { sock: None, guard, last_hb: Instant::now(), done: true, _marker: PhantomData }
    }

    fn finish(&mut self, reason: &str) {
        if self.done {
            return;
        }
        self.done = true;
        if let Some(sock) = self.sock.as_mut() {
            let stop = Command::new(T::stop_cmd_type()).encode();
            let _ = sock.write_all(&stop);
        }
        self.guard.stop();
        log::debug!("stream stopped: {reason}");
    }

    fn maybe_send_heartbeat(&mut self, sock: &mut TcpStream) {
        if self.last_hb.elapsed() >= STREAM_HB_PERIOD {
            let hb = Command::new(CommandType::Heartbeat).encode();
            if sock.write_all(&hb).is_ok() {
                self.last_hb = Instant::now();
            }
        }
    }
}

impl<T: StreamKind> Drop for StreamFrames<T> {
    fn drop(&mut self) {
        self.finish("dropped");
    }
}

impl<T: StreamKind> Iterator for StreamFrames<T> {
    type Item = T::Frame;

    fn next(&mut self) -> Option<T::Frame> {
        loop {
            if self.done {
                return None;
            }
            if !self.guard.is_streaming() {
                self.finish("cancelled");
                return None;
            }
            let Some(mut sock) = self.sock.take() else {
                self.finish("no socket");
                return None;
            };

            let hdr_bytes = match recv_exact_interruptible(&mut sock, HDR_LEN) {
                Ok(Some(b)) => b,
                Ok(None) => {
                    self.sock = Some(sock);
                    continue;
                }
                Err(e) => {
                    log::debug!("stream read error: {e}");
                    self.sock = Some(sock);
                    self.finish("i/o error");
                    return None;
                }
            };
            let hdr = match Command::decode_header(&hdr_bytes) {
                Ok(h) => h,
                Err(e) => {
                    log::debug!("stream framing error: {e}");
                    self.sock = Some(sock);
                    self.finish("framing error");
                    return None;
                }
            };
            let body = match recv_exact_retry_timeouts(&mut sock, hdr.body_size()) {
                Ok(b) => b,
                Err(e) => {
                    log::debug!("stream read error: {e}");
                    self.sock = Some(sock);
                    self.finish("i/o error");
                    return None;
                }
            };

            match hdr.cmd_type {
                CommandType::Heartbeat => {
                    self.sock = Some(sock);
                    continue;
                }
                CommandType::RetReplayEnd => {
                    self.sock = Some(sock);
                    self.finish("end of stream");
                    return None;
                }
                _ => {
                    let stream_type = hdr.arg(HDR_ARG_STREAM_TYPE);
                    let key1 = hdr.arg(HDR_ARG_STREAM_DEC1);
                    let key2 = hdr.arg(HDR_ARG_STREAM_DEC2);
                    let mut video = match VideoFrame::from_bytes(&body) {
                        Ok(v) => v,
                        Err(e) => {
                            log::debug!("stream frame decode error: {e}");
                            self.sock = Some(sock);
                            self.finish("framing error");
                            return None;
                        }
                    };
                    if let Err(e) = unmunge::unmunge(
                        &mut video.frame_bytes,
                        stream_type,
                        video.count,
                        video.size,
                        key1,
                        key2,
                    ) {
                        log::trace!("unmunge failed, ending stream: {e}");
                        self.sock = Some(sock);
                        self.finish("unsupported stream_type");
                        return None;
                    }
                    let frame = match T::from_video(video) {
                        Ok(f) => f,
                        Err(e) => {
                            log::debug!("replay frame decode error: {e}");
                            self.sock = Some(sock);
                            self.finish("framing error");
                            return None;
                        }
                    };
                    self.maybe_send_heartbeat(&mut sock);
                    self.sock = Some(sock);
                    return Some(frame);
                }
            }
        }
    }
}

/// Read exactly `n` bytes, but distinguish "nothing read yet and the read
/// timed out" (returns `Ok(None)`, letting the caller recheck cancellation)
/// from a genuine I/O failure. Once any bytes of `n` have been read, a
/// subsequent timeout no longer yields `None` — see
/// [`recv_exact_retry_timeouts`], used for the remainder of a frame once
/// its header has started arriving, so a partially-read frame is never
/// abandoned mid-flight.
fn recv_exact_interruptible(sock: &mut TcpStream, n: usize) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; n];
    let mut got = 0;
    loop {
        match sock.read(&mut buf[got..]) {
            Ok(0) => {
                return Err(CamError::Network(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )));
            }
            Ok(read) => {
                got += read;
                if got == n {
                    return Ok(Some(buf));
                }
            }
            Err(e) if is_read_timeout(&e) && got == 0 => return Ok(None),
            Err(e) if is_read_timeout(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Read exactly `n` bytes, retrying indefinitely through per-read timeouts.
/// Used once a frame has started arriving — cancellation must not corrupt a
/// partially consumed frame, so the read is allowed to outlive one
/// `stream_read_timeout` window.
fn recv_exact_retry_timeouts(sock: &mut TcpStream, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut got = 0;
    while got < n {
        match sock.read(&mut buf[got..]) {
            Ok(0) => {
                return Err(CamError::Network(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )));
            }
            Ok(read) => got += read,
            Err(e) if is_read_timeout(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

/// Download a remote file over the stream socket, writing chunks to `sink`
/// as they arrive and verifying the camera-reported MD5 against the bytes
/// actually received.
///
/// Returns `Ok(true)` on a verified download, `Ok(false)` on an MD5
/// mismatch or a mid-download protocol violation (no data integrity, but
/// not a hard error), `Err(NotFound)` if the camera reports the path
/// doesn't exist, and `Err(Cancelled)` if `guard`'s stream flag is
/// cleared (by `stop_stream()` or an external interrupt) before the
/// terminal `end` frame arrives.
pub(crate) fn download_file<W: Write>(
    addr: std::net::SocketAddr,
    cfg: &ClientConfig,
    path: &str,
    guard: &StreamGuard,
    sink: &mut W,
) -> Result<bool> {
    if !guard.try_start() {
        log::debug!("file download rejected: another stream is already active");
        return Ok(false);
    }
    let result = run_download(addr, cfg, path, guard, sink);
    guard.stop();
    result
}

fn run_download<W: Write>(
    addr: std::net::SocketAddr,
    cfg: &ClientConfig,
    path: &str,
    guard: &StreamGuard,
    sink: &mut W,
) -> Result<bool> {
    let header = FileFrame::request_header(path)?;
    let cmd = Command::with_body(CommandType::GetFile, header);
    let mut sock = net::connect_stream(addr, cfg)?;
    sock.write_all(&cmd.encode())?;

    let mut started = false;
    let mut hasher = Md5::new();
    let mut final_md5: Option<String> = None;

    loop {
        if !guard.is_streaming() {
            log::debug!("file download cancelled: {path}");
            return Err(CamError::Cancelled);
        }
        let hdr_bytes = match recv_exact_interruptible(&mut sock, HDR_LEN)? {
            Some(b) => b,
            None => continue,
        };
        let hdr = Command::decode_header(&hdr_bytes)?;
        let body = recv_exact_retry_timeouts(&mut sock, hdr.body_size())?;
        if hdr.cmd_type == CommandType::Heartbeat {
            continue;
        }
        let frame = FileFrame::from_bytes(&body)?;
        match frame.flag {
            FileFrameFlag::Start if !started => started = true,
            FileFrameFlag::Frame if started => {
                sink.write_all(&frame.file_bytes)?;
                hasher.update(&frame.file_bytes);
            }
            FileFrameFlag::End if started => {
                final_md5 = Some(frame.md5_hash);
                break;
            }
            FileFrameFlag::NotFound => return Err(CamError::not_found(path.to_string())),
            other => {
                log::debug!("unexpected file frame transition: {other:?} (started={started})");
                return Ok(false);
            }
        }
    }

    let digest = hex_lower(&hasher.finalize());
    let matches = final_md5.is_some_and(|reported| digest.eq_ignore_ascii_case(&reported));
    Ok(matches)
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_cas_allows_one_stream_at_a_time() {
        let guard = StreamGuard::new();
        assert!(guard.try_start());
        assert!(!guard.try_start());
        assert!(guard.stop());
        assert!(guard.try_start());
    }

    #[test]
    fn guard_stop_is_idempotent() {
        let guard = StreamGuard::new();
        assert!(!guard.stop());
        assert!(guard.try_start());
        assert!(guard.stop());
        assert!(!guard.stop());
    }

    #[test]
    fn hex_lower_matches_known_digest() {
        // md5("hello world") == 5eb63bbbe01eeed093cb22bb8f5acdc3
        let mut hasher = Md5::new();
        hasher.update(b"hello world");
        assert_eq!(hex_lower(&hasher.finalize()), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }
}
