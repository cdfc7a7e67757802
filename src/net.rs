//! Command socket client (Component D): a single-shot request/response RPC
//! over a fresh TCP connection to the camera's command port.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use crate::command::{Command, HDR_LEN};
use crate::config::ClientConfig;
use crate::error::{CamError, Result};

/// Send `cmd` to `addr` and return the decoded response.
///
/// Opens a fresh connection, writes the full request, reads exactly the
/// 46-byte response header, then reads exactly `body_size` further bytes.
/// The connection is closed on every exit path. The request itself is
/// never retried; a short read or connect failure surfaces as `Network`.
pub fn send_cmd(addr: SocketAddr, cfg: &ClientConfig, cmd: &Command) -> Result<Command> {
    let mut sock = TcpStream::connect_timeout(&addr, cfg.connect_timeout)?;
    sock.set_nodelay(true).ok();
    sock.set_read_timeout(Some(cfg.rpc_read_timeout))?;
    sock.set_write_timeout(Some(cfg.rpc_read_timeout))?;

    let wire = cmd.encode();
    sock.write_all(&wire)?;

    let hdr_bytes = recv_exact(&mut sock, HDR_LEN)?;
    let mut response = Command::decode_header(&hdr_bytes)?;
    let body = recv_exact(&mut sock, response.body_size())?;
    response.attach_body(body);
    Ok(response)
}

/// Read exactly `n` bytes from `r`, retrying partial reads. EOF before `n`
/// bytes are read is a `Network` error.
pub(crate) fn recv_exact(r: &mut impl Read, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut got = 0;
    while got < n {
        let read = r.read(&mut buf[got..])?;
        if read == 0 {
            return Err(CamError::Network(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before all bytes were received",
            )));
        }
        got += read;
    }
    Ok(buf)
}

/// Open a TCP connection with the configured connect timeout and stream
/// read timeout, for use by the stream session engine.
pub(crate) fn connect_stream(addr: SocketAddr, cfg: &ClientConfig) -> Result<TcpStream> {
    let sock = TcpStream::connect_timeout(&addr, cfg.connect_timeout)?;
    sock.set_nodelay(true).ok();
    sock.set_read_timeout(Some(cfg.stream_read_timeout))?;
    Ok(sock)
}

/// Per-read deadline helper: translate a timed-out read into `Ok(None)` so
/// the stream loop can distinguish "nothing arrived yet" from a hard I/O
/// failure.
pub(crate) fn is_read_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn recv_exact_reads_full_count() {
        let mut cur = Cursor::new(vec![1u8, 2, 3, 4, 5]);
        let got = recv_exact(&mut cur, 5).unwrap();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn recv_exact_fails_on_short_eof() {
        let mut cur = Cursor::new(vec![1u8, 2]);
        assert!(recv_exact(&mut cur, 5).is_err());
    }
}
