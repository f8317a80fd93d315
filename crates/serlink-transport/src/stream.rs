use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::link::ByteLink;

/// Default per-read timeout for stream-backed links.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(30);

/// A [`ByteLink`] over a connected byte stream.
///
/// The usual carrier is a TCP connection to a UART device bridge (one
/// socket per physical port); Unix domain sockets are supported for local
/// bridges. Port parameters (baud rate, data bits, parity, stop bits) are
/// applied by the bridge on its physical side and never travel in band.
pub struct StreamLink {
    inner: StreamInner,
}

enum StreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl StreamLink {
    /// Connect to a TCP device bridge.
    pub fn connect_tcp(addr: impl ToSocketAddrs, endpoint: &str) -> Result<Self> {
        Self::connect_tcp_with_timeout(addr, endpoint, DEFAULT_READ_TIMEOUT)
    }

    /// Connect to a TCP device bridge with an explicit read timeout.
    pub fn connect_tcp_with_timeout(
        addr: impl ToSocketAddrs,
        endpoint: &str,
        read_timeout: Duration,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;
        debug!(endpoint, "connected to tcp device bridge");
        Ok(Self {
            inner: StreamInner::Tcp(stream),
        })
    }

    /// Connect to a Unix-domain-socket device bridge.
    #[cfg(unix)]
    pub fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::connect_unix_with_timeout(path, DEFAULT_READ_TIMEOUT)
    }

    /// Connect to a Unix-domain-socket device bridge with an explicit read timeout.
    #[cfg(unix)]
    pub fn connect_unix_with_timeout(
        path: impl AsRef<std::path::Path>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let path = path.as_ref();
        let stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
            TransportError::Connect {
                endpoint: path.display().to_string(),
                source: e,
            }
        })?;
        stream.set_read_timeout(Some(read_timeout))?;
        debug!(?path, "connected to unix device bridge");
        Ok(Self {
            inner: StreamInner::Unix(stream),
        })
    }

    /// Wrap an already-connected TCP stream, applying the given read timeout.
    pub fn from_tcp(stream: TcpStream, read_timeout: Duration) -> Result<Self> {
        stream.set_read_timeout(Some(read_timeout))?;
        Ok(Self {
            inner: StreamInner::Tcp(stream),
        })
    }

    /// Wrap an already-connected Unix stream, applying the given read timeout.
    #[cfg(unix)]
    pub fn from_unix(
        stream: std::os::unix::net::UnixStream,
        read_timeout: Duration,
    ) -> Result<Self> {
        stream.set_read_timeout(Some(read_timeout))?;
        Ok(Self {
            inner: StreamInner::Unix(stream),
        })
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.read(buf),
        }
    }

    fn raw_write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.write_all(buf),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.write_all(buf),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_nonblocking(nonblocking),
        }
    }
}

impl ByteLink for StreamLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.raw_read(&mut buf[filled..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(filled);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(filled)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        loop {
            match self.raw_write_all(buf) {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.set_nonblocking(true)?;
        let mut scratch = [0u8; 256];
        let drained = loop {
            match self.raw_read(&mut scratch) {
                Ok(0) => break Err(TransportError::Closed),
                Ok(_) => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    break Ok(());
                }
                Err(err) => break Err(TransportError::Io(err)),
            }
        };
        self.set_nonblocking(false)?;
        drained
    }
}

impl std::fmt::Debug for StreamLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            StreamInner::Tcp(_) => f.debug_struct("StreamLink").field("type", &"tcp").finish(),
            #[cfg(unix)]
            StreamInner::Unix(_) => f.debug_struct("StreamLink").field("type", &"unix").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn tcp_pair(read_timeout: Duration) -> (StreamLink, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accepter = thread::spawn(move || listener.accept().unwrap().0);
        let link =
            StreamLink::connect_tcp_with_timeout(addr, &addr.to_string(), read_timeout).unwrap();
        (link, accepter.join().unwrap())
    }

    #[test]
    fn read_full_buffer() {
        let (mut link, mut far) = tcp_pair(Duration::from_millis(200));
        far.write_all(&[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 4];
        let n = link.read(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn short_read_on_timeout() {
        let (mut link, mut far) = tcp_pair(Duration::from_millis(20));
        far.write_all(&[9, 9]).unwrap();

        let mut buf = [0u8; 8];
        let n = link.read(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], &[9, 9]);
    }

    #[test]
    fn timeout_with_no_data_reads_zero() {
        let (mut link, _far) = tcp_pair(Duration::from_millis(10));

        let mut buf = [0u8; 1];
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_is_visible_to_far_side() {
        let (mut link, mut far) = tcp_pair(Duration::from_millis(10));
        link.write(b"ping").unwrap();

        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn flush_discards_buffered_input() {
        let (mut link, mut far) = tcp_pair(Duration::from_millis(50));
        far.write_all(&[0xAA; 32]).unwrap();

        // Give the bytes time to land in the receive buffer.
        thread::sleep(Duration::from_millis(30));
        link.flush().unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_after_close_is_error() {
        let (mut link, far) = tcp_pair(Duration::from_millis(50));
        drop(far);

        let mut buf = [0u8; 1];
        assert!(matches!(link.read(&mut buf), Err(TransportError::Closed)));
    }

    #[test]
    fn connect_refused_maps_to_connect_error() {
        // Bind then drop to get an address nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = StreamLink::connect_tcp(addr, &addr.to_string());
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn unix_pair_roundtrip() {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut link = StreamLink::from_unix(a, Duration::from_millis(50)).unwrap();
        let mut far = StreamLink::from_unix(b, Duration::from_millis(50)).unwrap();

        link.write(b"over unix").unwrap();
        let mut buf = [0u8; 9];
        assert_eq!(far.read(&mut buf).unwrap(), 9);
        assert_eq!(&buf, b"over unix");
    }
}
