use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Result, TransportError};
use crate::link::ByteLink;
use crate::stream::DEFAULT_READ_TIMEOUT;

/// An in-process loopback link pair.
///
/// Bytes written on one end become readable on the other, with the same
/// timeout-bounded read semantics as a real link. Used by tests, examples,
/// and anywhere two engine instances need to talk without a device.
pub struct MemoryLink {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    read_timeout: Duration,
}

struct Pipe {
    queue: Mutex<PipeState>,
    arrived: Condvar,
}

struct PipeState {
    bytes: VecDeque<u8>,
    open: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(PipeState {
                bytes: VecDeque::new(),
                open: true,
            }),
            arrived: Condvar::new(),
        })
    }
}

impl MemoryLink {
    /// Create a connected pair with the default read timeout.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_timeout(DEFAULT_READ_TIMEOUT)
    }

    /// Create a connected pair with an explicit read timeout.
    pub fn pair_with_timeout(read_timeout: Duration) -> (Self, Self) {
        let forward = Pipe::new();
        let backward = Pipe::new();
        (
            Self {
                rx: Arc::clone(&backward),
                tx: Arc::clone(&forward),
                read_timeout,
            },
            Self {
                rx: forward,
                tx: backward,
                read_timeout,
            },
        )
    }

    fn poisoned() -> TransportError {
        TransportError::Io(std::io::Error::other("loopback lock poisoned"))
    }
}

impl ByteLink for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let mut state = self.rx.queue.lock().map_err(|_| Self::poisoned())?;
        let mut filled = 0;

        while filled < buf.len() {
            while let Some(byte) = state.bytes.pop_front() {
                buf[filled] = byte;
                filled += 1;
                if filled == buf.len() {
                    return Ok(filled);
                }
            }
            if !state.open {
                return Err(TransportError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(filled);
            }
            let (next, timed_out) = self
                .rx
                .arrived
                .wait_timeout(state, deadline - now)
                .map_err(|_| Self::poisoned())?;
            state = next;
            if timed_out.timed_out() && state.bytes.is_empty() {
                return Ok(filled);
            }
        }
        Ok(filled)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let mut state = self.tx.queue.lock().map_err(|_| Self::poisoned())?;
        if !state.open {
            return Err(TransportError::Closed);
        }
        state.bytes.extend(buf.iter().copied());
        self.tx.arrived.notify_all();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut state = self.rx.queue.lock().map_err(|_| Self::poisoned())?;
        state.bytes.clear();
        Ok(())
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        // Wake a peer blocked in read so it observes the close.
        if let Ok(mut state) = self.tx.queue.lock() {
            state.open = false;
        }
        self.tx.arrived.notify_all();
        if let Ok(mut state) = self.rx.queue.lock() {
            state.open = false;
        }
        self.rx.arrived.notify_all();
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn roundtrip_both_directions() {
        let (mut a, mut b) = MemoryLink::pair();

        a.write(b"to-b").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"to-b");

        b.write(b"to-a").unwrap();
        assert_eq!(a.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"to-a");
    }

    #[test]
    fn read_times_out_short() {
        let (mut a, mut b) = MemoryLink::pair_with_timeout(Duration::from_millis(10));
        b.write(&[7]).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(a.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn read_wakes_on_late_write() {
        let (mut a, mut b) = MemoryLink::pair_with_timeout(Duration::from_millis(500));

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            b.write(&[1, 2, 3]).unwrap();
            b
        });

        let mut buf = [0u8; 3];
        assert_eq!(a.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        drop(writer.join().unwrap());
    }

    #[test]
    fn flush_discards_pending() {
        let (mut a, mut b) = MemoryLink::pair_with_timeout(Duration::from_millis(10));
        b.write(&[1, 2, 3]).unwrap();

        a.flush().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(a.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn dropped_peer_closes_link() {
        let (mut a, b) = MemoryLink::pair_with_timeout(Duration::from_millis(10));
        drop(b);

        let mut buf = [0u8; 1];
        assert!(matches!(a.read(&mut buf), Err(TransportError::Closed)));
        assert!(matches!(a.write(&[0]), Err(TransportError::Closed)));
    }
}
