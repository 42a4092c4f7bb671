//! Byte transports between the host and a reader.
//!
//! The reader itself only needs to push bytes out and pull whatever has
//! arrived. A read that times out is not an error; it returns `Ok(0)` so the
//! caller can keep its own clocks (settle delay, write timeout) running.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info};

use crate::config::ReaderConfig;
use crate::error::{ReaderError, ReaderResult};

/// A bidirectional byte link to a reader.
pub trait Transport {
    /// Write all of `data` to the link.
    fn send(&mut self, data: &[u8]) -> ReaderResult<()>;

    /// Read whatever is available into `buf`, waiting at most the link's
    /// read timeout. Returns `Ok(0)` when nothing arrived in time.
    fn receive(&mut self, buf: &mut [u8]) -> ReaderResult<usize>;

    /// Human-readable name of the link, for logs.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> ReaderResult<()> {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> ReaderResult<usize> {
        (**self).receive(buf)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ============================================================================
// Serial
// ============================================================================

/// A local serial port (8N1, no flow control).
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open a serial port.
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> ReaderResult<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()?;
        info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(SerialTransport {
            port,
            name: path.to_string(),
        })
    }

    /// List serial ports present on this machine.
    pub fn available_ports() -> ReaderResult<Vec<String>> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> ReaderResult<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> ReaderResult<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("serial {}", self.name)
    }
}

// ============================================================================
// TCP
// ============================================================================

/// A serial-over-TCP bridge (raw socket, no framing of its own).
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
}

impl TcpTransport {
    /// Connect to a bridge at `addr` (`host:port`).
    pub fn connect(addr: &str, read_timeout: Duration) -> ReaderResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;
        info!("Connected to {}", addr);
        Ok(TcpTransport {
            stream,
            peer: addr.to_string(),
        })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> ReaderResult<()> {
        self.stream.write_all(data)?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> ReaderResult<usize> {
        match self.stream.read(buf) {
            Ok(0) => Err(ReaderError::Disconnected),
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.peer)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// One end of an in-memory link.
///
/// Each `send` delivers one chunk to the other end; a `receive` returns at most
/// one chunk, keeping any remainder for the next call.
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    read_timeout: Duration,
    label: &'static str,
}

impl ChannelTransport {
    /// Create a connected pair: (host end, device end).
    pub fn pair(read_timeout: Duration) -> (ChannelTransport, ChannelTransport) {
        let (host_tx, device_rx) = crossbeam_channel::unbounded();
        let (device_tx, host_rx) = crossbeam_channel::unbounded();
        (
            ChannelTransport {
                tx: host_tx,
                rx: host_rx,
                pending: Vec::new(),
                read_timeout,
                label: "host",
            },
            ChannelTransport {
                tx: device_tx,
                rx: device_rx,
                pending: Vec::new(),
                read_timeout,
                label: "device",
            },
        )
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, data: &[u8]) -> ReaderResult<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| ReaderError::Disconnected)
    }

    fn receive(&mut self, buf: &mut [u8]) -> ReaderResult<usize> {
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }
        match self.rx.recv_timeout(self.read_timeout) {
            Ok(chunk) => {
                self.pending = chunk;
                Ok(self.drain_pending(buf))
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => Err(ReaderError::Disconnected),
        }
    }

    fn describe(&self) -> String {
        format!("channel ({})", self.label)
    }
}

/// Open the transport named by `config.port`.
///
/// `tcp://host:port` connects to a bridge, anything else is a serial device.
pub fn open(config: &ReaderConfig) -> ReaderResult<Box<dyn Transport + Send>> {
    if let Some(addr) = config.tcp_address() {
        debug!("Using TCP bridge at {}", addr);
        Ok(Box::new(TcpTransport::connect(addr, config.read_timeout())?))
    } else {
        Ok(Box::new(SerialTransport::open(
            &config.port,
            config.baud_rate,
            config.read_timeout(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_pair_delivers_both_ways() {
        let (mut host, mut device) = ChannelTransport::pair(Duration::from_millis(20));
        host.send(&[1, 2, 3]).unwrap();
        device.send(&[9]).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(device.receive(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(host.receive(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 9);
    }

    #[test]
    fn test_channel_timeout_returns_zero() {
        let (mut host, _device) = ChannelTransport::pair(Duration::from_millis(5));
        let mut buf = [0u8; 8];
        assert_eq!(host.receive(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_channel_small_buffer_keeps_remainder() {
        let (mut host, mut device) = ChannelTransport::pair(Duration::from_millis(20));
        device.send(&[1, 2, 3, 4, 5]).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(host.receive(&mut buf).unwrap(), 2);
        assert_eq!(host.receive(&mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
        assert_eq!(host.receive(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn test_channel_disconnect() {
        let (mut host, device) = ChannelTransport::pair(Duration::from_millis(20));
        drop(device);
        let mut buf = [0u8; 8];
        assert!(matches!(host.receive(&mut buf), Err(ReaderError::Disconnected)));
        assert!(matches!(host.send(&[1]), Err(ReaderError::Disconnected)));
    }
}
