//! A host-side session with one reader.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use nation_protocol::{
    AntennaSet, Command, EpcWrite, Frame, Message, ProtocolError, ProtocolSession,
    ReassemblerStats, SessionEvent, TagReport, WriteResult,
};
use tracing::{debug, info, trace, warn};

use crate::config::ReaderConfig;
use crate::error::{ReaderError, ReaderResult};
use crate::transport::Transport;

/// Size of a single transport read.
const READ_CHUNK: usize = 512;

/// Something that happened on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A tag was reported.
    TagSeen(TagReport),
    /// A write result arrived. `request` is the write it answers, or `None`
    /// if no write was outstanding (for example one that already timed out).
    WriteCompleted {
        request: Option<EpcWrite>,
        result: WriteResult,
    },
    /// A frame failed its checksum and was dropped.
    CorruptFrame { dropped: usize },
    /// A known frame whose payload could not be decoded.
    MalformedFrame { frame: Frame, error: ProtocolError },
    /// A frame this host does not handle.
    Unrecognized(Frame),
}

/// Inventory state as last commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryState {
    /// No inventory running.
    Idle,
    /// Continuous inventory on the given antennas.
    Running { antennas: AntennaSet, continuous: bool },
}

/// A session with one reader over a [`Transport`].
///
/// Everything is driven by the caller: commands are sent immediately, and
/// [`poll`](Self::poll) performs one read and returns what it decoded.
pub struct Reader<T: Transport> {
    transport: T,
    session: ProtocolSession,
    state: InventoryState,
    pending_write: Option<EpcWrite>,
    backlog: VecDeque<ReaderEvent>,
    settle_delay: Duration,
    buf: Vec<u8>,
}

impl<T: Transport> Reader<T> {
    /// Create a session with default settings.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &ReaderConfig::default())
    }

    /// Create a session using the timing and resync settings of `config`.
    pub fn with_config(transport: T, config: &ReaderConfig) -> Self {
        debug!("Reader session on {}", transport.describe());
        Reader {
            transport,
            session: ProtocolSession::with_policy(config.resync.into()),
            state: InventoryState::Idle,
            pending_write: None,
            backlog: VecDeque::new(),
            settle_delay: config.settle_delay(),
            buf: vec![0u8; READ_CHUNK],
        }
    }

    /// Current inventory state.
    pub fn state(&self) -> InventoryState {
        self.state
    }

    /// Whether continuous inventory is running.
    pub fn is_inventory_running(&self) -> bool {
        matches!(self.state, InventoryState::Running { .. })
    }

    /// The write waiting for its result, if any.
    pub fn pending_write(&self) -> Option<&EpcWrite> {
        self.pending_write.as_ref()
    }

    /// Reassembly counters for the inbound stream.
    pub fn stats(&self) -> ReassemblerStats {
        self.session.stats()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn send(&mut self, command: &Command) -> ReaderResult<()> {
        let bytes = self.session.encode_command(command);
        trace!("tx {} {}", command.name(), hex::encode(&bytes));
        self.transport.send(&bytes)
    }

    /// Start inventory on `antennas`.
    pub fn start_inventory(&mut self, antennas: AntennaSet, continuous: bool) -> ReaderResult<()> {
        if antennas.is_empty() {
            return Err(ProtocolError::NoAntennaSelected.into());
        }
        self.send(&Command::start_inventory(antennas, continuous))?;
        info!(
            "Inventory started on antennas {} ({})",
            antennas,
            if continuous { "continuous" } else { "single" }
        );
        self.state = if continuous {
            InventoryState::Running {
                antennas,
                continuous,
            }
        } else {
            InventoryState::Idle
        };
        Ok(())
    }

    /// Stop inventory.
    ///
    /// Reports already in flight are still delivered by later polls.
    pub fn stop_inventory(&mut self) -> ReaderResult<()> {
        self.send(&Command::stop_inventory())?;
        self.state = InventoryState::Idle;
        info!("Inventory stopped");
        Ok(())
    }

    /// Perform one read and return the decoded events, preceded by any
    /// events collected while settling or waiting for a write.
    pub fn poll(&mut self) -> ReaderResult<Vec<ReaderEvent>> {
        self.read_once()?;
        Ok(self.backlog.drain(..).collect())
    }

    /// Read once and queue what was decoded.
    fn read_once(&mut self) -> ReaderResult<()> {
        let n = self.transport.receive(&mut self.buf)?;
        if n == 0 {
            return Ok(());
        }
        trace!("rx {}", hex::encode(&self.buf[..n]));
        for event in self.session.feed(&self.buf[..n]) {
            let event = match event {
                SessionEvent::Message(Message::TagReport(report)) => ReaderEvent::TagSeen(report),
                SessionEvent::Message(Message::WriteResult(result)) => {
                    let request = self.pending_write.take();
                    if request.is_none() {
                        debug!("Write result {} with no write outstanding", result);
                    }
                    ReaderEvent::WriteCompleted { request, result }
                }
                SessionEvent::Message(Message::Unrecognized(frame)) => {
                    debug!("Unhandled frame {}", frame);
                    ReaderEvent::Unrecognized(frame)
                }
                SessionEvent::CorruptFrame { dropped, .. } => ReaderEvent::CorruptFrame { dropped },
                SessionEvent::Malformed { frame, error } => {
                    warn!("Malformed frame {}: {}", frame, error);
                    ReaderEvent::MalformedFrame { frame, error }
                }
            };
            self.backlog.push_back(event);
        }
        Ok(())
    }

    /// Send an EPC rewrite.
    ///
    /// The request is built before anything is sent, so an invalid request
    /// leaves the link untouched. If inventory is running it is stopped
    /// first, and the link is drained for the settle delay so the write is
    /// not sent into a burst of late tag reports.
    pub fn write_epc(&mut self, request: EpcWrite) -> ReaderResult<()> {
        if self.pending_write.is_some() {
            return Err(ReaderError::WriteInProgress);
        }
        let command = Command::WriteEpc(request.clone());

        if self.is_inventory_running() {
            self.stop_inventory()?;
            self.settle()?;
        }

        self.send(&command)?;
        info!(
            "Writing {} -> {} on antenna {}",
            request.old_epc(),
            request.new_epc(),
            request.antenna()
        );
        self.pending_write = Some(request);
        Ok(())
    }

    fn settle(&mut self) -> ReaderResult<()> {
        let deadline = Instant::now() + self.settle_delay;
        while Instant::now() < deadline {
            self.read_once()?;
        }
        Ok(())
    }

    /// Wait for the result of the outstanding write.
    ///
    /// Other events seen meanwhile are kept for the next [`poll`](Self::poll).
    /// On timeout the write is abandoned; a late result is then reported as
    /// a [`ReaderEvent::WriteCompleted`] without a request.
    pub fn wait_for_write(&mut self, timeout: Duration) -> ReaderResult<WriteResult> {
        if self.pending_write.is_none() {
            return Err(ReaderError::NoWriteInProgress);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Err(e) = self.read_once() {
                self.pending_write = None;
                return Err(e);
            }
            let found = self.backlog.iter().position(|e| {
                matches!(e, ReaderEvent::WriteCompleted { request: Some(_), .. })
            });
            if let Some(index) = found {
                if let Some(ReaderEvent::WriteCompleted { result, .. }) = self.backlog.remove(index) {
                    if result.is_success() {
                        info!("Write succeeded");
                    } else {
                        warn!("Write rejected: {}", result);
                    }
                    return Ok(result);
                }
            }
            if Instant::now() >= deadline {
                self.pending_write = None;
                warn!("No write result within {} ms", timeout.as_millis());
                return Err(ReaderError::Timeout(timeout.as_millis() as u64));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    fn reader() -> (Reader<ChannelTransport>, ChannelTransport) {
        let (host, device) = ChannelTransport::pair(Duration::from_millis(5));
        let config = ReaderConfig::for_port("test").with_settle_delay_ms(20);
        (Reader::with_config(host, &config), device)
    }

    fn recv_all(device: &mut ChannelTransport) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = device.receive(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_start_inventory_sends_frame() {
        let (mut reader, mut device) = reader();
        reader
            .start_inventory(AntennaSet::from_ids(&[1]).unwrap(), true)
            .unwrap();
        assert_eq!(
            recv_all(&mut device),
            hex::decode("5a0001021000050000000101f487").unwrap()
        );
        assert!(reader.is_inventory_running());
    }

    #[test]
    fn test_empty_antenna_set_sends_nothing() {
        let (mut reader, mut device) = reader();
        assert!(matches!(
            reader.start_inventory(AntennaSet::new(), true),
            Err(ReaderError::Protocol(ProtocolError::NoAntennaSelected))
        ));
        assert!(recv_all(&mut device).is_empty());
        assert!(!reader.is_inventory_running());
    }

    #[test]
    fn test_poll_decodes_tag_report() {
        let (mut reader, mut device) = reader();
        let report = Frame::new(0x02, 0x00, vec![0x00, 0x02, 0xBE, 0xEF, 0x30, 0x00, 0x02])
            .unwrap()
            .encode();
        device.send(&report).unwrap();

        let events = reader.poll().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ReaderEvent::TagSeen(r) => {
                assert_eq!(r.epc_hex(), "BEEF");
                assert_eq!(r.antenna_id, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_wait_without_write() {
        let (mut reader, _device) = reader();
        assert!(matches!(
            reader.wait_for_write(Duration::from_millis(1)),
            Err(ReaderError::NoWriteInProgress)
        ));
    }

    #[test]
    fn test_one_write_at_a_time() {
        let (mut reader, _device) = reader();
        let request = EpcWrite::new("AAAA", "BBBB", 1, 0).unwrap();
        reader.write_epc(request.clone()).unwrap();
        assert!(matches!(
            reader.write_epc(request),
            Err(ReaderError::WriteInProgress)
        ));
    }

    #[test]
    fn test_write_timeout_clears_pending() {
        let (mut reader, _device) = reader();
        reader
            .write_epc(EpcWrite::new("AAAA", "BBBB", 1, 0).unwrap())
            .unwrap();
        assert!(matches!(
            reader.wait_for_write(Duration::from_millis(20)),
            Err(ReaderError::Timeout(20))
        ));
        assert!(reader.pending_write().is_none());
    }

    #[test]
    fn test_disconnect_while_waiting_clears_pending() {
        let (mut reader, device) = reader();
        reader
            .write_epc(EpcWrite::new("AAAA", "BBBB", 1, 0).unwrap())
            .unwrap();
        drop(device);
        assert!(matches!(
            reader.wait_for_write(Duration::from_millis(50)),
            Err(ReaderError::Disconnected)
        ));
        assert!(reader.pending_write().is_none());
    }
}
