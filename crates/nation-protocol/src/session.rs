//! A per-connection protocol session.

use log::{debug, trace};

use crate::commands::Command;
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::reassembler::{ReassemblerStats, ResyncPolicy, StreamEvent, StreamReassembler};
use crate::responses::Message;

/// An event produced by [`ProtocolSession::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A validated and classified message.
    Message(Message),
    /// A frame failed its checksum and was dropped.
    CorruptFrame {
        /// CRC computed over the candidate.
        computed: u16,
        /// CRC carried by the candidate.
        received: u16,
        /// Bytes discarded.
        dropped: usize,
    },
    /// A valid frame whose payload did not match its message layout.
    Malformed {
        /// The frame.
        frame: Frame,
        /// What was wrong with it.
        error: ProtocolError,
    },
}

/// A simple synchronous interface for encoding commands and decoding messages.
///
/// This can be used with any byte stream (serial port, TCP socket, etc.).
/// The caller drives it: write what [`encode_command`](Self::encode_command)
/// returns, and pass every received chunk to [`feed`](Self::feed).
#[derive(Debug, Default)]
pub struct ProtocolSession {
    reassembler: StreamReassembler,
}

impl ProtocolSession {
    /// Create a new protocol session.
    pub fn new() -> Self {
        ProtocolSession {
            reassembler: StreamReassembler::new(),
        }
    }

    /// Create a session with the given resync policy.
    pub fn with_policy(policy: ResyncPolicy) -> Self {
        ProtocolSession {
            reassembler: StreamReassembler::with_policy(policy),
        }
    }

    /// Encode a command for transmission.
    pub fn encode_command(&self, command: &Command) -> Vec<u8> {
        let encoded = command.encode();
        trace!("encoded {} ({} bytes)", command.name(), encoded.len());
        encoded
    }

    /// Feed received data and decode every complete message, in wire order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<SessionEvent> {
        self.reassembler
            .feed(data)
            .into_iter()
            .map(|event| match event {
                StreamEvent::Frame(frame) => match Message::decode(&frame) {
                    Ok(message) => SessionEvent::Message(message),
                    Err(error) => {
                        debug!("malformed frame {}: {}", frame, error);
                        SessionEvent::Malformed { frame, error }
                    }
                },
                StreamEvent::CorruptFrame {
                    computed,
                    received,
                    dropped,
                } => SessionEvent::CorruptFrame {
                    computed,
                    received,
                    dropped,
                },
            })
            .collect()
    }

    /// Number of bytes waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.reassembler.buffered_len()
    }

    /// Reassembly counters.
    pub fn stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }

    /// Reset the session state.
    pub fn reset(&mut self) {
        self.reassembler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::WriteResult;
    use crate::types::AntennaSet;

    #[test]
    fn test_reports_after_stop_are_delivered() {
        let mut session = ProtocolSession::new();
        let stop = session.encode_command(&Command::stop_inventory());
        assert_eq!(stop.len(), 9);

        let report = Frame::new(0x02, 0x00, vec![0x00, 0x02, 0xBE, 0xEF, 0x30, 0x00, 0x01])
            .unwrap()
            .encode();
        let mut inbound = report.clone();
        inbound.extend(&report);

        let events = session.feed(&inbound);
        assert_eq!(events.len(), 2);
        for event in events {
            match event {
                SessionEvent::Message(Message::TagReport(r)) => assert_eq!(r.epc_hex(), "BEEF"),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_malformed_report_does_not_stop_decoding() {
        let mut session = ProtocolSession::new();
        let mut inbound = Frame::new(0x02, 0x00, vec![0x00, 0x20, 0x01]).unwrap().encode();
        inbound.extend(Frame::new(0x02, 0x11, vec![0x00]).unwrap().encode());

        let events = session.feed(&inbound);
        assert!(matches!(events[0], SessionEvent::Malformed { .. }));
        assert_eq!(events[1], SessionEvent::Message(Message::WriteResult(WriteResult::Success)));
    }

    #[test]
    fn test_encode_matches_command() {
        let session = ProtocolSession::new();
        let cmd = Command::start_inventory(AntennaSet::from_ids(&[2]).unwrap(), true);
        assert_eq!(session.encode_command(&cmd), cmd.encode());
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut session = ProtocolSession::new();
        session.feed(&[0x5A, 0x00, 0x01]);
        assert_eq!(session.buffered_len(), 3);
        session.reset();
        assert_eq!(session.buffered_len(), 0);
    }
}
