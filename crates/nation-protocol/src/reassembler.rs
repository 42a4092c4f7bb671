//! Stream reassembly for the reader's byte stream.
//!
//! Serial reads arrive in arbitrary chunks: a frame may be split across many
//! reads, several frames may arrive in one read, and line noise may appear
//! between them. [`StreamReassembler`] buffers the input and emits every
//! complete frame in wire order.

use bytes::{Buf, BytesMut};
use log::{debug, warn};

use crate::constants::*;
use crate::frame::{DecodeOutcome, Frame, FrameCodec, ResyncReason};

/// Initial buffer capacity; one maximum-size frame needs more, and grows on demand.
const INITIAL_CAPACITY: usize = 1024;

/// What to discard when a complete candidate frame fails its checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncPolicy {
    /// Drop the whole candidate and resume after it.
    #[default]
    DiscardFrame,
    /// Drop only the sync byte and search again from the next byte.
    SkipByte,
}

/// An event produced by [`StreamReassembler::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A frame whose checksum validated.
    Frame(Frame),
    /// A structurally complete frame failed its checksum and was dropped.
    CorruptFrame {
        /// CRC computed over the candidate.
        computed: u16,
        /// CRC carried by the candidate.
        received: u16,
        /// Bytes discarded.
        dropped: usize,
    },
}

/// Counters kept by a reassembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames emitted.
    pub frames: u64,
    /// Candidates rejected by the checksum.
    pub corrupt_frames: u64,
    /// Bytes thrown away while hunting for sync, including corrupt frames.
    pub bytes_discarded: u64,
}

/// Reassembles frames from a fragmented byte stream.
///
/// One instance per connection; the buffer is never shared.
#[derive(Debug)]
pub struct StreamReassembler {
    buffer: BytesMut,
    policy: ResyncPolicy,
    stats: ReassemblerStats,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReassembler {
    /// Create a reassembler that discards whole corrupt frames.
    pub fn new() -> Self {
        Self::with_policy(ResyncPolicy::default())
    }

    /// Create a reassembler with the given resync policy.
    pub fn with_policy(policy: ResyncPolicy) -> Self {
        StreamReassembler {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            policy,
            stats: ReassemblerStats::default(),
        }
    }

    /// The resync policy in use.
    pub fn policy(&self) -> ResyncPolicy {
        self.policy
    }

    /// Append received bytes and extract every complete frame.
    ///
    /// Partial frames stay buffered for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(data);

        let mut events = Vec::new();
        loop {
            match FrameCodec::try_decode(&self.buffer) {
                DecodeOutcome::Decoded { frame, consumed } => {
                    self.buffer.advance(consumed);
                    self.stats.frames += 1;
                    events.push(StreamEvent::Frame(frame));
                }
                DecodeOutcome::NeedMoreData => break,
                DecodeOutcome::Resync { drop, reason } => {
                    let dropped = match reason {
                        ResyncReason::SyncLost => {
                            debug!("no sync byte, discarding {} buffered bytes", drop);
                            drop
                        }
                        ResyncReason::LeadingGarbage => {
                            debug!("discarding {} bytes before sync", drop);
                            drop
                        }
                        ResyncReason::CrcMismatch {
                            computed,
                            received,
                            frame_len,
                        } => {
                            let dropped = match self.policy {
                                ResyncPolicy::DiscardFrame => frame_len,
                                ResyncPolicy::SkipByte => drop,
                            };
                            warn!(
                                "CRC mismatch (computed 0x{:04X}, received 0x{:04X}), dropping {} bytes",
                                computed, received, dropped
                            );
                            self.stats.corrupt_frames += 1;
                            events.push(StreamEvent::CorruptFrame {
                                computed,
                                received,
                                dropped,
                            });
                            dropped
                        }
                    };
                    self.buffer.advance(dropped);
                    self.stats.bytes_discarded += dropped as u64;
                }
            }
        }

        events
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether a frame header has been seen but its body is still missing.
    pub fn has_partial_frame(&self) -> bool {
        self.buffer.first() == Some(&FRAME_SYNC)
    }

    /// Counters since creation.
    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
