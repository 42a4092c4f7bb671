//! Nation UHF RFID Reader Protocol
//!
//! This crate provides types and utilities for talking to Nation-family UHF RFID
//! readers over their binary serial protocol. Every message, in both directions,
//! is carried in the same frame:
//!
//! ```text
//! +------+-----------+----------+-----+-----------+-----------------+-----------+
//! | 0x5A | 0x00 0x01 | category | mid | len (BE)  | payload[0..len] | CRC16 (BE)|
//! +------+-----------+----------+-----+-----------+-----------------+-----------+
//! ```
//!
//! The CRC is CRC-16/CCITT (polynomial 0x1021, zero init, no final XOR) over
//! everything after the sync byte up to the end of the payload.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → reader): start/stop inventory and EPC rewrite, see [`Command`]
//! - **Messages** (reader → host): tag reports and write results, see [`Message`]
//!
//! The protocol has no byte stuffing, so inbound data is recovered by scanning
//! for the sync byte and validating the checksum of each candidate frame. The
//! [`StreamReassembler`] does this for an arbitrarily fragmented byte stream.
//!
//! # Example
//!
//! ```rust,ignore
//! use nation_protocol::{AntennaSet, Command, ProtocolSession, SessionEvent};
//!
//! let mut session = ProtocolSession::new();
//! let start = Command::start_inventory(AntennaSet::from_ids(&[1, 3])?, true);
//! port.write_all(&session.encode_command(&start))?;
//!
//! for event in session.feed(&received) {
//!     if let SessionEvent::Message(Message::TagReport(report)) = event {
//!         println!("{} on antenna {}", report.epc, report.antenna_id);
//!     }
//! }
//! ```

mod commands;
mod constants;
mod crc;
mod error;
mod frame;
mod reassembler;
mod responses;
mod session;
mod types;

pub use commands::*;
pub use constants::*;
pub use crc::*;
pub use error::*;
pub use frame::*;
pub use reassembler::*;
pub use responses::*;
pub use session::*;
pub use types::*;
