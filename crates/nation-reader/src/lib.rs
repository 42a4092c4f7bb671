//! Host-side tooling for Nation UHF RFID readers.
//!
//! This crate connects [`nation_protocol`] to real links:
//!
//! - [`transport`]: serial ports, serial-over-TCP bridges and in-memory pairs
//! - [`Reader`]: a session that starts/stops inventory, rewrites EPCs and
//!   turns the inbound byte stream into [`ReaderEvent`]s
//! - [`TagTable`]: the tags seen so far, grouped by product
//! - [`Catalog`]: product lookup and auto-import of new tags

pub mod catalog;
pub mod config;
pub mod error;
pub mod inventory;
pub mod reader;
pub mod transport;

pub use catalog::{AutoImport, Catalog, ImportOutcome, NoCatalog, ProductInfo, ProductLookup};
pub use config::{ReaderConfig, ResyncMode};
pub use error::{ReaderError, ReaderResult};
pub use inventory::{ScannedTag, TagGroup, TagTable};
pub use reader::{InventoryState, Reader, ReaderEvent};
pub use transport::{ChannelTransport, SerialTransport, TcpTransport, Transport};
