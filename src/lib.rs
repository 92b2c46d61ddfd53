pub mod core;
pub mod dissector;
pub mod network;

#[cfg(test)]
mod test_utils;

pub use crate::core::{Configuration, DissectError, DissectResult, PacketPipeline};
pub use crate::dissector::{ChainStatus, Dissector, DissectorChain, DissectorRegistry};
pub use crate::network::packet::summary::PacketSummary;
pub use crate::network::packet::{sort_by_time, Packet, Transport};
