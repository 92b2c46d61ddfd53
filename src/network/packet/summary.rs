use crate::dissector::chain::ChainStatus;
use crate::network::packet::address::Address;
use crate::network::packet::protocol::ProtocolKind;
use crate::network::packet::Packet;
use chrono::{DateTime, Utc};
use serde::Serialize;

// 解析済みパケットの出力用表現
#[derive(Debug, Clone, Serialize)]
pub struct PacketSummary {
    pub timestamp: Option<DateTime<Utc>>,
    pub frames: usize,
    pub source: Option<Address>,
    pub destination: Option<Address>,
    pub transport: &'static str,
    pub layers: Vec<ProtocolKind>,
    pub sip: Option<String>,
    pub call_id: Option<String>,
    pub status: Option<ChainStatus>,
}

impl PacketSummary {
    pub fn from_packet(packet: &Packet) -> Self {
        let sip = packet.sip();
        Self {
            timestamp: packet.first_frame().and_then(|frame| frame.datetime()),
            frames: packet.frame_count(),
            source: packet.source_address(),
            destination: packet.destination_address(),
            transport: packet.transport(),
            layers: packet.layers(),
            sip: sip.map(|sip| sip.first_line.clone()),
            call_id: sip.and_then(|sip| sip.call_id.clone()),
            status: packet.chain_status(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissector::chain::DissectorChain;
    use crate::network::packet::frame::Frame;
    use crate::test_utils::*;

    #[test]
    fn test_summary_of_sip_packet() {
        let packet = ethernet_packet(builtin_registry());
        let ip = ipv4_udp([10, 0, 0, 1], 5060, [10, 0, 0, 2], 5060, &sip_invite(""));
        packet.append_frame(Frame::new(1_700_000_000_000_000, ethernet_frame(0x0800, &ip)));
        DissectorChain::run(&packet);

        let summary = PacketSummary::from_packet(&packet);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.transport, "UDP");
        assert_eq!(summary.call_id.as_deref(), Some("a84b4c76e66710@pc33.example.com"));
        assert_eq!(summary.status, Some(ChainStatus::Complete));
        assert!(summary.timestamp.is_some());

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["transport"], "UDP");
        assert_eq!(json["layers"][3], "Sip");
        assert_eq!(json["status"], "Complete");
        assert_eq!(json["source"]["port"], 5060);
    }

    #[test]
    fn test_summary_of_empty_packet() {
        let summary = PacketSummary::from_packet(&detached_packet());
        assert_eq!(summary.frames, 0);
        assert!(summary.timestamp.is_none());
        assert!(summary.source.is_none());
        assert_eq!(summary.transport, "???");
        assert!(summary.status.is_none());
    }
}
