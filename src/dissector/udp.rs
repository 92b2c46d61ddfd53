use crate::dissector::{DissectOutcome, Dissector};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;

const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpData {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UdpData {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < UDP_HEADER_LEN {
            return None;
        }

        Some(Self {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            destination_port: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            checksum: u16::from_be_bytes([data[6], data[7]]),
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UdpDissector;

impl Dissector for UdpDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Udp
    }

    // UDP はフレームをまたがないため、長さ不足は再構築待ちではなく不正とする
    fn parse(&self, _packet: &Packet, input: &Bytes) -> DissectOutcome {
        let Some(udp) = UdpData::parse(input) else {
            return DissectOutcome::Invalid;
        };

        let length = udp.length as usize;
        if length < UDP_HEADER_LEN || length > input.len() {
            return DissectOutcome::Invalid;
        }

        // イーサネットのパディングを除いたペイロード
        let payload = input.slice(UDP_HEADER_LEN..length);
        DissectOutcome::payload(ProtocolData::Udp(udp), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissector::Remainder;
    use crate::test_utils::detached_packet;

    fn udp_datagram(payload: &[u8], padding: usize) -> Bytes {
        let mut data = Vec::new();
        data.extend_from_slice(&5060u16.to_be_bytes());
        data.extend_from_slice(&5080u16.to_be_bytes());
        data.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(payload);
        data.extend(std::iter::repeat(0).take(padding));
        Bytes::from(data)
    }

    #[test]
    fn test_payload_excludes_padding() {
        let outcome = UdpDissector.parse(&detached_packet(), &udp_datagram(b"hello", 6));
        match outcome {
            DissectOutcome::Done {
                data: ProtocolData::Udp(udp),
                remainder: Remainder::Payload(payload),
            } => {
                assert_eq!(udp.source_port, 5060);
                assert_eq!(udp.destination_port, 5080);
                assert_eq!(&payload[..], b"hello");
            }
            other => panic!("想定外の結果: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_datagram_is_invalid() {
        let datagram = udp_datagram(b"hello world", 0);
        let truncated = datagram.slice(..12);
        assert_eq!(
            UdpDissector.parse(&detached_packet(), &truncated),
            DissectOutcome::Invalid
        );
        assert_eq!(
            UdpDissector.parse(&detached_packet(), &datagram.slice(..4)),
            DissectOutcome::Invalid
        );
    }
}
