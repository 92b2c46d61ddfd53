use crate::dissector::{DissectOutcome, Dissector};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpData {
    pub version: u8,
    // 上位プロトコル番号 (IPv6 では Next Header)
    pub protocol: u8,
    pub source: IpAddr,
    pub destination: IpAddr,
    pub header_len: usize,
    // ヘッダーを含む全長
    pub total_length: usize,
    pub ttl: u8,
    pub identification: u32,
    pub more_fragments: bool,
    pub fragment_offset: u16,
}

// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version|  IHL  |Type of Service|          Total Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Identification        |Flags|      Fragment Offset    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Time to Live |    Protocol   |         Header Checksum       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Source Address                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Destination Address                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
fn parse_ipv4(data: &[u8]) -> Option<IpData> {
    if data.len() < IPV4_MIN_HEADER_LEN {
        return None;
    }

    let header_len = (data[0] & 0xf) as usize * 4;
    if header_len < IPV4_MIN_HEADER_LEN || data.len() < header_len {
        return None;
    }

    let total_length = u16::from_be_bytes([data[2], data[3]]) as usize;
    let identification = u16::from_be_bytes([data[4], data[5]]);
    let flags_fragment_offset = u16::from_be_bytes([data[6], data[7]]);

    Some(IpData {
        version: 4,
        protocol: data[9],
        source: IpAddr::V4(Ipv4Addr::new(data[12], data[13], data[14], data[15])),
        destination: IpAddr::V4(Ipv4Addr::new(data[16], data[17], data[18], data[19])),
        header_len,
        total_length,
        ttl: data[8],
        identification: identification as u32,
        more_fragments: flags_fragment_offset & 0x2000 != 0,
        fragment_offset: (flags_fragment_offset & 0x1fff) * 8,
    })
}

fn parse_ipv6(data: &[u8]) -> Option<IpData> {
    if data.len() < IPV6_HEADER_LEN {
        return None;
    }

    let flow_label = u32::from_be_bytes([0, data[1] & 0xf, data[2], data[3]]);
    let payload_length = u16::from_be_bytes([data[4], data[5]]) as usize;

    let mut source_bytes = [0u8; 16];
    source_bytes.copy_from_slice(&data[8..24]);
    let mut dest_bytes = [0u8; 16];
    dest_bytes.copy_from_slice(&data[24..40]);

    Some(IpData {
        version: 6,
        protocol: data[6],
        source: IpAddr::V6(Ipv6Addr::from(source_bytes)),
        destination: IpAddr::V6(Ipv6Addr::from(dest_bytes)),
        header_len: IPV6_HEADER_LEN,
        total_length: IPV6_HEADER_LEN + payload_length,
        ttl: data[7],
        identification: flow_label,
        more_fragments: false,
        fragment_offset: 0,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IpDissector;

impl Dissector for IpDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ip
    }

    fn parse(&self, _packet: &Packet, input: &Bytes) -> DissectOutcome {
        let ip = match input.first().map(|b| b >> 4) {
            Some(4) => parse_ipv4(input),
            Some(6) => parse_ipv6(input),
            _ => None,
        };

        match ip {
            // フラグメントの再構築はこのレイヤーでは行わない
            Some(ip) if ip.more_fragments || ip.fragment_offset != 0 => DissectOutcome::Invalid,
            Some(ip) => {
                let header_len = ip.header_len;
                DissectOutcome::advance(ProtocolData::Ip(ip), header_len)
            }
            None => DissectOutcome::Invalid,
        }
    }
}
