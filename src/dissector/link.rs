use crate::dissector::{DissectOutcome, Dissector};
use crate::network::input::LinkType;
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;
use log::trace;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_QINQ: u16 = 0x88A8;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const LINUX_SLL_HEADER_LEN: usize = 16;
const NULL_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkData {
    pub link_type: LinkType,
    pub header_len: usize,
    pub ethertype: u16,
    pub source: Option<[u8; 6]>,
    pub destination: Option<[u8; 6]>,
    pub vlan_id: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct EthernetHeader {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ethertype: u16,
    pub vlan_id: Option<u16>,
}

impl EthernetHeader {
    pub fn parse(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < ETHERNET_HEADER_LEN {
            return None;
        }

        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];

        destination.copy_from_slice(&data[0..6]);
        source.copy_from_slice(&data[6..12]);
        let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
        let mut header_len = ETHERNET_HEADER_LEN;
        let mut vlan_id = None;

        // 802.1Q / 802.1ad タグを読み飛ばす
        while ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ {
            if data.len() < header_len + VLAN_TAG_LEN {
                return None;
            }
            let tci = u16::from_be_bytes([data[header_len], data[header_len + 1]]);
            vlan_id.get_or_insert(tci & 0x0fff);
            ethertype = u16::from_be_bytes([data[header_len + 2], data[header_len + 3]]);
            header_len += VLAN_TAG_LEN;
        }

        Some((
            Self {
                destination,
                source,
                ethertype,
                vlan_id,
            },
            header_len,
        ))
    }
}

// IPのバージョンからイーサタイプを推定 (Raw IP 用)
fn ethertype_from_version(data: &[u8]) -> Option<u16> {
    match data.first()? >> 4 {
        4 => Some(ETHERTYPE_IPV4),
        6 => Some(ETHERTYPE_IPV6),
        _ => None,
    }
}

fn parse_link(link_type: LinkType, data: &[u8]) -> Option<LinkData> {
    match link_type {
        LinkType::Ethernet => {
            let (header, header_len) = EthernetHeader::parse(data)?;
            Some(LinkData {
                link_type,
                header_len,
                ethertype: header.ethertype,
                source: Some(header.source),
                destination: Some(header.destination),
                vlan_id: header.vlan_id,
            })
        }
        LinkType::LinuxSll => {
            if data.len() < LINUX_SLL_HEADER_LEN {
                return None;
            }
            Some(LinkData {
                link_type,
                header_len: LINUX_SLL_HEADER_LEN,
                ethertype: u16::from_be_bytes([data[14], data[15]]),
                source: None,
                destination: None,
                vlan_id: None,
            })
        }
        LinkType::Null => {
            if data.len() < NULL_HEADER_LEN {
                return None;
            }
            // アドレスファミリはキャプチャしたホストのバイトオーダー
            let family = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            let family = if family > 0xffff { family.swap_bytes() } else { family };
            let ethertype = match family {
                2 => ETHERTYPE_IPV4,
                24 | 28 | 30 => ETHERTYPE_IPV6,
                _ => return None,
            };
            Some(LinkData {
                link_type,
                header_len: NULL_HEADER_LEN,
                ethertype,
                source: None,
                destination: None,
                vlan_id: None,
            })
        }
        LinkType::RawIp => Some(LinkData {
            link_type,
            header_len: 0,
            ethertype: ethertype_from_version(data)?,
            source: None,
            destination: None,
            vlan_id: None,
        }),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkDissector;

impl Dissector for LinkDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Link
    }

    fn parse(&self, packet: &Packet, input: &Bytes) -> DissectOutcome {
        // キャプチャ元が既に閉じられている場合はイーサネットとみなす
        let link_type = packet
            .input()
            .map(|input| input.link_type())
            .unwrap_or_default();

        match parse_link(link_type, input) {
            Some(link) if link.ethertype == ETHERTYPE_IPV4 || link.ethertype == ETHERTYPE_IPV6 => {
                let header_len = link.header_len;
                DissectOutcome::advance(ProtocolData::Link(link), header_len)
            }
            Some(link) => {
                trace!("IP以外のイーサタイプです: 0x{:04x}", link.ethertype);
                DissectOutcome::Invalid
            }
            None => DissectOutcome::Invalid,
        }
    }
}
