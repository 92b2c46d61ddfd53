use crate::dissector::ip::IpData;
use crate::dissector::link::LinkData;
use crate::dissector::sip::SipData;
use crate::dissector::tcp::TcpData;
use crate::dissector::tls::TlsData;
use crate::dissector::udp::UdpData;
use crate::dissector::websocket::WsData;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// パケットが持ちうるプロトコル
// スロットのインデックスとしてのみ使用する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolKind {
    Link = 0,
    Ip = 1,
    Udp,
    Tcp,
    Tls,
    Ws,
    Sip,
    Sdp,
    Rtp,
    Rtcp,
    Hep,
}

impl ProtocolKind {
    pub const COUNT: usize = 11;

    pub const ALL: [ProtocolKind; ProtocolKind::COUNT] = [
        ProtocolKind::Link,
        ProtocolKind::Ip,
        ProtocolKind::Udp,
        ProtocolKind::Tcp,
        ProtocolKind::Tls,
        ProtocolKind::Ws,
        ProtocolKind::Sip,
        ProtocolKind::Sdp,
        ProtocolKind::Rtp,
        ProtocolKind::Rtcp,
        ProtocolKind::Hep,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ProtocolKind::Link => "LINK",
            ProtocolKind::Ip => "IP",
            ProtocolKind::Udp => "UDP",
            ProtocolKind::Tcp => "TCP",
            ProtocolKind::Tls => "TLS",
            ProtocolKind::Ws => "WS",
            ProtocolKind::Sip => "SIP",
            ProtocolKind::Sdp => "SDP",
            ProtocolKind::Rtp => "RTP",
            ProtocolKind::Rtcp => "RTCP",
            ProtocolKind::Hep => "HEP",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// 各レイヤーの解析結果
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolData {
    Link(LinkData),
    Ip(IpData),
    Udp(UdpData),
    Tcp(TcpData),
    Tls(TlsData),
    Ws(WsData),
    Sip(SipData),
    // 外部ディセクタ (SDP, RTP, RTCP, HEP など) の解析結果
    Opaque(Bytes),
}

impl ProtocolData {
    pub fn kind(&self) -> Option<ProtocolKind> {
        match self {
            ProtocolData::Link(_) => Some(ProtocolKind::Link),
            ProtocolData::Ip(_) => Some(ProtocolKind::Ip),
            ProtocolData::Udp(_) => Some(ProtocolKind::Udp),
            ProtocolData::Tcp(_) => Some(ProtocolKind::Tcp),
            ProtocolData::Tls(_) => Some(ProtocolKind::Tls),
            ProtocolData::Ws(_) => Some(ProtocolKind::Ws),
            ProtocolData::Sip(_) => Some(ProtocolKind::Sip),
            ProtocolData::Opaque(_) => None,
        }
    }
}

/// プロトコル種別でインデックスされる固定長のスロット表。
///
/// 各スロットは一度だけ書き込める。値の取り出しはパケット破棄時
/// (`&mut self` を持つとき) に限られる。
#[derive(Debug)]
pub struct SlotTable {
    slots: [OnceLock<ProtocolData>; ProtocolKind::COUNT],
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    pub fn get(&self, kind: ProtocolKind) -> Option<&ProtocolData> {
        self.slots[kind.index()].get()
    }

    // 既に設定済みの場合はデータをそのまま返す
    pub fn set(&self, kind: ProtocolKind, data: ProtocolData) -> Result<(), ProtocolData> {
        self.slots[kind.index()].set(data)
    }

    pub fn is_set(&self, kind: ProtocolKind) -> bool {
        self.slots[kind.index()].get().is_some()
    }

    pub fn populated(&self) -> impl Iterator<Item = ProtocolKind> + '_ {
        ProtocolKind::ALL
            .into_iter()
            .filter(move |kind| self.is_set(*kind))
    }

    pub fn take(&mut self, kind: ProtocolKind) -> Option<ProtocolData> {
        self.slots[kind.index()].take()
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}
