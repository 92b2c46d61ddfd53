// テスト用のフレーム生成とディセクタ
use crate::dissector::registry::DissectorRegistry;
use crate::dissector::{DissectOutcome, Dissector};
use crate::network::input::{CaptureInput, LinkType, StaticInput};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

static ETHERNET_INPUT: OnceLock<Arc<dyn CaptureInput>> = OnceLock::new();

pub fn builtin_registry() -> Arc<DissectorRegistry> {
    Arc::new(DissectorRegistry::with_builtin())
}

pub fn test_input() -> Arc<dyn CaptureInput> {
    Arc::new(StaticInput::new("test", LinkType::Ethernet))
}

pub fn detached_packet() -> Packet {
    Packet::detached(builtin_registry())
}

// テスト終了まで生存する Ethernet キャプチャ元に紐づくパケット
pub fn ethernet_packet(registry: Arc<DissectorRegistry>) -> Packet {
    let input = ETHERNET_INPUT.get_or_init(test_input);
    Packet::new(input, registry)
}

pub fn ethernet_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x02, 0, 0, 0, 0, 0x02, 0x02, 0, 0, 0, 0, 0x01];
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn ipv4(src: [u8; 4], dst: [u8; 4], protocol: u8, transport: &[u8]) -> Vec<u8> {
    let total_length = (20 + transport.len()) as u16;
    let mut packet = vec![0x45, 0];
    packet.extend_from_slice(&total_length.to_be_bytes());
    // identification, flags, fragment offset
    packet.extend_from_slice(&[0, 1, 0, 0]);
    packet.extend_from_slice(&[64, protocol, 0, 0]);
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);
    packet.extend_from_slice(transport);
    packet
}

pub fn ipv4_udp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, payload: &[u8]) -> Vec<u8> {
    let length = (8 + payload.len()) as u16;
    let mut udp = Vec::with_capacity(length as usize);
    udp.extend_from_slice(&sport.to_be_bytes());
    udp.extend_from_slice(&dport.to_be_bytes());
    udp.extend_from_slice(&length.to_be_bytes());
    udp.extend_from_slice(&[0, 0]);
    udp.extend_from_slice(payload);
    ipv4(src, dst, 17, &udp)
}

pub fn ipv4_tcp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, payload: &[u8]) -> Vec<u8> {
    ipv4(src, dst, 6, &tcp_segment(sport, dport, payload))
}

pub fn tcp_segment(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    let mut tcp = Vec::with_capacity(20 + payload.len());
    tcp.extend_from_slice(&sport.to_be_bytes());
    tcp.extend_from_slice(&dport.to_be_bytes());
    tcp.extend_from_slice(&1000u32.to_be_bytes());
    tcp.extend_from_slice(&2000u32.to_be_bytes());
    // data offset 5, PSH|ACK
    tcp.extend_from_slice(&[0x50, 0x18]);
    tcp.extend_from_slice(&65535u16.to_be_bytes());
    tcp.extend_from_slice(&[0, 0, 0, 0]);
    tcp.extend_from_slice(payload);
    tcp
}

pub fn tls_record(content_type: u8, body: &[u8]) -> Vec<u8> {
    let mut record = vec![content_type, 3, 3];
    record.extend_from_slice(&(body.len() as u16).to_be_bytes());
    record.extend_from_slice(body);
    record
}

// FIN + テキストフレーム
pub fn ws_frame(payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let mask_bit = if mask.is_some() { 0x80 } else { 0 };
    let mut frame = vec![0x81];
    if payload.len() > 125 {
        frame.push(mask_bit | 126);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        frame.push(mask_bit | payload.len() as u8);
    }

    match mask {
        Some(key) => {
            frame.extend_from_slice(&key);
            frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
        }
        None => frame.extend_from_slice(payload),
    }
    frame
}

pub fn sip_invite(body: &str) -> Vec<u8> {
    format!(
        "INVITE sip:bob@biloxi.example.com SIP/2.0\r\n\
         Via: SIP/2.0/UDP pc33.example.com;branch=z9hG4bK776asdhds\r\n\
         From: Alice <sip:alice@example.com>;tag=1928301774\r\n\
         To: Bob <sip:bob@biloxi.example.com>\r\n\
         Call-ID: a84b4c76e66710@pc33.example.com\r\n\
         CSeq: 314159 INVITE\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        body.len(),
        body
    )
    .into_bytes()
}

// 解析も破棄もしない外部プロトコル用のディセクタ
pub struct OpaqueDissector(pub ProtocolKind);

impl Dissector for OpaqueDissector {
    fn kind(&self) -> ProtocolKind {
        self.0
    }

    fn parse(&self, _packet: &Packet, input: &Bytes) -> DissectOutcome {
        DissectOutcome::advance(ProtocolData::Opaque(input.clone()), input.len())
    }
}

// parse / free の呼び出し回数を数えるラッパー
pub struct Counting {
    inner: Box<dyn Dissector>,
    parsed: AtomicUsize,
    freed: AtomicUsize,
}

impl Counting {
    pub fn new<D: Dissector + 'static>(dissector: D) -> Self {
        Self {
            inner: Box::new(dissector),
            parsed: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
        }
    }

    pub fn parsed(&self) -> usize {
        self.parsed.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }
}

impl Dissector for Counting {
    fn kind(&self) -> ProtocolKind {
        self.inner.kind()
    }

    fn parse(&self, packet: &Packet, input: &Bytes) -> DissectOutcome {
        self.parsed.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(packet, input)
    }

    fn free(&self, data: ProtocolData) {
        self.freed.fetch_add(1, Ordering::SeqCst);
        self.inner.free(data);
    }
}

// 全種別に数えるディセクタを登録したレジストリ (カウンタは種別のインデックス順)
pub fn counting_registry() -> (Arc<DissectorRegistry>, Vec<Arc<Counting>>) {
    let counters: Vec<Arc<Counting>> = ProtocolKind::ALL
        .into_iter()
        .map(|kind| Arc::new(Counting::new(OpaqueDissector(kind))))
        .collect();

    let registry = counters
        .iter()
        .fold(DissectorRegistry::builder(), |builder, counter| {
            builder.register_shared(Arc::clone(counter) as Arc<dyn Dissector>)
        })
        .build();

    (Arc::new(registry), counters)
}
