pub mod address;
pub mod frame;
pub mod protocol;
pub mod summary;

use crate::core::error::{DissectError, DissectResult};
use crate::dissector::chain::{ChainCursor, ChainStatus};
use crate::dissector::ip::IpData;
use crate::dissector::link::LinkData;
use crate::dissector::registry::DissectorRegistry;
use crate::dissector::sip::SipData;
use crate::dissector::tcp::TcpData;
use crate::dissector::tls::TlsData;
use crate::dissector::udp::UdpData;
use crate::dissector::websocket::WsData;
use crate::network::input::{CaptureInput, StaticInput};
use address::Address;
use bytes::{Bytes, BytesMut};
use frame::Frame;
use log::{trace, warn};
use protocol::{ProtocolData, ProtocolKind, SlotTable};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};

// 表示層向けのトランスポート種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
    Unknown,
}

impl Transport {
    pub fn from_layers(udp: bool, tcp: bool, ws: bool, tls: bool) -> Self {
        match (udp, tcp, ws, tls) {
            (true, _, _, _) => Transport::Udp,
            (false, true, true, true) => Transport::Wss,
            (false, true, true, false) => Transport::Ws,
            (false, true, false, true) => Transport::Tls,
            (false, true, false, false) => Transport::Tcp,
            (false, false, _, _) => Transport::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Udp => "UDP",
            Transport::Tcp => "TCP",
            Transport::Tls => "TLS",
            Transport::Ws => "WS",
            Transport::Wss => "WSS",
            Transport::Unknown => "???",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Source,
    Destination,
}

struct PacketInner {
    // このパケットを生成したキャプチャ元 (所有しない)
    input: Weak<dyn CaptureInput>,
    registry: Arc<DissectorRegistry>,
    frames: RwLock<Vec<Frame>>,
    slots: SlotTable,
    src: OnceLock<Address>,
    dst: OnceLock<Address>,
    cursor: Mutex<ChainCursor>,
}

// 参照カウントが 0 になったときに一度だけ呼ばれる
impl Drop for PacketInner {
    fn drop(&mut self) {
        for kind in ProtocolKind::ALL {
            let Some(data) = self.slots.take(kind) else {
                continue;
            };
            match self.registry.lookup(kind) {
                Some(dissector) => dissector.free(data),
                None => warn!("{}", DissectError::UnregisteredDissector(kind)),
            }
        }

        self.frames
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.src.take();
        self.dst.take();
        trace!("パケットを破棄しました");
    }
}

/// キャプチャされた1つ以上のフレームと、その解析結果。
///
/// `Packet` は参照カウント付きのハンドルで、`acquire` / `release` で共有する。
/// 最後の参照が解放されたときに各スロットのデータを対応するディセクタで解放する。
/// 解析 (フレーム追加とチェインの実行) は公開前に一つの経路から行うこと。
pub struct Packet {
    inner: Arc<PacketInner>,
}

impl Packet {
    pub fn new(input: &Arc<dyn CaptureInput>, registry: Arc<DissectorRegistry>) -> Self {
        Self::with_input(Arc::downgrade(input), registry)
    }

    // キャプチャ元を持たないパケット (ファイル再生やテスト用)
    pub fn detached(registry: Arc<DissectorRegistry>) -> Self {
        Self::with_input(Weak::<StaticInput>::new(), registry)
    }

    fn with_input(input: Weak<dyn CaptureInput>, registry: Arc<DissectorRegistry>) -> Self {
        Self {
            inner: Arc::new(PacketInner {
                input,
                registry,
                frames: RwLock::new(Vec::new()),
                slots: SlotTable::new(),
                src: OnceLock::new(),
                dst: OnceLock::new(),
                cursor: Mutex::new(ChainCursor::default()),
            }),
        }
    }

    pub fn acquire(&self) -> Packet {
        Packet {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn release(self) {
        drop(self);
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Packet) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn input(&self) -> Option<Arc<dyn CaptureInput>> {
        self.inner.input.upgrade()
    }

    pub fn registry(&self) -> &Arc<DissectorRegistry> {
        &self.inner.registry
    }

    // フレームの追加のみ。解析は DissectorChain が行う
    pub fn append_frame(&self, frame: Frame) {
        self.write_frames().push(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.read_frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_frames().is_empty()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.read_frames().clone()
    }

    pub fn first_frame(&self) -> Option<Frame> {
        self.read_frames().first().cloned()
    }

    // 全フレームのデータを到着順に連結したもの
    pub fn payload(&self) -> Bytes {
        let frames = self.read_frames();
        match frames.as_slice() {
            [] => Bytes::new(),
            [frame] => frame.data().clone(),
            frames => {
                let total = frames.iter().map(|frame| frame.data().len()).sum();
                let mut payload = BytesMut::with_capacity(total);
                for frame in frames {
                    payload.extend_from_slice(frame.data());
                }
                payload.freeze()
            }
        }
    }

    // 最後に追加されたフレームの時刻 (最大値ではない)
    pub fn try_last_frame_timestamp(&self) -> DissectResult<u64> {
        self.read_frames()
            .last()
            .map(Frame::timestamp)
            .ok_or(DissectError::EmptyPacket)
    }

    pub fn last_frame_timestamp(&self) -> u64 {
        self.try_last_frame_timestamp().unwrap_or_else(|e| {
            warn!("{}", e);
            0
        })
    }

    pub fn cmp_by_time(&self, other: &Packet) -> Ordering {
        self.last_frame_timestamp()
            .cmp(&other.last_frame_timestamp())
    }

    pub fn set_slot(&self, kind: ProtocolKind, data: ProtocolData) -> Result<(), ProtocolData> {
        self.inner.slots.set(kind, data)
    }

    pub fn get_slot(&self, kind: ProtocolKind) -> Option<&ProtocolData> {
        self.inner.slots.get(kind)
    }

    pub fn has_layer(&self, kind: ProtocolKind) -> bool {
        self.inner.slots.is_set(kind)
    }

    pub fn layers(&self) -> Vec<ProtocolKind> {
        self.inner.slots.populated().collect()
    }

    pub fn link(&self) -> Option<&LinkData> {
        match self.get_slot(ProtocolKind::Link)? {
            ProtocolData::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn ip(&self) -> Option<&IpData> {
        match self.get_slot(ProtocolKind::Ip)? {
            ProtocolData::Ip(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn udp(&self) -> Option<&UdpData> {
        match self.get_slot(ProtocolKind::Udp)? {
            ProtocolData::Udp(udp) => Some(udp),
            _ => None,
        }
    }

    pub fn tcp(&self) -> Option<&TcpData> {
        match self.get_slot(ProtocolKind::Tcp)? {
            ProtocolData::Tcp(tcp) => Some(tcp),
            _ => None,
        }
    }

    pub fn tls(&self) -> Option<&TlsData> {
        match self.get_slot(ProtocolKind::Tls)? {
            ProtocolData::Tls(tls) => Some(tls),
            _ => None,
        }
    }

    pub fn ws(&self) -> Option<&WsData> {
        match self.get_slot(ProtocolKind::Ws)? {
            ProtocolData::Ws(ws) => Some(ws),
            _ => None,
        }
    }

    pub fn sip(&self) -> Option<&SipData> {
        match self.get_slot(ProtocolKind::Sip)? {
            ProtocolData::Sip(sip) => Some(sip),
            _ => None,
        }
    }

    pub fn transport_kind(&self) -> Transport {
        Transport::from_layers(
            self.has_layer(ProtocolKind::Udp),
            self.has_layer(ProtocolKind::Tcp),
            self.has_layer(ProtocolKind::Ws),
            self.has_layer(ProtocolKind::Tls),
        )
    }

    pub fn transport(&self) -> &'static str {
        self.transport_kind().as_str()
    }

    pub fn try_source_address(&self) -> DissectResult<Address> {
        self.cached_address(&self.inner.src, Endpoint::Source)
    }

    pub fn try_destination_address(&self) -> DissectResult<Address> {
        self.cached_address(&self.inner.dst, Endpoint::Destination)
    }

    // IP / ポートが未解析の場合は None (後で再度問い合わせてよい)
    pub fn source_address(&self) -> Option<Address> {
        self.try_source_address().ok()
    }

    pub fn destination_address(&self) -> Option<Address> {
        self.try_destination_address().ok()
    }

    fn cached_address(&self, cell: &OnceLock<Address>, endpoint: Endpoint) -> DissectResult<Address> {
        if let Some(address) = cell.get() {
            return Ok(*address);
        }
        let address = self.derive_address(endpoint)?;
        Ok(*cell.get_or_init(|| address))
    }

    fn derive_address(&self, endpoint: Endpoint) -> DissectResult<Address> {
        let ip = self.ip().ok_or(DissectError::MissingLayer(ProtocolKind::Ip))?;

        // UDP を優先し、なければ TCP のポートを使う
        let (source_port, destination_port) = if let Some(udp) = self.udp() {
            (udp.source_port, udp.destination_port)
        } else if let Some(tcp) = self.tcp() {
            (tcp.source_port, tcp.destination_port)
        } else {
            return Err(DissectError::MissingLayer(ProtocolKind::Tcp));
        };

        Ok(match endpoint {
            Endpoint::Source => Address::new(ip.source, source_port),
            Endpoint::Destination => Address::new(ip.destination, destination_port),
        })
    }

    pub fn chain_status(&self) -> Option<ChainStatus> {
        self.lock_cursor().status()
    }

    pub(crate) fn lock_cursor(&self) -> MutexGuard<'_, ChainCursor> {
        self.inner
            .cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_frames(&self) -> std::sync::RwLockReadGuard<'_, Vec<Frame>> {
        self.inner
            .frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_frames(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Frame>> {
        self.inner
            .frames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for Packet {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("frames", &self.frame_count())
            .field("layers", &self.layers())
            .field("refs", &self.ref_count())
            .finish()
    }
}

// 最後のフレームの時刻で安定ソートする
pub fn sort_by_time(packets: &mut [Packet]) {
    packets.sort_by(Packet::cmp_by_time);
}
