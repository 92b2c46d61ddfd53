use crate::core::error::DissectError;
use crate::dissector::ip::{IP_PROTO_TCP, IP_PROTO_UDP};
use crate::dissector::tls::could_be_tls_record;
use crate::dissector::websocket::is_ws_frame;
use crate::dissector::{DissectOutcome, Remainder};
use crate::network::packet::protocol::ProtocolKind;
use crate::network::packet::Packet;
use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use serde::Serialize;
use std::fmt;
use std::ops::Range;

// 解析段階 (この順に進む)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Link,
    Network,
    Transport,
    Tunnel,
    Application,
    Finished,
}

impl Stage {
    fn next(self) -> Stage {
        match self {
            Stage::Link => Stage::Network,
            Stage::Network => Stage::Transport,
            Stage::Transport => Stage::Tunnel,
            Stage::Tunnel => Stage::Application,
            Stage::Application | Stage::Finished => Stage::Finished,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainStatus {
    // これ以上解析するレイヤーがない
    Complete,
    // フレームの追加を待っている (同じレイヤーから再開する)
    NeedMoreData(ProtocolKind),
    // このレイヤーで解析を打ち切った
    Invalid(ProtocolKind),
    // ディセクタ未登録のため打ち切った
    Unregistered(ProtocolKind),
}

impl ChainStatus {
    // 再実行しても結果が変わらない状態か
    pub fn is_final(self) -> bool {
        !matches!(self, ChainStatus::NeedMoreData(_))
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::Complete => f.write_str("complete"),
            ChainStatus::NeedMoreData(kind) => write!(f, "need-more-data({})", kind),
            ChainStatus::Invalid(kind) => write!(f, "invalid({})", kind),
            ChainStatus::Unregistered(kind) => write!(f, "unregistered({})", kind),
        }
    }
}

/// パケットごとのチェイン再開位置。
///
/// `offset` はフレームを連結したデータ上の次のレイヤーの開始位置。
/// トンネルやUDPが新しいペイロードを作った場合は `payload` が優先される。
/// 最初のフレームのIPデータグラムより後ろ (イーサネットのパディング) は `padding` として読み飛ばす。
#[derive(Debug, Clone, Default)]
pub struct ChainCursor {
    stage: Stage,
    offset: usize,
    payload: Option<Bytes>,
    padding: Option<Range<usize>>,
    status: Option<ChainStatus>,
}

impl ChainCursor {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn status(&self) -> Option<ChainStatus> {
        self.status
    }

    fn input(&self, accumulated: &Bytes) -> Bytes {
        if let Some(payload) = &self.payload {
            return payload.clone();
        }
        let stream = self.strip_padding(accumulated);
        stream.slice(self.offset.min(stream.len())..)
    }

    // パディングを除いたフレーム連結データ
    fn strip_padding(&self, accumulated: &Bytes) -> Bytes {
        let Some(padding) = self.padding.clone() else {
            return accumulated.clone();
        };
        if padding.end > accumulated.len() {
            return accumulated.clone();
        }

        let tail = &accumulated[padding.end..];
        if tail.is_empty() {
            return accumulated.slice(..padding.start);
        }
        let mut stream = BytesMut::with_capacity(padding.start + tail.len());
        stream.extend_from_slice(&accumulated[..padding.start]);
        stream.extend_from_slice(tail);
        stream.freeze()
    }

    // IPヘッダーの全長より後ろに残る最初のフレームの末尾を記録する
    fn mark_padding(&mut self, packet: &Packet, datagram_start: usize) {
        if self.payload.is_some() || self.padding.is_some() {
            return;
        }
        let Some(ip) = packet.ip() else {
            return;
        };
        // 全長0 (TSO) など信頼できない値は無視する
        if ip.total_length < ip.header_len {
            return;
        }
        let first_len = packet.first_frame().map_or(0, |frame| frame.data().len());
        let datagram_end = datagram_start + ip.total_length;
        if datagram_end < first_len {
            trace!("パディングを除外します: {} bytes", first_len - datagram_end);
            self.padding = Some(datagram_end..first_len);
        }
    }

    fn advance(&mut self, remainder: Remainder) {
        match remainder {
            Remainder::Advance(consumed) => match &mut self.payload {
                Some(payload) => {
                    let consumed = consumed.min(payload.len());
                    *payload = payload.slice(consumed..);
                }
                None => self.offset += consumed,
            },
            Remainder::Payload(payload) => self.payload = Some(payload),
        }
    }

    fn halt(&mut self, status: ChainStatus) -> ChainStatus {
        self.status = Some(status);
        status
    }
}

enum Selection {
    Parse(ProtocolKind),
    // この段階は該当なし、次の段階へ
    Skip,
    // 解析終了
    Finish,
}

fn select(packet: &Packet, stage: Stage, input: &[u8]) -> Selection {
    match stage {
        Stage::Link => Selection::Parse(ProtocolKind::Link),
        Stage::Network => Selection::Parse(ProtocolKind::Ip),
        Stage::Transport => match packet.ip().map(|ip| ip.protocol) {
            Some(IP_PROTO_UDP) => Selection::Parse(ProtocolKind::Udp),
            Some(IP_PROTO_TCP) => Selection::Parse(ProtocolKind::Tcp),
            _ => Selection::Finish,
        },
        Stage::Tunnel => {
            if !packet.has_layer(ProtocolKind::Tcp) {
                return Selection::Skip;
            }
            if !packet.has_layer(ProtocolKind::Tls)
                && !packet.has_layer(ProtocolKind::Ws)
                && could_be_tls_record(input)
            {
                Selection::Parse(ProtocolKind::Tls)
            } else if !packet.has_layer(ProtocolKind::Ws) && is_ws_frame(input) {
                Selection::Parse(ProtocolKind::Ws)
            } else {
                Selection::Skip
            }
        }
        Stage::Application if input.is_empty() => Selection::Finish,
        Stage::Application => Selection::Parse(ProtocolKind::Sip),
        Stage::Finished => Selection::Finish,
    }
}

/// Link → IP → UDP|TCP → TLS/WS → SIP の順にディセクタを適用する。
///
/// 同じパケットに対して何度呼んでもよく、解析済みのレイヤーは再解析しない。
/// 同一パケットへの同時呼び出しは呼び出し側で直列化すること。
#[derive(Debug, Default, Clone, Copy)]
pub struct DissectorChain;

impl DissectorChain {
    pub fn run(packet: &Packet) -> ChainStatus {
        let mut cursor = packet.lock_cursor();
        if let Some(status) = cursor.status.filter(|status| status.is_final()) {
            return status;
        }

        let accumulated = packet.payload();
        let registry = packet.registry();

        loop {
            let input = cursor.input(&accumulated);
            let kind = match select(packet, cursor.stage, &input) {
                Selection::Parse(kind) => kind,
                Selection::Skip => {
                    cursor.stage = cursor.stage.next();
                    continue;
                }
                Selection::Finish => {
                    cursor.stage = Stage::Finished;
                    return cursor.halt(ChainStatus::Complete);
                }
            };

            let Some(dissector) = registry.lookup(kind) else {
                warn!("{}", DissectError::UnregisteredDissector(kind));
                return cursor.halt(ChainStatus::Unregistered(kind));
            };

            match dissector.parse(packet, &input) {
                DissectOutcome::Done { data, remainder } => {
                    if packet.set_slot(kind, data).is_err() {
                        warn!("{}", DissectError::SlotOccupied(kind));
                    }
                    let layer_start = cursor.offset;
                    cursor.advance(remainder);
                    if kind == ProtocolKind::Ip {
                        cursor.mark_padding(packet, layer_start);
                    }
                    trace!("{} を解析しました", kind);
                    // トンネル段階は TLS の後に WS が続く場合があるため留まる
                    if cursor.stage != Stage::Tunnel {
                        cursor.stage = cursor.stage.next();
                    }
                }
                // デコード済みのペイロードは後続フレームで伸びないため待たない
                DissectOutcome::NeedMoreData if cursor.payload.is_some() => {
                    debug!("{} がデコード済みペイロードの途中で終わっています", kind);
                    return cursor.halt(ChainStatus::Invalid(kind));
                }
                DissectOutcome::NeedMoreData => {
                    debug!("{} の解析にはフレームが不足しています", kind);
                    return cursor.halt(ChainStatus::NeedMoreData(kind));
                }
                DissectOutcome::Invalid => {
                    trace!("{} として解析できませんでした", kind);
                    return cursor.halt(ChainStatus::Invalid(kind));
                }
            }
        }
    }

    // 再構築を諦め、待っていたレイヤーを不正として確定させる
    pub fn abandon(packet: &Packet) -> ChainStatus {
        let mut cursor = packet.lock_cursor();
        match cursor.status {
            Some(ChainStatus::NeedMoreData(kind)) => cursor.halt(ChainStatus::Invalid(kind)),
            Some(status) => status,
            None => cursor.halt(ChainStatus::Invalid(ProtocolKind::Link)),
        }
    }
}
