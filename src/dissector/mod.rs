pub mod chain;
pub mod ip;
pub mod link;
pub mod registry;
pub mod sip;
pub mod tcp;
pub mod tls;
pub mod udp;
pub mod websocket;

use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;

pub use chain::{ChainStatus, DissectorChain, Stage};
pub use registry::DissectorRegistry;

// 解析後に次のレイヤーへ渡すデータ
#[derive(Debug, Clone, PartialEq)]
pub enum Remainder {
    // 入力の先頭から指定バイトを消費した (残りは次のレイヤーへ)
    Advance(usize),
    // 次のレイヤーへは新しいペイロードを渡す (長さ制限やマスク解除の結果など)
    Payload(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DissectOutcome {
    Done {
        data: ProtocolData,
        remainder: Remainder,
    },
    // 蓄積されたフレームだけではバイト数が足りない
    NeedMoreData,
    // このレイヤーとしては解析できない
    Invalid,
}

impl DissectOutcome {
    pub fn advance(data: ProtocolData, consumed: usize) -> Self {
        DissectOutcome::Done {
            data,
            remainder: Remainder::Advance(consumed),
        }
    }

    pub fn payload(data: ProtocolData, payload: Bytes) -> Self {
        DissectOutcome::Done {
            data,
            remainder: Remainder::Payload(payload),
        }
    }
}

/// プロトコルごとの解析・解放機能。
///
/// チェインとパケット破棄処理はこのトレイトにのみ依存する。
/// `parse` にはそのレイヤーの先頭から始まる入力が渡される。
pub trait Dissector: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    fn parse(&self, packet: &Packet, input: &Bytes) -> DissectOutcome;

    fn free(&self, data: ProtocolData) {
        drop(data);
    }
}
