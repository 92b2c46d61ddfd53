use crate::dissector::{DissectOutcome, Dissector};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;

pub const TLS_CHANGE_CIPHER_SPEC: u8 = 20;
pub const TLS_ALERT: u8 = 21;
pub const TLS_HANDSHAKE: u8 = 22;
pub const TLS_APPLICATION_DATA: u8 = 23;

const TLS_RECORD_HEADER_LEN: usize = 5;
// 2^14 + 2048 (暗号化後の最大長)
const TLS_MAX_RECORD_LEN: usize = 18432;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsRecord {
    pub content_type: u8,
    pub version: u16,
    pub length: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsData {
    pub records: Vec<TlsRecord>,
}

impl TlsData {
    pub fn version(&self) -> Option<u16> {
        self.records.first().map(|record| record.version)
    }

    pub fn has_application_data(&self) -> bool {
        self.records
            .iter()
            .any(|record| record.content_type == TLS_APPLICATION_DATA)
    }
}

// TLSレコードヘッダーのシグネチャ判定
pub fn is_tls_record(data: &[u8]) -> bool {
    data.len() >= 3
        && (TLS_CHANGE_CIPHER_SPEC..=TLS_APPLICATION_DATA).contains(&data[0])
        && data[1] == 3
        && data[2] <= 4
}

// 3バイト未満の場合は受信済みのバイトだけでレコードヘッダーらしいかを判定する
pub fn could_be_tls_record(data: &[u8]) -> bool {
    match data {
        [] => false,
        [content_type] => (TLS_CHANGE_CIPHER_SPEC..=TLS_APPLICATION_DATA).contains(content_type),
        [content_type, major] => {
            (TLS_CHANGE_CIPHER_SPEC..=TLS_APPLICATION_DATA).contains(content_type) && *major == 3
        }
        _ => is_tls_record(data),
    }
}

/// TLSレコード層のディセクタ。
///
/// 鍵を持たないため復号は行わず、レコードを読み飛ばすだけ。
/// 途中で切れたレコードがあれば後続フレームを待つ。
#[derive(Debug, Default, Clone, Copy)]
pub struct TlsDissector;

impl Dissector for TlsDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Tls
    }

    fn parse(&self, _packet: &Packet, input: &Bytes) -> DissectOutcome {
        let mut records = Vec::new();
        let mut offset = 0;

        while offset < input.len() {
            let rest = &input[offset..];
            if !could_be_tls_record(rest) {
                return DissectOutcome::Invalid;
            }
            if rest.len() < TLS_RECORD_HEADER_LEN {
                return DissectOutcome::NeedMoreData;
            }

            let length = u16::from_be_bytes([rest[3], rest[4]]);
            if length as usize > TLS_MAX_RECORD_LEN {
                return DissectOutcome::Invalid;
            }
            if rest.len() < TLS_RECORD_HEADER_LEN + length as usize {
                return DissectOutcome::NeedMoreData;
            }

            records.push(TlsRecord {
                content_type: rest[0],
                version: u16::from_be_bytes([rest[1], rest[2]]),
                length,
            });
            offset += TLS_RECORD_HEADER_LEN + length as usize;
        }

        if records.is_empty() {
            return DissectOutcome::Invalid;
        }

        DissectOutcome::advance(ProtocolData::Tls(TlsData { records }), offset)
    }
}
