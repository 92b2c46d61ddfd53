use crate::dissector::{DissectOutcome, Dissector};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;

pub const WS_OPCODE_CONTINUATION: u8 = 0x0;
pub const WS_OPCODE_TEXT: u8 = 0x1;
pub const WS_OPCODE_BINARY: u8 = 0x2;
pub const WS_OPCODE_CLOSE: u8 = 0x8;

const WS_FIN: u8 = 0x80;
const WS_RSV: u8 = 0x70;
const WS_OPCODE: u8 = 0x0f;
const WS_MASK: u8 = 0x80;
const WS_LEN: u8 = 0x7f;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsData {
    pub fin: bool,
    pub opcode: u8,
    pub mask_key: Option<[u8; 4]>,
    pub header_len: usize,
    pub payload_len: u64,
}

// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-------+-+-------------+-------------------------------+
// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
// | |1|2|3|       |K|             |                               |
// +-+-+-+-+-------+-+-------------+-------------------------------+
// |                   Masking-key (if MASK set)                   |
// +---------------------------------------------------------------+
enum FrameHeader {
    Complete(WsData),
    Truncated,
}

fn parse_frame_header(data: &[u8]) -> FrameHeader {
    if data.len() < 2 {
        return FrameHeader::Truncated;
    }

    let masked = data[1] & WS_MASK != 0;
    let (payload_len, mut header_len) = match data[1] & WS_LEN {
        126 => {
            if data.len() < 4 {
                return FrameHeader::Truncated;
            }
            (u16::from_be_bytes([data[2], data[3]]) as u64, 4)
        }
        127 => {
            if data.len() < 10 {
                return FrameHeader::Truncated;
            }
            let mut len = [0u8; 8];
            len.copy_from_slice(&data[2..10]);
            (u64::from_be_bytes(len), 10)
        }
        len => (len as u64, 2),
    };

    let mask_key = if masked {
        if data.len() < header_len + 4 {
            return FrameHeader::Truncated;
        }
        let mut key = [0u8; 4];
        key.copy_from_slice(&data[header_len..header_len + 4]);
        header_len += 4;
        Some(key)
    } else {
        None
    };

    FrameHeader::Complete(WsData {
        fin: data[0] & WS_FIN != 0,
        opcode: data[0] & WS_OPCODE,
        mask_key,
        header_len,
        payload_len,
    })
}

// テキスト/バイナリフレームの先頭かどうか
pub fn is_ws_frame(data: &[u8]) -> bool {
    if data.len() < 2 || data[0] & WS_RSV != 0 {
        return false;
    }
    let opcode = data[0] & WS_OPCODE;
    if opcode != WS_OPCODE_TEXT && opcode != WS_OPCODE_BINARY {
        return false;
    }
    // 64bit 長の最上位ビットは 0 でなければならない
    !(data[1] & WS_LEN == 127 && data.len() > 2 && data[2] & 0x80 != 0)
}

fn unmask(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    payload
        .iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % 4])
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsDissector;

impl Dissector for WsDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ws
    }

    fn parse(&self, _packet: &Packet, input: &Bytes) -> DissectOutcome {
        if !is_ws_frame(input) {
            return DissectOutcome::Invalid;
        }

        let ws = match parse_frame_header(input) {
            FrameHeader::Complete(ws) => ws,
            FrameHeader::Truncated => return DissectOutcome::NeedMoreData,
        };

        let Ok(payload_len) = usize::try_from(ws.payload_len) else {
            return DissectOutcome::Invalid;
        };
        let Some(frame_end) = ws.header_len.checked_add(payload_len) else {
            return DissectOutcome::Invalid;
        };
        if input.len() < frame_end {
            return DissectOutcome::NeedMoreData;
        }

        let payload = match ws.mask_key {
            Some(key) => Bytes::from(unmask(&input[ws.header_len..frame_end], key)),
            None => input.slice(ws.header_len..frame_end),
        };

        DissectOutcome::payload(ProtocolData::Ws(ws), payload)
    }
}
