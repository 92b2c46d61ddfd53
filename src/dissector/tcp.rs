use crate::dissector::{DissectOutcome, Dissector};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;

// TCPフラグの定義
pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_RST: u8 = 0x04;
pub const TCP_PSH: u8 = 0x08;
pub const TCP_ACK: u8 = 0x10;
pub const TCP_URG: u8 = 0x20;

const TCP_MIN_HEADER_LEN: usize = 20;

// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |          Source Port          |       Destination Port        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                        Sequence Number                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Acknowledgment Number                      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Data |           |U|A|P|R|S|F|                               |
// | Offset| Reserved  |R|C|S|S|Y|I|            Window             |
// |       |           |G|K|H|T|N|N|                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           Checksum            |         Urgent Pointer        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpData {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    pub header_len: usize,
    pub flags: u8,
    pub window_size: u16,
    pub mss: Option<u16>,
}

impl TcpData {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

// MSS オプションのみ取り出す
pub fn parse_tcp_options(data: &[u8]) -> Option<u16> {
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            0 => break,  // End of options
            1 => i += 1, // NOP
            2 if data.len() >= i + 4 => {
                return Some(u16::from_be_bytes([data[i + 2], data[i + 3]]));
            }
            _ if data.len() > i + 1 && data[i + 1] >= 2 => i += data[i + 1] as usize,
            _ => break,
        }
    }
    None
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDissector;

impl Dissector for TcpDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Tcp
    }

    fn parse(&self, _packet: &Packet, input: &Bytes) -> DissectOutcome {
        if input.len() < TCP_MIN_HEADER_LEN {
            return DissectOutcome::NeedMoreData;
        }

        let header_len = ((input[12] >> 4) & 0xf) as usize * 4;
        if header_len < TCP_MIN_HEADER_LEN {
            return DissectOutcome::Invalid;
        }
        if input.len() < header_len {
            return DissectOutcome::NeedMoreData;
        }

        let tcp = TcpData {
            source_port: u16::from_be_bytes([input[0], input[1]]),
            destination_port: u16::from_be_bytes([input[2], input[3]]),
            sequence_number: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
            acknowledgment_number: u32::from_be_bytes([input[8], input[9], input[10], input[11]]),
            header_len,
            flags: input[13],
            window_size: u16::from_be_bytes([input[14], input[15]]),
            mss: parse_tcp_options(&input[TCP_MIN_HEADER_LEN..header_len]),
        };

        DissectOutcome::advance(ProtocolData::Tcp(tcp), header_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissector::Remainder;
    use crate::test_utils::{detached_packet, tcp_segment};

    #[test]
    fn test_header_and_payload_offset() {
        let segment = Bytes::from(tcp_segment(40000, 5061, b"payload"));
        match TcpDissector.parse(&detached_packet(), &segment) {
            DissectOutcome::Done {
                data: ProtocolData::Tcp(tcp),
                remainder,
            } => {
                assert_eq!(tcp.source_port, 40000);
                assert_eq!(tcp.destination_port, 5061);
                assert!(tcp.has_flag(TCP_ACK));
                assert!(tcp.has_flag(TCP_PSH));
                assert!(!tcp.has_flag(TCP_SYN));
                assert_eq!(remainder, Remainder::Advance(20));
            }
            other => panic!("想定外の結果: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_header_needs_more_data() {
        let segment = Bytes::from(tcp_segment(1, 2, b""));
        assert_eq!(
            TcpDissector.parse(&detached_packet(), &segment.slice(..12)),
            DissectOutcome::NeedMoreData
        );

        // データオフセットがオプション込みの長さを示している
        let mut with_options = tcp_segment(1, 2, b"");
        with_options[12] = 6 << 4;
        assert_eq!(
            TcpDissector.parse(&detached_packet(), &Bytes::from(with_options)),
            DissectOutcome::NeedMoreData
        );
    }

    #[test]
    fn test_bad_data_offset_is_invalid() {
        let mut segment = tcp_segment(1, 2, b"");
        segment[12] = 2 << 4;
        assert_eq!(
            TcpDissector.parse(&detached_packet(), &Bytes::from(segment)),
            DissectOutcome::Invalid
        );
    }

    #[test]
    fn test_mss_option() {
        assert_eq!(parse_tcp_options(&[1, 1, 2, 4, 0x05, 0xb4]), Some(1460));
        assert_eq!(parse_tcp_options(&[0, 2, 4, 0x05, 0xb4]), None);
        // 長さ0のオプションで無限ループしない
        assert_eq!(parse_tcp_options(&[8, 0, 0, 0]), None);
    }
}
