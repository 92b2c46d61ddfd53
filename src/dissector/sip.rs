use crate::dissector::{DissectOutcome, Dissector};
use crate::network::packet::protocol::{ProtocolData, ProtocolKind};
use crate::network::packet::Packet;
use bytes::Bytes;
use log::trace;

pub const SIP_VERSION: &str = "SIP/2.0";

const SIP_METHODS: [&str; 14] = [
    "INVITE", "ACK", "BYE", "CANCEL", "OPTIONS", "REGISTER", "PRACK", "SUBSCRIBE", "NOTIFY",
    "PUBLISH", "INFO", "REFER", "MESSAGE", "UPDATE",
];

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipData {
    pub first_line: String,
    pub method: Option<String>,
    pub status_code: Option<u16>,
    pub call_id: Option<String>,
    pub cseq: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub content_length: usize,
    pub body: Bytes,
}

impl SipData {
    pub fn is_request(&self) -> bool {
        self.method.is_some()
    }
}

// SIPメッセージの先頭らしいかどうか (ヘッダーが揃っていなくても判定する)
pub fn looks_like_sip(data: &[u8]) -> bool {
    if data.starts_with(SIP_VERSION.as_bytes()) {
        return true;
    }
    SIP_METHODS.iter().any(|method| {
        data.len() > method.len()
            && data.starts_with(method.as_bytes())
            && data[method.len()] == b' '
    })
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
        .map(|position| position + HEADER_END.len())
}

// (method, status_code)
fn parse_first_line(line: &str) -> Option<(Option<String>, Option<u16>)> {
    if let Some(rest) = line.strip_prefix(SIP_VERSION) {
        let code = rest.trim_start().split(' ').next()?;
        if code.len() != 3 {
            return None;
        }
        return Some((None, Some(code.parse().ok()?)));
    }

    let mut parts = line.split(' ');
    let method = parts.next()?;
    let _uri = parts.next()?;
    let version = parts.next()?;
    if version != SIP_VERSION || parts.next().is_some() || !SIP_METHODS.contains(&method) {
        return None;
    }
    Some((Some(method.to_string()), None))
}

// 短縮形ヘッダー名を正式名に揃える
fn canonical_header(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "i" => "call-id".to_string(),
        "l" => "content-length".to_string(),
        "f" => "from".to_string(),
        "t" => "to".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SipDissector;

impl Dissector for SipDissector {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Sip
    }

    fn parse(&self, packet: &Packet, input: &Bytes) -> DissectOutcome {
        if !looks_like_sip(input) {
            return DissectOutcome::Invalid;
        }

        // UDP ではメッセージがフレームをまたがない
        let datagram = packet.has_layer(ProtocolKind::Udp);
        let incomplete = if datagram {
            DissectOutcome::Invalid
        } else {
            DissectOutcome::NeedMoreData
        };

        let Some(header_end) = find_header_end(input) else {
            return incomplete;
        };

        let Ok(headers) = std::str::from_utf8(&input[..header_end]) else {
            trace!("SIPヘッダーがUTF-8ではありません");
            return DissectOutcome::Invalid;
        };

        let mut lines = headers.split("\r\n");
        let first_line = lines.next().unwrap_or_default();
        let Some((method, status_code)) = parse_first_line(first_line) else {
            return DissectOutcome::Invalid;
        };

        let mut sip = SipData {
            first_line: first_line.to_string(),
            method,
            status_code,
            call_id: None,
            cseq: None,
            from: None,
            to: None,
            content_length: 0,
            body: Bytes::new(),
        };

        let mut content_length = None;
        for line in lines.filter(|line| !line.is_empty()) {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match canonical_header(name.trim()).as_str() {
                "call-id" => sip.call_id = Some(value.to_string()),
                "cseq" => sip.cseq = Some(value.to_string()),
                "from" => sip.from = Some(value.to_string()),
                "to" => sip.to = Some(value.to_string()),
                "content-length" => match value.parse::<usize>() {
                    Ok(length) => content_length = Some(length),
                    Err(_) => return DissectOutcome::Invalid,
                },
                _ => {}
            }
        }

        // Content-Length がない UDP メッセージはデータグラムの末尾までが本文
        let content_length = match content_length {
            Some(length) => length,
            None if datagram => input.len() - header_end,
            None => 0,
        };

        let Some(body_end) = header_end.checked_add(content_length) else {
            return DissectOutcome::Invalid;
        };
        if input.len() < body_end {
            return incomplete;
        }

        sip.content_length = content_length;
        sip.body = input.slice(header_end..body_end);

        DissectOutcome::advance(ProtocolData::Sip(sip), body_end)
    }
}
