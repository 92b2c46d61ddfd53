use std::fmt;

// キャプチャ元のリンク層種別 (pcap の DLT 値)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkType {
    Null,
    #[default]
    Ethernet,
    RawIp,
    LinuxSll,
}

impl LinkType {
    pub fn from_dlt(dlt: u32) -> Option<Self> {
        match dlt {
            0 => Some(LinkType::Null),
            1 => Some(LinkType::Ethernet),
            12 | 101 => Some(LinkType::RawIp),
            113 => Some(LinkType::LinuxSll),
            _ => None,
        }
    }

    pub fn dlt(self) -> u32 {
        match self {
            LinkType::Null => 0,
            LinkType::Ethernet => 1,
            LinkType::RawIp => 101,
            LinkType::LinuxSll => 113,
        }
    }
}

/// フレームの供給元。
///
/// パケットはキャプチャ元を所有せず、弱参照のみを保持する。
/// 解析処理からキャプチャ元のメソッドを呼ぶのはリンク層種別の取得だけ。
pub trait CaptureInput: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn link_type(&self) -> LinkType {
        LinkType::Ethernet
    }
}

// 固定値だけを持つキャプチャ元 (ファイル再生やテスト用)
#[derive(Debug, Clone)]
pub struct StaticInput {
    name: String,
    link_type: LinkType,
}

impl StaticInput {
    pub fn new(name: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            name: name.into(),
            link_type,
        }
    }
}

impl CaptureInput for StaticInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }
}
