use bytes::Bytes;
use chrono::{DateTime, Utc};

pub const USEC_PER_SEC: u64 = 1_000_000;

// pcap の長さフィールドは32bit
fn saturating_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

// キャプチャされた1フレーム
// PCAPへの書き出しに必要な情報をすべて保持する。生成後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    // 受信時刻 (マイクロ秒)
    ts: u64,
    // ワイヤ上の長さ
    len: u32,
    // 実際にキャプチャされた長さ
    caplen: u32,
    data: Bytes,
}

impl Frame {
    pub fn new(ts: u64, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let caplen = saturating_len(data.len());
        Self {
            ts,
            len: caplen,
            caplen,
            data,
        }
    }

    // スナップ長で切り詰められたフレーム用
    pub fn with_lengths(ts: u64, len: u32, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let caplen = saturating_len(data.len());
        Self {
            ts,
            len: len.max(caplen),
            caplen,
            data,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.ts
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn caplen(&self) -> u32 {
        self.caplen
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn seconds(&self) -> u64 {
        self.ts / USEC_PER_SEC
    }

    pub fn microseconds(&self) -> u64 {
        self.ts % USEC_PER_SEC
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.seconds()).ok()?;
        DateTime::from_timestamp(secs, (self.microseconds() * 1_000) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_saturates() {
        assert_eq!(saturating_len(1500), 1500);
        assert_eq!(saturating_len(u32::MAX as usize), u32::MAX);
        assert_eq!(saturating_len(usize::MAX), u32::MAX);
    }

    #[test]
    fn test_seconds_and_microseconds() {
        let frame = Frame::new(1_700_000_123_456_789, vec![0u8; 4]);
        assert_eq!(frame.seconds(), 1_700_000_123);
        assert_eq!(frame.microseconds(), 456_789);

        let frame = Frame::new(999_999, Bytes::new());
        assert_eq!(frame.seconds(), 0);
        assert_eq!(frame.microseconds(), 999_999);
    }

    #[test]
    fn test_lengths() {
        let frame = Frame::new(0, vec![1u8, 2, 3]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.caplen(), 3);

        let truncated = Frame::with_lengths(0, 1500, vec![0u8; 96]);
        assert_eq!(truncated.len(), 1500);
        assert_eq!(truncated.caplen(), 96);
    }

    #[test]
    fn test_datetime() {
        let frame = Frame::new(1_000_500_000, Bytes::new());
        let datetime = frame.datetime().expect("範囲内のタイムスタンプ");
        assert_eq!(datetime.timestamp(), 1_000);
        assert_eq!(datetime.timestamp_subsec_micros(), 500_000);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let frame = Frame::new(1, vec![0xaa; 64]);
        let cloned = frame.clone();
        assert_eq!(frame.data().as_ptr(), cloned.data().as_ptr());
    }
}
