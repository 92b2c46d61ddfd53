use crate::core::config::CaptureConfig;
use crate::core::error::{DissectError, DissectResult};
use crate::network::input::{CaptureInput, LinkType};
use crate::network::packet::frame::Frame;
use log::info;
use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};
use std::io;
use std::sync::Arc;

// pnet のデータリンクチャネルを使うライブキャプチャ
#[derive(Debug)]
pub struct LiveCapture {
    interface: NetworkInterface,
}

impl LiveCapture {
    pub fn open(
        interface: NetworkInterface,
        config: &CaptureConfig,
    ) -> DissectResult<(Arc<LiveCapture>, FrameReceiver)> {
        let channel_config = datalink::Config {
            read_buffer_size: config.buffer_size,
            promiscuous: config.promiscuous,
            ..Default::default()
        };

        let rx = match datalink::channel(&interface, channel_config) {
            Ok(Channel::Ethernet(_, rx)) => rx,
            Ok(_) => {
                return Err(DissectError::Capture(io::Error::new(
                    io::ErrorKind::Other,
                    "未対応のチャンネルタイプです",
                )))
            }
            Err(e) => return Err(DissectError::Capture(e)),
        };

        info!(
            "キャプチャを開始しました: {} (バッファ: {} bytes, プロミスキャス: {})",
            interface.name, config.buffer_size, config.promiscuous
        );

        Ok((Arc::new(LiveCapture { interface }), FrameReceiver { rx }))
    }

    pub fn interface(&self) -> &NetworkInterface {
        &self.interface
    }
}

impl CaptureInput for LiveCapture {
    fn name(&self) -> &str {
        &self.interface.name
    }

    fn link_type(&self) -> LinkType {
        LinkType::Ethernet
    }
}

pub struct FrameReceiver {
    rx: Box<dyn DataLinkReceiver>,
}

impl FrameReceiver {
    // 次のフレームを受信するまでブロックする
    pub fn next_frame(&mut self) -> DissectResult<Frame> {
        let data = self.rx.next()?;
        let ts = chrono::Utc::now().timestamp_micros().max(0) as u64;
        Ok(Frame::new(ts, data.to_vec()))
    }
}
