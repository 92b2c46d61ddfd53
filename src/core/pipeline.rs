use crate::core::config::DissectionConfig;
use crate::core::error::DissectResult;
use crate::dissector::chain::{ChainStatus, DissectorChain};
use crate::dissector::registry::{self, DissectorRegistry};
use crate::network::input::CaptureInput;
use crate::network::packet::frame::Frame;
use crate::network::packet::Packet;
use log::{debug, warn};
use std::sync::Arc;

/// フレームをパケットへ取り込み、ディセクタチェインを進める。
///
/// 再構築待ちのままフレーム数が上限に達したパケットは、待っていたレイヤーで不正として確定させる。
#[derive(Debug, Clone)]
pub struct PacketPipeline {
    registry: Arc<DissectorRegistry>,
    max_reassembly_frames: usize,
}

impl PacketPipeline {
    pub fn new(registry: Arc<DissectorRegistry>, config: &DissectionConfig) -> Self {
        Self {
            registry,
            max_reassembly_frames: config.max_reassembly_frames.max(1),
        }
    }

    // 初期化済みのグローバルレジストリを使う
    pub fn from_global(config: &DissectionConfig) -> DissectResult<Self> {
        Ok(Self::new(registry::global()?, config))
    }

    pub fn registry(&self) -> &Arc<DissectorRegistry> {
        &self.registry
    }

    pub fn new_packet(&self, input: &Arc<dyn CaptureInput>) -> Packet {
        Packet::new(input, Arc::clone(&self.registry))
    }

    pub fn ingest(&self, packet: &Packet, frame: Frame) -> ChainStatus {
        packet.append_frame(frame);
        let status = DissectorChain::run(packet);

        if let ChainStatus::NeedMoreData(kind) = status {
            let frames = packet.frame_count();
            if frames >= self.max_reassembly_frames {
                warn!(
                    "{} の再構築を打ち切りました (フレーム数: {})",
                    kind, frames
                );
                return DissectorChain::abandon(packet);
            }
            debug!("{} の続きを待っています (フレーム数: {})", kind, frames);
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::packet::protocol::ProtocolKind;
    use crate::test_utils::*;

    fn pipeline(max_reassembly_frames: usize) -> PacketPipeline {
        PacketPipeline::new(
            builtin_registry(),
            &DissectionConfig {
                max_reassembly_frames,
            },
        )
    }

    #[test]
    fn test_ingest_single_frame() {
        let pipeline = pipeline(4);
        let input = test_input();
        let packet = pipeline.new_packet(&input);
        let ip = ipv4_udp([10, 0, 0, 1], 5060, [10, 0, 0, 2], 5060, &sip_invite(""));

        let status = pipeline.ingest(&packet, Frame::new(1, ethernet_frame(0x0800, &ip)));
        assert_eq!(status, ChainStatus::Complete);
        assert!(packet.has_layer(ProtocolKind::Sip));
        assert!(packet.input().is_some());
    }

    #[test]
    fn test_ingest_reassembles_across_frames() {
        let pipeline = pipeline(4);
        let input = test_input();
        let packet = pipeline.new_packet(&input);
        let message = sip_invite("v=0\r\n");
        let (first, rest) = message.split_at(40);
        let ip = ipv4_tcp([10, 0, 0, 1], 40000, [10, 0, 0, 2], 5060, first);

        assert_eq!(
            pipeline.ingest(&packet, Frame::new(1, ethernet_frame(0x0800, &ip))),
            ChainStatus::NeedMoreData(ProtocolKind::Sip)
        );
        assert_eq!(
            pipeline.ingest(&packet, Frame::new(2, rest.to_vec())),
            ChainStatus::Complete
        );
        assert_eq!(packet.last_frame_timestamp(), 2);
    }

    #[test]
    fn test_ingest_gives_up_at_frame_limit() {
        let pipeline = pipeline(2);
        let input = test_input();
        let packet = pipeline.new_packet(&input);
        let ip = ipv4_tcp([10, 0, 0, 1], 40000, [10, 0, 0, 2], 5060, b"INVITE sip:bob");

        assert_eq!(
            pipeline.ingest(&packet, Frame::new(1, ethernet_frame(0x0800, &ip))),
            ChainStatus::NeedMoreData(ProtocolKind::Sip)
        );
        assert_eq!(
            pipeline.ingest(&packet, Frame::new(2, b"@example.com".to_vec())),
            ChainStatus::Invalid(ProtocolKind::Sip)
        );
        assert_eq!(packet.chain_status(), Some(ChainStatus::Invalid(ProtocolKind::Sip)));
    }

    #[test]
    fn test_new_packet_uses_pipeline_registry() {
        let pipeline = pipeline(1);
        let input = test_input();
        let packet = pipeline.new_packet(&input);
        assert!(Arc::ptr_eq(packet.registry(), pipeline.registry()));
        assert_eq!(packet.input().map(|i| i.name().to_string()), Some("test".to_string()));
    }
}
