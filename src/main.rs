use crate::error::InitProcessError;
use crate::select_device::select_device;
use crate::setup_logger::setup_logger;
use log::{debug, error, info, warn};
use packet_dissector::dissector::registry;
use packet_dissector::network::{CaptureInput, LiveCapture};
use packet_dissector::{ChainStatus, Configuration, DissectorRegistry, PacketPipeline, PacketSummary};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;

mod error;
mod select_device;
mod setup_logger;

const FRAME_QUEUE_SIZE: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), InitProcessError> {
    let config = Configuration::from_env().map_err(InitProcessError::ConfigError)?;
    setup_logger(&config.logging)?;
    debug!("設定を読み込みました: {:?}", config);

    let registry =
        registry::init(DissectorRegistry::with_builtin()).map_err(InitProcessError::RegistryError)?;
    let pipeline = PacketPipeline::new(registry, &config.dissection);

    // デバイスの選択
    let interface = select_device(config.capture.interface.as_deref())?;
    info!("デバイスの選択に成功しました: {}", interface.name);

    let (capture, mut receiver) =
        LiveCapture::open(interface, &config.capture).map_err(InitProcessError::CaptureError)?;
    let input: Arc<dyn CaptureInput> = capture;

    // 受信はブロッキングのため専用スレッドで行う
    let (tx, mut rx) = mpsc::channel(FRAME_QUEUE_SIZE);
    let reader = task::spawn_blocking(move || loop {
        match receiver.next_frame() {
            Ok(frame) => {
                if tx.blocking_send(frame).is_err() {
                    break;
                }
            }
            Err(e) => error!("フレームの読み取り中にエラーが発生しました: {}", e),
        }
    });

    while let Some(frame) = rx.recv().await {
        let packet = pipeline.new_packet(&input);
        let status = pipeline.ingest(&packet, frame);

        // 1フレーム単位で扱うため、続きを待つパケットはここで確定させる
        let status = match status {
            ChainStatus::NeedMoreData(_) => packet_dissector::DissectorChain::abandon(&packet),
            status => status,
        };

        let summary = PacketSummary::from_packet(&packet);
        if packet.sip().is_some() {
            match summary.to_json() {
                Ok(json) => info!("{}", json),
                Err(e) => warn!("サマリーの出力に失敗しました: {}", e),
            }
        } else {
            debug!("{} {:?} {}", status, summary.layers, summary.transport);
        }
        packet.release();
    }

    reader
        .await
        .map_err(|e| InitProcessError::PacketAnalysisError(e.to_string()))?;

    Ok(())
}
