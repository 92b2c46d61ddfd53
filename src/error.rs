use packet_dissector::core::DissectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitProcessError {
    #[error("設定の読み込みに失敗しました: {0}")]
    ConfigError(#[source] DissectError),

    #[error("ロガーのセットアップに失敗しました: {0}")]
    LoggerError(String),

    #[error("ディセクタレジストリの初期化に失敗しました: {0}")]
    RegistryError(#[source] DissectError),

    #[error("デバイス選択エラー: {0}")]
    DeviceSelectionError(String),

    #[error("キャプチャの開始に失敗しました: {0}")]
    CaptureError(#[source] DissectError),

    #[error("パケット分析エラー: {0}")]
    PacketAnalysisError(String),
}
