use crate::network::packet::protocol::ProtocolKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DissectError {
    #[error("フレームを持たないパケットです")]
    EmptyPacket,

    #[error("必要なレイヤーが解析されていません: {0}")]
    MissingLayer(ProtocolKind),

    #[error("ディセクタが登録されていません: {0}")]
    UnregisteredDissector(ProtocolKind),

    #[error("スロットは既に設定されています: {0}")]
    SlotOccupied(ProtocolKind),

    #[error("ディセクタレジストリは既に初期化されています")]
    RegistryAlreadyInitialized,

    #[error("ディセクタレジストリが初期化されていません")]
    RegistryNotInitialized,

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("キャプチャエラー: {0}")]
    Capture(#[from] std::io::Error),
}

pub type DissectResult<T> = Result<T, DissectError>;
