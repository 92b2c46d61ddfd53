use packet_dissector::core::config::LoggingConfig;
use crate::error::InitProcessError;
use env_logger::{Builder, Target};
use std::fs::File;
use std::io::Write;

pub fn setup_logger(config: &LoggingConfig) -> Result<(), InitProcessError> {
    let level = config
        .level_filter()
        .map_err(|e| InitProcessError::LoggerError(e.to_string()))?;

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        // タイムスタンプ付きのフォーマット
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    // ファイル指定がなければ標準出力
    match &config.file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| InitProcessError::LoggerError(format!("{}: {}", path, e)))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }

    builder
        .try_init()
        .map_err(|e| InitProcessError::LoggerError(e.to_string()))
}
