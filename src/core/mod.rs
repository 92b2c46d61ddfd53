pub mod config;
pub mod error;
pub mod pipeline;

pub use config::Configuration;
pub use error::{DissectError, DissectResult};
pub use pipeline::PacketPipeline;
