pub mod config;
pub mod llama;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use config::LlamaConfig;
pub use llama::{ChatClient, LlamaClient, LlamaError};
pub use pipeline::discovery::ReceiptGroup;
pub use pipeline::prompt::OutputFormat;
pub use pipeline::runner::{convert_batch, ingest_archive, BatchReport, PipelineError};
pub use pipeline::workdir::Workdir;

/// Initialize tracing once for the hosting process.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at info level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Recibo starting v{}", config::APP_VERSION);
}
