//! medfetch-core - Common infrastructure for biomedical ingestion pipelines
//!
//! Shared pieces used by the PubMed and ClinicalTrials.gov sources:
//! HTTP access with retry, partition-file buffering, date reconstruction,
//! logging, progress reporting, and cooperative shutdown.

pub mod dates;
pub mod error;
pub mod http;
pub mod logging;
pub mod partition;
pub mod progress;
pub mod shutdown;

// Re-exports for convenience
pub use error::FetchError;
pub use http::{
    SHARED_RUNTIME, get_bytes, get_bytes_with_retry, get_text, get_text_with_retry, http_client,
};
pub use logging::{IndicatifLogger, init_logging};
pub use partition::{PartitionRecord, PartitionStats, PartitionWriter};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use shutdown::{is_shutdown_requested, shutdown_flag};
