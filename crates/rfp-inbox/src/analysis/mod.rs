//! Proposal scoring and vendor ranking through an external reasoning provider.

pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod queue;

pub use error::{AnalysisError, ProviderError};
pub use orchestrator::{Analyzer, MIN_COMPARISON_SIZE};
pub use provider::{OpenAiCompatProvider, ReasoningProvider};
pub use queue::{analysis_queue, requeue_pending, AnalysisQueue, AnalysisWorker};
