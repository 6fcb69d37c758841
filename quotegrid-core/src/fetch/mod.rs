//! Price fetching: jobs, symbol state, chunked orchestration and providers.

pub mod backend;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod provider;
pub mod reporter;
pub mod state;
pub mod status;
pub mod yahoo;

pub use backend::{ProviderBackend, QuoteBackend, QuoteRequest, UNAVAILABLE};
pub use circuit_breaker::CircuitBreaker;
pub use config::{FetchConfig, ProviderConfig};
pub use error::{FetchError, RecordError};
pub use job::{FetchJob, QUERY_STRIDE};
pub use orchestrator::{merge_chunk_jobs, merge_retry_jobs, FetchOrchestrator, FetchSummary};
pub use provider::{PricePoint, ProviderError, QuoteProvider};
pub use reporter::{NullReporter, StatusReporter, TracingReporter};
pub use state::{Eligibility, Outcome, SymbolFetchState};
pub use status::{price_fetch_status, PriceFetchStatus};
pub use yahoo::YahooProvider;
