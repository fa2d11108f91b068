pub mod aggregator;
pub mod analyzer;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod format;
pub mod generation;
pub mod memory;
pub mod prompts;
pub mod provider;
pub mod sampler;
pub mod search;
pub mod store;
pub mod types;

pub use aggregator::{FragmentAggregator, STREAM_END_SENTINEL, Step};
pub use analyzer::{AnalysisRequest, VideoAnalyzer};
pub use cache::{CacheStats, ResponseCache, cache_key, get_root_cache_dir};
pub use chat::{ChatRequest, ChatResponse, ChatService};
pub use config::{CacheConfig, GenerationConfig, MemoryConfig, PageonConfig, SamplingConfig};
pub use error::{
    AnalysisError, ChatError, GenerationError, SearchError, StoreError, TranslationError,
};
pub use events::AnalysisEvent;
pub use extract::{Extracted, IncrementalExtractor, Reconciled, parse_document_text, reconcile};
pub use format::{format_document_readable, format_timestamp, format_transcript_with_timestamps};
pub use generation::{FragmentStream, OpenAiCompatibleGenerator, Prompt, TextGenerator};
pub use memory::{SessionKey, SessionMemoryStore};
pub use provider::{Provider, ProviderConfig};
pub use sampler::{SampledTranscript, sample_transcript};
pub use search::{DurationFilter, SearchParams, SearchResponse, YoutubeSearchService};
pub use store::{DocumentStore, FsDocumentStore, MemoryDocumentStore};
pub use types::{
    ConversationTurn, KeyPoint, Role, Section, TranscriptLine, VideoAnalysisDocument,
    VideoSummary,
};
