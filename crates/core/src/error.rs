use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Generation stream failed: {reason}")]
    Stream { reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Generation failed for {video_id}: {source}")]
    Generation {
        video_id: String,
        #[source]
        source: GenerationError,
    },

    #[error("Analysis of {video_id} was cancelled")]
    Cancelled { video_id: String },

    #[error("Transcript for {video_id} is empty")]
    EmptyTranscript { video_id: String },
}

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Translation generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Failed to encode document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Translated document is invalid: {reason}")]
    InvalidResponse { reason: String },
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat message is empty")]
    EmptyMessage,

    #[error("Chat generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API returned an error: {reason}")]
    Api { reason: String },
}
