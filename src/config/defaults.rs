//! Default values for configuration

/// Default Ollama URL for the embedding backend
pub fn default_embedding_url() -> String {
    std::env::var("RAGDESK_EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default retries for transient embedding failures
pub fn default_embedding_retries() -> u32 {
    2
}

/// Default Ollama URL for the completion backend
pub fn default_model_url() -> String {
    std::env::var("RAGDESK_MODEL_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string())
}

/// Default completion model
pub fn default_model_name() -> String {
    "mistral".to_string()
}

/// Default completion request timeout in seconds
pub fn default_model_timeout() -> u64 {
    120
}

/// Default retries for transient completion failures
pub fn default_model_retries() -> u32 {
    1
}

/// Default maximum characters per chunk
pub fn default_chunk_size() -> usize {
    1024
}

/// Default overlap characters between consecutive chunks
pub fn default_chunk_overlap() -> usize {
    100
}

/// Default number of chunks retrieved per question
pub fn default_retrieval_k() -> usize {
    3
}

/// Default minimum similarity score for retrieved chunks
pub fn default_score_threshold() -> f32 {
    0.5
}

/// Default minimum pool connections
pub fn default_min_connections() -> u32 {
    1
}

/// Default maximum pool connections
pub fn default_max_connections() -> u32 {
    10
}

/// Default row batch size for table streaming
pub fn default_row_batch_size() -> usize {
    1000
}

/// Default per-query timeout in seconds
pub fn default_query_timeout() -> u64 {
    30
}

/// Default: return only the first line of a model response
pub fn default_first_line_only() -> bool {
    true
}

/// Default number of sample rows per table for insights
pub fn default_sample_rows() -> usize {
    5
}
