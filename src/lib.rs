//! ragdesk: question answering over PDF documents and Postgres tables
//!
//! Sources are chunked, embedded and held in an in-memory vector index;
//! questions retrieve the closest chunks above a similarity threshold and a
//! language model answers from that context alone.

pub mod assistant;
pub mod chain;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod format;
pub mod index;
pub mod ingest;
pub mod llm;
