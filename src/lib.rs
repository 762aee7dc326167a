use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HolosError>;

#[derive(Error, Debug)]
pub enum HolosError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector index not found at {}", .0.display())]
    IndexMissing(PathBuf),

    #[error("Vector index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod documents;
pub mod index;
pub mod pipeline;
pub mod provider;
pub mod server;
