use thiserror::Error;

use crate::llm::ModelError;

/// Failure of a connect action. The session stays disconnected.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Please provide an OpenAI API Key")]
    MissingApiKey,

    #[error("Invalid port {0:?}: expected a number between 1 and 65535")]
    InvalidPort(String),

    #[error("Invalid connection parameters: {0}")]
    InvalidParameters(String),

    #[error("Unable to connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unable to initialize the language model: {0}")]
    Model(#[from] ModelError),
}

/// Failure of one query cycle. The session stays connected.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Not connected to a database")]
    NotConnected,

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("The model did not produce a SQL query")]
    EmptyQuery,
}
