pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod responder;
pub mod session;
pub mod transcript;
pub mod usage;

pub use chain::{ChainOptions, ChainOutput, IntermediateStep, SqlDatabaseChain};
pub use config::PgAssistConfig;
pub use db::{ConnectionDescriptor, PgDatabase, SqlDatabase, SslMode};
pub use error::{ConnectionError, QueryError};
pub use llm::{ChatModel, ChatModelConfig, Completion, ModelError, OpenAIChatClient, TokenUsage};
pub use responder::{Answer, QueryResponder, APOLOGY};
pub use session::{ConnectForm, DatabaseType, SessionContext, CONNECTED_MESSAGE};
pub use transcript::{Message, Role, Transcript, GREETING};
pub use usage::{Pricing, UsageSummary, UsageTracker};
