//! Per-user session state: transcript, live handles and the connected flag.

use serde::Deserialize;

use crate::config::PgAssistConfig;
use crate::db::{self, ConnectionDescriptor, SqlDatabase, SslMode};
use crate::error::{ConnectionError, QueryError};
use crate::llm::{ChatModel, ChatModelConfig, OpenAIChatClient};
use crate::responder::{Answer, QueryResponder};
use crate::transcript::Transcript;

pub const CONNECTED_MESSAGE: &str = "🎉 Successfully connected to the database!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    #[default]
    Local,
    Cloud,
}

/// Fields of the sidebar connect form.
#[derive(Clone, Deserialize)]
pub struct ConnectForm {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub database_type: DatabaseType,
    pub host: String,
    pub port: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Only honoured for `Cloud` databases.
    #[serde(default)]
    pub ssl_mode: Option<SslMode>,
}

impl ConnectForm {
    pub fn descriptor(&self) -> Result<ConnectionDescriptor, ConnectionError> {
        let ssl_mode = match self.database_type {
            DatabaseType::Local => None,
            DatabaseType::Cloud => self.ssl_mode,
        };
        ConnectionDescriptor::new(
            &self.user,
            &self.password,
            &self.host,
            &self.port,
            &self.database,
            ssl_mode,
        )
    }
}

impl std::fmt::Debug for ConnectForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectForm")
            .field("api_key", &"<redacted>")
            .field("database_type", &self.database_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// State of one chat session.
///
/// `connected` only goes from false to true. Reconnecting replaces both
/// handles and keeps the transcript.
pub struct SessionContext {
    transcript: Transcript,
    database: Option<Box<dyn SqlDatabase>>,
    model: Option<Box<dyn ChatModel>>,
    connected: bool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            database: None,
            model: None,
            connected: false,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Handle the connect action. On error the session is left untouched.
    pub async fn connect(
        &mut self,
        form: &ConnectForm,
        config: &PgAssistConfig,
    ) -> Result<&'static str, ConnectionError> {
        let api_key = form.api_key.trim();
        if api_key.is_empty() {
            return Err(ConnectionError::MissingApiKey);
        }
        // The client below is always built from the form key; the exported
        // variable only serves other tools that read OPENAI_API_KEY.
        if config.model.export_api_key_env {
            std::env::set_var("OPENAI_API_KEY", api_key);
        }

        let model = OpenAIChatClient::with_base_url(
            ChatModelConfig::new(api_key, &config.model),
            config.model.base_url.clone(),
        )?;

        let descriptor = form.descriptor()?;
        let database = db::connect(
            &descriptor,
            &config.database.schema,
            config.chain.sample_rows_in_table_info,
        )
        .await?;

        self.attach(Box::new(database), Box::new(model));
        Ok(CONNECTED_MESSAGE)
    }

    /// Install live handles and mark the session connected.
    pub fn attach(&mut self, database: Box<dyn SqlDatabase>, model: Box<dyn ChatModel>) {
        self.database = Some(database);
        self.model = Some(model);
        self.connected = true;
    }

    /// Run one query cycle and record it in the transcript.
    ///
    /// Only fails when the session is not connected; chain failures come back
    /// as the apology answer.
    pub async fn ask(
        &mut self,
        question: &str,
        responder: &QueryResponder,
    ) -> Result<Answer, QueryError> {
        let (database, model) = match (&self.database, &self.model) {
            (Some(d), Some(m)) if self.connected => (d.as_ref(), m.as_ref()),
            _ => return Err(QueryError::NotConnected),
        };

        let answer = responder
            .answer(question, &self.transcript, database, model)
            .await;
        self.transcript.record_exchange(question, answer.text.clone());
        Ok(answer)
    }
}
