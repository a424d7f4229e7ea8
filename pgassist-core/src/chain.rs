//! SQL database chain
//!
//! Natural-language question in, natural-language answer out:
//!
//! 1. render the SQL prompt and ask the model for a query
//! 2. optionally ask the model to double-check the query
//! 3. run the query against the live database
//! 4. feed the rows back through the prompt and ask for the answer
//!
//! A chain borrows its model and database and is built fresh for every
//! question; nothing is cached between invocations.

use serde::Serialize;

use crate::config::ChainConfig;
use crate::db::SqlDatabase;
use crate::error::QueryError;
use crate::llm::ChatModel;
use crate::prompt::PromptTemplates;

const SQL_RESULT_STOP: &str = "\nSQLResult:";

#[derive(Debug, Clone, Copy)]
pub struct ChainOptions {
    pub top_k: u32,
    pub use_query_checker: bool,
    pub return_intermediate_steps: bool,
}

impl From<&ChainConfig> for ChainOptions {
    fn from(config: &ChainConfig) -> Self {
        Self {
            top_k: config.top_k,
            use_query_checker: config.use_query_checker,
            return_intermediate_steps: config.return_intermediate_steps,
        }
    }
}

/// One recorded step of a chain run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", content = "value", rename_all = "snake_case")]
pub enum IntermediateStep {
    Input(String),
    Sql(String),
    SqlCommand { sql_cmd: String },
    Result(String),
    Answer(String),
}

#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub result: String,
    pub intermediate_steps: Option<Vec<IntermediateStep>>,
}

pub struct SqlDatabaseChain<'a> {
    model: &'a dyn ChatModel,
    database: &'a dyn SqlDatabase,
    templates: PromptTemplates,
    options: ChainOptions,
}

impl<'a> SqlDatabaseChain<'a> {
    pub fn new(
        model: &'a dyn ChatModel,
        database: &'a dyn SqlDatabase,
        options: ChainOptions,
    ) -> Result<Self, QueryError> {
        Ok(Self {
            model,
            database,
            templates: PromptTemplates::new()?,
            options,
        })
    }

    pub async fn invoke(&self, question: &str) -> Result<ChainOutput, QueryError> {
        let mut steps = Vec::new();
        let mut input = format!("{}\nSQLQuery:", question);
        let table_info = self.database.table_info().await?;

        let prompt = self
            .templates
            .render_sql_prompt(&input, &table_info, self.options.top_k)?;
        steps.push(IntermediateStep::Input(input.clone()));

        let generated = self.model.complete(&prompt, &[SQL_RESULT_STOP]).await?;
        let mut sql = extract_sql(&generated.text);
        tracing::debug!(sql = %sql, "Generated SQL");

        if self.options.use_query_checker && !sql.is_empty() {
            let check_prompt = self
                .templates
                .render_query_checker(&sql, self.database.dialect())?;
            let checked = self.model.complete(&check_prompt, &[]).await?;
            sql = extract_sql(&checked.text);
            tracing::debug!(sql = %sql, "Checked SQL");
        }

        if sql.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        steps.push(IntermediateStep::Sql(sql.clone()));
        steps.push(IntermediateStep::SqlCommand {
            sql_cmd: sql.clone(),
        });

        let rows = self.database.run(&sql).await?;
        steps.push(IntermediateStep::Result(rows.clone()));

        input.push_str(&format!(" {}\nSQLResult: {}\nAnswer:", sql, rows));
        let answer_prompt = self
            .templates
            .render_sql_prompt(&input, &table_info, self.options.top_k)?;
        steps.push(IntermediateStep::Input(input));

        let answer = self.model.complete(&answer_prompt, &[SQL_RESULT_STOP]).await?;
        let result = answer.text.trim().to_string();
        steps.push(IntermediateStep::Answer(result.clone()));

        Ok(ChainOutput {
            result,
            intermediate_steps: self.options.return_intermediate_steps.then_some(steps),
        })
    }
}

/// Pull the SQL statement out of a model response.
///
/// Handles `SQLQuery:` scratchpad markers, trailing `SQLResult:`/`Answer:`
/// sections and markdown code fences.
pub fn extract_sql(response: &str) -> String {
    let mut text = response.trim();

    if let Some(start) = text.rfind("SQLQuery:") {
        text = &text[start + "SQLQuery:".len()..];
    }
    let end = text
        .find("SQLResult:")
        .or_else(|| text.find("Answer:"))
        .unwrap_or(text.len());
    text = text[..end].trim();

    let inner = if let Some(s) = text.strip_prefix("```sql") {
        s
    } else if let Some(s) = text.strip_prefix("```") {
        s
    } else {
        text
    };
    inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
}
