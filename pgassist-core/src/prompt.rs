//! Prompt templates for the SQL chain, rendered with minijinja.

use minijinja::{context, Environment};

const SQL_PROMPT: &str = "sql_prompt.txt";
const QUERY_CHECKER: &str = "query_checker.txt";

const SQL_PROMPT_SRC: &str = r#"You are a PostgreSQL expert. Given an input question,
first create a syntactically correct PostgreSQL query to run,
then look at the results of the query and return the answer to the input question.
Unless the user specifies in the question a specific number of records to obtain, query for at most {{ top_k }} results using the LIMIT clause as per PostgreSQL.
Wrap each column name in double quotes (") to denote them as delimited identifiers.
Only use the following tables:
{{ table_info }}

Question: {{ input }}"#;

const QUERY_CHECKER_SRC: &str = r#"{{ query }}
Double check the {{ dialect }} query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query.

Output the final SQL query only.

SQL Query: "#;

pub struct PromptTemplates {
    env: Environment<'static>,
}

impl PromptTemplates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(SQL_PROMPT, SQL_PROMPT_SRC)?;
        env.add_template(QUERY_CHECKER, QUERY_CHECKER_SRC)?;
        Ok(Self { env })
    }

    /// Main instruction prompt. `input` carries the question plus any
    /// `SQLQuery:`/`SQLResult:` scratchpad accumulated so far.
    pub fn render_sql_prompt(
        &self,
        input: &str,
        table_info: &str,
        top_k: u32,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(SQL_PROMPT)?
            .render(context! { input, table_info, top_k })
    }

    pub fn render_query_checker(&self, query: &str, dialect: &str) -> Result<String, minijinja::Error> {
        self.env
            .get_template(QUERY_CHECKER)?
            .render(context! { query, dialect })
    }
}
