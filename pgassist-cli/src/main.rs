//! pgassist-cli: terminal client for the pgassist HTTP API
//!
//! # Subcommands
//! - `status`: show server health
//! - `chat`: open a session, connect it, then ask questions read from stdin

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8501";
const SSL_MODES: [&str; 4] = ["require", "verify-ca", "verify-full", "disable"];

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "pgassist-cli",
    version,
    about = "Ask a PostgreSQL database questions in plain language"
)]
struct Cli {
    /// pgassist HTTP server URL (overrides PGASSIST_HTTP_URL env var)
    #[arg(long, env = "PGASSIST_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show pgassist server status
    Status,

    /// Connect to a database and chat with it
    Chat(ChatArgs),
}

#[derive(Debug, Clone, clap::Args)]
struct ChatArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value = "5432")]
    port: String,

    #[arg(long, default_value = "postgres")]
    user: String,

    #[arg(long, env = "PGPASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    #[arg(long, default_value = "testing_3")]
    database: String,

    /// TLS mode; setting it connects as a cloud database
    #[arg(long, value_parser = SSL_MODES)]
    ssl_mode: Option<String>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub transcript: Vec<TranscriptMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub error: Option<String>,
}

// ============================================================================
// Request bodies and rendering
// ============================================================================

/// Build the connect body. A TLS mode switches the form to "cloud".
fn connect_body(args: &ChatArgs) -> serde_json::Value {
    let mut body = serde_json::json!({
        "api_key": args.api_key,
        "database_type": if args.ssl_mode.is_some() { "cloud" } else { "local" },
        "host": args.host,
        "port": args.port,
        "user": args.user,
        "password": args.password,
        "database": args.database,
    });
    if let Some(mode) = &args.ssl_mode {
        body["ssl_mode"] = serde_json::json!(mode);
    }
    body
}

fn render_message(msg: &TranscriptMessage) -> String {
    let avatar = if msg.role == "human" { "👤" } else { "🤖" };
    format!("{} {}", avatar, msg.content)
}

fn render_answer(resp: &AskResponse) -> String {
    match &resp.error {
        Some(e) => format!("🤖 {}\n   ({})", resp.answer, e),
        None => format!("🤖 {}", resp.answer),
    }
}

/// Turn a stdin line into a question; `None` ends the chat.
fn parse_line(line: &str) -> Option<Option<&str>> {
    let q = line.trim();
    if q.eq_ignore_ascii_case("exit") || q.eq_ignore_ascii_case("quit") {
        return None;
    }
    Some((!q.is_empty()).then_some(q))
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("pgassist server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Sessions:        {}", body["sessions"].as_u64().unwrap_or(0));
        }
        Ok(r) => {
            eprintln!("pgassist-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("pgassist-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn do_chat(server: &str, args: &ChatArgs) -> anyhow::Result<()> {
    // Model round trips can be slow; match the server's default request timeout.
    let http = client(120)?;

    let session: SessionResponse = match http.post(format!("{}/api/sessions", server)).send() {
        Ok(r) if r.status().is_success() => r.json()?,
        Ok(r) => {
            eprintln!("pgassist-cli: failed to create session (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("pgassist-cli: cannot reach {}: {}", server, e);
            std::process::exit(1);
        }
    };
    for msg in &session.transcript {
        println!("{}", render_message(msg));
    }

    let base = format!("{}/api/sessions/{}", server, session.session_id);
    let resp = http
        .post(format!("{}/connect", base))
        .json(&connect_body(args))
        .send()?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        eprintln!(
            "pgassist-cli: {}",
            body["error"].as_str().unwrap_or("connection failed")
        );
        std::process::exit(1);
    }
    println!("{}", body["message"].as_str().unwrap_or("Connected."));

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = match parse_line(&line) {
            None => break,
            Some(None) => continue,
            Some(Some(q)) => q,
        };

        let resp = http
            .post(format!("{}/ask", base))
            .json(&serde_json::json!({ "question": question }))
            .send()?;
        if resp.status().is_success() {
            let answer: AskResponse = resp.json()?;
            println!("{}", render_answer(&answer));
        } else {
            let status = resp.status();
            let body: serde_json::Value = resp.json().unwrap_or_default();
            eprintln!(
                "pgassist-cli: server returned {}: {}",
                status,
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match &cli.command {
        Commands::Status => do_status(&server),
        Commands::Chat(args) => do_chat(&server, args),
    };

    if let Err(e) = result {
        eprintln!("pgassist-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
