//! CubbyCtl - Command line client for a Cubby server
//!
//! Usage:
//!   cubbyctl register <name> <email> <password>
//!   cubbyctl login <email> <password>      - Print a bearer token
//!   cubbyctl upload <file> [-d text]       - Upload a file
//!   cubbyctl ls                            - List stored files
//!   cubbyctl health                        - Check the server
//!
//! Commands that need a token read it from `--token` or `CUBBY_TOKEN`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;

/// Cubby Control Tool
#[derive(Parser)]
#[command(name = "cubbyctl")]
#[command(about = "Talk to a Cubby file storage server", long_about = None)]
struct Cli {
    /// Path to server config file (used to find the API address)
    #[arg(short, long, default_value = "cubby.toml")]
    config: PathBuf,

    /// API endpoint to connect to (overrides config)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Bearer token (defaults to CUBBY_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        name: String,
        email: String,
        password: String,
    },
    /// Log in and print a bearer token
    Login { email: String, password: String },
    /// Upload a file
    Upload {
        /// File to upload
        file: PathBuf,
        /// Free-text description passed to the folder advisor
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List stored files and folders
    Ls,
    /// Check server health
    Health,
}

// ============ API Response Types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    id: String,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    message: String,
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    key: String,
    #[serde(default)]
    suggested_folder: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    user_folder: String,
    entries: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    healthy: bool,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
    #[serde(default)]
    retryable: bool,
}

// ============ Config ============

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfig {
    #[serde(default)]
    bind_address: Option<String>,
}

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

fn endpoint_from_config(path: &Path) -> String {
    let bind = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .and_then(|config| config.server.bind_address);

    match bind {
        Some(addr) if addr.starts_with("0.0.0.0") => format!(
            "http://127.0.0.1:{}",
            addr.rsplit(':').next().unwrap_or("8080")
        ),
        Some(addr) => format!("http://{}", addr),
        None => DEFAULT_ENDPOINT.to_string(),
    }
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| endpoint_from_config(&cli.config));
    let endpoint = endpoint.trim_end_matches('/').to_string();
    let token = cli.token.clone().or_else(|| std::env::var("CUBBY_TOKEN").ok());

    let client = reqwest::Client::new();
    let result = match &cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => register(&client, &endpoint, name, email, password).await,
        Commands::Login { email, password } => login(&client, &endpoint, email, password).await,
        Commands::Upload { file, description } => {
            upload(&client, &endpoint, token.as_deref(), file, description.as_deref()).await
        }
        Commands::Ls => list_files(&client, &endpoint, token.as_deref()).await,
        Commands::Health => health(&client, &endpoint).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// ============ Commands ============

/// Turn a non-2xx response into an error carrying the server's message
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match response.json::<ErrorResponse>().await {
        Ok(body) if body.retryable => bail!(
            "{} ({}): {}; the request can be retried",
            status,
            body.code,
            body.error
        ),
        Ok(body) => bail!("{} ({}): {}", status, body.code, body.error),
        Err(_) => bail!("API error: {}", status),
    }
}

fn require_token(token: Option<&str>) -> Result<&str> {
    token.ok_or_else(|| anyhow!("no token given; pass --token or set CUBBY_TOKEN"))
}

async fn register(
    client: &reqwest::Client,
    endpoint: &str,
    name: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    let response = client
        .post(format!("{}/api/auth/register", endpoint))
        .json(&json!({"name": name, "email": email, "password": password}))
        .send()
        .await
        .context("failed to reach server")?;

    let body: RegisterResponse = check(response).await?.json().await?;

    println!("{}", body.message);
    println!("  ID:    {}", body.user.id);
    println!("  Name:  {}", body.user.name);
    println!("  Email: {}", body.user.email);

    Ok(())
}

async fn login(client: &reqwest::Client, endpoint: &str, email: &str, password: &str) -> Result<()> {
    let response = client
        .post(format!("{}/api/auth/login", endpoint))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .context("failed to reach server")?;

    let body: LoginResponse = check(response).await?.json().await?;

    eprintln!("Logged in as {} ({})", body.user.name, body.user.id);
    println!("{}", body.token);
    eprintln!("\nexport CUBBY_TOKEN=<token above> to use it with other commands");

    Ok(())
}

async fn upload(
    client: &reqwest::Client,
    endpoint: &str,
    token: Option<&str>,
    file: &Path,
    description: Option<&str>,
) -> Result<()> {
    let token = require_token(token)?;

    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", file.display()))?
        .to_string();
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let size = content.len();

    let mut form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(content).file_name(name));
    if let Some(text) = description {
        form = form.text("description", text.to_string());
    }

    let response = client
        .post(format!("{}/api/uploads/", endpoint))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .context("failed to reach server")?;

    let body: UploadResponse = check(response).await?.json().await?;

    println!("Uploaded {} bytes as {}", size, body.key);
    if let Some(folder) = body.suggested_folder {
        println!("Suggested folder: {}", folder);
    }

    Ok(())
}

async fn list_files(client: &reqwest::Client, endpoint: &str, token: Option<&str>) -> Result<()> {
    let token = require_token(token)?;

    let response = client
        .post(format!("{}/api/listFiles/", endpoint))
        .bearer_auth(token)
        .send()
        .await
        .context("failed to reach server")?;

    let body: ListFilesResponse = check(response).await?.json().await?;

    println!();
    println!("Files in {}/", body.user_folder);
    println!();

    if body.entries.is_empty() {
        println!("(empty)");
        println!();
        return Ok(());
    }

    println!("{:<8} {:>12} {:<21} {}", "TYPE", "SIZE", "MODIFIED", "PATH");
    println!("{}", "-".repeat(72));

    for entry in &body.entries {
        let size = entry.size.map(format_size).unwrap_or_default();
        let modified = entry.last_modified.as_deref().unwrap_or("");
        let path = if entry.kind == "folder" {
            format!("\x1b[1;34m{}/\x1b[0m", entry.path)
        } else {
            entry.path.clone()
        };
        println!("{:<8} {:>12} {:<21} {}", entry.kind, size, modified, path);
    }
    println!();
    println!(
        "{} entries ({} files)",
        body.entries.len(),
        body.entries.iter().filter(|e| e.kind == "file").count()
    );
    println!();

    Ok(())
}

async fn health(client: &reqwest::Client, endpoint: &str) -> Result<()> {
    let response = client
        .get(format!("{}/health", endpoint))
        .send()
        .await
        .context("failed to reach server")?;

    let body: HealthResponse = check(response).await?.json().await?;

    if body.healthy {
        println!("\x1b[32m✓\x1b[0m {} is healthy (v{})", endpoint, body.version);
        Ok(())
    } else {
        bail!("{} reports unhealthy", endpoint)
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
