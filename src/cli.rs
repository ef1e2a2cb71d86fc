//! Interactive thin client for the REST API

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::api::{ChatResponse, ClearResponse, FilesResponse, UploadResponse};

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Upload(Option<PathBuf>),
    Files,
    Clear,
    Quit,
    Chat(String),
    Empty,
}

/// Interpret an input line; anything that is not a command is a chat message
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Quit,
        "upload" if rest.is_empty() => Command::Upload(None),
        "upload" => Command::Upload(Some(PathBuf::from(rest))),
        "files" => Command::Files,
        "clear" => Command::Clear,
        _ => Command::Chat(line.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl ClientError {
    /// The server has nothing indexed yet
    pub fn is_no_files(&self) -> bool {
        matches!(self, Self::Api { status: 503, detail } if detail.contains("No files uploaded"))
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    pub async fn upload(&self, filename: &str, content: Vec<u8>) -> Result<UploadResponse, ClientError> {
        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("files", part);
        let response = self.client.post(self.url("/upload")).multipart(form).send().await?;
        decode(response).await
    }

    pub async fn chat(&self, message: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.url("/chat"))
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await?;
        let body: ChatResponse = decode(response).await?;
        Ok(body.response)
    }

    pub async fn list_files(&self) -> Result<FilesResponse, ClientError> {
        let response = self.client.get(self.url("/files")).send().await?;
        decode(response).await
    }

    pub async fn clear_files(&self) -> Result<ClearResponse, ClientError> {
        let response = self.client.delete(self.url("/files")).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Api {
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }
    Ok(response.json().await?)
}

/// Pull `detail` out of an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Summary lines printed after an upload
pub fn format_upload(filename: &str, result: &UploadResponse) -> Vec<String> {
    let mut lines = Vec::new();
    if result.files_processed > 0 {
        lines.push(format!("✓ Processed: {}", filename));
    }
    if result.files_cached > 0 {
        lines.push(format!("⚡ Cached (already uploaded): {}", filename));
    }
    for err in &result.errors {
        lines.push(format!("✗ {}", err));
    }
    lines.push(format!("Status: {}", result.status));
    lines
}

/// Run the interactive loop against a running API server
pub async fn run(api_url: &str, timeout: Duration) -> Result<()> {
    info!("Starting CLI client");
    println!("{}", "=".repeat(60));
    println!("Meeting Transcript Chatbot (API Client)");
    println!("{}", "=".repeat(60));
    println!();

    let client = ApiClient::new(api_url, timeout)?;
    println!("Connecting to API server at {}...", api_url);
    if !client.health().await {
        error!("Cannot connect to API server at {}", api_url);
        anyhow::bail!(
            "API server is not running or not accessible at {}. Start it with `icsi-chat serve` or set CLI_API_URL.",
            api_url
        );
    }

    println!("✓ Connected to API server");
    println!();
    println!("Commands:");
    println!("  upload <file.mrt>     - Upload a meeting transcript file");
    println!("  files                 - List uploaded files");
    println!("  clear                 - Clear all uploaded files");
    println!("  quit or exit          - Exit the chatbot");
    println!("{}", "-".repeat(60));
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!("\nGoodbye!");
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => {
                println!("Goodbye!");
                break;
            }
            Command::Upload(None) => {
                println!("Usage: upload <file.mrt>");
                println!("Example: upload data/transcripts/Bmr001.mrt\n");
            }
            Command::Upload(Some(path)) => upload_path(&client, &path).await,
            Command::Files => match client.list_files().await {
                Ok(result) if result.files.is_empty() => println!("No files uploaded yet.\n"),
                Ok(result) => {
                    println!("\nUploaded files ({}):", result.count);
                    for filename in &result.files {
                        println!("  - {}", filename);
                    }
                    println!();
                }
                Err(e) => println!("Error listing files: {}\n", e),
            },
            Command::Clear => match client.clear_files().await {
                Ok(result) => println!("✓ {}\n", result.message),
                Err(e) => println!("Error clearing files: {}\n", e),
            },
            Command::Chat(message) => match client.chat(&message).await {
                Ok(response) => println!("\nAssistant: {}\n", response),
                Err(e) if e.is_no_files() => {
                    warn!("Chat attempted with no files uploaded");
                    println!("\nPlease upload a file first using: upload <file.mrt>\n");
                }
                Err(e) => {
                    error!("Chat request failed: {}", e);
                    println!("\n Error: {}\n", e);
                }
            },
        }
    }

    Ok(())
}

async fn upload_path(client: &ApiClient, path: &Path) {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(_) => {
            println!("Error: File not found: {}\n", path.display());
            return;
        }
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    println!("Uploading '{}'...", filename);
    info!("Uploading file via CLI: {:?}", path);
    match client.upload(&filename, content).await {
        Ok(result) => {
            for line in format_upload(&filename, &result) {
                println!("{}", line);
            }
            println!();
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            println!("Error uploading file: {}\n", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("   "), Command::Empty);
        assert_eq!(parse_command("QUIT"), Command::Quit);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("files"), Command::Files);
        assert_eq!(parse_command("clear"), Command::Clear);
        assert_eq!(parse_command("upload"), Command::Upload(None));
        assert_eq!(
            parse_command("upload  data/transcripts/Bmr001.mrt "),
            Command::Upload(Some(PathBuf::from("data/transcripts/Bmr001.mrt")))
        );
    }

    #[test]
    fn test_anything_else_is_chat() {
        assert_eq!(
            parse_command("what did me011 say about files?"),
            Command::Chat("what did me011 say about files?".to_string())
        );
        assert_eq!(parse_command("filesystem"), Command::Chat("filesystem".to_string()));
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(error_detail(r#"{"detail": "Message cannot be empty"}"#), "Message cannot be empty");
        assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");

        let err = ClientError::Api {
            status: 503,
            detail: "No files uploaded yet. Please upload .mrt files first.".to_string(),
        };
        assert!(err.is_no_files());
    }

    #[test]
    fn test_format_upload() {
        let result = UploadResponse {
            files_processed: 0,
            files_cached: 1,
            errors: vec![],
            total_files: 1,
            status: "ready".to_string(),
        };
        let lines = format_upload("Bmr001.mrt", &result);
        assert_eq!(lines[0], "⚡ Cached (already uploaded): Bmr001.mrt");
        assert_eq!(lines.last().unwrap(), "Status: ready");
    }
}
