//! `concord api`: send one request through the HTTP route table.
//!
//! Useful for checking exactly what a front end would receive, status code
//! and body included, without running a server.

use anyhow::{bail, Context, Result};
use concord_engine::{ApiBody, ApiRequest};
use concord_protocol::Method;
use std::path::PathBuf;

use super::context::{with_context, GlobalArgs};
use super::error::HelpfulError;

#[derive(Debug, Clone, clap::Args)]
pub struct ApiArgs {
    /// GET, POST, PUT or DELETE
    pub method: Method,

    /// Request path with optional query, e.g. /contracts/1 or /notifications/?limit=5
    pub path: String,

    /// JSON request body
    #[arg(long, value_name = "JSON")]
    pub body: Option<String>,

    /// Multipart form field (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    /// Multipart file part
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Where to save a file response [default: print its size]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn split_field(field: &str) -> Result<(&str, &str)> {
    field.split_once('=').ok_or_else(|| {
        HelpfulError::invalid_argument(
            format!("Invalid form field: '{}'", field),
            "TRY: Use KEY=VALUE, e.g. --field title=NDA",
        )
        .into()
    })
}

fn build_request(args: &ApiArgs) -> Result<ApiRequest> {
    let mut request = ApiRequest::new(args.method, args.path.clone());

    if let Some(body) = &args.body {
        let json: serde_json::Value = serde_json::from_str(body).map_err(|err| {
            HelpfulError::invalid_argument(
                format!("Invalid JSON body: {}", err),
                r#"TRY: Quote the body for your shell: --body '{"action": "lock"}'"#,
            )
        })?;
        request = request.with_json(json);
    }
    for field in &args.fields {
        let (key, value) = split_field(field)?;
        request = request.with_field(key, value);
    }
    if let Some(path) = &args.file {
        let bytes = std::fs::read(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => HelpfulError::file_not_found(path),
            _ => HelpfulError::cannot_read_file(path, &err.to_string()),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        request = request.with_file(name, bytes);
    }
    Ok(request)
}

pub fn run(global: &GlobalArgs, args: ApiArgs) -> Result<()> {
    let request = build_request(&args)?;

    with_context(global, |ctx| async move {
        let actor = ctx.actor().await?;
        let response = ctx.engine.handle(actor.id, request).await;

        match &response.body {
            ApiBody::Json(value) => {
                if !ctx.json {
                    println!("HTTP {}", response.status);
                }
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            ApiBody::File { file_name, bytes } => match &args.output {
                Some(path) => {
                    std::fs::write(path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("HTTP {}: saved {} to {}", response.status, file_name, path.display());
                }
                None => println!(
                    "HTTP {}: {} ({} bytes, use --output to save)",
                    response.status,
                    file_name,
                    bytes.len()
                ),
            },
        }

        if response.status >= 400 {
            bail!("Request failed with HTTP {}", response.status);
        }
        Ok(())
    })
}
