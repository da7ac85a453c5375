//! Request command - send one authorized call to the tenant API
//!
//! Paths are relative to `{baseUrl}/{orgName}/{tenantName}/`.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde_json::Value;
use tenantlink_core::api::{ApiResponse, RequestOptions};
use tenantlink_core::ports::HttpMethod;
use tenantlink_domain::{NetworkErrorKind, SdkError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::GlobalArgs;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RequestCommand {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD)
    #[arg(value_parser = str::parse::<HttpMethod>)]
    pub method: HttpMethod,

    /// Path under the tenant, e.g. `odata/Folders`
    pub path: String,

    /// Query parameter, repeatable
    #[arg(short = 'q', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Extra header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// JSON body, or `@path` to read it from a file
    #[arg(short, long)]
    pub data: Option<String>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected NAME:VALUE, got `{raw}`"))
}

impl RequestCommand {
    fn options(&self, cancel: CancellationToken) -> Result<RequestOptions> {
        let mut options = RequestOptions::new().cancel_with(cancel);
        options.params.clone_from(&self.params);
        options.headers.clone_from(&self.headers);

        if let Some(data) = &self.data {
            let text = match data.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Cannot read request body from {path}"))?,
                None => data.clone(),
            };
            let body: Value = serde_json::from_str(&text).context("Request body is not valid JSON")?;
            options = options.json(&body)?;
        }
        Ok(options)
    }

    pub async fn execute(&self, globals: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sdk = globals.sdk(None)?;

        if sdk.config().oauth_settings().is_some() && !sdk.auth().token_manager().load().await {
            bail!("Not signed in; run `tenantlink login` first");
        }

        let cancel = CancellationToken::new();
        let options = self.options(cancel.clone())?;
        let timeout = self.timeout.map(Duration::from_secs);
        let watcher = tokio::spawn(async move {
            match timeout {
                Some(timeout) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        () = tokio::time::sleep(timeout) => {}
                    }
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
            cancel.cancel();
        });

        debug!(method = %self.method, path = %self.path, "sending request");
        let result = sdk.api().request(self.method, &self.path, options).await;
        watcher.abort();
        if cancel_requested(&result) {
            info!("request cancelled");
        }

        match result {
            Ok(ApiResponse::Json(value)) => formatter.print_json(&value),
            Ok(ApiResponse::Text(text)) => println!("{text}"),
            Ok(ApiResponse::NoContent) => formatter.success("No content"),
            Err(err) => {
                sdk.dispose();
                return Err(describe(&err));
            }
        }
        sdk.dispose();
        Ok(())
    }
}

fn cancel_requested(result: &tenantlink_domain::Result<ApiResponse>) -> bool {
    result.as_ref().err().and_then(SdkError::network_kind) == Some(NetworkErrorKind::Aborted)
}

fn describe(err: &SdkError) -> anyhow::Error {
    let mut text = format!("{}: {}", err.error_type(), err.message());
    if let Some(status) = err.status_code() {
        text.push_str(&format!(" [status {status}]"));
    }
    if let Some(request_id) = err.request_id() {
        text.push_str(&format!(" [request id {request_id}]"));
    }
    if err.is_retryable() {
        text.push_str(" (retryable)");
    }
    anyhow!(text)
}
