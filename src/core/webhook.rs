//! Deployment success webhooks.
//!
//! Each target receives one `multipart/form-data` POST carrying the bundle.
//! Targets are contacted in configured order and the first failure stops delivery.

use std::path::Path;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;

use crate::config::WebhookTarget;
use crate::error::{Error, Result, WebhookFailedDetails};
use crate::task::{run_all, Aggregation};

const MAX_LOGGED_BODY: usize = 1024;

fn truncate(body: &str) -> String {
    if body.len() <= MAX_LOGGED_BODY {
        return body.to_string();
    }
    let mut end = MAX_LOGGED_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

pub struct WebhookClient {
    client: Client,
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Posts the bundle to every target, stopping at the first failure.
    ///
    /// `lookup` resolves authorization environment variables.
    pub fn notify_all<F>(&self, targets: &[WebhookTarget], bundle: &Path, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        run_all(targets.iter().enumerate(), Aggregation::FailFast, |(index, target)| {
            tracing::debug!(webhook = %target.url, index, "submitting deployment success webhook");
            self.notify(target, bundle, &lookup)
        })
    }

    pub fn notify<F>(&self, target: &WebhookTarget, bundle: &Path, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let form = Form::new()
            .text("action", "deploy")
            .text("status", "success")
            .file("bundle", bundle)
            .map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("open bundle {}", bundle.display())))
            })?;

        let mut request = self.client.post(&target.url).multipart(form);

        if !target.authorization_var.is_empty() {
            match lookup(&target.authorization_var).filter(|v| !v.is_empty()) {
                Some(value) => request = request.header(AUTHORIZATION, value),
                None => tracing::warn!(
                    env_var = %target.authorization_var,
                    "authorization environment variable is empty"
                ),
            }
        }

        let response = request.send().map_err(|e| {
            tracing::error!(webhook = %target.url, error = %e, "failed to execute webhook request");
            Error::webhook_failed(WebhookFailedDetails {
                url: target.url.clone(),
                status: None,
                body: None,
                error: Some(e.to_string()),
            })
        })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        tracing::debug!(
            status = status.as_u16(),
            webhook = %target.url,
            response_body = %truncate(&body),
            "received webhook response"
        );

        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                webhook = %target.url,
                response_body = %truncate(&body),
                "webhook returned non-success status"
            );
            return Err(Error::webhook_failed(WebhookFailedDetails {
                url: target.url.clone(),
                status: Some(status.as_u16()),
                body: Some(truncate(&body)),
                error: None,
            }));
        }

        tracing::info!(webhook = %target.url, "successfully submitted deployment success webhook");
        Ok(())
    }
}
