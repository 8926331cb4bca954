use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidValue,
    ConfigInvalidYaml,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    CommandFailed,
    CommandExecFailed,
    CommandNotStarted,
    CommandInterrupted,
    CommandInterruptFailed,

    TaskFailed,
    StageFailed,
    WebhookFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigInvalidYaml => "config.invalid_yaml",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::CommandFailed => "command.failed",
            ErrorCode::CommandExecFailed => "command.exec_failed",
            ErrorCode::CommandNotStarted => "command.not_started",
            ErrorCode::CommandInterrupted => "command.interrupted",
            ErrorCode::CommandInterruptFailed => "command.interrupt_failed",

            ErrorCode::TaskFailed => "task.failed",
            ErrorCode::StageFailed => "stage.failed",
            ErrorCode::WebhookFailed => "webhook.failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    /// True for the five outcomes the executor can classify a tool invocation into.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            ErrorCode::CommandFailed
                | ErrorCode::CommandExecFailed
                | ErrorCode::CommandNotStarted
                | ErrorCode::CommandInterrupted
                | ErrorCode::CommandInterruptFailed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidYamlDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

/// Classified outcome of one external tool invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandErrorDetails {
    pub command: String,
    pub exit_code: i32,
    pub cause: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailedDetails {
    pub stage: String,
    pub cause_code: String,
    pub cause: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookFailedDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    /// Underlying errors, kept whole so aggregated failures stay inspectable.
    pub causes: Vec<Error>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            causes: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        let message = format!("Missing required argument: {}", args.join(", "));
        Self::new(
            ErrorCode::ValidationMissingArgument,
            message,
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let field = field.into();
        let problem = problem.into();
        let message = format!("Invalid argument '{}': {}", field, problem);
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            message,
            to_details(InvalidArgumentDetails {
                field,
                problem,
                id,
                tried,
            }),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key '{}'", key),
            to_details(ConfigMissingKeyDetails { key, path }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value for '{}': {}", key, problem),
            to_details(ConfigInvalidValueDetails {
                key,
                value,
                problem,
            }),
        )
    }

    pub fn config_invalid_yaml(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidYaml,
            format!("Invalid YAML document: {}", path),
            to_details(ConfigInvalidYamlDetails {
                path,
                error: error.into(),
            }),
        )
    }

    /// Builds one of the command.* errors. `code` must satisfy [`ErrorCode::is_command`].
    pub fn command(
        code: ErrorCode,
        command: impl Into<String>,
        exit_code: i32,
        cause: impl Into<String>,
    ) -> Self {
        let details = CommandErrorDetails {
            command: command.into(),
            exit_code,
            cause: cause.into(),
        };
        Self::new(
            code,
            format!("[shell:{}] {}", details.command, details.cause),
            to_details(&details),
        )
    }

    pub fn command_failed(command: impl Into<String>, exit_code: i32) -> Self {
        Self::command(
            ErrorCode::CommandFailed,
            command,
            exit_code,
            format!("exit status {}", exit_code),
        )
    }

    /// Exit code reported by a command.* error, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        if !self.code.is_command() {
            return None;
        }
        self.details
            .get("exitCode")
            .and_then(Value::as_i64)
            .map(|code| code as i32)
    }

    /// Command name reported by a command.* error, if this is one.
    pub fn command_name(&self) -> Option<&str> {
        if !self.code.is_command() {
            return None;
        }
        self.details.get("command").and_then(Value::as_str)
    }

    pub fn stage_failed(stage: impl Into<String>, cause: Error) -> Self {
        let stage = stage.into();
        let mut err = Self::new(
            ErrorCode::StageFailed,
            format!("{} pipeline failed: {}", stage, cause.message),
            to_details(StageFailedDetails {
                stage,
                cause_code: cause.code.as_str().to_string(),
                cause: cause.message.clone(),
            }),
        );
        err.causes.push(cause);
        err
    }

    /// Joins several failures into one. A single failure is returned unchanged.
    pub fn joined(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            count => {
                let message = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                let details = serde_json::json!({
                    "count": count,
                    "codes": errors.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(),
                });
                let mut err = Self::new(ErrorCode::TaskFailed, message, details);
                err.causes = errors;
                Some(err)
            }
        }
    }

    pub fn webhook_failed(details: WebhookFailedDetails) -> Self {
        let message = match (details.status, &details.error) {
            (Some(status), _) => format!(
                "webhook request failed with status: {} - url: {}",
                status, details.url
            ),
            (None, Some(error)) => {
                format!("webhook request failed: {} - url: {}", error, details.url)
            }
            (None, None) => format!("webhook request failed - url: {}", details.url),
        };
        Self::new(ErrorCode::WebhookFailed, message, to_details(details))
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(ctx) => format!("IO error ({}): {}", ctx, error),
            None => format!("IO error: {}", error),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalIoErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalJsonError,
            format!("JSON error: {}", error),
            to_details(InternalJsonErrorDetails { error, context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            format!("Unexpected error: {}", error),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Every command.* error reachable from this one, depth first.
    pub fn command_errors(&self) -> Vec<&Error> {
        let mut found = Vec::new();
        if self.code.is_command() {
            found.push(self);
        }
        for cause in &self.causes {
            found.extend(cause.command_errors());
        }
        found
    }
}
