//! JSON envelope for non-streaming commands, and the error-to-exit-code mapping
//! shared by every command.

use portage::error::Hint;
use portage::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<CliError>,
}

impl CliError {
    fn from_error(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
            hints: if err.hints.is_empty() {
                None
            } else {
                Some(err.hints.clone())
            },
            causes: err.causes.iter().map(CliError::from_error).collect(),
        }
    }
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError::from_error(err)),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

pub fn print_success<T: Serialize>(data: T) -> Result<()> {
    print_response(&CliResponse::success(data))
}

pub fn print_result<T: Serialize>(result: Result<T>) -> Result<()> {
    match result {
        Ok(data) => print_success(data),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(&err);
            (Err(err), exit_code)
        }
    }
}

/// Tool failures surface the tool's own exit status; everything else maps by error class.
pub fn exit_code_for_error(err: &Error) -> i32 {
    if let Some(code) = err.command_errors().first().and_then(|e| e.exit_code()) {
        return code.clamp(1, 255);
    }

    match err.code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ConfigInvalidYaml
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::StageFailed | ErrorCode::TaskFailed => err
            .causes
            .first()
            .map(exit_code_for_error)
            .unwrap_or(1),

        ErrorCode::CommandFailed
        | ErrorCode::CommandExecFailed
        | ErrorCode::CommandNotStarted
        | ErrorCode::CommandInterrupted
        | ErrorCode::CommandInterruptFailed
        | ErrorCode::WebhookFailed
        | ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    print_result(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_exit_code_passes_through_stage_wrapper() {
        let err = Error::stage_failed("image scan", Error::command_failed("grype", 3));
        assert_eq!(exit_code_for_error(&err), 3);
    }

    #[test]
    fn large_exit_codes_are_clamped() {
        let err = Error::command(
            ErrorCode::CommandExecFailed,
            "syft",
            portage::exec::EXIT_CODE_OTHER,
            "No such file or directory",
        );
        assert_eq!(exit_code_for_error(&err), 255);
    }

    #[test]
    fn config_errors_exit_with_two() {
        let err = Error::stage_failed(
            "code scan",
            Error::validation_missing_argument(vec!["codeScan.semgrepRules".to_string()]),
        );
        assert_eq!(exit_code_for_error(&err), 2);
        assert_eq!(exit_code_for_error(&Error::config_invalid_yaml("x.yml", "bad")), 2);
    }

    #[test]
    fn webhook_failure_exits_with_one() {
        let err = Error::webhook_failed(portage::error::WebhookFailedDetails {
            url: "https://hooks.example.com".to_string(),
            status: Some(500),
            body: None,
            error: None,
        });
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
