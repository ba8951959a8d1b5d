//! User-facing errors with suggestions.
//!
//! Every error printed by the CLI carries what went wrong, optionally where,
//! and `TRY:` lines with a next step.

use concord_engine::EngineError;
use concord_protocol::ErrorResponse;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    /// Stable machine code, shared with the HTTP error body.
    pub code: &'static str,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: "CLI_ERROR",
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    pub fn missing_actor() -> Self {
        Self::new("No acting user given")
            .with_code("MISSING_ACTOR")
            .with_context("This command acts on behalf of a registered user")
            .with_suggestions([
                "TRY: Pass the username: concord --as alice <command>",
                "TRY: Or export it once: export CONCORD_USER=alice",
                "TRY: Register a user first: concord user add alice alice@example.com",
            ])
    }

    pub fn unknown_user(username: &str) -> Self {
        Self::new(format!("User '{}' not found", username))
            .with_code("NOT_FOUND")
            .with_suggestions([
                "TRY: List registered users: concord user list".to_string(),
                format!("TRY: Search by name: concord user search {}", username),
            ])
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_code("FILE_NOT_FOUND")
            .with_suggestion(format!(
                "TRY: Check if the file exists: ls -la {}",
                path.display()
            ))
    }

    pub fn cannot_read_file(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot read file: {}", path.display()))
            .with_code("FILE_UNREADABLE")
            .with_context(reason.to_string())
            .with_suggestion(format!(
                "TRY: Check file permissions: ls -la {}",
                path.display()
            ))
    }

    pub fn invalid_argument(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::new(message)
            .with_code("INVALID_INPUT")
            .with_suggestion(hint)
    }
}

impl From<EngineError> for HelpfulError {
    fn from(err: EngineError) -> Self {
        let code = err.code();
        let base = if err.is_client_error() {
            HelpfulError::new(err.to_string())
        } else {
            HelpfulError::new("Internal error").with_context(err.to_string())
        }
        .with_code(code);

        match err {
            EngineError::LockConflict(_) => base.with_suggestions([
                "TRY: See who holds the lock: concord contract show <ID>",
                "TRY: Ask them to finish their edit or run: concord contract unlock <ID>",
            ]),
            EngineError::ApprovalRequired(_) => base.with_suggestion(
                "TRY: Both parties approve first: concord contract approve <ID>",
            ),
            EngineError::Forbidden(_) => base.with_suggestion(
                "TRY: Check the acting user (--as) is the sender or recipient",
            ),
            EngineError::NotFound(_) => {
                base.with_suggestion("TRY: List your contracts: concord contract list")
            }
            EngineError::RecipientNotFound => base.with_suggestions([
                "TRY: Look the recipient up: concord user search <NAME>",
                "TRY: Register them: concord user add <USERNAME> <EMAIL>",
            ]),
            EngineError::SelfTarget | EngineError::MissingRecipient => {
                base.with_suggestion("TRY: Name the other party: --to <USERNAME> or --to-email <EMAIL>")
            }
            EngineError::FileMissing => base
                .with_context("The document is recorded but its stored file is gone")
                .with_suggestion("TRY: Check the uploads directory: concord config"),
            EngineError::Db(_) | EngineError::Storage(_) => {
                base.with_suggestion("TRY: Re-run with -v and check ~/.concord/logs/concord.log")
            }
            _ => base,
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Human rendering for stderr.
pub fn render(err: &anyhow::Error) -> String {
    match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => helpful.to_string(),
        None => format!("ERROR: {:#}", err),
    }
}

/// Machine rendering for `--json`, in the same shape as HTTP error bodies.
pub fn to_error_response(err: &anyhow::Error) -> ErrorResponse {
    match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => {
            let response = ErrorResponse::new(helpful.message.clone(), helpful.code);
            if helpful.suggestions.is_empty() {
                response
            } else {
                response.with_details(serde_json::json!({
                    "context": helpful.context,
                    "suggestions": helpful.suggestions,
                }))
            }
        }
        None => ErrorResponse::new(format!("{:#}", err), "CLI_ERROR"),
    }
}

pub fn print_json_error(err: &anyhow::Error) {
    let body = to_error_response(err);
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{}", render(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("TRY: again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("TRY: again"));
    }

    #[test]
    fn test_engine_error_keeps_code_and_message() {
        let err = HelpfulError::from(EngineError::LockConflict(
            "Contract is currently being edited by another user".to_string(),
        ));
        assert_eq!(err.code, "LOCK_CONFLICT");
        assert_eq!(
            err.message,
            "Contract is currently being edited by another user"
        );
        assert!(err.suggestions.iter().any(|s| s.contains("unlock")));
    }

    #[test]
    fn test_json_error_shape() {
        let err: anyhow::Error = HelpfulError::missing_actor().into();
        let body = to_error_response(&err);
        assert_eq!(body.code, "MISSING_ACTOR");
        assert_eq!(body.error, "No acting user given");
        assert!(body.details.is_some());

        let plain = anyhow::anyhow!("boom");
        let body = to_error_response(&plain);
        assert_eq!(body.code, "CLI_ERROR");
        assert_eq!(body.error, "boom");
    }
}
