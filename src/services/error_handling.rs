use crate::domain::Pool;
use crate::repository::RepositoryError;
use anyhow::{Context, Result};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum MinerStatsError {
    #[error("Not signed in: {action} needs a user")]
    NotSignedIn { action: String },

    #[error("Can't find bookmark to remove")]
    BookmarkNotFound,

    #[error("Rig profile not found: {uuid}")]
    RigProfileNotFound { uuid: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Balance request for {pool} failed: {message}")]
    BalanceRequest { pool: Pool, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MinerStatsError {
    pub fn not_signed_in(action: impl Into<String>) -> Self {
        Self::NotSignedIn {
            action: action.into(),
        }
    }
}

/// Error context wrapper naming the failed operation and its inputs.
pub struct ErrorContext {
    operation: String,
    details: Vec<(String, String)>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.details.push((key.into(), value.to_string()));
        self
    }

    pub fn wrap<T, E>(self, result: std::result::Result<T, E>) -> Result<T>
    where
        E: Into<anyhow::Error>,
    {
        result.map_err(Into::into).with_context(|| {
            let mut msg = format!("Operation '{}' failed", self.operation);
            if !self.details.is_empty() {
                msg.push_str(" with context:");
                for (key, value) in self.details {
                    msg.push_str(&format!("\n  {}: {}", key, value));
                }
            }
            msg
        })
    }
}

pub struct LogHelper;

impl LogHelper {
    pub fn log_error_with_context(context: &str, error: &anyhow::Error) {
        error!(
            context = %context,
            error = %error,
            error_chain = ?error.chain().map(ToString::to_string).collect::<Vec<_>>(),
            "Error occurred"
        );
    }

    /// A failure that was replaced by a default value.
    pub fn log_fallback(operation: &str, error: &dyn fmt::Display) {
        warn!(
            operation = %operation,
            error = %error,
            "Falling back to default value"
        );
    }
}

/// Short messages for the command line.
pub struct UserErrorFormatter;

impl UserErrorFormatter {
    pub fn format_for_cli(error: &anyhow::Error) -> String {
        if let Some(known) = error.downcast_ref::<MinerStatsError>() {
            return Self::format_known(known);
        }
        if error.downcast_ref::<RepositoryError>().is_some() || error.downcast_ref::<sqlx::Error>().is_some() {
            return format!("A database error occurred: {error:#}");
        }
        format!("{error:#}")
    }

    fn format_known(error: &MinerStatsError) -> String {
        match error {
            MinerStatsError::NotSignedIn { .. } => {
                "Pass --user <uid> to read or change user data.".to_string()
            }
            MinerStatsError::RigProfileNotFound { uuid } => {
                format!("No rig profile with id {uuid}. Run `minerstats profiles` to list them.")
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let result: Result<()> = Err(anyhow::anyhow!("backend unavailable"));

        let wrapped = ErrorContext::new("save_rig_profile")
            .with_detail("uuid", "p1")
            .with_detail("attempt", 1)
            .wrap(result);

        let error_msg = format!("{:#}", wrapped.unwrap_err());
        assert!(error_msg.contains("save_rig_profile"));
        assert!(error_msg.contains("uuid: p1"));
        assert!(error_msg.contains("backend unavailable"));
    }

    #[test]
    fn test_cli_formatting_of_known_errors() {
        let err = anyhow::Error::new(MinerStatsError::not_signed_in("bookmark"));
        assert!(UserErrorFormatter::format_for_cli(&err).contains("--user"));

        let err = anyhow::Error::new(MinerStatsError::BookmarkNotFound);
        assert_eq!(UserErrorFormatter::format_for_cli(&err), "Can't find bookmark to remove");
    }
}
