use crate::config::ConfigError;
use thiserror::Error;

/// Maximum length of an error message captured into a row's `error` field.
pub const ERROR_FIELD_MAX: usize = 240;

#[derive(Error, Debug)]
pub enum FollowRatioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser session error: {0}")]
    Session(#[from] SessionError),

    #[error("Roster input error: {0}")]
    Input(#[from] InputError),

    #[error("CSV output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Application shutdown requested")]
    Shutdown,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("WebDriver session could not be created: {0}")]
    Connect(#[from] fantoccini::error::NewSessionError),

    #[error("WebDriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Worksheet not found: {0}")]
    SheetNotFound(String),

    #[error("The input has no 'username' column")]
    MissingUsernameColumn,

    #[error("Unsupported input format: {0:?} (expected .xlsx, .xls, .ods or .csv)")]
    UnsupportedFormat(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Cap a captured error message for the CSV `error` field.
pub fn truncate_message(message: &str, max: usize) -> String {
    message.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message_short_input_unchanged() {
        assert_eq!(truncate_message("boom", ERROR_FIELD_MAX), "boom");
    }

    #[test]
    fn test_truncate_message_caps_length() {
        let long = "x".repeat(1000);
        let capped = truncate_message(&long, ERROR_FIELD_MAX);
        assert_eq!(capped.chars().count(), ERROR_FIELD_MAX);
    }

    #[test]
    fn test_truncate_message_is_character_based() {
        // Multi-byte characters must not be split mid-codepoint.
        let long = "é".repeat(500);
        let capped = truncate_message(&long, ERROR_FIELD_MAX);
        assert_eq!(capped.chars().count(), ERROR_FIELD_MAX);
    }

    #[test]
    fn test_error_display() {
        let error = FollowRatioError::Input(InputError::MissingUsernameColumn);
        assert!(error.to_string().contains("username"));

        let error = FollowRatioError::Input(InputError::SheetNotFound("Sheet2".to_string()));
        assert!(error.to_string().contains("Sheet2"));
    }

    #[test]
    fn test_error_conversion_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = FollowRatioError::from(io_error);
        assert!(matches!(error, FollowRatioError::Io(_)));
    }

    #[test]
    fn test_nested_error_conversion() {
        let config_error = ConfigError::MissingRequired("input.path".to_string());
        let error = FollowRatioError::from(config_error);
        match error {
            FollowRatioError::Config(inner) => {
                assert!(inner.to_string().contains("input.path"));
            }
            _ => panic!("Expected Config error variant"),
        }
    }
}
