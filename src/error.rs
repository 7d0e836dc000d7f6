use thiserror::Error;

/// Generic text used when the endpoint fails without telling us why
pub const GENERIC_TRANSPORT_MESSAGE: &str = "Failed to get response from Gemini API";

/// Why a completion did not produce model text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// No usable credential; no request was made
    #[error("Please set up your Gemini API key (set {env_var} or add api_key to {config_hint})")]
    Configuration {
        env_var: String,
        config_hint: String,
    },

    /// The request never got a response, or got a non-2xx one
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// 2xx response without `candidates[0].content.parts[0].text`
    #[error("Invalid response format from API")]
    MalformedResponse,
}

impl CompletionError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Text of the assistant message shown in place of a reply
    pub fn to_message_content(&self) -> String {
        format!("Error: {self}. Please check the log for more details.")
    }
}

/// Why a submission was refused before anything happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("nothing to send")]
    Empty,
    #[error("a request is already in flight")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn configuration_error_mentions_api_key() {
        let error = CompletionError::Configuration {
            env_var: "GEMINI_API_KEY".to_string(),
            config_hint: "~/.novagem/config.toml".to_string(),
        };
        let content = error.to_message_content();
        assert!(content.starts_with("Error:"));
        assert!(content.contains("API key"));
        assert!(content.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn transport_error_uses_message_verbatim() {
        let error = CompletionError::transport(Some(400), "API key not valid. Please pass a valid API key.");
        assert_eq!(
            error.to_message_content(),
            "Error: API key not valid. Please pass a valid API key.. Please check the log for more details."
        );
    }

    #[test]
    fn malformed_error_text() {
        let content = CompletionError::MalformedResponse.to_message_content();
        assert!(content.starts_with("Error: Invalid response format from API"));
    }
}
