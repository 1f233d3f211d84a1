use thiserror::Error;

pub type InstantWinResult<T> = Result<T, InstantWinError>;

#[derive(Error, Debug)]
pub enum InstantWinError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template {0} not found")]
    TemplateNotFound(i64),

    #[error("Template {0} has no nodes")]
    EmptyTemplate(i64),

    #[error("Conversation {0} not found")]
    ConversationNotFound(i64),

    #[error("History store error: {0}")]
    History(String),

    #[error("Prize catalog error: {0}")]
    Catalog(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl InstantWinError {
    /// Short machine-readable code used in transport error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Validation(_) => "invalid_request",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::EmptyTemplate(_) => "empty_template",
            Self::ConversationNotFound(_) => "conversation_not_found",
            Self::History(_) => "history_unavailable",
            Self::Catalog(_) => "catalog_unavailable",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }
}
