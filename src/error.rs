use crate::models::{ALIAS_MAX_CHARS, DESCRIPTION_MAX_CHARS, MAX_ALIASES, TRIGGER_MAX_CHARS};

/// Errors produced by the Truth Bullet store and discovery engine.
///
/// Validation variants are caller mistakes and get rendered back to the user
/// as a rejection message; `Db`/`Json` are systemic and propagate to the
/// framework's error handler.
#[derive(Debug, thiserror::Error)]
pub enum InvestigationError {
    #[error("a Truth Bullet or alias named `{0}` already exists in this channel")]
    AlreadyExists(String),

    #[error("no Truth Bullet named `{0}` exists in this channel")]
    NotFound(String),

    #[error("no alias named `{0}` exists on that Truth Bullet")]
    AliasNotFound(String),

    #[error("a Truth Bullet can have at most {MAX_ALIASES} aliases")]
    TooManyAliases,

    #[error("trigger names can be at most {TRIGGER_MAX_CHARS} characters long")]
    TriggerTooLong,

    #[error("aliases can be at most {ALIAS_MAX_CHARS} characters long")]
    AliasTooLong,

    #[error("descriptions can be at most {DESCRIPTION_MAX_CHARS} characters long")]
    DescriptionTooLong,

    #[error("`{0}` is not a valid http(s) image URL")]
    InvalidImageUrl(String),

    #[error("that Truth Bullet has already been found")]
    AlreadyFound,

    #[error("that Truth Bullet has not been found yet")]
    NotYetFound,

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl InvestigationError {
    /// True for validation errors that should be surfaced to the invoking
    /// user instead of propagating.
    pub fn user_facing(&self) -> bool {
        !matches!(self, Self::Db(_) | Self::Json(_))
    }
}
