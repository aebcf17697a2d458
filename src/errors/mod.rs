use thiserror::Error;

/// Typed error hierarchy for linedrop.
///
/// Use at adapter boundaries (LINE API calls, Drive uploads, persistence,
/// command parsing). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion
/// via the `?` operator.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Webhook signature rejected: {0}")]
    Auth(String),

    #[error("Profile lookup failed: {0}")]
    ProfileLookup(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("{0}")]
    CommandParse(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    /// Whether this error should abort process startup. Everything except
    /// misconfiguration is log-and-continue at the per-event boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The corrective text to send back to the user, if this error is
    /// user-facing (command parse failures carry their reply verbatim).
    pub fn user_reply(&self) -> Option<&str> {
        match self {
            Self::CommandParse(reply) => Some(reply),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
