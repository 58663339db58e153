use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The reply resolver failed outright (network, timeout, model error).
    /// Any blocks it delivered before failing are already sent.
    #[error("reply generation failed: {source}")]
    Generation {
        #[source]
        source: anyhow::Error,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn generation(source: anyhow::Error) -> Self {
        Self::Generation { source }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}
