use std::path::Path;

pub type TuneResult<T> = Result<T, TuneError>;

#[derive(thiserror::Error, Debug)]
pub enum TuneError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io failure: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encode failed at quality {quality}: {reason}")]
    EncodeFailed { quality: u8, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TuneError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn encode_failed(quality: u8, reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            quality,
            reason: reason.into(),
        }
    }

    /// Shorthand for the common "`<verb>` '`<path>`'" io context.
    pub fn io_at(verb: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{verb} '{}'", path.display()), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            TuneError::invalid_input("x")
                .to_string()
                .contains("invalid input:")
        );
        assert!(
            TuneError::io("write 'a.webp'", std::io::Error::other("disk full"))
                .to_string()
                .contains("io failure: write 'a.webp': disk full")
        );
        assert!(
            TuneError::encode_failed(42, "x")
                .to_string()
                .contains("encode failed at quality 42:")
        );
    }

    #[test]
    fn io_at_names_the_path() {
        let err = TuneError::io_at(
            "read",
            Path::new("in/a.png"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("read 'in/a.png'"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = TuneError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
