use std::path::PathBuf;

pub type AnimResult<T> = Result<T, AnimError>;

#[derive(thiserror::Error, Debug)]
pub enum AnimError {
    #[error("cannot read simulation log '{}': {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnimError {
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Source {
            path: path.into(),
            source,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            AnimError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(AnimError::render("x").to_string().contains("render error:"));
        assert!(AnimError::encode("x").to_string().contains("encode error:"));
        assert!(
            AnimError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn source_error_names_the_path() {
        let err = AnimError::unreadable(
            "missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("missing.txt"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = AnimError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
