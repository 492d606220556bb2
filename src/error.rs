use thiserror::Error;

/// Error taxonomy of the analysis core.
///
/// Only `Configuration` (and structural buffer mismatches surfaced as
/// `Input` at construction time) stop a run. Metric-level failures are turned
/// into `no_data` results by the pipeline, see [`Unavailable`].
#[derive(Debug, Error)]
pub enum MixgradeError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("external process failed: {0}")]
    ExternalProcess(String),
}

pub type Result<T> = std::result::Result<T, MixgradeError>;

impl MixgradeError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Reason code recorded on a metric that could not be computed.
    pub fn unavailable(&self) -> Unavailable {
        match self {
            Self::Input(_) => Unavailable::InvalidInput,
            Self::InsufficientData(_) => Unavailable::InsufficientData,
            Self::Configuration(_) | Self::ExternalProcess(_) => Unavailable::NotMeasured,
        }
    }
}

/// Why a metric carries no value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    InvalidInput,
    InsufficientData,
    NotMeasured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_follow_variant() {
        assert_eq!(
            MixgradeError::input("x").unavailable(),
            Unavailable::InvalidInput
        );
        assert_eq!(
            MixgradeError::InsufficientData("x".into()).unavailable(),
            Unavailable::InsufficientData
        );
        assert_eq!(
            MixgradeError::config("x").unavailable(),
            Unavailable::NotMeasured
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = MixgradeError::config("bands missing");
        assert_eq!(err.to_string(), "configuration error: bands missing");
    }
}
