use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("destination point set is empty")]
    EmptyDestinationSet,

    #[error("no points left to bin into rings")]
    EmptyRadiusSet,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("length mismatch: `{name}` has {actual} elements, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("frame number {0} appears more than once")]
    DuplicateFrame(u32),

    #[error("no disks detected in frame `{frame}`")]
    NoDisksDetected { frame: String },

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[inline]
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Error::LengthMismatch {
                name,
                expected,
                actual,
            })
        }
    }
}
