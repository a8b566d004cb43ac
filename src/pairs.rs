use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Which frame pairs a batch run visits, as `(first, second)` frame indices
/// with `first < second`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePairs {
    /// Every pair `(i, j)`, `i < j`.
    AllPairs,
    /// `(i, i + 1)`.
    Consecutive,
    /// `(i, i + k)` starting from frame `start`, `i` advancing by `step`.
    KBuffer { start: usize, k: usize, step: usize },
}

impl FramePairs {
    pub fn validate(&self) -> Result<(), Error> {
        match *self {
            FramePairs::KBuffer { k, .. } if k == 0 => {
                Err(Error::config("k-buffer distance must be at least 1"))
            }
            FramePairs::KBuffer { step, .. } if step == 0 => {
                Err(Error::config("k-buffer step must be at least 1"))
            }
            _ => Ok(()),
        }
    }

    pub fn pairs(&self, num_frames: usize) -> Result<Vec<(usize, usize)>, Error> {
        self.validate()?;

        let pairs = match *self {
            FramePairs::AllPairs => (0..num_frames)
                .flat_map(|i| (i + 1..num_frames).map(move |j| (i, j)))
                .collect(),

            FramePairs::Consecutive => (1..num_frames).map(|j| (j - 1, j)).collect(),

            FramePairs::KBuffer { start, k, step } => (start..num_frames)
                .step_by(step)
                .take_while(|i| i + k < num_frames)
                .map(|i| (i, i + k))
                .collect(),
        };

        Ok(pairs)
    }
}
