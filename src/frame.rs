use serde_derive::{Deserialize, Serialize};

use crate::detection::PointSet;
use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub number: u32,
    pub name: String,
    pub points: PointSet,
}

impl Frame {
    pub fn new(number: u32, name: impl Into<String>, points: PointSet) -> Self {
        Self {
            number,
            name: name.into(),
            points,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Trailing digits of the file stem, e.g. `DSC_0007.jpg` -> 7.
    pub fn number_from_name(name: &str) -> Option<u32> {
        let stem = match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        };

        let start = stem
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(idx, _)| idx)?;

        stem[start..].parse().ok()
    }
}

/// Frames of one measurement, ordered by frame number.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new(mut frames: Vec<Frame>) -> Result<Self, Error> {
        frames.sort_by_key(|f| f.number);

        if let Some(pair) = frames.windows(2).find(|w| w[0].number == w[1].number) {
            return Err(Error::DuplicateFrame(pair[0].number));
        }

        Ok(Self { frames })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Frame> {
        self.frames.get(idx)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn point_sets(&self) -> Vec<&PointSet> {
        self.frames.iter().map(|f| &f.points).collect()
    }

    pub fn position_of(&self, number: u32) -> Option<usize> {
        self.frames
            .binary_search_by_key(&number, |f| f.number)
            .ok()
    }
}
