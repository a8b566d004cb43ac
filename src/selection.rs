use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Which particle slots to show, parsed from text like `"0,1,2"` or `"0-5,9"`.
///
/// Ranges are kept as inclusive `(start, end)` bounds and only expanded
/// against a concrete slot count.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub enum ParticleSelection {
    #[default]
    All,
    Slots(Vec<(usize, usize)>),
}

impl ParticleSelection {
    #[inline]
    pub fn contains(&self, slot: usize) -> bool {
        match self {
            ParticleSelection::All => true,
            ParticleSelection::Slots(ranges) => ranges
                .iter()
                .any(|&(start, end)| start <= slot && slot <= end),
        }
    }

    /// Selected slots below `num_slots`, in selection order.
    pub fn resolve(&self, num_slots: usize) -> Vec<usize> {
        match self {
            ParticleSelection::All => (0..num_slots).collect(),
            ParticleSelection::Slots(ranges) => ranges
                .iter()
                .filter(|&&(start, _)| start < num_slots)
                .flat_map(|&(start, end)| start..=end.min(num_slots - 1))
                .collect(),
        }
    }
}

impl FromStr for ParticleSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let mut ranges = Vec::new();

        for part in text.split(',').filter(|p| !p.is_empty()) {
            let parse = |n: &str| {
                n.parse::<usize>()
                    .map_err(|_| Error::config(format!("invalid particle index `{}`", n)))
            };

            match part.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (parse(start)?, parse(end)?);
                    if end < start {
                        return Err(Error::config(format!("empty particle range `{}`", part)));
                    }
                    ranges.push((start, end));
                }
                None => {
                    let slot = parse(part)?;
                    ranges.push((slot, slot));
                }
            }
        }

        if ranges.is_empty() {
            Ok(ParticleSelection::All)
        } else {
            Ok(ParticleSelection::Slots(ranges))
        }
    }
}
