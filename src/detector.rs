use tracing::{debug, warn};

use crate::detection::PointSet;
use crate::error::Error;
use crate::frame::{Frame, FrameSequence};
use crate::measurement::Measurement;

/// Finds disks in a single frame.
///
/// Implementations load the image themselves and fail with
/// [`Error::NoDisksDetected`] when the frame holds no disks.
pub trait Detector {
    fn detect(&mut self, frame_name: &str) -> Result<PointSet, Error>;
}

impl<F> Detector for F
where
    F: FnMut(&str) -> Result<PointSet, Error>,
{
    #[inline]
    fn detect(&mut self, frame_name: &str) -> Result<PointSet, Error> {
        self(frame_name)
    }
}

/// Runs `detector` over every frame of `measurement`.
///
/// A frame whose detection fails is kept with an empty point set so the
/// trajectory builder can report it. Names without a trailing frame number
/// are numbered after the largest parsed one, in listing order.
pub fn detect_measurement<M, D>(measurement: &M, detector: &mut D) -> Result<FrameSequence, Error>
where
    M: Measurement + ?Sized,
    D: Detector + ?Sized,
{
    let names = measurement.frame_names();
    let parsed: Vec<Option<u32>> = names.iter().map(|n| Frame::number_from_name(n)).collect();
    let mut next_free = parsed
        .iter()
        .flatten()
        .max()
        .map_or(0, |&max| max.saturating_add(1));
    let mut frames = Vec::with_capacity(names.len());

    for (name, parsed) in names.iter().zip(parsed) {
        let number = match parsed {
            Some(number) => number,
            None => {
                let number = next_free;
                next_free = next_free.saturating_add(1);
                debug!(frame = %name, number, "no frame number in name");
                number
            }
        };

        let points = match detector.detect(name) {
            Ok(points) => {
                debug!(frame = %name, disks = points.len(), "detected");
                points
            }
            Err(err) => {
                warn!(frame = %name, error = %err, "detection failed");
                PointSet::default()
            }
        };

        frames.push(Frame::new(number, name.clone(), points));
    }

    FrameSequence::new(frames)
}
