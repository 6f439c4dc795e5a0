use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::KineError;

/// Trajectories of named 3D points sampled over a common time axis.
///
/// Each point owns one slot holding `n_frames` coordinates. A missing sample is a
/// coordinate with NaN components. Names are resolved to slot indices once with
/// [`Markers::slots`] so that per-frame loops only index arrays.
#[derive(Debug, Clone, Default)]
pub struct Markers {
    n_frames: usize,
    names: Vec<String>,
    index: HashMap<String, usize>,
    series: Vec<Vec<DVec3>>,
}

impl Markers {
    /// Create an empty set of trajectories with `n_frames` frames.
    pub fn new(n_frames: usize) -> Self {
        Self {
            n_frames,
            ..Default::default()
        }
    }

    /// Number of time frames.
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no point has been inserted.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Point names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Insert or replace the trajectory of a point.
    ///
    /// # Errors
    ///
    /// Returns [`KineError::FrameCountMismatch`] if the trajectory does not have
    /// `n_frames` samples.
    pub fn insert(&mut self, name: impl Into<String>, points: Vec<DVec3>) -> Result<(), KineError> {
        let name = name.into();
        if points.len() != self.n_frames {
            return Err(KineError::FrameCountMismatch {
                name,
                expected: self.n_frames,
                actual: points.len(),
            });
        }
        self.put(name, points);
        Ok(())
    }

    /// Insert a point that does not move, repeated over every frame.
    pub fn insert_static(&mut self, name: impl Into<String>, point: DVec3) {
        let points = vec![point; self.n_frames];
        self.put(name.into(), points);
    }

    /// Insert or replace a trajectory already known to hold `n_frames` samples.
    pub(crate) fn put(&mut self, name: String, points: Vec<DVec3>) {
        debug_assert_eq!(points.len(), self.n_frames);
        match self.index.get(&name) {
            Some(&slot) => self.series[slot] = points,
            None => {
                self.index.insert(name.clone(), self.names.len());
                self.names.push(name);
                self.series.push(points);
            }
        }
    }

    /// Trajectory of a point, if present.
    pub fn get(&self, name: &str) -> Option<&[DVec3]> {
        self.index.get(name).map(|&slot| self.series[slot].as_slice())
    }

    /// Whether a point is present.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Slot index of a point.
    pub fn slot(&self, name: &str) -> Result<usize, KineError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| KineError::MissingPoint(name.to_string()))
    }

    /// Slot indices of several points, in the order given.
    pub fn slots<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, KineError> {
        names.iter().map(|name| self.slot(name.as_ref())).collect()
    }

    /// Trajectory stored in a slot.
    ///
    /// PRECONDITION: `slot` was returned by [`Markers::slot`] on this instance.
    pub fn series(&self, slot: usize) -> &[DVec3] {
        &self.series[slot]
    }

    /// Coordinates of a slot at one frame.
    pub fn point(&self, slot: usize, frame: usize) -> DVec3 {
        self.series[slot][frame]
    }

    /// Iterate over `(name, trajectory)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DVec3])> {
        self.names
            .iter()
            .zip(self.series.iter())
            .map(|(name, series)| (name.as_str(), series.as_slice()))
    }

    /// Keep only the listed points.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Markers, KineError> {
        let mut out = Markers::new(self.n_frames);
        for name in names {
            let name = name.as_ref();
            let slot = self.slot(name)?;
            out.insert(name, self.series[slot].clone())?;
        }
        Ok(out)
    }
}

/// Coordinates of named points in the local reference frame of a rigid body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    points: Vec<(String, DVec3)>,
}

impl Template {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a local point.
    pub fn insert(&mut self, name: impl Into<String>, point: DVec3) {
        let name = name.into();
        match self.points.iter_mut().find(|(n, _)| *n == name) {
            Some((_, p)) => *p = point,
            None => self.points.push((name, point)),
        }
    }

    /// Local coordinates of a point, if present.
    pub fn get(&self, name: &str) -> Option<DVec3> {
        self.points
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| *p)
    }

    /// Local coordinates of several points, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<DVec3>, KineError> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .ok_or_else(|| KineError::MissingPoint(name.as_ref().to_string()))
            })
            .collect()
    }

    /// Keep only the listed points.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Template, KineError> {
        let points = self.select(names)?;
        Ok(names
            .iter()
            .map(|n| n.as_ref().to_string())
            .zip(points)
            .collect())
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the template is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over `(name, point)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DVec3)> {
        self.points.iter().map(|(n, p)| (n.as_str(), *p))
    }
}

impl<S: Into<String>> FromIterator<(S, DVec3)> for Template {
    fn from_iter<I: IntoIterator<Item = (S, DVec3)>>(iter: I) -> Self {
        let mut template = Template::new();
        for (name, point) in iter {
            template.insert(name, point);
        }
        template
    }
}
