//! Reconstruction of a stylus tip from markers rigidly attached to the stylus.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::KineError;
use crate::markers::{Markers, Template};
use crate::registration::{rigid_body_svd, RegistrationParams};
use crate::transforms::transform_template;
use crate::trilateration::{normal_to_ls_plane, trilateration};

/// A method that computes the tip trajectory of a stylus from marker trajectories.
pub trait TipReconstruction {
    /// Reconstruct one tip position per frame of `markers`.
    fn reconstruct_tip(&self, markers: &Markers) -> Result<Vec<DVec3>, KineError>;
}

/// Markers aligned with the stylus axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollinearParams {
    /// Marker names, ordered from the one closest to the tip.
    pub markers: Vec<String>,
    /// Distance from each marker to the tip, same order as `markers`.
    pub distances: Vec<f64>,
}

/// How the five markers of a non-collinear stylus are registered before trilateration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClusterFit {
    /// Fit `{P1, P2, P3, P5}` and `{P2, P4, P5}` separately.
    #[default]
    TwoClusters,
    /// Fit the five markers at once.
    AllMarkers,
}

/// Five coplanar markers with the tip off their plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonCollinearParams {
    /// Marker names `P1..P5`.
    pub markers: [String; 5],
    /// Local coordinates of the five markers.
    pub template: Template,
    /// Distance from each marker to the tip.
    pub distances: [f64; 5],
    /// Distance of the tip from the markers plane.
    pub off_plane_distance: f64,
    /// Registration layout.
    pub cluster_fit: ClusterFit,
    /// Registration parameters.
    pub registration: RegistrationParams,
}

/// The supported stylus geometries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StylusStrategy {
    /// N markers on a line through the tip.
    Collinear(CollinearParams),
    /// Five-marker cluster with trilateration.
    NonCollinear5(NonCollinearParams),
}

/// A stylus bound to its tip reconstruction strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Stylus {
    strategy: StylusStrategy,
}

impl Stylus {
    /// Create a stylus.
    pub fn new(strategy: StylusStrategy) -> Self {
        Self { strategy }
    }

    /// The configured strategy.
    pub fn strategy(&self) -> &StylusStrategy {
        &self.strategy
    }

    /// Reconstruct the tip trajectory.
    pub fn reconstruct(&self, markers: &Markers) -> Result<Vec<DVec3>, KineError> {
        match &self.strategy {
            StylusStrategy::Collinear(params) => params.reconstruct_tip(markers),
            StylusStrategy::NonCollinear5(params) => params.reconstruct_tip(markers),
        }
    }
}

impl TipReconstruction for CollinearParams {
    fn reconstruct_tip(&self, markers: &Markers) -> Result<Vec<DVec3>, KineError> {
        if self.markers.len() != self.distances.len() {
            return Err(KineError::MismatchedLengths {
                left_name: "stylus markers",
                left_len: self.markers.len(),
                right_name: "stylus distances",
                right_len: self.distances.len(),
            });
        }

        // markers never recorded are skipped altogether
        let present: Vec<(&[DVec3], f64)> = self
            .markers
            .iter()
            .zip(&self.distances)
            .filter_map(|(name, d)| markers.get(name).map(|s| (s, *d)))
            .collect();

        (0..markers.n_frames())
            .map(|frame| {
                let visible: Vec<(DVec3, f64)> = present
                    .iter()
                    .map(|(s, d)| (s[frame], *d))
                    .filter(|(p, _)| p.is_finite())
                    .collect();

                let (first, last) = match (visible.first(), visible.last()) {
                    (Some(first), Some(last)) if visible.len() >= 2 => (first.0, last.0),
                    _ => {
                        return Err(KineError::InsufficientCollinearMarkers {
                            frame,
                            visible: visible.len(),
                        })
                    }
                };

                let direction = (first - last).normalize_or(DVec3::NAN);
                let sum = visible
                    .iter()
                    .fold(DVec3::ZERO, |acc, (p, d)| acc + *p + *d * direction);
                Ok(sum / visible.len() as f64)
            })
            .collect()
    }
}

// Sign that keeps zero, unlike f64::signum.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else if v == 0.0 {
        0.0
    } else {
        f64::NAN
    }
}

impl NonCollinearParams {
    // Cleaned marker trajectories: template points mapped through the fitted poses.
    fn fitted_markers(&self, markers: &Markers) -> Result<[Vec<DVec3>; 5], KineError> {
        let [n1, n2, n3, n4, n5] = &self.markers;
        let template = self.template.subset(&self.markers)?;

        let fit = |names: &[&String]| -> Result<Markers, KineError> {
            log::debug!("Performing SVD with {names:?}");
            let reg = rigid_body_svd(markers, names, &self.template, &self.registration)?;
            Ok(transform_template(&template, &reg.homogeneous()))
        };
        let take = |m: &Markers, name: &str| -> Result<Vec<DVec3>, KineError> {
            m.get(name)
                .map(<[DVec3]>::to_vec)
                .ok_or_else(|| KineError::MissingPoint(name.to_string()))
        };

        match self.cluster_fit {
            ClusterFit::TwoClusters => {
                let a = fit(&[n1, n2, n3, n5])?;
                let b = fit(&[n2, n4, n5])?;
                let p5 = take(&a, n5)?
                    .into_iter()
                    .zip(take(&b, n5)?)
                    .map(|(pa, pb)| 0.5 * (pa + pb))
                    .collect();
                Ok([take(&a, n1)?, take(&b, n2)?, take(&a, n3)?, take(&b, n4)?, p5])
            }
            ClusterFit::AllMarkers => {
                let all = fit(&[n1, n2, n3, n4, n5])?;
                Ok([
                    take(&all, n1)?,
                    take(&all, n2)?,
                    take(&all, n3)?,
                    take(&all, n4)?,
                    take(&all, n5)?,
                ])
            }
        }
    }
}

impl TipReconstruction for NonCollinearParams {
    fn reconstruct_tip(&self, markers: &Markers) -> Result<Vec<DVec3>, KineError> {
        let [p1, p2, p3, p4, p5] = self.fitted_markers(markers)?;
        let [r1, r2, r3, r4, r5] = self.distances;

        log::debug!("Performing trilaterations on {} frames", markers.n_frames());
        let tip = (0..markers.n_frames())
            .map(|i| {
                let u1 = trilateration(&[p1[i], p3[i], p5[i]], &[r1, r3, r5]).offset;
                let u2 = trilateration(&[p2[i], p4[i], p5[i]], &[r2, r4, r5]).offset;

                let normal = normal_to_ls_plane(&[p1[i], p2[i], p3[i], p4[i], p5[i]]);
                let side = (p3[i] - p2[i]).cross(p5[i] - p2[i]).dot(normal);
                let v = sign(side) * self.off_plane_distance * normal;

                0.5 * ((p1[i] + u1 + v) + (p2[i] + u2 + v))
            })
            .collect();
        Ok(tip)
    }
}
