//! Rigid-body registration (Arun et al. 1987, Söderkvist & Wedin 1993, Challis 1995).
//!
//! Estimates the rotation `R` and translation `t` such that `y = R * x + t + e` is
//! optimal in the least-squares sense, where `x` are template points in the local
//! frame of a rigid marker cluster and `y` the same points observed in the global frame.

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::KineError;
use crate::markers::{Markers, Template};
use crate::parallel::{try_map_frames, ExecutionStrategy};
use crate::transforms::RigidTransform;

/// Singular values below this threshold are treated as zero when ranking the
/// cross-covariance matrix.
pub const DEFAULT_RANK_TOLERANCE: f64 = 2e-5;

/// What to do when the visible markers of a single frame are collinear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DegeneracyPolicy {
    /// Fail the whole batch with [`KineError::CollinearPoints`].
    Abort,
    /// Output a NaN transform for the frame and continue.
    #[default]
    NanFrame,
}

/// Parameters for [`rigid_body_svd`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    /// Tolerance on the singular values of the cross-covariance matrix.
    pub tolerance: f64,
    /// Handling of frames whose visible markers are collinear.
    pub policy: DegeneracyPolicy,
    /// Log the residual of every frame.
    pub verbose: bool,
    /// Frame execution strategy.
    pub execution: ExecutionStrategy,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_RANK_TOLERANCE,
            policy: DegeneracyPolicy::default(),
            verbose: false,
            execution: ExecutionStrategy::default(),
        }
    }
}

/// Output of a single rigid fit.
#[derive(Debug, Clone)]
pub struct RigidFit {
    /// Estimated transform from local to global frame.
    pub transform: RigidTransform,
    /// Distance between each fitted and observed point.
    pub residuals: Vec<f64>,
    /// Number of singular values above tolerance (2 for a planar point set).
    pub rank: usize,
}

impl RigidFit {
    /// Root-mean-square of the residuals.
    pub fn rmse(&self) -> f64 {
        let n = self.residuals.len() as f64;
        (self.residuals.iter().map(|e| e * e).sum::<f64>() / n).sqrt()
    }

    /// Index and value of the largest residual.
    pub fn worst(&self) -> Option<(usize, f64)> {
        self.residuals
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Per-frame outcome of [`rigid_body_svd`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameStatus {
    /// The transform was estimated.
    Valid {
        /// Root-mean-square residual over the visible markers.
        rmse: f64,
        /// Index, in the requested marker list, of the marker with the largest residual.
        worst_point: usize,
        /// Largest residual.
        worst_residual: f64,
    },
    /// Fewer than 3 markers were visible; the transform is NaN.
    Underdetermined {
        /// Number of visible markers.
        visible: usize,
    },
    /// The visible markers were collinear; the transform is NaN.
    RankDeficient {
        /// Rank of the cross-covariance matrix.
        rank: usize,
    },
}

impl FrameStatus {
    /// Whether the frame holds a valid transform.
    pub fn is_valid(&self) -> bool {
        matches!(self, FrameStatus::Valid { .. })
    }
}

/// Per-frame rigid transforms of a marker cluster.
#[derive(Debug, Clone)]
pub struct Registration {
    /// One transform per frame, NaN where the frame could not be estimated.
    pub transforms: Vec<RigidTransform>,
    /// One status per frame.
    pub status: Vec<FrameStatus>,
}

impl Registration {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Per-frame rotations.
    pub fn rotations(&self) -> Vec<DMat3> {
        self.transforms.iter().map(|t| t.rotation).collect()
    }

    /// Per-frame translations.
    pub fn translations(&self) -> Vec<DVec3> {
        self.transforms.iter().map(|t| t.translation).collect()
    }

    /// Per-frame homogeneous matrices.
    pub fn homogeneous(&self) -> Vec<DMat4> {
        crate::transforms::to_homogeneous_batch(&self.transforms)
    }

    /// Number of frames with a valid transform.
    pub fn num_valid(&self) -> usize {
        self.status.iter().filter(|s| s.is_valid()).count()
    }
}

// SVD of a 3x3 matrix with singular values sorted in decreasing order.
fn svd3(m: &DMat3) -> (DMat3, DVec3, DMat3) {
    let mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| m.col(j)[i]);
    let svd = mat.svd();
    let (u, s, v) = (svd.u(), svd.s_diagonal(), svd.v());

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| s.read(b).total_cmp(&s.read(a)));

    let col = |m: faer::MatRef<'_, f64>, j: usize| DVec3::new(m.read(0, j), m.read(1, j), m.read(2, j));
    let u = DMat3::from_cols(col(u, order[0]), col(u, order[1]), col(u, order[2]));
    let v = DMat3::from_cols(col(v, order[0]), col(v, order[1]), col(v, order[2]));
    let s = DVec3::new(s.read(order[0]), s.read(order[1]), s.read(order[2]));
    (u, s, v)
}

fn rank(s: DVec3, tolerance: f64) -> usize {
    s.to_array().iter().filter(|&&v| v > tolerance).count()
}

fn centroid(points: &[DVec3]) -> DVec3 {
    points.iter().fold(DVec3::ZERO, |acc, p| acc + *p) / points.len() as f64
}

// Cross-dispersion matrix C = B^T * A / n, A and B being the centered point sets.
fn cross_covariance(a: &[DVec3], a_mean: DVec3, b: &[DVec3], b_mean: DVec3) -> DMat3 {
    let mut c = DMat3::ZERO;
    for (pa, pb) in a.iter().zip(b) {
        let ac = *pa - a_mean;
        let bc = *pb - b_mean;
        c += DMat3::from_cols(bc * ac.x, bc * ac.y, bc * ac.z);
    }
    c * (1.0 / a.len() as f64)
}

/// Rank of the dispersion matrix of a point set.
///
/// A rank below 2 means the points are collinear (or coincident).
pub fn point_set_rank(points: &[DVec3], tolerance: f64) -> usize {
    if points.is_empty() {
        return 0;
    }
    let mean = centroid(points);
    let (_, s, _) = svd3(&cross_covariance(points, mean, points, mean));
    rank(s, tolerance)
}

/// Estimate the rigid transform mapping `local` points onto `global` points.
///
/// # Arguments
///
/// * `local` - Point coordinates in the local rigid frame.
/// * `global` - Corresponding coordinates in the global frame, all finite.
/// * `tolerance` - Threshold on the singular values of the cross-covariance matrix.
///
/// # Returns
///
/// The transform, the residual of every point and the rank of the problem. For a
/// planar point set (rank 2) the missing singular vectors are rebuilt as the cross
/// product of the first two.
///
/// # Errors
///
/// * [`KineError::MismatchedLengths`] if `local` and `global` differ in length.
/// * [`KineError::NonFinitePoint`] if a coordinate is NaN or infinite.
/// * [`KineError::CollinearPoints`] if fewer than 2 singular values exceed `tolerance`.
///
/// Example:
///
/// ```
/// use glam::{DMat3, DVec3};
/// use kornia_kine::registration::{rigid_body_transformation, DEFAULT_RANK_TOLERANCE};
///
/// let local = vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z];
/// let rot = DMat3::from_rotation_z(0.5);
/// let global: Vec<DVec3> = local.iter().map(|p| rot * *p + DVec3::ONE).collect();
/// let fit = rigid_body_transformation(&local, &global, DEFAULT_RANK_TOLERANCE).unwrap();
/// assert!(fit.transform.rotation.abs_diff_eq(rot, 1e-9));
/// ```
pub fn rigid_body_transformation(
    local: &[DVec3],
    global: &[DVec3],
    tolerance: f64,
) -> Result<RigidFit, KineError> {
    if local.len() != global.len() {
        return Err(KineError::MismatchedLengths {
            left_name: "local points",
            left_len: local.len(),
            right_name: "global points",
            right_len: global.len(),
        });
    }
    if local.is_empty() {
        return Err(KineError::CollinearPoints { rank: 0 });
    }
    if let Some(index) = local
        .iter()
        .zip(global)
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        return Err(KineError::NonFinitePoint { index });
    }

    let x_mean = centroid(local);
    let y_mean = centroid(global);
    let c = cross_covariance(local, x_mean, global, y_mean);

    let (mut u, s, mut v) = svd3(&c);
    let rank = rank(s, tolerance);
    if rank < 2 {
        return Err(KineError::CollinearPoints { rank });
    }
    if rank < 3 {
        // all points on one plane: rebuild the normal direction
        u.z_axis = u.x_axis.cross(u.y_axis);
        v.z_axis = v.x_axis.cross(v.y_axis);
    }

    // d = -1 would give a reflection
    let d = (u * v.transpose()).determinant().round();
    let rotation = u * DMat3::from_diagonal(DVec3::new(1.0, 1.0, d)) * v.transpose();
    let transform = RigidTransform::new(rotation, y_mean - rotation * x_mean);

    let residuals = local
        .iter()
        .zip(global)
        .map(|(x, y)| transform.transform_point(*x).distance(*y))
        .collect();

    Ok(RigidFit {
        transform,
        residuals,
        rank,
    })
}

/// Estimate, for every frame, the pose of a rigid marker cluster.
///
/// Only the markers visible in a frame are used. Frames with fewer than 3 visible
/// markers get a NaN transform; frames whose visible markers are collinear are handled
/// according to [`RegistrationParams::policy`].
///
/// # Arguments
///
/// * `markers` - Global trajectories.
/// * `names` - Markers of the cluster to use.
/// * `template` - Local coordinates of (at least) the markers in `names`.
/// * `params` - Registration parameters.
///
/// # Errors
///
/// * [`KineError::MissingPoint`] if a name is absent from `markers` or `template`.
/// * [`KineError::CollinearTemplate`] if the template points are collinear; this is
///   checked before any frame is processed.
/// * [`KineError::CollinearPoints`] for a degenerate frame under [`DegeneracyPolicy::Abort`].
pub fn rigid_body_svd<S: AsRef<str>>(
    markers: &Markers,
    names: &[S],
    template: &Template,
    params: &RegistrationParams,
) -> Result<Registration, KineError> {
    let slots = markers.slots(names)?;
    let local = template.select(names)?;
    let labels: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();

    let template_rank = point_set_rank(&local, params.tolerance);
    if template_rank < 2 {
        return Err(KineError::CollinearTemplate {
            rank: template_rank,
        });
    }

    let frames = try_map_frames(markers.n_frames(), params.execution, |frame| {
        let mut visible = Vec::with_capacity(slots.len());
        let mut x = Vec::with_capacity(slots.len());
        let mut y = Vec::with_capacity(slots.len());
        for (i, &slot) in slots.iter().enumerate() {
            let p = markers.point(slot, frame);
            if p.is_finite() {
                visible.push(i);
                x.push(local[i]);
                y.push(p);
            }
        }

        if visible.len() < 3 {
            log::warn!(
                "Only {} markers are visible for frame {}. Data will be set to nan",
                visible.len(),
                frame
            );
            return Ok((
                RigidTransform::NAN,
                FrameStatus::Underdetermined {
                    visible: visible.len(),
                },
            ));
        }

        match rigid_body_transformation(&x, &y, params.tolerance) {
            Ok(fit) => {
                let rmse = fit.rmse();
                let (worst, worst_residual) = fit.worst().unwrap_or((0, f64::NAN));
                let worst_point = visible[worst];
                if params.verbose {
                    log::info!(
                        "RMSE for rigid pose estimation for frame {}: {:.5}. Max distance for {}: {:.5}",
                        frame,
                        rmse,
                        labels[worst_point],
                        worst_residual
                    );
                }
                Ok((
                    fit.transform,
                    FrameStatus::Valid {
                        rmse,
                        worst_point,
                        worst_residual,
                    },
                ))
            }
            Err(KineError::CollinearPoints { rank }) => match params.policy {
                DegeneracyPolicy::Abort => Err(KineError::CollinearPoints { rank }),
                DegeneracyPolicy::NanFrame => {
                    log::warn!(
                        "Visible markers are collinear for frame {} (rank {}). Data will be set to nan",
                        frame,
                        rank
                    );
                    Ok((RigidTransform::NAN, FrameStatus::RankDeficient { rank }))
                }
            },
            Err(e) => Err(e),
        }
    })?;

    let (transforms, status) = frames.into_iter().unzip();
    Ok(Registration { transforms, status })
}
