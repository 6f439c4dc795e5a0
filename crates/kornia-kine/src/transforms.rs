use glam::{DMat3, DMat4, DVec3, DVec4};

use crate::error::KineError;
use crate::linalg::{matvec_batch, BatchMatrix};
use crate::markers::{Markers, Template};

/// A rotation and translation mapping local coordinates into a parent frame.
///
/// `p_parent = rotation * p_local + translation`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation from local to parent frame.
    pub rotation: DMat3,
    /// Origin of the local frame expressed in the parent frame.
    pub translation: DVec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Transform marking a frame that could not be estimated.
    pub const NAN: Self = Self {
        rotation: DMat3::NAN,
        translation: DVec3::NAN,
    };

    /// Create a transform from its parts.
    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Whether any entry is NaN.
    pub fn is_nan(&self) -> bool {
        self.rotation.is_nan() || self.translation.is_nan()
    }

    /// Map a local point into the parent frame.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    /// Map a set of local points into the parent frame.
    pub fn transform_points(&self, points: &[DVec3]) -> Vec<DVec3> {
        points.iter().map(|p| self.transform_point(*p)).collect()
    }

    /// Inverse transform, valid for proper rotations.
    ///
    /// R' = R^T, t' = -R^T * t
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// 4x4 homogeneous matrix of the transform.
    pub fn to_homogeneous(&self) -> DMat4 {
        DMat4::from_cols(
            self.rotation.x_axis.extend(0.0),
            self.rotation.y_axis.extend(0.0),
            self.rotation.z_axis.extend(0.0),
            self.translation.extend(1.0),
        )
    }

    /// Split a 4x4 homogeneous matrix into rotation and translation.
    ///
    /// The last row is ignored.
    pub fn from_homogeneous(m: &DMat4) -> Self {
        Self {
            rotation: DMat3::from_cols(
                m.x_axis.truncate(),
                m.y_axis.truncate(),
                m.z_axis.truncate(),
            ),
            translation: m.w_axis.truncate(),
        }
    }
}

/// Build homogeneous matrices from per-frame rotations and translations.
///
/// # Errors
///
/// Returns [`KineError::MismatchedLengths`] if the batches differ in length.
pub fn compose_transforms(
    rotations: &[DMat3],
    translations: &[DVec3],
) -> Result<Vec<DMat4>, KineError> {
    if rotations.len() != translations.len() {
        return Err(KineError::MismatchedLengths {
            left_name: "rotations",
            left_len: rotations.len(),
            right_name: "translations",
            right_len: translations.len(),
        });
    }
    Ok(rotations
        .iter()
        .zip(translations)
        .map(|(r, t)| RigidTransform::new(*r, *t).to_homogeneous())
        .collect())
}

/// Split homogeneous matrices into per-frame rotations and translations.
pub fn decompose_transforms(mats: &[DMat4]) -> (Vec<DMat3>, Vec<DVec3>) {
    mats.iter()
        .map(|m| {
            let t = RigidTransform::from_homogeneous(m);
            (t.rotation, t.translation)
        })
        .unzip()
}

/// Homogeneous matrices of a batch of rigid transforms.
pub fn to_homogeneous_batch(transforms: &[RigidTransform]) -> Vec<DMat4> {
    transforms.iter().map(RigidTransform::to_homogeneous).collect()
}

fn apply_homogeneous(mats: &[DMat4], points: &[DVec3]) -> Vec<DVec3> {
    let points_h: Vec<DVec4> = points.iter().map(|p| p.extend(1.0)).collect();
    matvec_batch(mats, &points_h)
        .into_iter()
        .map(|p| p.truncate())
        .collect()
}

/// Express every trajectory in a new reference frame, frame by frame.
///
/// `mats[k]` maps coordinates at frame `k` from the current frame to the new one.
/// Frames whose matrix contains NaN produce NaN points.
///
/// # Errors
///
/// Returns [`KineError::MismatchedLengths`] if there is not one matrix per frame.
pub fn change_reference_frame(markers: &Markers, mats: &[DMat4]) -> Result<Markers, KineError> {
    if markers.n_frames() != mats.len() {
        return Err(KineError::MismatchedLengths {
            left_name: "marker frames",
            left_len: markers.n_frames(),
            right_name: "transforms",
            right_len: mats.len(),
        });
    }
    let mut out = Markers::new(mats.len());
    for (name, series) in markers.iter() {
        out.insert(name, apply_homogeneous(mats, series))?;
    }
    Ok(out)
}

/// Map static template points into a trajectory using one matrix per frame.
pub fn transform_template(template: &Template, mats: &[DMat4]) -> Markers {
    let mut out = Markers::new(mats.len());
    for (name, point) in template.iter() {
        let series = mats
            .iter()
            .map(|m| {
                if m.has_nan() {
                    DVec3::NAN
                } else {
                    m.transform_point3(point)
                }
            })
            .collect();
        out.put(name.to_string(), series);
    }
    out
}
