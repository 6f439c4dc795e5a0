use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::KineError;
use crate::linalg::{inverse_batch, matmul_batch};
use crate::parallel::{map_frames, ExecutionStrategy};

/// Decomposition of the relative orientation of two segments into three angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AngleConvention {
    /// Ordered ZXY Euler angles of the joint matrix `R1^-1 * R2`, as `(z, x, y)`.
    #[default]
    EulerZxy,
    /// Grood & Suntay joint coordinate system, as `(FE, AA, IE)`.
    GroodSuntay,
}

impl AngleConvention {
    /// Joint angles in radians for one frame.
    ///
    /// `r1` and `r2` rotate the proximal and distal segment frames into the global frame.
    pub fn decompose(&self, r1: &DMat3, r2: &DMat3) -> [f64; 3] {
        match self {
            AngleConvention::EulerZxy => euler_zxy(&(r1.inverse() * *r2)),
            AngleConvention::GroodSuntay => grood_suntay(r1, r2),
        }
    }
}

/// Below this value of `cos(x)` the ZXY decomposition is treated as gimbal locked.
pub const GIMBAL_LOCK_TOLERANCE: f64 = 1e-7;

#[inline]
fn at(m: &DMat3, row: usize, col: usize) -> f64 {
    m.col(col)[row]
}

/// ZXY Euler angles `(z, x, y)` of a joint matrix `J = Rz * Rx * Ry`, in radians.
///
/// `x` is taken from `asin(J[2,1])`; the alternative solution `±π - x` is only used when
/// the principal one falls outside `[-π/2, π/2]`.
///
/// At `x = ±π/2` only `z ± y` is defined. When `cos(x)` is below
/// [`GIMBAL_LOCK_TOLERANCE`], `y` is set to zero and the whole rotation is assigned to `z`.
///
/// Example:
///
/// ```
/// use glam::DMat3;
/// use kornia_kine::joint::euler_zxy;
///
/// let j = DMat3::from_rotation_z(0.1) * DMat3::from_rotation_x(0.2) * DMat3::from_rotation_y(0.3);
/// let [z, x, y] = euler_zxy(&j);
/// assert!((z - 0.1).abs() < 1e-12 && (x - 0.2).abs() < 1e-12 && (y - 0.3).abs() < 1e-12);
/// ```
pub fn euler_zxy(j: &DMat3) -> [f64; 3] {
    let solve = |x: f64| {
        let c = x.cos();
        if c.abs() < GIMBAL_LOCK_TOLERANCE {
            return [f64::atan2(at(j, 1, 0), at(j, 0, 0)), x, 0.0];
        }
        let y = f64::atan2(-at(j, 2, 0) / c, at(j, 2, 2) / c);
        let z = f64::atan2(-at(j, 0, 1) / c, at(j, 1, 1) / c);
        [z, x, y]
    };

    // rounding can push |J[2,1]| slightly above 1
    let x1 = at(j, 2, 1).clamp(-1.0, 1.0).asin();
    if (-std::f64::consts::FRAC_PI_2..=std::f64::consts::FRAC_PI_2).contains(&x1) {
        solve(x1)
    } else {
        let x2 = if x1 >= 0.0 {
            std::f64::consts::PI - x1
        } else {
            -std::f64::consts::PI - x1
        };
        solve(x2)
    }
}

/// Grood & Suntay angles `(FE, AA, IE)` in radians.
///
/// The segment axes are the columns of `r1` (proximal) and `r2` (distal). Flexion
/// happens about the proximal Z axis, internal rotation about the distal Y axis, and
/// ab-adduction about the floating axis `e2 = Y2 x Z1`.
pub fn grood_suntay(r1: &DMat3, r2: &DMat3) -> [f64; 3] {
    let (x1, y1, z1) = (r1.x_axis, r1.y_axis, r1.z_axis);
    let (x2, y2, z2) = (r2.x_axis, r2.y_axis, r2.z_axis);

    let e2 = y2.cross(z1);
    let ie = -f64::atan2(e2.dot(-z2), e2.dot(x2));
    let fe = f64::atan2(e2.dot(y1), e2.dot(x1));
    let aa = y2.dot(z1).acos() - std::f64::consts::FRAC_PI_2;
    [fe, -aa, ie]
}

/// Joint angles, in degrees, between two segment orientation series.
///
/// Frames where either orientation is NaN produce NaN angles.
///
/// # Errors
///
/// Returns [`KineError::MismatchedLengths`] if the two series differ in length.
pub fn joint_angles(
    r1: &[DMat3],
    r2: &[DMat3],
    convention: AngleConvention,
    execution: ExecutionStrategy,
) -> Result<Vec<[f64; 3]>, KineError> {
    check_lengths("proximal rotations", r1.len(), "distal rotations", r2.len())?;

    let radians = match convention {
        AngleConvention::EulerZxy => {
            let joint = matmul_batch(&inverse_batch(r1), r2);
            map_frames(joint.len(), execution, |k| euler_zxy(&joint[k]))
        }
        AngleConvention::GroodSuntay => {
            map_frames(r1.len(), execution, |k| grood_suntay(&r1[k], &r2[k]))
        }
    };

    Ok(radians
        .into_iter()
        .map(|angles| angles.map(f64::to_degrees))
        .collect())
}

/// Poses of two segments at one frame.
///
/// Rotations map segment coordinates to global ones; use their transpose to express
/// global vectors in a segment frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPair {
    /// Proximal segment rotation (segment to global).
    pub r1: DMat3,
    /// Distal segment rotation (segment to global).
    pub r2: DMat3,
    /// Proximal segment origin in the global frame.
    pub o1: DVec3,
    /// Distal segment origin in the global frame.
    pub o2: DVec3,
}

/// Joint translations computed frame by frame by a user-provided function.
///
/// `f` receives the segment-to-global rotations and the segment origins of each frame.
///
/// # Errors
///
/// Returns [`KineError::MismatchedLengths`] if the inputs differ in length.
pub fn joint_translations<F>(
    r1: &[DMat3],
    r2: &[DMat3],
    o1: &[DVec3],
    o2: &[DVec3],
    f: F,
    execution: ExecutionStrategy,
) -> Result<Vec<[f64; 3]>, KineError>
where
    F: Fn(&SegmentPair) -> [f64; 3] + Send + Sync,
{
    check_lengths("proximal rotations", r1.len(), "distal rotations", r2.len())?;
    check_lengths("proximal rotations", r1.len(), "proximal origins", o1.len())?;
    check_lengths("proximal rotations", r1.len(), "distal origins", o2.len())?;

    Ok(map_frames(r1.len(), execution, |k| {
        f(&SegmentPair {
            r1: r1[k],
            r2: r2[k],
            o1: o1[k],
            o2: o2[k],
        })
    }))
}

fn check_lengths(
    left_name: &'static str,
    left_len: usize,
    right_name: &'static str,
    right_len: usize,
) -> Result<(), KineError> {
    if left_len != right_len {
        return Err(KineError::MismatchedLengths {
            left_name,
            left_len,
            right_name,
            right_len,
        });
    }
    Ok(())
}
