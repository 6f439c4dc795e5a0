//! Anatomical segment frames from bony landmarks.
//!
//! Reference: Leardini A, Benedetti MG, Berti L, Bettinelli D, Nativo R, Giannini S.
//! Rear-foot, mid-foot and fore-foot motion during the stance phase of gait.
//! Gait Posture. 2007;25(3):453-62.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::KineError;
use crate::linalg::versor;
use crate::markers::{Markers, Template};
use crate::registration::{rigid_body_svd, RegistrationParams};
use crate::transforms::{transform_template, RigidTransform};

/// Anatomical side of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Right side.
    Right,
    /// Left side.
    Left,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Right => 1.0,
            Side::Left => -1.0,
        }
    }
}

/// Landmarks of the shank frame: medial malleolus, lateral malleolus, head of fibula,
/// tibial tuberosity.
pub const SHANK_LANDMARKS: [&str; 4] = ["MM", "LM", "HF", "TT"];

/// Landmarks of the foot frame: calcaneus, first, second and fifth metatarsal heads.
pub const FOOT_LANDMARKS: [&str; 4] = ["CA", "FM", "SM", "VM"];

/// Landmarks of the calcaneus frame: calcaneus, peroneal tubercle, sustentaculum tali.
pub const CALCANEUS_LANDMARKS: [&str; 3] = ["CA", "PT", "ST"];

/// Segment pose estimated through a technical marker cluster.
#[derive(Debug, Clone)]
pub struct ClusterPose {
    /// Segment to global transform, per frame.
    pub pose: Vec<RigidTransform>,
    /// Anatomical landmarks reconstructed in the global frame.
    pub landmarks: Markers,
}

fn segment_pose<const N: usize>(
    markers: &Markers,
    names: [&str; N],
    frame: impl Fn([DVec3; N]) -> RigidTransform,
) -> Result<Vec<RigidTransform>, KineError> {
    let slots = markers.slots(&names)?;
    Ok((0..markers.n_frames())
        .map(|k| frame(std::array::from_fn(|i| markers.point(slots[i], k))))
        .collect())
}

fn from_axes(x: DVec3, y: DVec3, z: DVec3, origin: DVec3) -> RigidTransform {
    RigidTransform::new(DMat3::from_cols(x, y, z), origin)
}

/// Shank frame (ISB): origin at the inter-malleolar point, Y towards the tibial
/// tuberosity, X normal to the malleoli and fibular head plane, Z lateral for the
/// right side.
pub fn shank_pose_isb(markers: &Markers, side: Side) -> Result<Vec<RigidTransform>, KineError> {
    segment_pose(markers, SHANK_LANDMARKS, |[mm, lm, hf, tt]| {
        let origin = 0.5 * (lm + mm);
        let x_temp = side.sign() * versor((origin - lm).cross(hf - lm));
        let to_tt = tt - origin;
        let y = versor(to_tt - x_temp * to_tt.dot(x_temp));
        let z = versor(x_temp.cross(y));
        let x = versor(y.cross(z));
        from_axes(x, y, z, origin)
    })
}

/// Foot frame (ISB): origin at the calcaneus, X towards the second metatarsal head,
/// Y normal to the calcaneus and metatarsal heads plane.
pub fn foot_pose_isb(markers: &Markers, side: Side) -> Result<Vec<RigidTransform>, KineError> {
    segment_pose(markers, FOOT_LANDMARKS, |[ca, fm, sm, vm]| {
        let y_temp = side.sign() * versor((vm - ca).cross(fm - ca));
        let to_sm = sm - ca;
        let x = versor(to_sm - y_temp * to_sm.dot(y_temp));
        let z = versor(x.cross(y_temp));
        let y = versor(z.cross(x));
        from_axes(x, y, z, ca)
    })
}

/// Calcaneus frame: origin at the calcaneus, X towards the midpoint of peroneal
/// tubercle and sustentaculum tali.
pub fn calcaneus_pose(markers: &Markers, side: Side) -> Result<Vec<RigidTransform>, KineError> {
    segment_pose(markers, CALCANEUS_LANDMARKS, |[ca, pt, st]| {
        let x = versor(0.5 * (st + pt) - ca);
        let y_temp = side.sign() * versor(x.cross(st - ca));
        let z = versor(x.cross(y_temp));
        let y = versor(z.cross(x));
        from_axes(x, y, z, ca)
    })
}

// Register the technical cluster, bring the landmarks from the template into the
// global frame and build the anatomical frame on them.
fn with_cluster<S, F>(
    markers: &Markers,
    cluster: &[S],
    template: &Template,
    landmarks: &[&str],
    params: &RegistrationParams,
    pose: F,
) -> Result<ClusterPose, KineError>
where
    S: AsRef<str>,
    F: Fn(&Markers) -> Result<Vec<RigidTransform>, KineError>,
{
    let registration = rigid_body_svd(markers, cluster, template, params)?;
    let landmarks = transform_template(&template.subset(landmarks)?, &registration.homogeneous());
    Ok(ClusterPose {
        pose: pose(&landmarks)?,
        landmarks,
    })
}

/// [`shank_pose_isb`] with landmarks tracked by a technical cluster.
///
/// `template` holds the local coordinates of both the cluster markers and the
/// landmarks.
pub fn shank_pose_isb_with_cluster<S: AsRef<str>>(
    markers: &Markers,
    cluster: &[S],
    template: &Template,
    side: Side,
    params: &RegistrationParams,
) -> Result<ClusterPose, KineError> {
    with_cluster(markers, cluster, template, &SHANK_LANDMARKS, params, |m| {
        shank_pose_isb(m, side)
    })
}

/// [`foot_pose_isb`] with landmarks tracked by a technical cluster.
pub fn foot_pose_isb_with_cluster<S: AsRef<str>>(
    markers: &Markers,
    cluster: &[S],
    template: &Template,
    side: Side,
    params: &RegistrationParams,
) -> Result<ClusterPose, KineError> {
    with_cluster(markers, cluster, template, &FOOT_LANDMARKS, params, |m| {
        foot_pose_isb(m, side)
    })
}

/// [`calcaneus_pose`] with landmarks tracked by a technical cluster.
pub fn calcaneus_pose_with_cluster<S: AsRef<str>>(
    markers: &Markers,
    cluster: &[S],
    template: &Template,
    side: Side,
    params: &RegistrationParams,
) -> Result<ClusterPose, KineError> {
    with_cluster(markers, cluster, template, &CALCANEUS_LANDMARKS, params, |m| {
        calcaneus_pose(m, side)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose() -> (DMat3, DVec3) {
        (
            DMat3::from_rotation_y(0.3) * DMat3::from_rotation_x(-0.2),
            DVec3::new(200.0, -100.0, 50.0),
        )
    }

    fn posed(points: &[(&str, DVec3)], n_frames: usize) -> Markers {
        let (r, t) = pose();
        let mut markers = Markers::new(n_frames);
        for (name, p) in points {
            markers.insert_static(*name, r * *p + t);
        }
        markers
    }

    fn assert_pose(frames: &[RigidTransform]) {
        let (r, t) = pose();
        for f in frames {
            assert!(f.rotation.abs_diff_eq(r, 1e-9));
            assert!(f.translation.abs_diff_eq(t, 1e-9));
        }
    }

    // landmarks laid out so that each anatomical frame matches the local frame
    fn shank(side: Side) -> Vec<(&'static str, DVec3)> {
        let s = side.sign();
        vec![
            ("MM", DVec3::new(0.0, 0.0, -30.0 * s)),
            ("LM", DVec3::new(0.0, 0.0, 30.0 * s)),
            ("HF", DVec3::new(0.0, 350.0, 25.0 * s)),
            ("TT", DVec3::new(30.0, 330.0, 0.0)),
        ]
    }

    fn foot() -> Vec<(&'static str, DVec3)> {
        vec![
            ("CA", DVec3::ZERO),
            ("FM", DVec3::new(190.0, 0.0, -30.0)),
            ("SM", DVec3::new(200.0, 0.0, 0.0)),
            ("VM", DVec3::new(180.0, 0.0, 40.0)),
        ]
    }

    fn calcaneus() -> Vec<(&'static str, DVec3)> {
        vec![
            ("CA", DVec3::ZERO),
            ("PT", DVec3::new(50.0, 0.0, 20.0)),
            ("ST", DVec3::new(50.0, 0.0, -20.0)),
        ]
    }

    #[test]
    fn test_shank_pose_both_sides() -> Result<(), KineError> {
        for side in [Side::Right, Side::Left] {
            assert_pose(&shank_pose_isb(&posed(&shank(side), 2), side)?);
        }
        Ok(())
    }

    #[test]
    fn test_foot_pose() -> Result<(), KineError> {
        assert_pose(&foot_pose_isb(&posed(&foot(), 2), Side::Right)?);

        let left = foot_pose_isb(&posed(&foot(), 1), Side::Left)?;
        let (r, _) = pose();
        assert!(left[0].rotation.y_axis.abs_diff_eq(-(r * DVec3::Y), 1e-9));
        Ok(())
    }

    #[test]
    fn test_calcaneus_pose() -> Result<(), KineError> {
        assert_pose(&calcaneus_pose(&posed(&calcaneus(), 2), Side::Right)?);
        Ok(())
    }

    #[test]
    fn test_missing_landmark() {
        let markers = posed(&calcaneus()[..2], 1);
        assert_eq!(
            calcaneus_pose(&markers, Side::Right).unwrap_err(),
            KineError::MissingPoint("ST".to_string())
        );
    }

    #[test]
    fn test_pose_with_cluster() -> Result<(), KineError> {
        let cluster = [
            ("T1", DVec3::new(10.0, 150.0, 40.0)),
            ("T2", DVec3::new(60.0, 170.0, 45.0)),
            ("T3", DVec3::new(30.0, 220.0, 60.0)),
            ("T4", DVec3::new(0.0, 200.0, 35.0)),
        ];
        let names = ["T1", "T2", "T3", "T4"];
        let markers = posed(&cluster, 3);
        let params = RegistrationParams::default();

        let shank_template: Template = cluster.iter().copied().chain(shank(Side::Right)).collect();
        let out =
            shank_pose_isb_with_cluster(&markers, &names, &shank_template, Side::Right, &params)?;
        assert_pose(&out.pose);
        assert_eq!(out.landmarks.len(), 4);
        assert_eq!(out.landmarks.n_frames(), 3);

        let foot_template: Template = cluster.iter().copied().chain(foot()).collect();
        let out = foot_pose_isb_with_cluster(&markers, &names, &foot_template, Side::Right, &params)?;
        assert_pose(&out.pose);

        let calc_template: Template = cluster.iter().copied().chain(calcaneus()).collect();
        let out =
            calcaneus_pose_with_cluster(&markers, &names, &calc_template, Side::Right, &params)?;
        assert_pose(&out.pose);

        assert!(
            shank_pose_isb_with_cluster(&markers, &names, &calc_template, Side::Right, &params)
                .is_err()
        );
        Ok(())
    }
}
