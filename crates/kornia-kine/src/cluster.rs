use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::KineError;
use crate::linalg::{cross_batch, inverse_batch, nan_mean, versor_batch};
use crate::markers::{Markers, Template};
use crate::registration::{rigid_body_svd, RegistrationParams};
use crate::stylus::Stylus;
use crate::transforms::{change_reference_frame, to_homogeneous_batch, RigidTransform};

/// Frames used to average marker positions when building a cluster template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemplateWindow {
    /// Every frame, ignoring missing samples.
    #[default]
    AllNoNan,
    /// Frames `start..end`, ignoring missing samples.
    Range(usize, usize),
    /// A single frame.
    Frame(usize),
}

/// Technical frame of a marker cluster built from its last three markers.
///
/// With `a, b, c` the last three names, the origin is `b`, X points from `b` to `c`,
/// Z is normal to the plane of the three markers and Y completes the right-handed frame.
///
/// # Errors
///
/// * [`KineError::InvalidMarkerCount`] if fewer than 3 names are given.
/// * [`KineError::MissingPoint`] if a name is not in `markers`.
pub fn cluster_frame<S: AsRef<str>>(
    markers: &Markers,
    names: &[S],
) -> Result<Vec<RigidTransform>, KineError> {
    if names.len() < 3 {
        return Err(KineError::InvalidMarkerCount {
            expected: 3,
            actual: names.len(),
        });
    }
    let slots = markers.slots(&names[names.len() - 3..])?;
    let (m2, m3, m4) = (
        markers.series(slots[0]),
        markers.series(slots[1]),
        markers.series(slots[2]),
    );

    let diff = |a: &[DVec3], b: &[DVec3]| -> Vec<DVec3> {
        a.iter().zip(b).map(|(a, b)| *a - *b).collect()
    };

    let x = versor_batch(&diff(m4, m3));
    let z = versor_batch(&cross_batch(&x, &diff(m2, m3)));
    let y = versor_batch(&cross_batch(&z, &x));

    Ok((0..markers.n_frames())
        .map(|k| RigidTransform::new(DMat3::from_cols(x[k], y[k], z[k]), m3[k]))
        .collect())
}

/// Build the local template of a marker cluster from recorded trajectories.
///
/// Markers are expressed in the technical frame of [`cluster_frame`] and their local
/// coordinates are averaged over `window`.
///
/// # Errors
///
/// * Errors of [`cluster_frame`].
/// * [`KineError::FrameOutOfRange`] if `window` exceeds the recording.
pub fn create_cluster_template<S: AsRef<str>>(
    markers: &Markers,
    names: &[S],
    window: TemplateWindow,
) -> Result<Template, KineError> {
    let n_frames = markers.n_frames();
    let frames = match window {
        TemplateWindow::AllNoNan => 0..n_frames,
        TemplateWindow::Range(start, end) => {
            if start >= end || end > n_frames {
                return Err(KineError::FrameOutOfRange {
                    frame: end.max(start),
                    n_frames,
                });
            }
            start..end
        }
        TemplateWindow::Frame(frame) => {
            if frame >= n_frames {
                return Err(KineError::FrameOutOfRange { frame, n_frames });
            }
            frame..frame + 1
        }
    };

    let global_to_local = inverse_batch(&to_homogeneous_batch(&cluster_frame(markers, names)?));
    let local = change_reference_frame(&markers.subset(names)?, &global_to_local)?;

    let mut template = Template::new();
    for (name, series) in local.iter() {
        template.insert(name, nan_mean(&series[frames.clone()]));
    }
    Ok(template)
}

/// Tip of a stylus expressed in the frame of a marker cluster.
///
/// The cluster is registered on `template`, the tip is reconstructed and averaged over
/// all frames in the global frame, then expressed in the cluster frame at every frame.
/// Frames where the cluster could not be registered give NaN.
///
/// # Errors
///
/// Errors of [`rigid_body_svd`] and of the stylus reconstruction.
pub fn stylus_tip_in_cluster<S: AsRef<str>>(
    stylus: &Stylus,
    markers: &Markers,
    names: &[S],
    template: &Template,
    params: &RegistrationParams,
) -> Result<Vec<DVec3>, KineError> {
    let registration = rigid_body_svd(markers, names, template, params)?;
    let global_to_local = inverse_batch(&registration.homogeneous());

    let tip = nan_mean(&stylus.reconstruct(markers)?);
    log::debug!("Average stylus tip in global frame: {tip}");

    let mut tip_markers = Markers::new(markers.n_frames());
    tip_markers.insert_static("Tip", tip);
    let local = change_reference_frame(&tip_markers, &global_to_local)?;
    Ok(local.series(0).to_vec())
}
