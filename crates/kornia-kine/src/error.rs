use thiserror::Error;

/// Error types for the kinematics pipeline.
///
/// Per-frame degeneracy (occluded markers, spheres that do not intersect) is not an
/// error: it is reported in the output as NaN values or a [`crate::registration::FrameStatus`].
#[derive(Debug, Error, PartialEq)]
pub enum KineError {
    /// The points used for a rigid fit are collinear and the rotation is undetermined.
    #[error("markers are probably collinear: cross-covariance rank is {rank}, at least 2 required")]
    CollinearPoints {
        /// Number of singular values above tolerance.
        rank: usize,
    },

    /// The local template itself is degenerate, whatever markers are visible.
    #[error("template points are collinear: rank is {rank}, at least 2 required")]
    CollinearTemplate {
        /// Number of singular values above tolerance.
        rank: usize,
    },

    /// Collinear stylus reconstruction needs two markers to define a direction.
    #[error("at least 2 collinear stylus markers must be visible, got {visible} at frame {frame}")]
    InsufficientCollinearMarkers {
        /// Frame index where the check failed.
        frame: usize,
        /// Number of visible markers in that frame.
        visible: usize,
    },

    /// A rigid fit received a NaN or infinite coordinate.
    #[error("point {index} has non-finite coordinates")]
    NonFinitePoint {
        /// Index of the offending point pair.
        index: usize,
    },

    /// A point name was requested but is not present.
    #[error("point `{0}` not found")]
    MissingPoint(String),

    /// A trajectory does not have the expected number of frames.
    #[error("point `{name}` has {actual} frames, expected {expected}")]
    FrameCountMismatch {
        /// Name of the offending point.
        name: String,
        /// Expected number of frames.
        expected: usize,
        /// Actual number of frames.
        actual: usize,
    },

    /// Two batched inputs have different lengths.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedLengths {
        /// Label for the left-hand slice.
        left_name: &'static str,
        /// Length of the left-hand slice.
        left_len: usize,
        /// Label for the right-hand slice.
        right_name: &'static str,
        /// Length of the right-hand slice.
        right_len: usize,
    },

    /// A strategy received the wrong number of markers or distances.
    #[error("expected {expected} markers, got {actual}")]
    InvalidMarkerCount {
        /// Number of markers required.
        expected: usize,
        /// Number of markers provided.
        actual: usize,
    },

    /// A frame index is outside the recording.
    #[error("frame {frame} is out of range for {n_frames} frames")]
    FrameOutOfRange {
        /// Requested frame.
        frame: usize,
        /// Number of frames available.
        n_frames: usize,
    },
}
