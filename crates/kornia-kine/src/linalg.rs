use glam::{DMat3, DMat4, DVec3, DVec4};

/// Square matrix types that can be processed along a batch (time) axis.
pub trait BatchMatrix: Copy + Send + Sync {
    /// Column vector type the matrix acts on.
    type Vector: Copy + Send + Sync;

    /// Matrix filled with NaN, used for frames that cannot be computed.
    const NAN: Self;

    /// Whether any entry is NaN.
    fn has_nan(&self) -> bool;

    /// Matrix-vector product.
    fn vec_mul(&self, rhs: Self::Vector) -> Self::Vector;

    /// Matrix-matrix product.
    fn mat_mul(&self, rhs: &Self) -> Self;

    /// Matrix inverse. Singular matrices produce non-finite entries.
    fn inv(&self) -> Self;
}

impl BatchMatrix for DMat3 {
    type Vector = DVec3;
    const NAN: Self = DMat3::NAN;

    fn has_nan(&self) -> bool {
        self.is_nan()
    }

    fn vec_mul(&self, rhs: DVec3) -> DVec3 {
        self.mul_vec3(rhs)
    }

    fn mat_mul(&self, rhs: &Self) -> Self {
        self.mul_mat3(rhs)
    }

    fn inv(&self) -> Self {
        self.inverse()
    }
}

impl BatchMatrix for DMat4 {
    type Vector = DVec4;
    const NAN: Self = DMat4::NAN;

    fn has_nan(&self) -> bool {
        self.is_nan()
    }

    fn vec_mul(&self, rhs: DVec4) -> DVec4 {
        self.mul_vec4(rhs)
    }

    fn mat_mul(&self, rhs: &Self) -> Self {
        self.mul_mat4(rhs)
    }

    fn inv(&self) -> Self {
        self.inverse()
    }
}

/// Multiply each matrix of a batch by the vector of the same frame.
///
/// PRECONDITION: `mats` and `vecs` have the same length.
///
/// Example:
///
/// ```
/// use glam::{DMat3, DVec3};
/// use kornia_kine::linalg::matvec_batch;
///
/// let mats = vec![DMat3::IDENTITY, DMat3::from_diagonal(DVec3::splat(2.0))];
/// let vecs = vec![DVec3::X, DVec3::Y];
/// let out = matvec_batch(&mats, &vecs);
/// assert_eq!(out, vec![DVec3::X, DVec3::new(0.0, 2.0, 0.0)]);
/// ```
pub fn matvec_batch<M: BatchMatrix>(mats: &[M], vecs: &[M::Vector]) -> Vec<M::Vector> {
    assert_eq!(mats.len(), vecs.len());
    mats.iter().zip(vecs).map(|(m, v)| m.vec_mul(*v)).collect()
}

/// Multiply the matrices of two batches frame by frame (`a[k] * b[k]`).
///
/// PRECONDITION: `a` and `b` have the same length.
pub fn matmul_batch<M: BatchMatrix>(a: &[M], b: &[M]) -> Vec<M> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(a, b)| a.mat_mul(b)).collect()
}

/// Left-multiply every matrix of a batch by the same matrix (`a * b[k]`).
pub fn matmul_fixed<M: BatchMatrix>(a: &M, b: &[M]) -> Vec<M> {
    b.iter().map(|b| a.mat_mul(b)).collect()
}

/// Row-wise dot product of two batches of vectors.
///
/// PRECONDITION: `a` and `b` have the same length.
pub fn dot_batch(a: &[DVec3], b: &[DVec3]) -> Vec<f64> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(a, b)| a.dot(*b)).collect()
}

/// Row-wise cross product of two batches of vectors.
///
/// PRECONDITION: `a` and `b` have the same length.
pub fn cross_batch(a: &[DVec3], b: &[DVec3]) -> Vec<DVec3> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(a, b)| a.cross(*b)).collect()
}

/// Divide a vector by its Euclidean norm. A zero vector gives NaN.
#[inline]
pub fn versor(v: DVec3) -> DVec3 {
    v.normalize_or(DVec3::NAN)
}

/// Divide each vector by its Euclidean norm.
///
/// Zero-length or missing vectors give NaN rather than an error.
pub fn versor_batch(v: &[DVec3]) -> Vec<DVec3> {
    v.iter().map(|v| versor(*v)).collect()
}

/// Invert a batch of matrices, skipping frames that contain NaN.
///
/// Frames with at least one NaN entry are returned as [`BatchMatrix::NAN`] instead of
/// failing, so that frame-wise pipelines do not need to branch on missing data.
///
/// Example:
///
/// ```
/// use glam::DMat3;
/// use kornia_kine::linalg::inverse_batch;
///
/// let inv = inverse_batch(&[DMat3::IDENTITY, DMat3::NAN]);
/// assert_eq!(inv[0], DMat3::IDENTITY);
/// assert!(inv[1].is_nan());
/// ```
pub fn inverse_batch<M: BatchMatrix>(mats: &[M]) -> Vec<M> {
    mats.iter()
        .map(|m| if m.has_nan() { M::NAN } else { m.inv() })
        .collect()
}

/// Component-wise mean that ignores NaN samples.
///
/// A component with no finite sample is NaN.
pub fn nan_mean(points: &[DVec3]) -> DVec3 {
    let mut sum = [0.0f64; 3];
    let mut count = [0usize; 3];
    for p in points {
        for (i, v) in p.to_array().into_iter().enumerate() {
            if !v.is_nan() {
                sum[i] += v;
                count[i] += 1;
            }
        }
    }
    DVec3::from_array(std::array::from_fn(|i| match count[i] {
        0 => f64::NAN,
        c => sum[i] / c as f64,
    }))
}
