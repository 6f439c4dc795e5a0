use glam::{DMat3, DVec3};

/// Solution of a 3-sphere intersection.
///
/// The intersection points are `origin + offset ± axis`. `axis` is `None` when the
/// spheres do not intersect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trilateration {
    /// Center of the first sphere.
    pub origin: DVec3,
    /// Vector from `origin` to the foot of the intersection axis on the centers plane.
    pub offset: DVec3,
    /// Half-chord vector along the normal of the centers plane.
    pub axis: Option<DVec3>,
}

impl Trilateration {
    /// Foot of the intersection axis on the plane through the three centers.
    pub fn base(&self) -> DVec3 {
        self.origin + self.offset
    }

    /// The two intersection points, `base + axis` first.
    pub fn candidates(&self) -> Option<[DVec3; 2]> {
        self.axis
            .map(|axis| [self.base() + axis, self.base() - axis])
    }
}

/// Intersect three spheres.
///
/// # Arguments
///
/// * `centers` - Sphere centers `p1, p2, p3`.
/// * `radii` - Sphere radii `r1, r2, r3`.
///
/// The axis direction is the normal `(p2 - p1) x (p3 - p1)`, so the `+` candidate
/// lies on the side the normal points to. Collinear centers give non-finite values.
///
/// Example:
///
/// ```
/// use glam::DVec3;
/// use kornia_kine::trilateration::trilateration;
///
/// let centers = [DVec3::ZERO, DVec3::X * 2.0, DVec3::Y * 2.0];
/// let tip = DVec3::new(1.0, 1.0, 1.0);
/// let radii = centers.map(|c| c.distance(tip));
/// let sol = trilateration(&centers, &radii);
/// assert!(sol.candidates().unwrap()[0].abs_diff_eq(tip, 1e-12));
/// ```
pub fn trilateration(centers: &[DVec3; 3], radii: &[f64; 3]) -> Trilateration {
    let [p1, p2, p3] = *centers;
    let [r1, r2, r3] = *radii;

    let p21 = p2 - p1;
    let p31 = p3 - p1;
    let n = p21.cross(p31);
    let n2 = n.length_squared();

    let a = (p21.length_squared() + r1 * r1 - r2 * r2) * p31;
    let b = (p31.length_squared() + r1 * r1 - r3 * r3) * p21;
    let offset = ((a - b) * 0.5).cross(n) / n2;

    let h2 = r1 * r1 - offset.length_squared();
    let axis = (h2 >= 0.0).then(|| h2.sqrt() * n / n2.sqrt());

    Trilateration {
        origin: p1,
        offset,
        axis,
    }
}

/// Unit normal of the least-squares plane `n . p = 1` through a set of points.
///
/// Solves `(P^T P) n = P^T 1` and normalizes. The fitted plane must not contain the
/// origin of the coordinate system, otherwise the result is non-finite.
pub fn normal_to_ls_plane(points: &[DVec3]) -> DVec3 {
    let mut ata = DMat3::ZERO;
    let mut atb = DVec3::ZERO;
    for p in points {
        ata += DMat3::from_cols(*p * p.x, *p * p.y, *p * p.z);
        atb += *p;
    }
    (ata.inverse() * atb).normalize_or(DVec3::NAN)
}
