use glam::{Vec2, Vec3};

/// Tolerance for degenerate geometry (parallel lines, zero-length directions).
pub const EPSILON: f32 = 1e-6;

/// A ray in 3D space with origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Intersect ray with an infinite plane defined by a point and normal.
    /// Returns distance along ray if hit, None if parallel.
    pub fn intersect_plane(&self, plane_point: Vec3, plane_normal: Vec3) -> Option<f32> {
        let denom = plane_normal.dot(self.direction);
        if denom.abs() < EPSILON {
            return None;
        }
        let t = (plane_point - self.origin).dot(plane_normal) / denom;
        if t > 0.0 { Some(t) } else { None }
    }

    /// Intersect ray with a sphere. Returns the near hit distance.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let t = -b - disc.sqrt();
        if t > EPSILON { Some(t) } else { None }
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A convex quad on the ground plane, wound counter-clockwise seen from above.
/// Used for marquee containment tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub d: Vec3,
}

impl Quad {
    pub fn new(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> Self {
        Self { a, b, c, d }
    }

    /// True if `p` lies inside the quad, ignoring height.
    pub fn contains_xz(&self, p: Vec3) -> bool {
        is_left(self.a, self.b, p)
            && is_left(self.b, self.c, p)
            && is_left(self.c, self.d, p)
            && is_left(self.d, self.a, p)
    }
}

fn is_left(p0: Vec3, p1: Vec3, p2: Vec3) -> bool {
    (p1.x - p0.x) * (p2.z - p0.z) - (p2.x - p0.x) * (p1.z - p0.z) > 0.0
}

/// Drop the height component.
pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Squared distance between two points in the ground plane.
pub fn dist_sq_xz(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Rotate `point` about the vertical axis through `pivot`. Positive angles
/// turn clockwise seen from above (the rotation the right-drag gesture
/// produces). Height is untouched.
pub fn rotate_xz(point: Vec3, pivot: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - pivot.x;
    let dz = point.z - pivot.z;
    Vec3::new(
        pivot.x + cos * dx + sin * dz,
        point.y,
        pivot.z - sin * dx + cos * dz,
    )
}

/// Rotate a direction vector the same way `rotate_xz` rotates points.
pub fn rotate_dir_xz(dir: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(cos * dir.x + sin * dir.z, dir.y, -sin * dir.x + cos * dir.z)
}

/// Closest point to `p` on the infinite line through `origin` along `dir`,
/// measured in the ground plane. `dir` is expected to be normalized in XZ.
pub fn project_onto_line_xz(origin: Vec3, dir: Vec3, p: Vec3) -> Vec3 {
    let t = (p.x - origin.x) * dir.x + (p.z - origin.z) * dir.z;
    origin + dir * t
}

/// Closest point to `p` on the line segment a..b, measured in the ground
/// plane but returned in 3D.
pub fn closest_on_segment_xz(a: Vec3, b: Vec3, p: Vec3) -> Vec3 {
    let v = xz(b) - xz(a);
    let w = xz(p) - xz(a);
    let c2 = v.dot(v);
    if c2 < EPSILON {
        return a;
    }
    let t = (w.dot(v) / c2).clamp(0.0, 1.0);
    a + (b - a) * t
}

/// Intersection of two infinite lines in the ground plane, as the parameter
/// along the first line. None if the lines are parallel.
pub fn line_intersect_xz(p1: Vec3, d1: Vec3, p2: Vec3, d2: Vec3) -> Option<(f32, f32)> {
    let cross = d1.x * d2.z - d1.z * d2.x;
    if cross.abs() < EPSILON {
        return None;
    }
    let dx = p2.x - p1.x;
    let dz = p2.z - p1.z;
    let u = (dx * d2.z - dz * d2.x) / cross;
    let v = (dx * d1.z - dz * d1.x) / cross;
    Some((u, v))
}

/// True when a segment from `start_pos` leaving along `start_dir` and
/// arriving at `end_pos` along `end_dir` is effectively a straight line.
pub fn is_straight(start_pos: Vec3, start_dir: Vec3, end_pos: Vec3, end_dir: Vec3) -> bool {
    let line = (xz(end_pos) - xz(start_pos)).normalize_or_zero();
    if line == Vec2::ZERO {
        return true;
    }
    let sd = xz(start_dir).normalize_or_zero();
    let ed = xz(end_dir).normalize_or_zero();
    sd.dot(line) > 0.999 && ed.dot(-line) > 0.999
}

/// Cubic bezier through four control points.
#[derive(Debug, Clone, Copy)]
pub struct Bezier {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub d: Vec3,
}

impl Bezier {
    /// Build the curve between two endpoints with outgoing/incoming tangent
    /// directions. The control offset is a third of the endpoint distance,
    /// halved at an end that meets other geometry at a sharp corner
    /// (`smooth_* == false`).
    pub fn from_directions(
        start_pos: Vec3,
        start_dir: Vec3,
        end_pos: Vec3,
        end_dir: Vec3,
        smooth_start: bool,
        smooth_end: bool,
    ) -> Self {
        let dist = (xz(end_pos) - xz(start_pos)).length();
        let scale_start = if smooth_start { dist / 3.0 } else { dist / 6.0 };
        let scale_end = if smooth_end { dist / 3.0 } else { dist / 6.0 };
        Self {
            a: start_pos,
            b: start_pos + start_dir * scale_start,
            c: end_pos + end_dir * scale_end,
            d: end_pos,
        }
    }

    pub fn position(&self, t: f32) -> Vec3 {
        let u = 1.0 - t;
        self.a * (u * u * u)
            + self.b * (3.0 * u * u * t)
            + self.c * (3.0 * u * t * t)
            + self.d * (t * t * t)
    }

    pub fn tangent(&self, t: f32) -> Vec3 {
        let u = 1.0 - t;
        ((self.b - self.a) * (3.0 * u * u)
            + (self.c - self.b) * (6.0 * u * t)
            + (self.d - self.c) * (3.0 * t * t))
            .normalize_or_zero()
    }

    /// Closest point on the curve to `p` in the ground plane, by sampling.
    /// Returns (position, tangent direction).
    pub fn closest_xz(&self, p: Vec3) -> (Vec3, Vec3) {
        const STEPS: usize = 32;
        let mut best_t = 0.0;
        let mut best_sq = f32::MAX;
        for i in 0..=STEPS {
            let t = i as f32 / STEPS as f32;
            let sq = dist_sq_xz(self.position(t), p);
            if sq < best_sq {
                best_sq = sq;
                best_t = t;
            }
        }
        // One refinement pass around the best coarse sample.
        let step = 1.0 / STEPS as f32;
        let lo = (best_t - step).max(0.0);
        let hi = (best_t + step).min(1.0);
        for i in 0..=STEPS {
            let t = lo + (hi - lo) * i as f32 / STEPS as f32;
            let sq = dist_sq_xz(self.position(t), p);
            if sq < best_sq {
                best_sq = sq;
                best_t = t;
            }
        }
        (self.position(best_t), self.tangent(best_t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_contains_xz() {
        let quad = Quad::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        );
        assert!(quad.contains_xz(Vec3::new(5.0, 3.0, 5.0)));
        assert!(!quad.contains_xz(Vec3::new(-1.0, 0.0, 5.0)));
        assert!(!quad.contains_xz(Vec3::new(5.0, 0.0, 11.0)));
    }

    #[test]
    fn rotate_xz_quarter_turn() {
        let p = rotate_xz(
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_2,
        );
        assert!((p.x - 0.0).abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-5);
        assert!((p.z - -1.0).abs() < 1e-5);
    }

    #[test]
    fn project_onto_line() {
        let p = project_onto_line_xz(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 4.0),
        );
        assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn closest_on_segment_clamps() {
        let a = Vec3::ZERO;
        let b = Vec3::new(10.0, 0.0, 0.0);
        let mid = closest_on_segment_xz(a, b, Vec3::new(5.0, 0.0, 5.0));
        assert!((mid - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
        let clamped = closest_on_segment_xz(a, b, Vec3::new(-5.0, 0.0, 0.0));
        assert!((clamped - a).length() < 1e-5);
    }

    #[test]
    fn line_intersection() {
        let (u, _v) = line_intersect_xz(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        assert!((u - 5.0).abs() < 1e-5);

        assert!(
            line_intersect_xz(
                Vec3::ZERO,
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 3.0),
                Vec3::new(1.0, 0.0, 0.0),
            )
            .is_none()
        );
    }

    #[test]
    fn straightness() {
        let dir = Vec3::new(1.0, 0.0, 0.0);
        assert!(is_straight(
            Vec3::ZERO,
            dir,
            Vec3::new(20.0, 0.0, 0.0),
            -dir
        ));
        assert!(!is_straight(
            Vec3::ZERO,
            dir,
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0)
        ));
    }

    #[test]
    fn bezier_endpoints_and_midpoint() {
        let b = Bezier::from_directions(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, -1.0),
            true,
            true,
        );
        assert!((b.position(0.0) - Vec3::ZERO).length() < 1e-5);
        assert!((b.position(1.0) - Vec3::new(10.0, 0.0, 10.0)).length() < 1e-5);
        // The curve bulges toward the tangent corner.
        let mid = b.position(0.5);
        assert!(mid.x > 0.0 && mid.x < 10.0);
        assert!(mid.z > 0.0 && mid.z < 10.0);
    }
}
