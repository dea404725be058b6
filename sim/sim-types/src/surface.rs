//! Closed triangulated particle surfaces.
//!
//! A [`SurfaceMesh`] stores points and triangular faces with
//! counter-clockwise winding seen from outside, so area vectors point
//! outward. Per-face geometry (centers, area vectors, unit normals) is
//! computed lazily and dropped whenever points or faces change.
//!
//! Volume and inertia integrals use the divergence theorem: every face
//! spans a signed tetrahedron with a reference point, and the tetrahedra
//! sum to the enclosed solid.

use std::sync::OnceLock;

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Cached per-face geometry.
#[derive(Debug, Clone)]
struct FaceGeometry {
    centers: Vec<Point3<f64>>,
    area_vectors: Vec<Vector3<f64>>,
    normals: Vec<Vector3<f64>>,
}

/// Closed triangle surface owned by exactly one particle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceMesh {
    points: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
    #[serde(skip)]
    geometry: OnceLock<FaceGeometry>,
}

impl SurfaceMesh {
    /// Create a surface from points and faces.
    #[must_use]
    pub fn new(points: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            points,
            faces,
            geometry: OnceLock::new(),
        }
    }

    /// Axis-aligned cube centered at the origin.
    #[must_use]
    pub fn cube(half_extent: f64) -> Self {
        let h = half_extent;
        let points = vec![
            Point3::new(-h, -h, -h),
            Point3::new(h, -h, -h),
            Point3::new(h, h, -h),
            Point3::new(-h, h, -h),
            Point3::new(-h, -h, h),
            Point3::new(h, -h, h),
            Point3::new(h, h, h),
            Point3::new(-h, h, h),
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        Self::new(points, faces)
    }

    /// Regular icosahedron with the given circumradius, centered at the origin.
    #[must_use]
    pub fn icosahedron(circumradius: f64) -> Self {
        let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let raw = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ];
        let scale = circumradius / (1.0 + t * t).sqrt();
        let points = raw
            .iter()
            .map(|&(x, y, z)| Point3::new(x * scale, y * scale, z * scale))
            .collect();
        let faces = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];
        let mut mesh = Self::new(points, faces);
        mesh.orient_outward();
        mesh
    }

    /// Surface points.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Triangle faces as point indices.
    #[must_use]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the surface has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Replace every point. The face list must stay valid for the new points.
    pub fn set_points(&mut self, points: Vec<Point3<f64>>) {
        self.points = points;
        self.invalidate();
    }

    /// Replace the topology.
    pub fn set_faces(&mut self, faces: Vec<[u32; 3]>) {
        self.faces = faces;
        self.invalidate();
    }

    /// Mutate points in place.
    pub fn map_points(&mut self, f: impl Fn(&Point3<f64>) -> Point3<f64>) {
        for p in &mut self.points {
            *p = f(p);
        }
        self.invalidate();
    }

    /// Rotate about `about`, then translate.
    pub fn transform(
        &mut self,
        rotation: &UnitQuaternion<f64>,
        about: &Point3<f64>,
        translation: &Vector3<f64>,
    ) {
        self.map_points(|p| about + rotation * (p - about) + translation);
    }

    /// Scale uniformly about `center`.
    pub fn scale_about(&mut self, factor: f64, center: &Point3<f64>) {
        self.map_points(|p| center + (p - center) * factor);
    }

    fn invalidate(&mut self) {
        self.geometry.take();
    }

    fn geometry(&self) -> &FaceGeometry {
        self.geometry.get_or_init(|| {
            let mut centers = Vec::with_capacity(self.faces.len());
            let mut area_vectors = Vec::with_capacity(self.faces.len());
            let mut normals = Vec::with_capacity(self.faces.len());
            for tri in &self.faces {
                let [a, b, c] = self.corners(tri);
                centers.push(Point3::from((a.coords + b.coords + c.coords) / 3.0));
                let sf = 0.5 * (b - a).cross(&(c - a));
                let mag = sf.norm();
                normals.push(if mag > 0.0 { sf / mag } else { Vector3::zeros() });
                area_vectors.push(sf);
            }
            FaceGeometry {
                centers,
                area_vectors,
                normals,
            }
        })
    }

    fn corners(&self, tri: &[u32; 3]) -> [Point3<f64>; 3] {
        [
            self.points[tri[0] as usize],
            self.points[tri[1] as usize],
            self.points[tri[2] as usize],
        ]
    }

    /// Face centers.
    #[must_use]
    pub fn face_centers(&self) -> &[Point3<f64>] {
        &self.geometry().centers
    }

    /// Outward face area vectors (magnitude = face area).
    #[must_use]
    pub fn area_vectors(&self) -> &[Vector3<f64>] {
        &self.geometry().area_vectors
    }

    /// Outward unit face normals (zero for degenerate faces).
    #[must_use]
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.geometry().normals
    }

    /// Total surface area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area_vectors().iter().map(Vector3::norm).sum()
    }

    /// Enclosed volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|tri| {
                let [a, b, c] = self.corners(tri);
                a.coords.cross(&b.coords).dot(&c.coords) / 6.0
            })
            .sum()
    }

    /// Centroid of the enclosed solid (uniform density).
    ///
    /// Falls back to the mean point for surfaces with no enclosed volume.
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        let mut volume = 0.0;
        let mut accum = Vector3::zeros();
        for tri in &self.faces {
            let [a, b, c] = self.corners(tri);
            let vol = a.coords.cross(&b.coords).dot(&c.coords) / 6.0;
            volume += vol;
            accum += vol * (a.coords + b.coords + c.coords) / 4.0;
        }
        if volume.abs() < 1e-300 {
            let n = self.points.len().max(1) as f64;
            let sum: Vector3<f64> = self.points.iter().map(|p| p.coords).sum();
            return Point3::from(sum / n);
        }
        Point3::from(accum / volume)
    }

    /// Radius of the sphere with the same volume.
    #[must_use]
    pub fn equivalent_radius(&self) -> f64 {
        (3.0 * self.volume().abs() / (4.0 * std::f64::consts::PI)).cbrt()
    }

    /// Largest distance from `center` to a surface point.
    #[must_use]
    pub fn bounding_radius(&self, center: &Point3<f64>) -> f64 {
        self.points
            .iter()
            .map(|p| (p - center).norm())
            .fold(0.0, f64::max)
    }

    /// Inertia tensor of the enclosed solid about `reference`.
    ///
    /// No parallel-axis shift is applied: the moments are integrated about
    /// `reference` directly, so passing a cluster's common center of mass
    /// gives this member's contribution to the cluster tensor.
    #[must_use]
    #[allow(clippy::suspicious_operation_groupings)] // a²+b²+c²+ab+ac+bc
    pub fn inertia_about(&self, reference: &Point3<f64>, density: f64) -> Matrix3<f64> {
        let mut xx = 0.0;
        let mut yy = 0.0;
        let mut zz = 0.0;
        let mut xy = 0.0;
        let mut xz = 0.0;
        let mut yz = 0.0;

        for tri in &self.faces {
            let [pa, pb, pc] = self.corners(tri);
            let a = pa - reference;
            let b = pb - reference;
            let c = pc - reference;

            let det = a.cross(&b).dot(&c);
            let f60 = det / 60.0;
            let f120 = det / 120.0;

            xx += f60 * (a.x * a.x + b.x * b.x + c.x * c.x + a.x * b.x + a.x * c.x + b.x * c.x);
            yy += f60 * (a.y * a.y + b.y * b.y + c.y * c.y + a.y * b.y + a.y * c.y + b.y * c.y);
            zz += f60 * (a.z * a.z + b.z * b.z + c.z * c.z + a.z * b.z + a.z * c.z + b.z * c.z);

            xy += f120
                * (2.0 * (a.x * a.y + b.x * b.y + c.x * c.y)
                    + a.x * b.y
                    + a.y * b.x
                    + a.x * c.y
                    + a.y * c.x
                    + b.x * c.y
                    + b.y * c.x);
            xz += f120
                * (2.0 * (a.x * a.z + b.x * b.z + c.x * c.z)
                    + a.x * b.z
                    + a.z * b.x
                    + a.x * c.z
                    + a.z * c.x
                    + b.x * c.z
                    + b.z * c.x);
            yz += f120
                * (2.0 * (a.y * a.z + b.y * b.z + c.y * c.z)
                    + a.y * b.z
                    + a.z * b.y
                    + a.y * c.z
                    + a.z * c.y
                    + b.y * c.z
                    + b.z * c.y);
        }

        density * Matrix3::new(yy + zz, -xy, -xz, -xy, xx + zz, -yz, -xz, -yz, xx + yy)
    }

    /// Flip the winding if the surface encloses a negative volume.
    pub fn orient_outward(&mut self) {
        if self.volume() < 0.0 {
            for tri in &mut self.faces {
                tri.swap(1, 2);
            }
            self.invalidate();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_volume_and_centroid() {
        let cube = SurfaceMesh::cube(0.5);
        assert_relative_eq!(cube.volume(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cube.area(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(cube.centroid().coords, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = SurfaceMesh::cube(1.0);
        for (center, normal) in cube.face_centers().iter().zip(cube.normals()) {
            assert!(center.coords.dot(normal) > 0.0);
            assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cube_inertia() {
        // Solid cube, side 2, density 3: m = 24, I = m s² / 6 = 16
        let cube = SurfaceMesh::cube(1.0);
        let inertia = cube.inertia_about(&Point3::origin(), 3.0);
        assert_relative_eq!(inertia[(0, 0)], 16.0, epsilon = 1e-10);
        assert_relative_eq!(inertia[(1, 1)], 16.0, epsilon = 1e-10);
        assert_relative_eq!(inertia[(2, 2)], 16.0, epsilon = 1e-10);
        assert_relative_eq!(inertia[(0, 1)], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_inertia_about_offset_point_matches_parallel_axis() {
        let cube = SurfaceMesh::cube(0.5);
        let reference = Point3::new(2.0, 0.0, 0.0);
        let inertia = cube.inertia_about(&reference, 1.0);
        // I_yy about reference = 1/6 + m d² with m = 1, d = 2
        assert_relative_eq!(inertia[(1, 1)], 1.0 / 6.0 + 4.0, epsilon = 1e-10);
        assert_relative_eq!(inertia[(0, 0)], 1.0 / 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_icosahedron_is_outward() {
        let ico = SurfaceMesh::icosahedron(1.0);
        assert!(ico.volume() > 0.0);
        assert_relative_eq!(ico.bounding_radius(&Point3::origin()), 1.0, epsilon = 1e-12);
        assert!(ico.equivalent_radius() < 1.0);
    }

    #[test]
    fn test_cache_invalidated_on_motion() {
        let mut cube = SurfaceMesh::cube(0.5);
        let before = cube.face_centers()[0];
        cube.transform(
            &UnitQuaternion::identity(),
            &Point3::origin(),
            &Vector3::new(1.0, 0.0, 0.0),
        );
        let after = cube.face_centers()[0];
        assert_relative_eq!(after.x - before.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_about() {
        let mut cube = SurfaceMesh::cube(0.5);
        cube.scale_about(2.0, &Point3::origin());
        assert_relative_eq!(cube.volume(), 8.0, epsilon = 1e-12);
    }
}
