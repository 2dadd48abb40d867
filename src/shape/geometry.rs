/// A location in 3-space, single precision like the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3D {
	pub x: f32,
	pub y: f32,
	pub z: f32,
}

impl Point3D {
	pub fn new(x: f32, y: f32, z: f32) -> Self {
		Self { x, y, z }
	}

	/// Squared Euclidean distance to another point.
	#[inline]
	pub fn dist_sq(&self, other: &Point3D) -> f32 {
		let dx = self.x - other.x;
		let dy = self.y - other.y;
		let dz = self.z - other.z;
		dx * dx + dy * dy + dz * dz
	}
}

/// A sphere: center plus radius. The radius is stored unscaled; VolBox
/// applies its `sphere_scale` at query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
	pub center: Point3D,
	pub radius: f32,
}

impl Sphere {
	pub fn new(x: f32, y: f32, z: f32, radius: f32) -> Self {
		Self {
			center: Point3D::new(x, y, z),
			radius,
		}
	}

	/// Mirror the center through the axis planes selected by `signs`.
	#[inline]
	pub fn flipped(&self, signs: [f32; 3]) -> Self {
		Self {
			center: Point3D::new(
				self.center.x * signs[0],
				self.center.y * signs[1],
				self.center.z * signs[2],
			),
			radius: self.radius,
		}
	}
}

/// An ordered reference point set. A point's position in this order is its
/// permanent identity for the lifetime of any VolBox built over it.
pub type PointCloud = Vec<Point3D>;

/// An ordered list of query spheres (e.g. one per atom).
pub type SphereList = Vec<Sphere>;

/// Subtract the centroid from every point, returning the centroid.
pub fn mean_center(points: &mut [Point3D]) -> Point3D {
	let mean = centroid(points);
	for p in points.iter_mut() {
		p.x -= mean.x;
		p.y -= mean.y;
		p.z -= mean.z;
	}
	mean
}

/// Centroid of a point set; the origin for an empty set.
pub fn centroid(points: &[Point3D]) -> Point3D {
	if points.is_empty() {
		return Point3D::default();
	}
	let mut xsum = 0.0f32;
	let mut ysum = 0.0f32;
	let mut zsum = 0.0f32;
	for p in points {
		xsum += p.x;
		ysum += p.y;
		zsum += p.z;
	}
	let n = points.len() as f32;
	Point3D::new(xsum / n, ysum / n, zsum / n)
}

/// Centroid of sphere centers; the origin for an empty list.
pub fn sphere_centroid(spheres: &[Sphere]) -> Point3D {
	if spheres.is_empty() {
		return Point3D::default();
	}
	let mut xsum = 0.0f32;
	let mut ysum = 0.0f32;
	let mut zsum = 0.0f32;
	for s in spheres {
		xsum += s.center.x;
		ysum += s.center.y;
		zsum += s.center.z;
	}
	let n = spheres.len() as f32;
	Point3D::new(xsum / n, ysum / n, zsum / n)
}

/// Shift every sphere center by `-offset`.
pub fn untranslate_spheres(spheres: &mut [Sphere], offset: Point3D) {
	for s in spheres.iter_mut() {
		s.center.x -= offset.x;
		s.center.y -= offset.y;
		s.center.z -= offset.z;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mean_center_moves_centroid_to_origin() {
		let mut points = vec![
			Point3D::new(1.0, 2.0, 3.0),
			Point3D::new(3.0, 2.0, 1.0),
			Point3D::new(2.0, 2.0, 2.0),
		];
		let mean = mean_center(&mut points);
		assert_eq!(mean, Point3D::new(2.0, 2.0, 2.0));
		let after = centroid(&points);
		assert!(after.x.abs() < 1e-6);
		assert!(after.y.abs() < 1e-6);
		assert!(after.z.abs() < 1e-6);
	}

	#[test]
	fn flip_changes_selected_signs_only() {
		let s = Sphere::new(1.0, -2.0, 3.0, 1.5);
		let f = s.flipped([1.0, -1.0, -1.0]);
		assert_eq!(f.center, Point3D::new(1.0, 2.0, -3.0));
		assert_eq!(f.radius, 1.5);
	}

	#[test]
	fn centroid_of_empty_set_is_origin() {
		assert_eq!(centroid(&[]), Point3D::default());
		assert_eq!(sphere_centroid(&[]), Point3D::default());
	}
}
