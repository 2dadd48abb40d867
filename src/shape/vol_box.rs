use bitvec::vec::BitVec;

use crate::shape::error::ShapeError;
use crate::shape::geometry::{Point3D, PointCloud, Sphere};

/// Number of grid cells per side of the bounding box.
const UNITS_PER_SIDE: f32 = 8.0;

/// Uniform-grid spatial index over a fixed reference point cloud.
///
/// Built once, read-only afterwards, so it can be shared freely across
/// threads fingerprinting different molecules. Each reference point keeps
/// its index in the input cloud as its permanent identity; fingerprint bit
/// `i` means "reference point `i` is covered by at least one query sphere".
pub struct VolBox {
	sphere_scale: f32,
	xmin: f32,
	ymin: f32,
	zmin: f32,
	dx: f32,
	dy: f32,
	dz: f32,
	ixmax: usize,
	iymax: usize,
	izmax: usize,
	// Flat ix-major bucket array; each bucket lists reference point indices.
	buckets: Vec<Vec<u32>>,
	bucket_points: PointCloud,
}

impl VolBox {
	/// Build the grid in one pass over `points`.
	///
	/// Cell size is `extent / 8` per axis; a zero-extent axis collapses to
	/// a single cell instead of dividing by zero. `sphere_scale` multiplies
	/// every query sphere's radius (the ε of the fingerprint configuration).
	pub fn new(points: &[Point3D], sphere_scale: f32) -> Self {
		let mut xmin = 0.0f32;
		let mut xmax = 0.0f32;
		let mut ymin = 0.0f32;
		let mut ymax = 0.0f32;
		let mut zmin = 0.0f32;
		let mut zmax = 0.0f32;
		let mut first = true;
		for p in points {
			if first {
				xmin = p.x;
				xmax = p.x;
				ymin = p.y;
				ymax = p.y;
				zmin = p.z;
				zmax = p.z;
				first = false;
			} else {
				xmin = xmin.min(p.x);
				xmax = xmax.max(p.x);
				ymin = ymin.min(p.y);
				ymax = ymax.max(p.y);
				zmin = zmin.min(p.z);
				zmax = zmax.max(p.z);
			}
		}

		let dx = (xmax - xmin) / UNITS_PER_SIDE;
		let dy = (ymax - ymin) / UNITS_PER_SIDE;
		let dz = (zmax - zmin) / UNITS_PER_SIDE;

		let ixmax = if dx == 0.0 { 0 } else { UNITS_PER_SIDE as usize - 1 };
		let iymax = if dy == 0.0 { 0 } else { UNITS_PER_SIDE as usize - 1 };
		let izmax = if dz == 0.0 { 0 } else { UNITS_PER_SIDE as usize - 1 };

		let mut vb = Self {
			sphere_scale,
			xmin,
			ymin,
			zmin,
			dx,
			dy,
			dz,
			ixmax,
			iymax,
			izmax,
			buckets: vec![Vec::new(); (ixmax + 1) * (iymax + 1) * (izmax + 1)],
			bucket_points: PointCloud::new(),
		};
		vb.add_points(points);
		vb
	}

	fn add_points(&mut self, points: &[Point3D]) {
		self.bucket_points.reserve(points.len());
		for p in points {
			let ix = self.cell_coord(p.x, self.xmin, self.dx, self.ixmax);
			let iy = self.cell_coord(p.y, self.ymin, self.dy, self.iymax);
			let iz = self.cell_coord(p.z, self.zmin, self.dz, self.izmax);
			let cell = self.cell_index(ix, iy, iz);
			self.buckets[cell].push(self.bucket_points.len() as u32);
			self.bucket_points.push(*p);
		}
	}

	#[inline]
	fn cell_coord(&self, v: f32, min: f32, d: f32, max_index: usize) -> usize {
		if d == 0.0 {
			return 0;
		}
		let i = ((v - min) / d) as i64;
		i.clamp(0, max_index as i64) as usize
	}

	#[inline]
	fn cell_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
		(ix * (self.iymax + 1) + iy) * (self.izmax + 1) + iz
	}

	/// Number of reference points indexed by this VolBox.
	pub fn len(&self) -> usize {
		self.bucket_points.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bucket_points.is_empty()
	}

	/// OR in the coverage bits for every sphere, shifted by `offset`.
	///
	/// With `from_scratch` the buffer is resized to `len() + offset` and
	/// cleared first; otherwise it must already hold at least that many
	/// bits and existing bits are preserved (OR is idempotent).
	pub fn set_bits_for_spheres(
		&self,
		spheres: &[Sphere],
		bits: &mut BitVec,
		from_scratch: bool,
		offset: usize,
	) -> Result<(), ShapeError> {
		let needed = self.len() + offset;
		if from_scratch {
			bits.clear();
			bits.resize(needed, false);
		} else {
			validate_bits(bits, needed)?;
		}
		for sphere in spheres {
			self.set_bits_for_one_sphere_unchecked(sphere, bits, offset);
		}
		Ok(())
	}

	/// OR in the coverage bits for a single sphere.
	pub fn set_bits_for_one_sphere(
		&self,
		sphere: &Sphere,
		bits: &mut BitVec,
		offset: usize,
	) -> Result<(), ShapeError> {
		validate_bits(bits, self.len() + offset)?;
		self.set_bits_for_one_sphere_unchecked(sphere, bits, offset);
		Ok(())
	}

	/// Like `set_bits_for_spheres`, but each reference index is first
	/// reduced to `index % (len() >> num_folds)`.
	///
	/// The buffer must already be sized for the folded length; there is no
	/// from-scratch variant because folded regions are packed side by side
	/// in a larger fingerprint. Folding never loses a hit: any original
	/// index that would be set maps onto a slot that ends up set.
	pub fn set_folded_bits_for_spheres(
		&self,
		spheres: &[Sphere],
		bits: &mut BitVec,
		num_folds: u32,
		offset: usize,
	) -> Result<(), ShapeError> {
		let folded_size = self.folded_len(num_folds)?;
		validate_bits(bits, offset + folded_size)?;
		for sphere in spheres {
			self.set_folded_bits_for_one_sphere_unchecked(sphere, bits, offset, folded_size);
		}
		Ok(())
	}

	/// Fingerprint length after `num_folds` halvings.
	pub fn folded_len(&self, num_folds: u32) -> Result<usize, ShapeError> {
		// checked_shr: a fold count at or past the bit width folds to nothing.
		let folded = self.len().checked_shr(num_folds).unwrap_or(0);
		if folded == 0 && self.len() != 0 {
			return Err(ShapeError::InvalidFolds {
				num_folds,
				size: self.len(),
			});
		}
		Ok(folded)
	}

	/// Collect the reference points covered by any of the spheres.
	pub fn points_within_spheres(&self, spheres: &[Sphere]) -> Result<PointCloud, ShapeError> {
		let mut which = BitVec::new();
		self.set_bits_for_spheres(spheres, &mut which, true, 0)?;
		let mut contained = PointCloud::with_capacity(which.count_ones());
		for i in which.iter_ones() {
			contained.push(self.bucket_points[i]);
		}
		Ok(contained)
	}

	fn set_bits_for_one_sphere_unchecked(&self, sphere: &Sphere, bits: &mut BitVec, offset: usize) {
		let radius = sphere.radius * self.sphere_scale;
		let rsqr = radius * radius;
		for point_index in self.indices_in_cube(&sphere.center, radius) {
			let bit_index = point_index as usize + offset;
			// Skipping already-set bits is an optimization; OR is idempotent.
			if !bits[bit_index] {
				let p = &self.bucket_points[point_index as usize];
				if p.dist_sq(&sphere.center) <= rsqr {
					bits.set(bit_index, true);
				}
			}
		}
	}

	fn set_folded_bits_for_one_sphere_unchecked(
		&self,
		sphere: &Sphere,
		bits: &mut BitVec,
		offset: usize,
		folded_size: usize,
	) {
		if folded_size == 0 {
			return;
		}
		let radius = sphere.radius * self.sphere_scale;
		let rsqr = radius * radius;
		for point_index in self.indices_in_cube(&sphere.center, radius) {
			let bit_index = (point_index as usize % folded_size) + offset;
			if !bits[bit_index] {
				let p = &self.bucket_points[point_index as usize];
				if p.dist_sq(&sphere.center) <= rsqr {
					bits.set(bit_index, true);
				}
			}
		}
	}

	/// Broad phase: candidate point indices from all buckets intersecting
	/// the sphere's axis-aligned bounding cube, clamped to the grid.
	fn indices_in_cube(&self, center: &Point3D, radius: f32) -> Vec<u32> {
		let (x0, xf) = self.cell_range(center.x, radius, self.xmin, self.dx, self.ixmax);
		let (y0, yf) = self.cell_range(center.y, radius, self.ymin, self.dy, self.iymax);
		let (z0, zf) = self.cell_range(center.z, radius, self.zmin, self.dz, self.izmax);

		let mut result = Vec::new();
		for ix in x0..=xf {
			for iy in y0..=yf {
				for iz in z0..=zf {
					result.extend_from_slice(&self.buckets[self.cell_index(ix, iy, iz)]);
				}
			}
		}
		result
	}

	#[inline]
	fn cell_range(&self, v: f32, radius: f32, min: f32, d: f32, max_index: usize) -> (usize, usize) {
		if d == 0.0 {
			return (0, 0);
		}
		let lo = (((v - radius - min) / d) as i64).clamp(0, max_index as i64) as usize;
		let hi = (((v + radius - min) / d) as i64).clamp(0, max_index as i64) as usize;
		(lo, hi)
	}
}

fn validate_bits(bits: &BitVec, needed: usize) -> Result<(), ShapeError> {
	if bits.len() < needed {
		return Err(ShapeError::BitBufferTooSmall {
			have: bits.len(),
			need: needed,
		});
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::shape::hammersley::{EllipsoidParams, Hammersley};

	fn test_sphere_cloud() -> PointCloud {
		Hammersley::ellipsoid(&EllipsoidParams {
			num_points: 4096,
			scale: 11.0,
			a: 1.0,
			b: 1.0,
			c: 1.0,
		})
	}

	fn brute_force_bits(cloud: &[Point3D], sphere: &Sphere) -> BitVec {
		let mut bits = BitVec::repeat(false, cloud.len());
		let rsqr = sphere.radius * sphere.radius;
		for (i, p) in cloud.iter().enumerate() {
			if p.dist_sq(&sphere.center) <= rsqr {
				bits.set(i, true);
			}
		}
		bits
	}

	#[test]
	fn every_point_lands_in_exactly_one_bucket() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		let mut seen = vec![0u32; vb.len()];
		for bucket in &vb.buckets {
			for &i in bucket {
				seen[i as usize] += 1;
			}
		}
		assert!(seen.iter().all(|&count| count == 1));
	}

	#[test]
	fn query_matches_brute_force_distance_test() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		for sphere in [
			Sphere::new(0.0, 0.0, 0.0, 3.0),
			Sphere::new(5.0, -2.0, 1.0, 4.5),
			Sphere::new(-10.0, 0.0, 0.0, 2.0),
		] {
			let mut bits = BitVec::new();
			vb.set_bits_for_spheres(&[sphere], &mut bits, true, 0).unwrap();
			assert_eq!(bits, brute_force_bits(&cloud, &sphere));
		}
	}

	#[test]
	fn giant_sphere_covers_every_point() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		let mut bits = BitVec::repeat(false, vb.len());
		vb.set_bits_for_one_sphere(&Sphere::new(0.0, 0.0, 0.0, 22.0), &mut bits, 0)
			.unwrap();
		assert_eq!(bits.count_ones(), vb.len());
	}

	#[test]
	fn sphere_scale_multiplies_query_radius() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 2.0);
		let query = Sphere::new(0.0, 0.0, 0.0, 3.0);
		let mut bits = BitVec::new();
		vb.set_bits_for_spheres(&[query], &mut bits, true, 0).unwrap();
		// Scaled query behaves like an unscaled query of twice the radius.
		assert_eq!(bits, brute_force_bits(&cloud, &Sphere::new(0.0, 0.0, 0.0, 6.0)));
	}

	#[test]
	fn short_buffer_is_a_size_mismatch_error() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		let mut bits = BitVec::repeat(false, vb.len() - 1);
		let err = vb
			.set_bits_for_spheres(&[Sphere::new(0.0, 0.0, 0.0, 1.0)], &mut bits, false, 0)
			.unwrap_err();
		assert!(matches!(err, ShapeError::BitBufferTooSmall { .. }));
	}

	#[test]
	fn offset_shifts_all_set_bits() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		let sphere = Sphere::new(0.0, 0.0, 0.0, 4.0);
		let offset = 17;

		let mut plain = BitVec::new();
		vb.set_bits_for_spheres(&[sphere], &mut plain, true, 0).unwrap();
		let mut shifted = BitVec::new();
		vb.set_bits_for_spheres(&[sphere], &mut shifted, true, offset).unwrap();

		assert_eq!(shifted.len(), vb.len() + offset);
		for i in 0..vb.len() {
			assert_eq!(plain[i], shifted[i + offset]);
		}
	}

	#[test]
	fn repeated_or_is_idempotent() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		let spheres = vec![Sphere::new(1.0, 1.0, 1.0, 3.0), Sphere::new(-2.0, 0.0, 0.5, 2.0)];

		let mut once = BitVec::repeat(false, vb.len());
		vb.set_bits_for_spheres(&spheres, &mut once, false, 0).unwrap();
		let mut twice = once.clone();
		vb.set_bits_for_spheres(&spheres, &mut twice, false, 0).unwrap();
		assert_eq!(once, twice);
	}

	#[test]
	fn folding_never_loses_a_hit() {
		let cloud = test_sphere_cloud();
		let vb = VolBox::new(&cloud, 1.0);
		let spheres = vec![Sphere::new(0.0, 0.0, 0.0, 5.0), Sphere::new(6.0, 3.0, -1.0, 2.5)];

		for num_folds in 1..=3u32 {
			let folded_size = vb.folded_len(num_folds).unwrap();

			let mut full = BitVec::new();
			vb.set_bits_for_spheres(&spheres, &mut full, true, 0).unwrap();
			let mut folded = BitVec::repeat(false, folded_size);
			vb.set_folded_bits_for_spheres(&spheres, &mut folded, num_folds, 0)
				.unwrap();

			// Image of the full-resolution bits under the folding map.
			let mut expected: BitVec = BitVec::repeat(false, folded_size);
			for i in full.iter_ones() {
				expected.set(i % folded_size, true);
			}
			assert_eq!(folded, expected);
		}
	}

	#[test]
	fn oversized_fold_counts_are_rejected_not_masked() {
		let cloud: PointCloud = (0..16)
			.map(|i| Point3D::new(i as f32, 0.0, 0.0))
			.collect();
		let vb = VolBox::new(&cloud, 1.0);

		assert_eq!(vb.folded_len(2).unwrap(), 4);
		// Folding a 16-point box 5+ times leaves nothing.
		assert!(matches!(vb.folded_len(5), Err(ShapeError::InvalidFolds { .. })));
		// Shift counts at or past the usize width must error, not wrap.
		assert!(matches!(vb.folded_len(64), Err(ShapeError::InvalidFolds { .. })));
		assert!(matches!(
			vb.folded_len(usize::BITS + 1),
			Err(ShapeError::InvalidFolds { .. })
		));

		// An empty box folds to an empty fingerprint at any fold count.
		let empty = VolBox::new(&[], 1.0);
		assert_eq!(empty.folded_len(64).unwrap(), 0);
	}

	#[test]
	fn degenerate_planar_cloud_builds_a_flat_grid() {
		// All points share z = 0; the z axis collapses to a single cell.
		let cloud: PointCloud = (0..64)
			.map(|i| Point3D::new((i % 8) as f32, (i / 8) as f32, 0.0))
			.collect();
		let vb = VolBox::new(&cloud, 1.0);
		assert_eq!(vb.len(), 64);

		let mut bits = BitVec::new();
		vb.set_bits_for_spheres(&[Sphere::new(3.5, 3.5, 0.0, 20.0)], &mut bits, true, 0)
			.unwrap();
		assert_eq!(bits.count_ones(), 64);
	}
}
