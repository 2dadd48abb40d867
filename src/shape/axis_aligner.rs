use nalgebra::{DMatrix, Matrix3};

use crate::mol::molecule::Mol;
use crate::shape::error::ShapeError;
use crate::shape::geometry::{
	mean_center, sphere_centroid, untranslate_spheres, Point3D, PointCloud, SphereList,
};
use crate::shape::vol_box::VolBox;

/// Rotates molecules into a canonical frame: mean-center on the heavy-atom
/// centroid, then PCA-align so the principal axes of the molecular shape
/// land on x, y, z in decreasing variance order.
///
/// The shape is sampled either from the atom centers themselves
/// (`atom_centers_only`) or from the aligner's reference sphere cloud: the
/// points of a Hammersley sphere covered by the atoms' van-der-Waals
/// spheres. Alignment is invariant to input translation but not to
/// reflection; the fingerprinter enumerates 4 explicit flips downstream to
/// absorb the reflection ambiguity.
pub struct AxisAligner {
	vol_box: VolBox,
	atom_centers_only: bool,
}

fn transform_point(vt: &Matrix3<f32>, p: Point3D) -> Point3D {
	Point3D::new(
		vt[(0, 0)] * p.x + vt[(0, 1)] * p.y + vt[(0, 2)] * p.z,
		vt[(1, 0)] * p.x + vt[(1, 1)] * p.y + vt[(1, 2)] * p.z,
		vt[(2, 0)] * p.x + vt[(2, 1)] * p.y + vt[(2, 2)] * p.z,
	)
}

fn cross(a: Point3D, b: Point3D) -> Point3D {
	Point3D::new(
		a.y * b.z - a.z * b.y,
		-(a.x * b.z - a.z * b.x),
		a.x * b.y - a.y * b.x,
	)
}

/// SVD may hand back a transform that mirrors one of the coordinate axes.
/// Transform the unit basis and check that the third image is still the
/// cross product of the first two.
fn axis_is_mirrored(vt: &Matrix3<f32>) -> bool {
	let a = transform_point(vt, Point3D::new(1.0, 0.0, 0.0));
	let b = transform_point(vt, Point3D::new(0.0, 1.0, 0.0));
	let c = transform_point(vt, Point3D::new(0.0, 0.0, 1.0));
	let xp = cross(a, b);
	(c.x - xp.x).abs() >= 1.0e-6 || (c.y - xp.y).abs() >= 1.0e-6 || (c.z - xp.z).abs() >= 1.0e-6
}

fn unmirror_axis(vt: &mut Matrix3<f32>, i_axis: usize) {
	for i in 0..3 {
		vt[(i_axis, i)] = -vt[(i_axis, i)];
	}
}

fn unmirror_axes(vt: &mut Matrix3<f32>) {
	for i in 0..3 {
		if !axis_is_mirrored(vt) {
			break;
		}
		unmirror_axis(vt, i);
		if axis_is_mirrored(vt) {
			// Still mirrored? Back off and try the next axis.
			unmirror_axis(vt, i);
		}
	}
}

impl AxisAligner {
	/// `points` is the reference sphere cloud (Hammersley output);
	/// `atom_scale` scales atom radii during coverage queries.
	pub fn new(points: &[Point3D], atom_scale: f32, atom_centers_only: bool) -> Self {
		Self {
			vol_box: VolBox::new(points, atom_scale),
			atom_centers_only,
		}
	}

	/// Mutate the molecule's atom coordinates into the canonical frame.
	///
	/// An empty molecule is a no-op. A degenerate shape cloud or a
	/// non-converging SVD is reported, never silently defaulted; the
	/// molecule's coordinates are untouched on error.
	pub fn align_to_axes(&self, mol: &mut Mol) -> Result<(), ShapeError> {
		if mol.atoms.is_empty() {
			return Ok(());
		}

		// PCA transform from the mean-centered heavy-atom shape.
		let mut centers = mol.atom_spheres(false);
		mean_center_spheres(&mut centers);
		let cloud = self.mean_centered_cloud(&centers)?;
		let transform = find_axis_align_transform(&cloud)?;

		// Mean-center all atoms on the heavy-atom centroid, then rotate.
		let mean = sphere_centroid(&mol.atom_spheres(false));
		for atom in &mut mol.atoms {
			let centered = Point3D::new(
				atom.pos.x - mean.x,
				atom.pos.y - mean.y,
				atom.pos.z - mean.z,
			);
			atom.pos = transform_point(&transform, centered);
		}
		Ok(())
	}

	/// The point cloud PCA runs on: atom centers, or the covered points of
	/// the reference sphere, re-centered.
	fn mean_centered_cloud(&self, centers: &SphereList) -> Result<PointCloud, ShapeError> {
		if self.atom_centers_only {
			// Atom centers are already mean-centered.
			return Ok(centers.iter().map(|s| s.center).collect());
		}
		let mut cloud = self.vol_box.points_within_spheres(centers)?;
		mean_center(&mut cloud);
		Ok(cloud)
	}
}

fn mean_center_spheres(spheres: &mut SphereList) {
	let mean = sphere_centroid(spheres);
	untranslate_spheres(spheres, mean);
}

/// PCA via SVD of the n-by-3 cloud matrix; rows of the result are the
/// principal axes in decreasing variance order, mirror-corrected.
fn find_axis_align_transform(cloud: &[Point3D]) -> Result<Matrix3<f32>, ShapeError> {
	if cloud.is_empty() {
		return Err(ShapeError::EmptyCloud);
	}

	let x = DMatrix::from_fn(cloud.len(), 3, |i, j| match j {
		0 => cloud[i].x,
		1 => cloud[i].y,
		_ => cloud[i].z,
	});

	let svd = x
		.try_svd(false, true, f32::EPSILON, 1000)
		.ok_or(ShapeError::SvdFailed)?;
	let v_t = svd.v_t.ok_or(ShapeError::SvdFailed)?;

	let mut transform = Matrix3::from_fn(|i, j| v_t[(i, j)]);
	unmirror_axes(&mut transform);
	Ok(transform)
}
