use std::sync::Arc;
use std::time::{Duration, Instant};

use bitvec::vec::BitVec;

use crate::mol::atom::Atom;
use crate::mol::molecule::Mol;
use crate::shape::axis_aligner::AxisAligner;
use crate::shape::error::ShapeError;
use crate::shape::features::{FeatureFinder, NullFeatureFinder};
use crate::shape::geometry::{Point3D, Sphere, SphereList};
use crate::shape::vol_box::VolBox;

/// The 4 axis reflections applied after PCA alignment. Sign products are
/// all +1, so every flip is a proper rotation; together they absorb the
/// reflection ambiguity PCA leaves behind.
pub const FLIP_MATRIX: [[f32; 3]; 4] = [
	[1.0, 1.0, 1.0], // unflipped
	[1.0, -1.0, -1.0],
	[-1.0, 1.0, -1.0],
	[-1.0, -1.0, 1.0],
];

/// One bit per reference point, for a single orientation.
pub type BitFingerprint = BitVec;

/// The 4 per-flip fingerprints of a single conformer.
pub type ShapeFingerprint = Vec<BitFingerprint>;

fn flipped_spheres(spheres: &[Sphere], signs: [f32; 3]) -> SphereList {
	spheres.iter().map(|s| s.flipped(signs)).collect()
}

/// Shape fingerprint generator for conformers which are already
/// consistently aligned: full resolution, shape channel only.
pub struct Fingerprinter<'a> {
	vol_box: &'a VolBox,
}

impl<'a> Fingerprinter<'a> {
	pub fn new(vol_box: &'a VolBox) -> Self {
		Self { vol_box }
	}

	/// Compute the 4 per-flip fingerprints for the given atoms.
	pub fn compute(&self, atoms: &[Atom]) -> Result<ShapeFingerprint, ShapeError> {
		let spheres: SphereList = atoms
			.iter()
			.map(|a| Sphere {
				center: a.pos,
				radius: a.radius(),
			})
			.collect();
		let mut result = ShapeFingerprint::with_capacity(FLIP_MATRIX.len());
		for signs in FLIP_MATRIX {
			let mut bits = BitVec::new();
			self.vol_box
				.set_bits_for_spheres(&flipped_spheres(&spheres, signs), &mut bits, true, 0)?;
			result.push(bits);
		}
		Ok(result)
	}
}

/// Full per-molecule fingerprinting pipeline.
///
/// States: Idle -> MoleculeSet -> Flip0..Flip3 -> Idle. `set_molecule`
/// aligns a private copy of the molecule and primes the flip sequence;
/// each `next_fingerprint` call emits one flip until all 4 are exhausted.
///
/// Layout of each fingerprint: `stride = vol_box.len() >> num_folds` bits
/// of shape channel first, then one `stride`-sized region per feature
/// channel, in the provider's fixed channel order.
pub struct MolFingerprinter {
	aligner: Arc<AxisAligner>,
	vol_box: Arc<VolBox>,
	num_folds: u32,
	finder: Box<dyn FeatureFinder + Send>,
	timeout: Option<Duration>,
	deadline: Option<Instant>,
	mol_name: String,
	heavies: SphereList,
	all_atoms: SphereList,
	i_flip: usize,
}

impl MolFingerprinter {
	/// Build from the two reference clouds. `sphere_scale` (ε) multiplies
	/// every atom radius during coverage queries.
	pub fn new(
		ellipsoid_cloud: &[Point3D],
		sphere_cloud: &[Point3D],
		sphere_scale: f32,
		num_folds: u32,
	) -> Self {
		Self::with_parts(
			Arc::new(VolBox::new(ellipsoid_cloud, sphere_scale)),
			Arc::new(AxisAligner::new(sphere_cloud, sphere_scale, false)),
			num_folds,
			Box::new(NullFeatureFinder),
		)
	}

	/// Build from shared reference structures. VolBox and AxisAligner are
	/// immutable after construction, so batch fingerprinting can hand the
	/// same two Arcs to one MolFingerprinter per worker thread.
	pub fn with_parts(
		vol_box: Arc<VolBox>,
		aligner: Arc<AxisAligner>,
		num_folds: u32,
		finder: Box<dyn FeatureFinder + Send>,
	) -> Self {
		Self {
			aligner,
			vol_box,
			num_folds,
			finder,
			timeout: None,
			deadline: None,
			mol_name: String::new(),
			heavies: SphereList::new(),
			all_atoms: SphereList::new(),
			i_flip: FLIP_MATRIX.len(),
		}
	}

	/// Per-molecule deadline: molecules whose flips are still being
	/// computed this long after `set_molecule` fail with
	/// `ShapeError::DeadlineExceeded`.
	pub fn set_timeout(&mut self, timeout: Option<Duration>) {
		self.timeout = timeout;
	}

	/// Total bits in each emitted fingerprint.
	pub fn fingerprint_len(&self) -> Result<usize, ShapeError> {
		let stride = self.vol_box.folded_len(self.num_folds)?;
		Ok(stride * (1 + self.finder.num_channels()))
	}

	/// Align a private copy of `mol` and prime the 4-flip sequence.
	///
	/// The caller's molecule is never mutated. On alignment failure the
	/// fingerprinter drops back to Idle and reports the error.
	pub fn set_molecule(&mut self, mol: &Mol) -> Result<(), ShapeError> {
		self.i_flip = FLIP_MATRIX.len();
		self.mol_name = mol.name.clone();

		let mut aligned = mol.clone();
		self.aligner.align_to_axes(&mut aligned)?;

		// Heavy atoms drive the shape channel, all atoms the feature
		// channels.
		self.heavies = aligned.atom_spheres(false);
		self.all_atoms = aligned.atom_spheres(true);
		self.finder.rebuild(&aligned);

		self.deadline = self.timeout.map(|t| Instant::now() + t);
		self.i_flip = 0;
		Ok(())
	}

	/// Emit the fingerprint for the next flip; `Ok(None)` once all 4 flips
	/// are exhausted (call `set_molecule` again to resume).
	///
	/// A failed flip aborts the molecule's whole fingerprint set; no
	/// partially populated bit vector is ever returned.
	pub fn next_fingerprint(&mut self) -> Result<Option<BitFingerprint>, ShapeError> {
		if self.i_flip >= FLIP_MATRIX.len() {
			return Ok(None);
		}
		match self.compute_current_flip() {
			Ok(bits) => {
				self.i_flip += 1;
				Ok(Some(bits))
			}
			Err(err) => {
				self.i_flip = FLIP_MATRIX.len();
				Err(err)
			}
		}
	}

	fn compute_current_flip(&mut self) -> Result<BitFingerprint, ShapeError> {
		if let Some(deadline) = self.deadline {
			if Instant::now() >= deadline {
				return Err(ShapeError::DeadlineExceeded(self.mol_name.clone()));
			}
		}

		let signs = FLIP_MATRIX[self.i_flip];
		let stride = self.vol_box.folded_len(self.num_folds)?;
		let num_channels = self.finder.num_channels();
		let mut bits = BitVec::repeat(false, stride * (1 + num_channels));
		if stride == 0 {
			return Ok(bits);
		}

		// Shape channel.
		let flipped = flipped_spheres(&self.heavies, signs);
		self.vol_box
			.set_folded_bits_for_spheres(&flipped, &mut bits, self.num_folds, 0)?;

		// Feature channels, each over its subset of the all-atom spheres.
		if num_channels > 0 {
			let flipped_all = flipped_spheres(&self.all_atoms, signs);
			for channel in 0..num_channels {
				let channel_spheres: SphereList = self
					.finder
					.atom_indices_for_channel(channel)
					.iter()
					.map(|&i| flipped_all[i])
					.collect();
				let offset = stride * (channel + 1);
				self.vol_box.set_folded_bits_for_spheres(
					&channel_spheres,
					&mut bits,
					self.num_folds,
					offset,
				)?;
			}
		}
		Ok(bits)
	}
}
