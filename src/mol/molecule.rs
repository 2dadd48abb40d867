use crate::mol::atom::Atom;
use crate::shape::geometry::{Sphere, SphereList};

/// A bond between two atoms, referenced by index into the owning Mol.
///
/// `bond_type` and `stereo` keep the literal V2000 numeric codes; no
/// chemical meaning is inferred from them here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
	pub from: usize,
	pub to: usize,
	pub bond_type: u8,
	pub stereo: u8,
}

/// A molecule as read from an SD file: a name plus owned, indexable atom
/// and bond sequences.
#[derive(Debug, Clone, Default)]
pub struct Mol {
	pub name: String,
	pub atoms: Vec<Atom>,
	pub bonds: Vec<Bond>,
}

impl Mol {
	pub fn new(name: String, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
		Self { name, atoms, bonds }
	}

	/// One sphere per atom (center + van der Waals radius), optionally
	/// excluding hydrogens.
	pub fn atom_spheres(&self, include_hydrogens: bool) -> SphereList {
		let mut spheres = SphereList::with_capacity(self.atoms.len());
		for atom in &self.atoms {
			if include_hydrogens || !atom.is_hydrogen() {
				spheres.push(Sphere {
					center: atom.pos,
					radius: atom.radius(),
				});
			}
		}
		spheres
	}

	/// Indices of atoms bonded to `atom_index`.
	pub fn neighbors(&self, atom_index: usize) -> Vec<usize> {
		let mut result = Vec::new();
		for bond in &self.bonds {
			if bond.from == atom_index {
				result.push(bond.to);
			} else if bond.to == atom_index {
				result.push(bond.from);
			}
		}
		result
	}

	/// Whether every atom coordinate is a finite float.
	pub fn has_finite_coords(&self) -> bool {
		self.atoms
			.iter()
			.all(|a| a.pos.x.is_finite() && a.pos.y.is_finite() && a.pos.z.is_finite())
	}
}
