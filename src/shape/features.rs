use crate::mol::molecule::Mol;

/// A pharmacophore feature-channel provider.
///
/// The number and order of channels is fixed for the provider's lifetime
/// and determines the fingerprint layout. `rebuild` is invoked once per
/// `set_molecule`; matches must stay cached across the 4 flips since atom
/// indices are flip-invariant.
pub trait FeatureFinder {
	fn num_channels(&self) -> usize;

	/// Zero-based indices of the atoms matching the channel. A channel
	/// index out of range is a programming error and panics.
	fn atom_indices_for_channel(&self, channel: usize) -> &[usize];

	/// Recompute matches for a new molecule.
	fn rebuild(&mut self, mol: &Mol);
}

/// Zero-channel provider: plain shape fingerprints.
#[derive(Debug, Default)]
pub struct NullFeatureFinder;

impl FeatureFinder for NullFeatureFinder {
	fn num_channels(&self) -> usize {
		0
	}

	fn atom_indices_for_channel(&self, channel: usize) -> &[usize] {
		panic!("channel index {channel} out of range (0 channels)");
	}

	fn rebuild(&mut self, _mol: &Mol) {}
}

/// Predicate deciding whether one atom of a molecule matches a feature.
pub type AtomPredicate = fn(&Mol, usize) -> bool;

/// A named feature pattern.
pub struct FeaturePattern {
	pub name: &'static str,
	pub matches: AtomPredicate,
}

/// Feature finder driven by an explicitly constructed, immutable pattern
/// table. Matches are computed eagerly on `rebuild` and served from the
/// cache afterwards.
pub struct PatternFeatureFinder {
	patterns: Vec<FeaturePattern>,
	matches: Vec<Vec<usize>>,
}

impl PatternFeatureFinder {
	pub fn new(patterns: Vec<FeaturePattern>) -> Self {
		let matches = patterns.iter().map(|_| Vec::new()).collect();
		Self { patterns, matches }
	}

	pub fn channel_name(&self, channel: usize) -> &'static str {
		self.patterns[channel].name
	}
}

impl FeatureFinder for PatternFeatureFinder {
	fn num_channels(&self) -> usize {
		self.patterns.len()
	}

	fn atom_indices_for_channel(&self, channel: usize) -> &[usize] {
		&self.matches[channel]
	}

	fn rebuild(&mut self, mol: &Mol) {
		for (pattern, cache) in self.patterns.iter().zip(self.matches.iter_mut()) {
			cache.clear();
			for i in 0..mol.atoms.len() {
				if (pattern.matches)(mol, i) {
					cache.push(i);
				}
			}
		}
	}
}

fn is_hbond_acceptor(mol: &Mol, i: usize) -> bool {
	matches!(mol.atoms[i].atomic_num, 7 | 8)
}

fn is_hbond_donor(mol: &Mol, i: usize) -> bool {
	if !matches!(mol.atoms[i].atomic_num, 7 | 8 | 16) {
		return false;
	}
	mol.neighbors(i).iter().any(|&j| mol.atoms[j].is_hydrogen())
}

fn is_charged(mol: &Mol, i: usize) -> bool {
	mol.atoms[i].charge != 0
}

/// The built-in channel table: element/bond-graph approximations of the
/// classic pharmacophore channels. External providers with richer pattern
/// matching plug in through the `FeatureFinder` trait instead.
pub fn default_patterns() -> Vec<FeaturePattern> {
	vec![
		FeaturePattern {
			name: "hbond-acceptor",
			matches: is_hbond_acceptor,
		},
		FeaturePattern {
			name: "hbond-donor",
			matches: is_hbond_donor,
		},
		FeaturePattern {
			name: "charged",
			matches: is_charged,
		},
	]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mol::atom::Atom;
	use crate::mol::molecule::Bond;
	use crate::shape::geometry::Point3D;

	fn methanol() -> Mol {
		// C-O-H plus methyl hydrogens, with a formal charge on the oxygen.
		let mut atoms = vec![
			Atom::new(6, Point3D::new(0.0, 0.0, 0.0)),
			Atom::new(8, Point3D::new(1.4, 0.0, 0.0)),
			Atom::new(1, Point3D::new(1.8, 0.9, 0.0)),
		];
		atoms[1].charge = -1;
		let bonds = vec![
			Bond { from: 0, to: 1, bond_type: 1, stereo: 0 },
			Bond { from: 1, to: 2, bond_type: 1, stereo: 0 },
		];
		Mol::new("methanol".into(), atoms, bonds)
	}

	#[test]
	fn default_patterns_classify_a_small_molecule() {
		let mut finder = PatternFeatureFinder::new(default_patterns());
		assert_eq!(finder.num_channels(), 3);
		finder.rebuild(&methanol());

		assert_eq!(finder.atom_indices_for_channel(0), &[1]); // acceptor: O
		assert_eq!(finder.atom_indices_for_channel(1), &[1]); // donor: O-H
		assert_eq!(finder.atom_indices_for_channel(2), &[1]); // charged
	}

	#[test]
	fn rebuild_replaces_previous_matches() {
		let mut finder = PatternFeatureFinder::new(default_patterns());
		finder.rebuild(&methanol());
		finder.rebuild(&Mol::default());
		assert!(finder.atom_indices_for_channel(0).is_empty());
	}

	#[test]
	#[should_panic(expected = "out of range")]
	fn null_finder_panics_on_any_channel() {
		let finder = NullFeatureFinder;
		finder.atom_indices_for_channel(0);
	}
}
