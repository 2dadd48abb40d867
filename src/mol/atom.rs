use crate::shape::geometry::Point3D;

// Van der Waals radii in Ångstroms, indexed by atomic number - 1.
// Derived from PubChem's periodic table (values rescaled from pm).
const ATOMIC_RADIUS: [f32; 99] = [
	1.20, 1.40, 1.82, 1.53, 1.92, 1.70, 1.55, 1.52, 1.35, 1.54, 2.27, 1.73, 1.84, 2.10, 1.80,
	1.80, 1.75, 1.88, 2.75, 2.31, 2.11, 1.87, 1.79, 1.89, 1.97, 1.94, 1.92, 1.63, 1.40, 1.39,
	1.87, 2.11, 1.85, 1.90, 1.83, 2.02, 3.03, 2.49, 2.19, 1.86, 2.07, 2.09, 2.09, 2.07, 1.95,
	2.02, 1.72, 1.58, 1.93, 2.17, 2.06, 2.06, 1.98, 2.16, 3.43, 2.68, 2.40, 2.35, 2.39, 2.29,
	2.36, 2.29, 2.33, 2.37, 2.21, 2.29, 2.16, 2.35, 2.27, 2.42, 2.21, 2.12, 2.17, 2.10, 2.17,
	2.16, 2.02, 2.09, 1.66, 2.09, 1.96, 2.02, 2.07, 1.97, 2.02, 2.20, 3.48, 2.83, 2.60, 2.37,
	2.43, 2.40, 2.21, 2.43, 2.44, 2.45, 2.44, 2.45, 2.45,
];

// Atomic symbols, indexed by atomic number - 1.
const ATOMIC_SYMBOL: [&str; 99] = [
	"H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
	"Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
	"Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
	"In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu",
	"Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt",
	"Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np",
	"Pu", "Am", "Cm", "Bk", "Cf", "Es",
];

// For elements beyond the table (or atomic number 0 placeholders).
const DEFAULT_RADIUS: f32 = 2.0;

/// Van der Waals radius for an atomic number, in Ångstroms.
pub fn element_radius(atomic_num: u32) -> f32 {
	ATOMIC_RADIUS
		.get(atomic_num.wrapping_sub(1) as usize)
		.copied()
		.unwrap_or(DEFAULT_RADIUS)
}

/// Atomic symbol for an atomic number; "?" if unknown.
pub fn element_symbol(atomic_num: u32) -> &'static str {
	ATOMIC_SYMBOL
		.get(atomic_num.wrapping_sub(1) as usize)
		.copied()
		.unwrap_or("?")
}

/// Atomic number for a symbol as written in an SD atom block.
pub fn atomic_num_for_symbol(symbol: &str) -> Option<u32> {
	let trimmed = symbol.trim();
	ATOMIC_SYMBOL
		.iter()
		.position(|&s| s == trimmed)
		.map(|i| i as u32 + 1)
}

/// An atom: atomic number, position, and formal charge.
///
/// Atoms are owned by their Mol and referenced everywhere by index, never
/// by address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
	pub atomic_num: u32,
	pub pos: Point3D,
	pub charge: i32,
}

impl Atom {
	pub fn new(atomic_num: u32, pos: Point3D) -> Self {
		Self {
			atomic_num,
			pos,
			charge: 0,
		}
	}

	/// Van der Waals radius, in Ångstroms.
	pub fn radius(&self) -> f32 {
		element_radius(self.atomic_num)
	}

	pub fn symbol(&self) -> &'static str {
		element_symbol(self.atomic_num)
	}

	pub fn is_hydrogen(&self) -> bool {
		self.atomic_num == 1
	}
}
