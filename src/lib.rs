pub mod shape {
	pub mod geometry;
	pub mod hammersley;
	pub mod vol_box;
	pub mod axis_aligner;
	pub mod fingerprinter;
	pub mod features;
	pub mod measures;
	pub mod encode;
	pub mod error;
}

pub mod mol {
	pub mod atom;
	pub mod molecule;
	pub mod sd;
}
