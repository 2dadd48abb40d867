use std::io::{self, BufRead, Write};

use crate::mol::atom::{atomic_num_for_symbol, Atom};
use crate::mol::molecule::{Bond, Mol};
use crate::shape::geometry::Point3D;

fn field(line: &str, start: usize, len: usize) -> &str {
	if line.len() <= start {
		return "";
	}
	let end = (start + len).min(line.len());
	// A fixed-column offset can land inside a multi-byte character; treat
	// that as an empty field so it surfaces as a parse error, not a panic.
	line.get(start..end).unwrap_or("")
}

fn bad_data(msg: String) -> io::Error {
	io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Streaming reader for record-oriented SD (V2000 molfile) input.
///
/// Each `read` call consumes one record through its `$$$$` terminator.
/// Data items (`> <tag>` blocks) are consumed and discarded; only the
/// connection table matters for fingerprinting.
pub struct SdReader<R: BufRead> {
	input: R,
	source_name: String,
	line_num: usize,
}

impl<R: BufRead> SdReader<R> {
	pub fn new(input: R, source_name: &str) -> Self {
		Self {
			input,
			source_name: source_name.to_string(),
			line_num: 0,
		}
	}

	fn next_line(&mut self) -> io::Result<Option<String>> {
		let mut line = String::new();
		let n = self.input.read_line(&mut line)?;
		if n == 0 {
			return Ok(None);
		}
		self.line_num += 1;
		while line.ends_with('\n') || line.ends_with('\r') {
			line.pop();
		}
		Ok(Some(line))
	}

	fn parse_error(&self, msg: &str) -> io::Error {
		bad_data(format!("{}:{}: {}", self.source_name, self.line_num, msg))
	}

	/// Read the next molecule; `Ok(None)` at end of input.
	pub fn read(&mut self) -> io::Result<Option<Mol>> {
		// Header block: name, program stamp, comment.
		let name = match self.next_line()? {
			Some(line) => line.trim().to_string(),
			None => return Ok(None),
		};
		let _program = self
			.next_line()?
			.ok_or_else(|| self.parse_error("truncated header block"))?;
		let _comment = self
			.next_line()?
			.ok_or_else(|| self.parse_error("truncated header block"))?;

		let counts = self
			.next_line()?
			.ok_or_else(|| self.parse_error("missing counts line"))?;
		let num_atoms: usize = field(&counts, 0, 3)
			.trim()
			.parse()
			.map_err(|_| self.parse_error("bad atom count"))?;
		let num_bonds: usize = field(&counts, 3, 3)
			.trim()
			.parse()
			.map_err(|_| self.parse_error("bad bond count"))?;

		let mut atoms = Vec::with_capacity(num_atoms);
		for _ in 0..num_atoms {
			let line = self
				.next_line()?
				.ok_or_else(|| self.parse_error("truncated atom block"))?;
			let x: f32 = field(&line, 0, 10)
				.trim()
				.parse()
				.map_err(|_| self.parse_error("bad atom x coordinate"))?;
			let y: f32 = field(&line, 10, 10)
				.trim()
				.parse()
				.map_err(|_| self.parse_error("bad atom y coordinate"))?;
			let z: f32 = field(&line, 20, 10)
				.trim()
				.parse()
				.map_err(|_| self.parse_error("bad atom z coordinate"))?;
			if !(x.is_finite() && y.is_finite() && z.is_finite()) {
				return Err(self.parse_error("non-finite atom coordinate"));
			}
			let symbol = field(&line, 31, 3).trim().to_string();
			let atomic_num = atomic_num_for_symbol(&symbol).unwrap_or(0);
			atoms.push(Atom::new(atomic_num, Point3D::new(x, y, z)));
		}

		let mut bonds = Vec::with_capacity(num_bonds);
		for _ in 0..num_bonds {
			let line = self
				.next_line()?
				.ok_or_else(|| self.parse_error("truncated bond block"))?;
			let from: usize = field(&line, 0, 3)
				.trim()
				.parse()
				.map_err(|_| self.parse_error("bad bond atom index"))?;
			let to: usize = field(&line, 3, 3)
				.trim()
				.parse()
				.map_err(|_| self.parse_error("bad bond atom index"))?;
			if from == 0 || to == 0 || from > num_atoms || to > num_atoms {
				return Err(self.parse_error("bond atom index out of range"));
			}
			// Type and stereo codes are kept as raw numbers.
			let bond_type: u8 = field(&line, 6, 3).trim().parse().unwrap_or(0);
			let stereo: u8 = field(&line, 9, 3).trim().parse().unwrap_or(0);
			bonds.push(Bond {
				from: from - 1,
				to: to - 1,
				bond_type,
				stereo,
			});
		}

		// Property block, then data items, through the record terminator.
		loop {
			let line = match self.next_line()? {
				Some(line) => line,
				None => break, // tolerate a missing final $$$$
			};
			if line.starts_with("$$$$") {
				break;
			}
			if line.starts_with("M  CHG") {
				apply_charges(&line, &mut atoms);
			}
		}

		Ok(Some(Mol::new(name, atoms, bonds)))
	}

	/// Skip one record without parsing it. Returns false at end of input.
	pub fn skip(&mut self) -> io::Result<bool> {
		let mut saw_any = false;
		while let Some(line) = self.next_line()? {
			saw_any = true;
			if line.starts_with("$$$$") {
				return Ok(true);
			}
		}
		Ok(saw_any)
	}
}

/// Apply an `M  CHG` property line: count then (atom index, charge) pairs.
fn apply_charges(line: &str, atoms: &mut [Atom]) {
	let tokens: Vec<&str> = line.split_whitespace().skip(2).collect();
	let Some(count) = tokens.first().and_then(|t| t.parse::<usize>().ok()) else {
		return;
	};
	for pair in tokens[1..].chunks(2).take(count) {
		if let [idx, chg] = pair {
			if let (Ok(idx), Ok(chg)) = (idx.parse::<usize>(), chg.parse::<i32>()) {
				if idx >= 1 && idx <= atoms.len() {
					atoms[idx - 1].charge = chg;
				}
			}
		}
	}
}

/// Writer producing round-trippable V2000 SD records.
pub struct SdWriter<W: Write> {
	output: W,
}

impl<W: Write> SdWriter<W> {
	pub fn new(output: W) -> Self {
		Self { output }
	}

	pub fn write(&mut self, mol: &Mol) -> io::Result<()> {
		writeln!(self.output, "{}", mol.name)?;
		writeln!(self.output, "  shapefp")?;
		writeln!(self.output)?;
		writeln!(
			self.output,
			"{:3}{:3}  0  0  0  0  0  0  0  0999 V2000",
			mol.atoms.len(),
			mol.bonds.len()
		)?;
		for atom in &mol.atoms {
			writeln!(
				self.output,
				"{:10.4}{:10.4}{:10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
				atom.pos.x,
				atom.pos.y,
				atom.pos.z,
				atom.symbol()
			)?;
		}
		for bond in &mol.bonds {
			writeln!(
				self.output,
				"{:3}{:3}{:3}{:3}",
				bond.from + 1,
				bond.to + 1,
				bond.bond_type,
				bond.stereo
			)?;
		}
		let charged: Vec<(usize, i32)> = mol
			.atoms
			.iter()
			.enumerate()
			.filter(|(_, a)| a.charge != 0)
			.map(|(i, a)| (i + 1, a.charge))
			.collect();
		if !charged.is_empty() {
			write!(self.output, "M  CHG{:3}", charged.len())?;
			for (idx, chg) in charged {
				write!(self.output, " {:3} {:3}", idx, chg)?;
			}
			writeln!(self.output)?;
		}
		writeln!(self.output, "M  END")?;
		writeln!(self.output, "$$$$")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::BufReader;

	const ETHANOL: &str = "\
ethanol
  test

  9  8  0  0  0  0  0  0  0  0999 V2000
   -0.8876    0.1519    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.4643   -0.5337    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5571    0.4145    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
   -1.7030   -0.5711    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.9666    0.7750    0.8901 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.9666    0.7750   -0.8901 H   0  0  0  0  0  0  0  0  0  0  0  0
    0.5437   -1.1577    0.8935 H   0  0  0  0  0  0  0  0  0  0  0  0
    0.5437   -1.1577   -0.8935 H   0  0  0  0  0  0  0  0  0  0  0  0
    2.3802   -0.0935    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
  1  4  1  0
  1  5  1  0
  1  6  1  0
  2  7  1  0
  2  8  1  0
  3  9  1  0
M  END
> <id>
42

$$$$
";

	#[test]
	fn reads_a_v2000_record() {
		let mut reader = SdReader::new(BufReader::new(ETHANOL.as_bytes()), "test");
		let mol = reader.read().unwrap().unwrap();
		assert_eq!(mol.name, "ethanol");
		assert_eq!(mol.atoms.len(), 9);
		assert_eq!(mol.bonds.len(), 8);
		assert_eq!(mol.atoms[2].symbol(), "O");
		assert_eq!(mol.bonds[1], Bond { from: 1, to: 2, bond_type: 1, stereo: 0 });
		// End of input after the only record.
		assert!(reader.read().unwrap().is_none());
	}

	#[test]
	fn skip_advances_one_record() {
		let two = format!("{}{}", ETHANOL, ETHANOL);
		let mut reader = SdReader::new(BufReader::new(two.as_bytes()), "test");
		assert!(reader.skip().unwrap());
		let mol = reader.read().unwrap().unwrap();
		assert_eq!(mol.name, "ethanol");
		assert!(!reader.skip().unwrap());
	}

	#[test]
	fn round_trips_through_the_writer() {
		let mut reader = SdReader::new(BufReader::new(ETHANOL.as_bytes()), "test");
		let mut mol = reader.read().unwrap().unwrap();
		mol.atoms[2].charge = -1;

		let mut buffer = Vec::new();
		SdWriter::new(&mut buffer).write(&mol).unwrap();

		let mut again = SdReader::new(BufReader::new(buffer.as_slice()), "round-trip");
		let back = again.read().unwrap().unwrap();
		assert_eq!(back.name, mol.name);
		assert_eq!(back.atoms.len(), mol.atoms.len());
		assert_eq!(back.bonds, mol.bonds);
		assert_eq!(back.atoms[2].charge, -1);
	}

	#[test]
	fn field_is_empty_when_a_column_splits_a_character() {
		assert_eq!(field("abcdef", 0, 3), "abc");
		// "α" is 2 bytes; a column boundary inside it yields an empty field.
		assert_eq!(field("ααα", 0, 3), "");
		assert_eq!(field("ab", 5, 3), "");
	}

	#[test]
	fn multibyte_garbage_is_a_parse_error_not_a_panic() {
		// The é straddles the byte-10 column boundary of the x field.
		let broken = concat!(
			"name\nprog\ncomment\n",
			"  1  0  0  0  0  0  0  0  0  0999 V2000\n",
			"  0.0000 é   0.0000    0.0000 C   0  0\n",
			"$$$$\n",
		);
		let mut reader = SdReader::new(BufReader::new(broken.as_bytes()), "broken");
		let err = reader.read().unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}

	#[test]
	fn truncated_record_is_a_parse_error() {
		let broken = "name\nprog\ncomment\n  2  1  0  0  0  0  0  0  0  0999 V2000\n";
		let mut reader = SdReader::new(BufReader::new(broken.as_bytes()), "broken");
		let err = reader.read().unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}
}
