use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use shapefp::mol::molecule::Mol;
use shapefp::mol::sd::SdReader;
use shapefp::shape::axis_aligner::AxisAligner;
use shapefp::shape::encode;
use shapefp::shape::features::{FeatureFinder, NullFeatureFinder, PatternFeatureFinder, default_patterns};
use shapefp::shape::fingerprinter::MolFingerprinter;
use shapefp::shape::geometry::{Point3D, PointCloud};
use shapefp::shape::hammersley::{CuboidParams, EllipsoidParams, Hammersley};
use shapefp::shape::vol_box::VolBox;

/// Default reference clouds, matching the classic 10k/11-radius files.
const DEFAULT_CLOUD_POINTS: u32 = 10240;
const DEFAULT_CLOUD_RADIUS: f32 = 11.0;
const DEFAULT_ELLIPSOID_AXES: [f32; 3] = [1.0, 0.75, 0.5];

fn print_compile_info() {
	eprintln!(
		"shapefp {} (compiled {} {})",
		env!("CARGO_PKG_VERSION"),
		env!("COMPILE_DATE"),
		env!("COMPILE_TIME"),
	);
}

#[derive(Parser)]
#[command(name = "shapefp", version, about = "3D molecular shape fingerprints")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Generate a Hammersley reference cloud as "x y z" lines
	Hammersley(HammersleyArgs),
	/// Fingerprint every conformer of an SD file, 4 lines per conformer
	Fingerprint(FingerprintArgs),
}

#[derive(Args)]
struct HammersleyArgs {
	#[command(subcommand)]
	shape: CloudShape,
}

#[derive(Subcommand)]
enum CloudShape {
	/// Points within an ellipsoid x²/a + y²/b + z²/c < scale²
	Ellipsoid {
		num_points: u32,
		a: f32,
		b: f32,
		c: f32,
		/// Extent of the largest ellipsoid axis
		scale: f32,
	},
	/// Points within an axis-aligned cuboid
	Cuboid {
		num_points: u32,
		xmin: f32,
		xmax: f32,
		ymin: f32,
		ymax: f32,
		zmin: f32,
		zmax: f32,
	},
}

#[derive(Args)]
struct FingerprintArgs {
	/// Input SD file of 3D conformers
	sd_file: PathBuf,

	/// Number of times to fold each fingerprint in half
	#[arg(long, default_value_t = 0)]
	num_folds: u32,

	/// Output format per fingerprint line
	#[arg(long, value_enum, default_value = "A")]
	format: Format,

	/// Append the molecule name to each fingerprint line
	#[arg(long)]
	include_ids: bool,

	/// Scale factor each atom radius is multiplied by during coverage
	/// queries. Applied linearly; older fingerprint tools squared this
	/// value before use
	#[arg(long, default_value_t = 1.0)]
	epsilon: f32,

	/// Add pharmacophore feature channels to each fingerprint
	#[arg(long)]
	features: bool,

	/// Ellipsoid cloud file ("x y z" lines); generated when omitted
	#[arg(long)]
	ellipsoid_cloud: Option<PathBuf>,

	/// Sphere cloud file ("x y z" lines); generated when omitted
	#[arg(long)]
	sphere_cloud: Option<PathBuf>,

	/// Number of worker threads
	#[arg(long, default_value_t = 1)]
	jobs: usize,

	/// Per-molecule deadline; molecules over it are skipped with a warning
	#[arg(long)]
	timeout_ms: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
	/// Plain ASCII bit string
	#[value(name = "A")]
	A,
	/// "B" + base64(gzip(packed bytes))
	#[value(name = "B")]
	B,
	/// "C" + base64(gzip(bit string))
	#[value(name = "C")]
	C,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	print_compile_info();
	match cli.command {
		Command::Hammersley(args) => run_hammersley(&args),
		Command::Fingerprint(args) => run_fingerprint(&args),
	}
}

fn run_hammersley(args: &HammersleyArgs) -> Result<()> {
	let points = match args.shape {
		CloudShape::Ellipsoid {
			num_points,
			a,
			b,
			c,
			scale,
		} => Hammersley::ellipsoid(&EllipsoidParams {
			num_points,
			scale,
			a,
			b,
			c,
		}),
		CloudShape::Cuboid {
			num_points,
			xmin,
			xmax,
			ymin,
			ymax,
			zmin,
			zmax,
		} => Hammersley::cuboid(&CuboidParams {
			num_points,
			xmin,
			xmax,
			ymin,
			ymax,
			zmin,
			zmax,
		}),
	};

	let stdout = std::io::stdout();
	let mut out = BufWriter::new(stdout.lock());
	for p in &points {
		writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
	}
	out.flush()?;
	Ok(())
}

/// Parse an "x y z" cloud file, one point per line.
fn read_cloud(path: &Path) -> Result<PointCloud> {
	let file = File::open(path)
		.with_context(|| format!("cannot open cloud file '{}'", path.display()))?;
	let mut points = PointCloud::new();
	for (line_num, line) in BufReader::new(file).lines().enumerate() {
		let line = line?;
		let mut fields = line.split_whitespace();
		let Some(first) = fields.next() else {
			continue;
		};
		let coord = |s: &str| -> Result<f32> {
			s.parse()
				.with_context(|| format!("{}:{}: bad coordinate '{s}'", path.display(), line_num + 1))
		};
		let x = coord(first)?;
		let (Some(y), Some(z)) = (fields.next(), fields.next()) else {
			bail!("{}:{}: expected 3 coordinates", path.display(), line_num + 1);
		};
		points.push(Point3D::new(x, coord(y)?, coord(z)?));
	}
	Ok(points)
}

fn load_or_generate_clouds(args: &FingerprintArgs) -> Result<(PointCloud, PointCloud)> {
	let [a, b, c] = DEFAULT_ELLIPSOID_AXES;
	let ellipsoid = match &args.ellipsoid_cloud {
		Some(path) => read_cloud(path)?,
		None => Hammersley::ellipsoid(&EllipsoidParams {
			num_points: DEFAULT_CLOUD_POINTS,
			scale: DEFAULT_CLOUD_RADIUS,
			a,
			b,
			c,
		}),
	};
	let sphere = match &args.sphere_cloud {
		Some(path) => read_cloud(path)?,
		None => Hammersley::ellipsoid(&EllipsoidParams {
			num_points: DEFAULT_CLOUD_POINTS,
			scale: DEFAULT_CLOUD_RADIUS,
			a: 1.0,
			b: 1.0,
			c: 1.0,
		}),
	};
	Ok((ellipsoid, sphere))
}

/// Shared pull-source handing workers one indexed record at a time, so an
/// SD file is never materialized whole.
struct MolSource<R: BufRead> {
	reader: SdReader<R>,
	next_index: usize,
}

impl<R: BufRead> MolSource<R> {
	fn new(reader: SdReader<R>) -> Self {
		Self {
			reader,
			next_index: 0,
		}
	}

	fn next(&mut self) -> io::Result<Option<(usize, Mol)>> {
		match self.reader.read()? {
			Some(mol) => {
				let index = self.next_index;
				self.next_index += 1;
				Ok(Some((index, mol)))
			}
			None => Ok(None),
		}
	}
}

/// Restores input order over out-of-order worker results. Only results
/// still waiting on an earlier molecule are buffered.
struct OrderedSink<W: Write> {
	out: W,
	pending: BTreeMap<usize, std::result::Result<Vec<String>, String>>,
	next_index: usize,
	num_written: usize,
	num_skipped: usize,
}

impl<W: Write> OrderedSink<W> {
	fn new(out: W) -> Self {
		Self {
			out,
			pending: BTreeMap::new(),
			next_index: 0,
			num_written: 0,
			num_skipped: 0,
		}
	}

	fn push(
		&mut self,
		index: usize,
		outcome: std::result::Result<Vec<String>, String>,
	) -> io::Result<()> {
		self.pending.insert(index, outcome);
		while let Some(outcome) = self.pending.remove(&self.next_index) {
			self.next_index += 1;
			match outcome {
				Ok(lines) => {
					for line in lines {
						writeln!(self.out, "{line}")?;
					}
					self.num_written += 1;
				}
				Err(warning) => {
					self.num_skipped += 1;
					eprintln!("{warning}");
				}
			}
		}
		Ok(())
	}
}

fn format_fingerprint(
	fp: &bitvec::vec::BitVec,
	format: Format,
	include_ids: bool,
	name: &str,
) -> Result<String> {
	let mut line = match format {
		Format::A => encode::bit_string(fp),
		Format::B => format!("B{}", encode::packed_base64(fp)?),
		Format::C => format!("C{}", encode::bit_string_base64(fp)?),
	};
	if include_ids {
		line.push(' ');
		line.push_str(name);
	}
	Ok(line)
}

/// All output lines for one molecule, or a warning message for the skip.
fn fingerprint_one(
	mfp: &mut MolFingerprinter,
	mol: &Mol,
	args: &FingerprintArgs,
) -> std::result::Result<Vec<String>, String> {
	let mut run = || -> Result<Vec<String>> {
		mfp.set_molecule(mol)?;
		let mut lines = Vec::with_capacity(4);
		while let Some(fp) = mfp.next_fingerprint()? {
			lines.push(format_fingerprint(&fp, args.format, args.include_ids, &mol.name)?);
		}
		Ok(lines)
	};
	run().map_err(|e| format!("skipping '{}': {e:#}", mol.name))
}

fn make_finder(features: bool) -> Box<dyn FeatureFinder + Send> {
	if features {
		Box::new(PatternFeatureFinder::new(default_patterns()))
	} else {
		Box::new(NullFeatureFinder)
	}
}

fn run_fingerprint(args: &FingerprintArgs) -> Result<()> {
	let (ellipsoid, sphere) = load_or_generate_clouds(args)?;
	let vol_box = Arc::new(VolBox::new(&ellipsoid, args.epsilon));
	let aligner = Arc::new(AxisAligner::new(&sphere, args.epsilon, true));
	let timeout = args.timeout_ms.map(Duration::from_millis);

	let file = File::open(&args.sd_file)
		.with_context(|| format!("cannot open sd file '{}'", args.sd_file.display()))?;
	let source = Mutex::new(MolSource::new(SdReader::new(
		BufReader::new(file),
		&args.sd_file.display().to_string(),
	)));
	let sink = Mutex::new(OrderedSink::new(BufWriter::new(io::stdout())));
	let failure: Mutex<Option<anyhow::Error>> = Mutex::new(None);

	let pb = ProgressBar::new_spinner();
	pb.set_style(
		ProgressStyle::default_spinner()
		.template("Fingerprinting: {pos} molecules ({per_sec})")
		.unwrap(),
	);

	// First error wins; the other workers drain and stop.
	let fail = |err: anyhow::Error| {
		let mut slot = failure.lock().unwrap();
		if slot.is_none() {
			*slot = Some(err);
		}
	};

	thread::scope(|scope| {
		for _ in 0..args.jobs.max(1) {
			scope.spawn(|| {
				let mut mfp = MolFingerprinter::with_parts(
					Arc::clone(&vol_box),
					Arc::clone(&aligner),
					args.num_folds,
					make_finder(args.features),
				);
				mfp.set_timeout(timeout);
				loop {
					if failure.lock().unwrap().is_some() {
						break;
					}
					let pulled = source.lock().unwrap().next();
					let (index, mol) = match pulled {
						Ok(Some(next)) => next,
						Ok(None) => break,
						Err(err) => {
							fail(err.into());
							break;
						}
					};
					let outcome = fingerprint_one(&mut mfp, &mol, args);
					if let Err(err) = sink.lock().unwrap().push(index, outcome) {
						fail(err.into());
						break;
					}
					pb.inc(1);
				}
			});
		}
	});
	pb.finish_and_clear();

	if let Some(err) = failure.into_inner().unwrap() {
		return Err(err);
	}
	let mut sink = sink.into_inner().unwrap();
	sink.out.flush()?;
	eprintln!(
		"Fingerprinted {} of {} molecules.",
		sink.num_written,
		sink.num_written + sink.num_skipped
	);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ordered_sink_restores_input_order() {
		let mut sink = OrderedSink::new(Vec::new());
		sink.push(1, Ok(vec!["second".into()])).unwrap();
		// Nothing is written until the earlier molecule arrives.
		assert!(sink.out.is_empty());
		sink.push(2, Err("skipped".into())).unwrap();
		sink.push(0, Ok(vec!["first".into()])).unwrap();

		assert_eq!(String::from_utf8(sink.out.clone()).unwrap(), "first\nsecond\n");
		assert_eq!(sink.num_written, 2);
		assert_eq!(sink.num_skipped, 1);
		assert!(sink.pending.is_empty());
	}

	#[test]
	fn mol_source_streams_indexed_records() {
		const RECORD: &str =
			"mol\nprog\n\n  0  0  0  0  0  0  0  0  0  0999 V2000\nM  END\n$$$$\n";
		let two = format!("{RECORD}{RECORD}");
		let mut source = MolSource::new(SdReader::new(BufReader::new(two.as_bytes()), "test"));

		let (index, mol) = source.next().unwrap().unwrap();
		assert_eq!(index, 0);
		assert_eq!(mol.name, "mol");
		assert_eq!(source.next().unwrap().unwrap().0, 1);
		assert!(source.next().unwrap().is_none());
	}
}
