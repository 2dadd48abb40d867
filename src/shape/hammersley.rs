use crate::shape::geometry::{Point3D, PointCloud};

/// Low-discrepancy point generator over the unit cube.
///
/// The k-th point (k = 1..=N) is `(k/N, vdc2(k), vdc3(k))` where `vdcP` is
/// the radix-P van der Corput value: write k in base P, least significant
/// digit first, then sum `digit_i / P^(i+1)`. Pure integer/float arithmetic,
/// so the sequence is bit-identical across runs and platforms.
pub struct Hammersley {
	num_points: u32,
	point_index: u32,
}

/// Bounds for `Hammersley::cuboid`.
#[derive(Debug, Clone, Copy)]
pub struct CuboidParams {
	pub num_points: u32,
	pub xmin: f32,
	pub xmax: f32,
	pub ymin: f32,
	pub ymax: f32,
	pub zmin: f32,
	pub zmax: f32,
}

/// Parameters for `Hammersley::ellipsoid`. `a`, `b`, `c` are squared
/// semi-axis fractions; `scale` is the half-width of the sampled cube.
#[derive(Debug, Clone, Copy)]
pub struct EllipsoidParams {
	pub num_points: u32,
	pub scale: f32,
	pub a: f32,
	pub b: f32,
	pub c: f32,
}

/// Radix-2 van der Corput value of `index`, using the bit pattern directly.
fn vdc_base2(index: u32) -> f32 {
	let mut result = 0.0f32;
	let mut twocount: u64 = 1;
	let mut j = 0u32;
	while twocount <= index as u64 {
		if index & (1 << j) != 0 {
			result += 1.0 / (twocount * 2) as f32;
		}
		j += 1;
		twocount *= 2;
	}
	result
}

/// Radix-`prime` van der Corput value of `index`.
fn vdc_base_n(prime: u32, index: u32) -> f32 {
	let mut digits = Vec::new();
	let mut n = index;
	while n > 0 {
		digits.push(n % prime);
		n /= prime;
	}
	let mut result = 0.0f32;
	let mut count: u64 = 1;
	for &digit in &digits {
		if digit != 0 {
			result += digit as f32 / (count * prime as u64) as f32;
		}
		count *= prime as u64;
	}
	result
}

impl Hammersley {
	pub fn new(num_points: u32) -> Self {
		Self {
			num_points,
			point_index: 0,
		}
	}

	/// Fill a cuboid with up to `num_points` low-discrepancy points.
	///
	/// Oversamples the unit cube scaled to the largest axis and rejects
	/// points outside the normalized box. A zero-extent axis collapses to
	/// zero thickness (every output pinned to its min) rather than
	/// dividing by zero. May return fewer than `num_points` when the
	/// oversampling estimate runs dry.
	pub fn cuboid(params: &CuboidParams) -> PointCloud {
		let mut result = PointCloud::new();
		if params.num_points == 0 {
			return result;
		}
		result.reserve(params.num_points as usize);

		let dxw = params.xmax - params.xmin;
		let dyw = params.ymax - params.ymin;
		let dzw = params.zmax - params.zmin;
		let dw_max = dxw.max(dyw).max(dzw);

		if dw_max <= 0.0 {
			// Fully degenerate request: every point is the corner.
			result.resize(
				params.num_points as usize,
				Point3D::new(params.xmin, params.ymin, params.zmin),
			);
			return result;
		}

		// Dimensions of the subcube within the unit cube. Degenerate axes
		// contribute nothing to the accepted volume fraction.
		let dx = dxw / dw_max;
		let dy = dyw / dw_max;
		let dz = dzw / dw_max;
		let mut fract = 1.0f32;
		for d in [dx, dy, dz] {
			if d > 0.0 {
				fract *= d;
			}
		}

		// How many unit-cube points must be generated so that num_points
		// survive rejection?
		let mut total_points = (params.num_points as f32 / fract) as u32;
		if (total_points as f32 * fract) < params.num_points as f32 {
			total_points += 1;
		}

		let accept = |t: f32, d: f32| d <= 0.0 || t <= d;
		let place = |t: f32, d: f32, min: f32| if d <= 0.0 { min } else { t * dw_max + min };

		for raw in Hammersley::new(total_points) {
			if result.len() >= params.num_points as usize {
				break;
			}
			if accept(raw.x, dx) && accept(raw.y, dy) && accept(raw.z, dz) {
				result.push(Point3D::new(
					place(raw.x, dx, params.xmin),
					place(raw.y, dy, params.ymin),
					place(raw.z, dz, params.zmin),
				));
			}
		}
		result
	}

	/// Fill an ellipsoid with up to `num_points` low-discrepancy points.
	///
	/// Points are generated in `[-scale, scale]^3` and kept iff
	/// `x²/a + y²/b + z²/c < scale²`.
	pub fn ellipsoid(params: &EllipsoidParams) -> PointCloud {
		let mut result = PointCloud::new();
		if params.num_points == 0 {
			return result;
		}
		result.reserve(params.num_points as usize);

		let scale_2 = params.scale * 2.0;
		let scale_sqr = params.scale * params.scale;

		// Fraction of the cube's volume covered by the ellipsoid:
		// V = 4π/3·abc for semi-axes √a·r, √b·r, √c·r inside a cube of
		// volume 8r³ gives π/6·√a·√b·√c.
		let fraction =
			params.a.sqrt() * params.b.sqrt() * params.c.sqrt() * std::f32::consts::PI / 6.0;
		let mut total_points = (params.num_points as f32 / fraction) as u32;
		if (total_points as f32 * fraction) < params.num_points as f32 {
			total_points += 1;
		}

		for raw in Hammersley::new(total_points) {
			if result.len() >= params.num_points as usize {
				break;
			}
			// Scale and mean-center the raw unit-cube point.
			let x = params.scale - scale_2 * raw.x;
			let y = params.scale - scale_2 * raw.y;
			let z = params.scale - scale_2 * raw.z;
			let mag = x * x / params.a + y * y / params.b + z * z / params.c;
			if mag < scale_sqr {
				result.push(Point3D::new(x, y, z));
			}
		}
		result
	}
}

impl Iterator for Hammersley {
	type Item = Point3D;

	fn next(&mut self) -> Option<Point3D> {
		if self.point_index >= self.num_points {
			return None;
		}
		self.point_index += 1;
		let k = self.point_index;
		Some(Point3D::new(
			k as f32 / self.num_points as f32,
			vdc_base2(k),
			vdc_base_n(3, k),
		))
	}
}
