//! Similarity and distance measures over same-length fingerprints and
//! count vectors. Comparisons are only meaningful between fingerprints
//! produced at the same fold level; a length mismatch is an error, never
//! silently truncated.

use bitvec::slice::BitSlice;

use crate::shape::error::ShapeError;

fn check_lengths(left: usize, right: usize) -> Result<(), ShapeError> {
	if left != right {
		return Err(ShapeError::LengthMismatch { left, right });
	}
	Ok(())
}

/// Tanimoto similarity over bit vectors: |A∩B| / |A∪B|.
/// Two all-zero fingerprints count as identical.
pub fn tanimoto(a: &BitSlice, b: &BitSlice) -> Result<f64, ShapeError> {
	check_lengths(a.len(), b.len())?;
	let mut both = 0usize;
	let mut either = 0usize;
	for (x, y) in a.iter().by_vals().zip(b.iter().by_vals()) {
		if x && y {
			both += 1;
		}
		if x || y {
			either += 1;
		}
	}
	if either == 0 {
		return Ok(1.0);
	}
	Ok(both as f64 / either as f64)
}

/// Tversky similarity over bit vectors: c / (α·|A−B| + β·|B−A| + c).
pub fn tversky(a: &BitSlice, b: &BitSlice, alpha: f64, beta: f64) -> Result<f64, ShapeError> {
	check_lengths(a.len(), b.len())?;
	let mut both = 0usize;
	let mut a_only = 0usize;
	let mut b_only = 0usize;
	for (x, y) in a.iter().by_vals().zip(b.iter().by_vals()) {
		match (x, y) {
			(true, true) => both += 1,
			(true, false) => a_only += 1,
			(false, true) => b_only += 1,
			(false, false) => {}
		}
	}
	let denom = alpha * a_only as f64 + beta * b_only as f64 + both as f64;
	if denom == 0.0 {
		return Ok(1.0);
	}
	Ok(both as f64 / denom)
}

/// Tanimoto similarity over count vectors: a·b / (a·a + b·b − a·b).
pub fn tanimoto_counts(a: &[f64], b: &[f64]) -> Result<f64, ShapeError> {
	check_lengths(a.len(), b.len())?;
	let mut dot = 0.0;
	let mut a_sq = 0.0;
	let mut b_sq = 0.0;
	for (x, y) in a.iter().zip(b.iter()) {
		dot += x * y;
		a_sq += x * x;
		b_sq += y * y;
	}
	let denom = a_sq + b_sq - dot;
	if denom == 0.0 {
		return Ok(1.0);
	}
	Ok(dot / denom)
}

/// Cosine similarity over count vectors.
pub fn cosine_counts(a: &[f64], b: &[f64]) -> Result<f64, ShapeError> {
	check_lengths(a.len(), b.len())?;
	let mut dot = 0.0;
	let mut a_sq = 0.0;
	let mut b_sq = 0.0;
	for (x, y) in a.iter().zip(b.iter()) {
		dot += x * y;
		a_sq += x * x;
		b_sq += y * y;
	}
	let denom = (a_sq * b_sq).sqrt();
	if denom == 0.0 {
		return Ok(if a_sq == b_sq { 1.0 } else { 0.0 });
	}
	Ok(dot / denom)
}

/// Euclidean distance over count vectors.
pub fn euclidean_counts(a: &[f64], b: &[f64]) -> Result<f64, ShapeError> {
	check_lengths(a.len(), b.len())?;
	let mut sum = 0.0;
	for (x, y) in a.iter().zip(b.iter()) {
		let d = x - y;
		sum += d * d;
	}
	Ok(sum.sqrt())
}

#[cfg(test)]
mod tests {
	use super::*;
	use bitvec::bitvec;
	use bitvec::order::Lsb0;

	#[test]
	fn tanimoto_is_overlap_over_union() {
		let a = bitvec![1, 1, 0, 0];
		let b = bitvec![1, 0, 1, 0];
		assert_eq!(tanimoto(&a, &b).unwrap(), 1.0 / 3.0);
		assert_eq!(tanimoto(&a, &a).unwrap(), 1.0);
	}

	#[test]
	fn tanimoto_of_empty_sets_is_one() {
		let a = bitvec![0, 0, 0];
		assert_eq!(tanimoto(&a, &a).unwrap(), 1.0);
	}

	#[test]
	fn length_mismatch_is_an_error() {
		let a = bitvec![1, 0];
		let b = bitvec![1, 0, 1];
		assert!(matches!(
			tanimoto(&a, &b).unwrap_err(),
			ShapeError::LengthMismatch { left: 2, right: 3 }
		));
		assert!(cosine_counts(&[1.0], &[1.0, 2.0]).is_err());
	}

	#[test]
	fn tversky_with_unit_weights_matches_tanimoto() {
		let a = bitvec![1, 1, 1, 0, 0];
		let b = bitvec![0, 1, 1, 1, 0];
		let tv = tversky(&a, &b, 1.0, 1.0).unwrap();
		let ta = tanimoto(&a, &b).unwrap();
		assert!((tv - ta).abs() < 1e-12);
	}

	#[test]
	fn count_measures_on_simple_vectors() {
		let a = [1.0, 2.0, 3.0];
		let b = [1.0, 2.0, 3.0];
		assert!((tanimoto_counts(&a, &b).unwrap() - 1.0).abs() < 1e-12);
		assert!((cosine_counts(&a, &b).unwrap() - 1.0).abs() < 1e-12);
		assert_eq!(euclidean_counts(&a, &b).unwrap(), 0.0);

		let c = [0.0, 0.0, 0.0];
		assert_eq!(euclidean_counts(&a, &c).unwrap(), (14.0f64).sqrt());
	}
}
