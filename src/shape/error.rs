use thiserror::Error;

/// Errors surfaced by the shape fingerprinting pipeline.
///
/// Index/size errors and SVD failure are reported synchronously to the
/// immediate caller; nothing here is retried internally.
#[derive(Error, Debug)]
pub enum ShapeError {
	#[error("bit buffer too small: have {have} bits, need at least {need}")]
	BitBufferTooSmall { have: usize, need: usize },

	#[error("cannot fold a {size}-point fingerprint {num_folds} times")]
	InvalidFolds { num_folds: u32, size: usize },

	#[error("cannot find an alignment for an empty point cloud")]
	EmptyCloud,

	#[error("singular value decomposition did not converge")]
	SvdFailed,

	#[error("deadline exceeded while fingerprinting '{0}'")]
	DeadlineExceeded(String),

	#[error("vector lengths differ: {left} vs {right}")]
	LengthMismatch { left: usize, right: usize },
}
