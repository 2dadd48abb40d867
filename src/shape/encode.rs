//! Text and binary transport encodings for fingerprints.
//!
//! The canonical packed representation: bit `i` is coverage of reference
//! point `i`, lowest index first, packed 8 to a byte starting at each
//! byte's least significant bit. Everything else here is derived from it.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use bitvec::vec::BitVec;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Render a fingerprint as a '0'/'1' string, lowest index first.
pub fn bit_string(bits: &BitVec) -> String {
	bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
}

/// Parse a '0'/'1' string, lowest index first.
pub fn parse_bit_string(s: &str) -> io::Result<BitVec> {
	let mut bits = BitVec::with_capacity(s.len());
	for c in s.chars() {
		match c {
			'0' => bits.push(false),
			'1' => bits.push(true),
			_ => {
				return Err(io::Error::new(
					io::ErrorKind::InvalidData,
					format!("invalid fingerprint character '{c}'"),
				))
			}
		}
	}
	Ok(bits)
}

/// Canonical packed bytes, zero-padded to a whole byte.
pub fn packed_bytes(bits: &BitVec) -> Vec<u8> {
	let mut bytes = vec![0u8; bits.len().div_ceil(8)];
	for i in bits.iter_ones() {
		bytes[i / 8] |= 1 << (i % 8);
	}
	bytes
}

/// Rebuild a fingerprint of `num_bits` from its canonical packed bytes.
pub fn from_packed_bytes(bytes: &[u8], num_bits: usize) -> io::Result<BitVec> {
	if bytes.len() < num_bits.div_ceil(8) {
		return Err(io::Error::new(
			io::ErrorKind::InvalidData,
			format!("{} packed bytes cannot hold {num_bits} bits", bytes.len()),
		));
	}
	let mut bits = BitVec::repeat(false, num_bits);
	for i in 0..num_bits {
		if bytes[i / 8] & (1 << (i % 8)) != 0 {
			bits.set(i, true);
		}
	}
	Ok(bits)
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(data)?;
	encoder.finish()
}

fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
	let mut decoder = GzDecoder::new(data);
	let mut out = Vec::new();
	decoder.read_to_end(&mut out)?;
	Ok(out)
}

fn b64_decode(text: &str) -> io::Result<Vec<u8>> {
	B64.decode(text)
		.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// base64(gzip(packed bytes)) — the compact binary transport form.
pub fn packed_base64(bits: &BitVec) -> io::Result<String> {
	Ok(B64.encode(gzip(&packed_bytes(bits))?))
}

/// Invert `packed_base64`; `num_bits` restores the exact length.
pub fn from_packed_base64(text: &str, num_bits: usize) -> io::Result<BitVec> {
	from_packed_bytes(&gunzip(&b64_decode(text)?)?, num_bits)
}

/// base64(gzip('0'/'1' string)) — the compressed-ASCII transport form.
pub fn bit_string_base64(bits: &BitVec) -> io::Result<String> {
	Ok(B64.encode(gzip(bit_string(bits).as_bytes())?))
}

/// Invert `bit_string_base64`.
pub fn from_bit_string_base64(text: &str) -> io::Result<BitVec> {
	let ascii = gunzip(&b64_decode(text)?)?;
	let s = String::from_utf8(ascii)
		.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
	parse_bit_string(&s)
}

#[cfg(test)]
mod tests {
	use super::*;
	use bitvec::bitvec;

	fn sample() -> BitVec {
		let mut bits = bitvec![0; 37];
		for i in [0usize, 3, 8, 9, 20, 36] {
			bits.set(i, true);
		}
		bits
	}

	#[test]
	fn bit_string_is_lowest_index_first() {
		let mut bits = BitVec::repeat(false, 5);
		bits.set(0, true);
		bits.set(3, true);
		assert_eq!(bit_string(&bits), "10010");
		assert_eq!(parse_bit_string("10010").unwrap(), bits);
	}

	#[test]
	fn packed_bytes_round_trip() {
		let bits = sample();
		let bytes = packed_bytes(&bits);
		assert_eq!(bytes.len(), 5);
		assert_eq!(bytes[0], 0b0000_1001); // bits 0 and 3
		assert_eq!(bytes[1], 0b0000_0011); // bits 8 and 9
		assert_eq!(from_packed_bytes(&bytes, bits.len()).unwrap(), bits);
	}

	#[test]
	fn compressed_forms_round_trip() {
		let bits = sample();
		let packed = packed_base64(&bits).unwrap();
		assert_eq!(from_packed_base64(&packed, bits.len()).unwrap(), bits);

		let ascii = bit_string_base64(&bits).unwrap();
		assert_eq!(from_bit_string_base64(&ascii).unwrap(), bits);
	}

	#[test]
	fn bad_input_is_invalid_data() {
		assert!(parse_bit_string("10x1").is_err());
		assert!(from_packed_bytes(&[0u8], 16).is_err());
		assert!(from_packed_base64("!!!", 8).is_err());
	}
}
