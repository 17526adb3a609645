use nom::error::{VerboseError, VerboseErrorKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
	#[error("truncated input")]
	Truncated,
	#[error("bad magic number {0:#010x}")]
	BadMagic(u32),
	#[error("malformed input: {0}")]
	Malformed(String),
	#[error("constant pool index {0} does not point at the expected entry")]
	BadConstant(u16),
}

impl ReaderError {
	/// Turns a nom failure into something readable, keeping the innermost context and
	/// the byte offset it happened at.
	pub fn from_nom(source: &[u8], error: nom::Err<VerboseError<&[u8]>>) -> ReaderError {
		let error = match error {
			nom::Err::Incomplete(_) => return ReaderError::Truncated,
			nom::Err::Error(error) | nom::Err::Failure(error) => error,
		};

		let mut output = String::new();
		let mut truncated = false;
		for (remaining, kind) in error.errors.iter() {
			let location = source.len() - remaining.len();
			match kind {
				VerboseErrorKind::Context(context) => {
					if !output.is_empty() {
						output.push_str(" <- ");
					}
					output.push_str(&format!("[{location}..] {context}"));
				}
				VerboseErrorKind::Nom(nom::error::ErrorKind::Eof) => truncated = true,
				VerboseErrorKind::Nom(kind) => {
					if !output.is_empty() {
						output.push_str(" <- ");
					}
					output.push_str(&format!("[{location}..] {}", kind.description()));
				}
				VerboseErrorKind::Char(c) => {
					output.push_str(&format!("[{location}..] expected '{c}'"));
				}
			}
		}

		if truncated && output.is_empty() {
			return ReaderError::Truncated;
		}
		if output.is_empty() {
			output.push_str("unknown error");
		}
		ReaderError::Malformed(output)
	}
}
