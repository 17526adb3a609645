use crate::{IResult, ReaderError};
use nom::combinator::{map, map_res};
use nom::error::{context, VerboseError, VerboseErrorKind};
use nom::multi::length_data;
use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u8};
use nom::sequence::pair;
use tracing::trace;

#[derive(Clone, Debug, PartialEq)]
pub enum ConstantInfo {
	Utf8(String),
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	Class { name_index: u16 },
	String { string_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
	/// Second slot taken by a preceding long or double.
	Unusable,
}

impl ConstantInfo {
	pub fn parse(input: &[u8]) -> IResult<'_, ConstantInfo> {
		let (input, tag) = be_u8(input)?;
		trace!("constant tag {tag}");
		match tag {
			1 => map_res(length_data(be_u16), |data: &[u8]| {
				cesu8::from_java_cesu8(data).map(|value| ConstantInfo::Utf8(value.into_owned()))
			})(input),
			3 => map(be_i32, ConstantInfo::Integer)(input),
			4 => map(be_f32, ConstantInfo::Float)(input),
			5 => map(be_i64, ConstantInfo::Long)(input),
			6 => map(be_f64, ConstantInfo::Double)(input),
			7 => map(be_u16, |name_index| ConstantInfo::Class { name_index })(input),
			8 => map(be_u16, |string_index| ConstantInfo::String { string_index })(input),
			9 => map(pair(be_u16, be_u16), |(class_index, name_and_type_index)| {
				ConstantInfo::FieldRef {
					class_index,
					name_and_type_index,
				}
			})(input),
			10 => map(pair(be_u16, be_u16), |(class_index, name_and_type_index)| {
				ConstantInfo::MethodRef {
					class_index,
					name_and_type_index,
				}
			})(input),
			11 => map(pair(be_u16, be_u16), |(class_index, name_and_type_index)| {
				ConstantInfo::InterfaceMethodRef {
					class_index,
					name_and_type_index,
				}
			})(input),
			12 => map(pair(be_u16, be_u16), |(name_index, descriptor_index)| {
				ConstantInfo::NameAndType {
					name_index,
					descriptor_index,
				}
			})(input),
			15 => map(pair(be_u8, be_u16), |(reference_kind, reference_index)| {
				ConstantInfo::MethodHandle {
					reference_kind,
					reference_index,
				}
			})(input),
			16 => map(be_u16, |descriptor_index| ConstantInfo::MethodType { descriptor_index })(input),
			17 => map(pair(be_u16, be_u16), |(bootstrap_method_attr_index, name_and_type_index)| {
				ConstantInfo::Dynamic {
					bootstrap_method_attr_index,
					name_and_type_index,
				}
			})(input),
			18 => map(pair(be_u16, be_u16), |(bootstrap_method_attr_index, name_and_type_index)| {
				ConstantInfo::InvokeDynamic {
					bootstrap_method_attr_index,
					name_and_type_index,
				}
			})(input),
			19 => map(be_u16, |name_index| ConstantInfo::Module { name_index })(input),
			20 => map(be_u16, |name_index| ConstantInfo::Package { name_index })(input),
			_ => Err(failure(input, "Unknown constant tag")),
		}
	}

	fn is_wide(&self) -> bool {
		matches!(self, ConstantInfo::Long(_) | ConstantInfo::Double(_))
	}
}

pub(crate) fn failure<'a>(input: &'a [u8], message: &'static str) -> nom::Err<VerboseError<&'a [u8]>> {
	nom::Err::Failure(VerboseError {
		errors: vec![(input, VerboseErrorKind::Context(message))],
	})
}

/// Constant pool with the class file's one-based indexing. Index zero is never valid.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
	values: Vec<ConstantInfo>,
}

impl ConstantPool {
	pub fn new(values: Vec<ConstantInfo>) -> ConstantPool {
		ConstantPool { values }
	}

	pub fn parse(input: &[u8]) -> IResult<'_, ConstantPool> {
		let (mut input, count) = context("Constant pool count", be_u16)(input)?;
		let slots = count.saturating_sub(1) as usize;
		let mut values = Vec::with_capacity(slots);
		while values.len() < slots {
			let (rest, value) = context("Constant", ConstantInfo::parse)(input)?;
			input = rest;
			let wide = value.is_wide();
			values.push(value);
			if wide {
				values.push(ConstantInfo::Unusable);
			}
		}

		// A wide constant in the last slot spills over the declared count.
		if values.len() > slots {
			return Err(failure(input, "Wide constant overflows the pool"));
		}

		Ok((input, ConstantPool { values }))
	}

	pub fn get(&self, index: u16) -> Option<&ConstantInfo> {
		let index = (index as usize).checked_sub(1)?;
		self.values.get(index)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn utf8(&self, index: u16) -> Result<&str, ReaderError> {
		match self.get(index) {
			Some(ConstantInfo::Utf8(value)) => Ok(value.as_str()),
			_ => Err(ReaderError::BadConstant(index)),
		}
	}

	/// Internal (slash separated) name of the class constant at `index`.
	pub fn class_name(&self, index: u16) -> Result<&str, ReaderError> {
		match self.get(index) {
			Some(ConstantInfo::Class { name_index }) => self.utf8(*name_index),
			_ => Err(ReaderError::BadConstant(index)),
		}
	}
}
