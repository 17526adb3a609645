use crate::consts::ConstantPool;
use crate::{IResult, ReaderError};
use nom::bytes::complete::tag;
use nom::combinator::map;
use nom::error::context;
use nom::multi::length_count;
use nom::number::complete::be_u16;
use webvm_core::ClassAccessFlags;

pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Everything in a class file up to (and including) the interface table. Fields, methods
/// and attributes are of no interest to a loader that only needs to define the class.
#[derive(Clone, Debug)]
pub struct ClassHeader {
	pub minor_version: u16,
	pub major_version: u16,
	pub constant_pool: ConstantPool,
	pub access_flags: ClassAccessFlags,
	pub this_class: u16,
	pub super_class: u16,
	pub interfaces: Vec<u16>,
}

impl ClassHeader {
	pub fn parse(input: &[u8]) -> IResult<'_, Self> {
		let (input, _) = context("CAFE", tag(b"\xca\xfe\xba\xbe"))(input)?;
		let (input, minor_version) = context("Java Minor Version", be_u16)(input)?;
		let (input, major_version) = context("Java Major Version", be_u16)(input)?;
		let (input, constant_pool) = context("Constant Pool", ConstantPool::parse)(input)?;
		let (input, access_flags) = context(
			"Access flags",
			map(be_u16, ClassAccessFlags::from_bits_truncate),
		)(input)?;
		let (input, this_class) = context("This class", be_u16)(input)?;
		let (input, super_class) = context("Class Superclass", be_u16)(input)?;
		let (input, interfaces) = context("Interfaces", length_count(be_u16, be_u16))(input)?;

		Ok((
			input,
			ClassHeader {
				minor_version,
				major_version,
				constant_pool,
				access_flags,
				this_class,
				super_class,
				interfaces,
			},
		))
	}

	/// Parses and validates the header. The constant pool references used by
	/// [`ClassHeader::this_name`] are checked here so later lookups cannot fail.
	pub fn read(data: &[u8]) -> Result<ClassHeader, ReaderError> {
		if data.len() >= 4 {
			let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
			if magic != CLASS_MAGIC {
				return Err(ReaderError::BadMagic(magic));
			}
		}

		let (_, header) = ClassHeader::parse(data).map_err(|err| ReaderError::from_nom(data, err))?;
		header.constant_pool.class_name(header.this_class)?;
		if header.super_class != 0 {
			header.constant_pool.class_name(header.super_class)?;
		}
		for interface in &header.interfaces {
			header.constant_pool.class_name(*interface)?;
		}
		Ok(header)
	}

	/// Internal name of the class this file declares, e.g. `com/example/Foo`.
	pub fn this_name(&self) -> &str {
		self.constant_pool.class_name(self.this_class).unwrap_or_default()
	}

	/// `None` only for `java/lang/Object` and module-info files.
	pub fn super_name(&self) -> Option<&str> {
		if self.super_class == 0 {
			return None;
		}
		self.constant_pool.class_name(self.super_class).ok()
	}

	pub fn interface_names(&self) -> impl Iterator<Item = &str> + '_ {
		self.interfaces
			.iter()
			.filter_map(|index| self.constant_pool.class_name(*index).ok())
	}
}
