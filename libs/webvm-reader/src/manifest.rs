use crate::ReaderError;
use ahash::{HashMap, HashMapExt};

pub const SEALED: &str = "Sealed";
pub const SPECIFICATION_TITLE: &str = "Specification-Title";
pub const SPECIFICATION_VERSION: &str = "Specification-Version";
pub const SPECIFICATION_VENDOR: &str = "Specification-Vendor";
pub const IMPLEMENTATION_TITLE: &str = "Implementation-Title";
pub const IMPLEMENTATION_VERSION: &str = "Implementation-Version";
pub const IMPLEMENTATION_VENDOR: &str = "Implementation-Vendor";

/// One manifest section. Attribute names compare case-insensitively, values keep their case.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
	values: Vec<(String, String)>,
}

impl Attributes {
	pub fn get(&self, name: &str) -> Option<&str> {
		self.values
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let value = value.into();
		match self.values.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
			Some(slot) => slot.1 = value,
			None => self.values.push((name, value)),
		}
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// A parsed `META-INF/MANIFEST.MF`.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
	main: Attributes,
	entries: HashMap<String, Attributes>,
}

impl Manifest {
	pub fn new() -> Manifest {
		Manifest {
			main: Attributes::default(),
			entries: HashMap::new(),
		}
	}

	pub fn read(data: &[u8]) -> Result<Manifest, ReaderError> {
		let text = std::str::from_utf8(data)
			.map_err(|err| ReaderError::Malformed(format!("manifest is not UTF-8: {err}")))?;
		Manifest::parse(text)
	}

	/// Parses the manifest text format: `Name: value` headers, continuation lines starting
	/// with a single space, sections separated by blank lines. Every section after the main
	/// one must start with a `Name` header.
	pub fn parse(text: &str) -> Result<Manifest, ReaderError> {
		let mut manifest = Manifest::new();
		let mut section: Vec<(String, String)> = Vec::new();
		let mut main_done = false;

		let lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));
		for (number, line) in lines.enumerate() {
			if line.is_empty() {
				manifest.finish_section(&mut section, &mut main_done)?;
				continue;
			}

			if let Some(rest) = line.strip_prefix(' ') {
				match section.last_mut() {
					Some((_, value)) => value.push_str(rest),
					None => {
						return Err(ReaderError::Malformed(format!(
							"manifest line {}: continuation without a header",
							number + 1
						)))
					}
				}
				continue;
			}

			let Some((name, value)) = line.split_once(':') else {
				return Err(ReaderError::Malformed(format!(
					"manifest line {}: missing ':'",
					number + 1
				)));
			};
			let value = value.strip_prefix(' ').unwrap_or(value);
			section.push((name.trim().to_string(), value.to_string()));
		}
		manifest.finish_section(&mut section, &mut main_done)?;
		Ok(manifest)
	}

	fn finish_section(
		&mut self,
		section: &mut Vec<(String, String)>,
		main_done: &mut bool,
	) -> Result<(), ReaderError> {
		if section.is_empty() {
			return Ok(());
		}

		let mut attributes = Attributes::default();
		let mut entry_name = None;
		for (key, value) in section.drain(..) {
			if *main_done && entry_name.is_none() && key.eq_ignore_ascii_case("Name") {
				entry_name = Some(value);
			} else {
				attributes.insert(key, value);
			}
		}

		if !*main_done {
			self.main = attributes;
			*main_done = true;
			return Ok(());
		}

		match entry_name {
			Some(name) => {
				self.entries.entry(name).or_default().values.extend(attributes.values);
				Ok(())
			}
			None => Err(ReaderError::Malformed(
				"manifest section without a Name header".to_string(),
			)),
		}
	}

	pub fn main_attributes(&self) -> &Attributes {
		&self.main
	}

	pub fn main_attributes_mut(&mut self) -> &mut Attributes {
		&mut self.main
	}

	pub fn attributes(&self, name: &str) -> Option<&Attributes> {
		self.entries.get(name)
	}

	pub fn attributes_mut(&mut self, name: &str) -> &mut Attributes {
		self.entries.entry(name.to_string()).or_default()
	}

	/// Per-package `Sealed` wins over the main section's.
	pub fn is_package_sealed(&self, package: &str) -> bool {
		let path = format!("{}/", package.replace('.', "/"));
		let sealed = self
			.attributes(&path)
			.and_then(|attributes| attributes.get(SEALED))
			.or_else(|| self.main.get(SEALED));
		sealed.is_some_and(|value| value.eq_ignore_ascii_case("true"))
	}

	/// Looks an attribute up in the package section first, then in the main section.
	pub fn package_attribute(&self, package: &str, name: &str) -> Option<&str> {
		let path = format!("{}/", package.replace('.', "/"));
		self.attributes(&path)
			.and_then(|attributes| attributes.get(name))
			.or_else(|| self.main.get(name))
	}
}
