pub const CLASS_FILE_SUFFIX: &str = ".class";

/// `com.acme.Foo` -> `/com/acme/Foo.class` (or without the leading slash).
pub fn binary_name_to_path(binary_name: &str, with_leading_slash: bool) -> String {
	// 1 for the leading '/', 6 for ".class"
	let mut path = String::with_capacity(7 + binary_name.len());
	if with_leading_slash {
		path.push('/');
	}
	path.extend(binary_name.chars().map(|c| if c == '.' { '/' } else { c }));
	path.push_str(CLASS_FILE_SUFFIX);
	path
}

/// Resource names are relative to the class path root; resource root paths are absolute.
pub fn name_to_path(name: &str) -> String {
	if name.starts_with('/') {
		return name.to_string();
	}
	let mut path = String::with_capacity(1 + name.len());
	path.push('/');
	path.push_str(name);
	path
}

/// `/com/acme/Foo.class` -> `com/acme/Foo`.
pub fn path_to_internal_name(path: &str) -> &str {
	let path = path.strip_prefix('/').unwrap_or(path);
	path.strip_suffix(CLASS_FILE_SUFFIX).unwrap_or(path)
}

pub fn internal_to_binary_name(internal_name: &str) -> String {
	internal_name.replace('/', ".")
}

pub fn binary_to_internal_name(binary_name: &str) -> String {
	binary_name.replace('.', "/")
}

/// The package of a binary name, `None` for the unnamed package.
pub fn package_name(binary_name: &str) -> Option<&str> {
	binary_name.rfind('.').map(|pos| &binary_name[..pos])
}

pub fn is_class_resource(name: &str) -> bool {
	name.ends_with(CLASS_FILE_SUFFIX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn class_paths() {
		assert_eq!(binary_name_to_path("com.acme.Foo", true), "/com/acme/Foo.class");
		assert_eq!(binary_name_to_path("Foo", false), "Foo.class");
		assert_eq!(path_to_internal_name("/com/acme/Foo.class"), "com/acme/Foo");
		assert_eq!(internal_to_binary_name("com/acme/Foo$Inner"), "com.acme.Foo$Inner");
	}

	#[test]
	fn resource_paths() {
		assert_eq!(name_to_path("logging.properties"), "/logging.properties");
		assert_eq!(name_to_path("/META-INF/x"), "/META-INF/x");
	}

	#[test]
	fn packages() {
		assert_eq!(package_name("com.acme.Foo"), Some("com.acme"));
		assert_eq!(package_name("Foo"), None);
	}
}
