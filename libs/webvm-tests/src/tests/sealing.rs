use webvm_core::Lifecycle;
use webvm_loader::{ClassLoadError, LoaderConfig, SecurityViolation};
use webvm_reader::Manifest;
use webvm_resources::MemoryJar;

use crate::{class_bytes, Webapp};

fn sealed_manifest() -> eyre::Result<Manifest> {
	Ok(Manifest::parse(
		"Manifest-Version: 1.0\r\n\
		Implementation-Version: 2.0\r\n\
		\r\n\
		Name: com/acme/sealed/\r\n\
		Sealed: true\r\n",
	)?)
}

fn split_package(config: LoaderConfig) -> eyre::Result<Webapp> {
	let webapp = Webapp::new(config);
	webapp.root.add_jar(
		MemoryJar::new("sealed.jar")
			.with_manifest(sealed_manifest()?)
			.with_class("com.acme.sealed.A", class_bytes("com.acme.sealed.A")),
	);
	webapp.root.add_jar(
		MemoryJar::new("other.jar").with_class("com.acme.sealed.B", class_bytes("com.acme.sealed.B")),
	);
	webapp.loader.start()?;
	Ok(webapp)
}

#[test]
fn sealed_packages_reject_foreign_classes() -> eyre::Result<()> {
	let webapp = split_package(LoaderConfig::default())?;
	let a = webapp.loader.load_class("com.acme.sealed.A", false)?;
	assert_eq!(a.package_name(), Some("com.acme.sealed"));

	match webapp.loader.load_class("com.acme.sealed.B", false) {
		Err(ClassLoadError::Security {
			violation: SecurityViolation::Sealing { package },
			..
		}) => assert_eq!(package, "com.acme.sealed"),
		other => panic!("unexpected {other:?}"),
	}
	Ok(())
}

#[test]
fn unsealed_packages_reject_sealing_archives() -> eyre::Result<()> {
	let webapp = split_package(LoaderConfig::default())?;
	webapp.loader.load_class("com.acme.sealed.B", false)?;
	assert!(matches!(
		webapp.loader.load_class("com.acme.sealed.A", false),
		Err(ClassLoadError::Security {
			violation: SecurityViolation::Sealing { .. },
			..
		})
	));
	Ok(())
}

#[test]
fn sealing_can_be_disabled() -> eyre::Result<()> {
	let webapp = split_package(LoaderConfig {
		enforce_sealing: false,
		..LoaderConfig::default()
	})?;
	webapp.loader.load_class("com.acme.sealed.A", false)?;
	webapp.loader.load_class("com.acme.sealed.B", false)?;
	Ok(())
}
