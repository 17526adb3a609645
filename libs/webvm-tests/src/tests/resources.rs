use std::sync::Arc;

use webvm_core::Lifecycle;
use webvm_loader::LoaderConfig;
use webvm_resources::{MemoryJar, MemoryResourceRoot, Repository, ResourceRef, ResourceUrl, WebResourceRoot};

use crate::Webapp;

/// Serves the class path of an existing root under a second repository URL.
struct Mirror(Arc<MemoryResourceRoot>);

impl Repository for Mirror {
	fn url(&self) -> ResourceUrl {
		ResourceUrl::new("memory:/mirror")
	}

	fn find(&self, path: &str) -> Option<ResourceRef> {
		let resource = self.0.get_class_loader_resource(path);
		resource.exists().then_some(resource)
	}
}

fn webapp() -> eyre::Result<Webapp> {
	let webapp = Webapp::new(LoaderConfig::default());
	webapp.root.put("/WEB-INF/classes/conf/app.xml", b"classes".to_vec());
	webapp
		.root
		.add_jar(MemoryJar::new("a.jar").with_entry("conf/app.xml", b"a".to_vec()));
	webapp.root.add_jar(
		MemoryJar::new("b.jar")
			.with_entry("conf/app.xml", b"b".to_vec())
			.with_entry("conf/only-b.xml", b"only b".to_vec()),
	);
	webapp.shared.add_resource("conf/app.xml", b"shared".to_vec());
	webapp.loader.start()?;
	Ok(webapp)
}

fn strings(urls: Vec<ResourceUrl>) -> Vec<String> {
	urls.into_iter().map(|url| url.to_string()).collect()
}

#[test]
fn every_location_in_discovery_order() -> eyre::Result<()> {
	let webapp = webapp()?;
	assert_eq!(
		strings(webapp.loader.find_resources("conf/app.xml")),
		vec![
			"memory:/app/WEB-INF/classes/conf/app.xml",
			"jar:memory:/app/WEB-INF/lib/a.jar!/conf/app.xml",
			"jar:memory:/app/WEB-INF/lib/b.jar!/conf/app.xml",
		]
	);
	assert_eq!(
		strings(webapp.loader.get_resources("conf/app.xml")),
		vec![
			"memory:/app/WEB-INF/classes/conf/app.xml",
			"jar:memory:/app/WEB-INF/lib/a.jar!/conf/app.xml",
			"jar:memory:/app/WEB-INF/lib/b.jar!/conf/app.xml",
			"loader:shared/conf/app.xml",
		]
	);
	Ok(())
}

#[test]
fn first_match_wins() -> eyre::Result<()> {
	let webapp = webapp()?;
	assert_eq!(
		webapp.loader.get_resource_as_stream("conf/app.xml"),
		Some(b"classes".to_vec())
	);
	assert_eq!(
		webapp.loader.get_resource_as_stream("/conf/only-b.xml"),
		Some(b"only b".to_vec())
	);
	assert_eq!(
		webapp.loader.find_resource("conf/only-b.xml").map(|url| url.to_string()),
		Some("jar:memory:/app/WEB-INF/lib/b.jar!/conf/only-b.xml".to_string())
	);
	assert_eq!(webapp.loader.get_resource("conf/missing.xml"), None);
	assert!(webapp.loader.get_resources("conf/missing.xml").is_empty());
	Ok(())
}

#[test]
fn duplicate_locations_are_reported_once() -> eyre::Result<()> {
	let webapp = webapp()?;
	webapp.loader.add_repository(Arc::new(Mirror(webapp.root.clone())));
	assert_eq!(webapp.loader.find_resources("conf/app.xml").len(), 3);
	assert_eq!(
		webapp.loader.urls().last(),
		Some(&ResourceUrl::new("memory:/mirror"))
	);
	Ok(())
}

#[test]
fn repositories_are_collected_at_start() -> eyre::Result<()> {
	let webapp = webapp()?;
	assert_eq!(
		strings(webapp.loader.urls()),
		vec![
			"memory:/app/WEB-INF/classes",
			"memory:/app/WEB-INF/lib/a.jar",
			"memory:/app/WEB-INF/lib/b.jar",
		]
	);
	Ok(())
}

#[test]
fn stopped_loaders_serve_nothing() -> eyre::Result<()> {
	let webapp = webapp()?;
	webapp.loader.stop()?;
	assert_eq!(webapp.loader.get_resource("conf/app.xml"), None);
	assert_eq!(webapp.loader.get_resource_as_stream("conf/app.xml"), None);
	assert!(webapp.loader.get_resources("conf/app.xml").is_empty());
	assert!(webapp.loader.find_resources("conf/app.xml").is_empty());
	assert!(webapp.loader.urls().is_empty());
	Ok(())
}
