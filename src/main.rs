use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};
use tracing::{info, warn, Level};
use webvm_core::Lifecycle;
use webvm_loader::leak::SweepOutcome;
use webvm_loader::{BackgroundProcessor, LoaderConfig, SharedLoader, WebappLoader};
use webvm_resources::{ContextInfo, DirResourceRoot};

/// Loads classes out of an exploded web application.
#[derive(Parser, Debug)]
#[command(name = "webvm", version)]
struct Args {
	/// Root of the exploded web application (the directory holding WEB-INF).
	#[arg(long)]
	webapp: PathBuf,

	/// TOML loader configuration. WEBVM_* environment variables override it.
	#[arg(long)]
	config: Option<PathBuf>,

	/// Context path reported in logs; defaults to the directory name.
	#[arg(long)]
	context: Option<String>,

	/// Ask the parent loader before the web application.
	#[arg(long)]
	delegate: bool,

	/// Keep running for this many seconds, reloading on changes.
	#[arg(long)]
	watch: Option<u64>,

	#[arg(short, long)]
	verbose: bool,

	/// Binary class names, e.g. `com.acme.Foo`.
	classes: Vec<String>,
}

fn main() -> eyre::Result<()> {
	let args = Args::parse();
	webvm_core::init_with(if args.verbose { Level::TRACE } else { Level::INFO });

	let mut config = match &args.config {
		Some(path) => LoaderConfig::load_from(path)?,
		None => LoaderConfig::from_env()?,
	};
	config.delegate |= args.delegate;

	let context = args.context.clone().unwrap_or_else(|| {
		let name = args
			.webapp
			.file_name()
			.map(|name| name.to_string_lossy().to_string())
			.unwrap_or_default();
		format!("/{name}")
	});
	let root = DirResourceRoot::new(
		&args.webapp,
		ContextInfo {
			name: context,
			host: "localhost".to_string(),
			service: "Catalina".to_string(),
		},
	)
	.wrap_err_with(|| format!("cannot open web application {}", args.webapp.display()))?;

	let platform = SharedLoader::platform();
	let shared = SharedLoader::new("shared", Some(platform.clone()));
	let delay = Duration::from_millis(config.background_delay_ms);
	let loader = Arc::new(WebappLoader::new(Arc::new(root), shared, platform, config));
	loader.start()?;

	let class_loader = loader.loader().ok_or_else(|| eyre!("class loader did not start"))?;
	info!("{class_loader}");
	for url in class_loader.urls() {
		info!("Repository {url}");
	}

	let mut failures = 0;
	for name in &args.classes {
		match class_loader.load_class(name, true) {
			Ok(class) => {
				let location = class
					.code_source()
					.location
					.as_ref()
					.map(|url| url.to_string())
					.unwrap_or_else(|| "<unknown>".to_string());
				println!("{name}\t{}\t{location}", class.loader());
			}
			Err(err) => {
				warn!("{err}");
				failures += 1;
			}
		}
	}
	drop(class_loader);
	info!("Modified since start: {}", loader.modified());

	if let Some(seconds) = args.watch {
		let processor = BackgroundProcessor::spawn(loader.clone(), delay)?;
		thread::sleep(Duration::from_secs(seconds));
		processor.shutdown()?;
		info!("Reloaded {} times", loader.reload_count());
	}

	let last = loader.loader();
	loader.stop()?;
	if let Some(report) = last.and_then(|loader| loader.last_leak_report()) {
		for (sweep, outcome) in &report.outcomes {
			if let SweepOutcome::Failed(reason) = outcome {
				warn!("Leak sweep {sweep} failed: {reason}");
			}
		}
	}
	loader.destroy()?;

	if failures > 0 {
		return Err(eyre!("{failures} of {} classes could not be loaded", args.classes.len()));
	}
	Ok(())
}
