use std::fmt::{Display, Formatter};
use tracing::{debug, error, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SweepKind {
	Jdbc,
	Threads,
	ThreadLocals,
	RmiTargets,
	SerializationCache,
	Auxiliary,
}

impl SweepKind {
	/// Execution order.
	pub const ALL: [SweepKind; 6] = [
		SweepKind::Jdbc,
		SweepKind::Threads,
		SweepKind::ThreadLocals,
		SweepKind::RmiTargets,
		SweepKind::SerializationCache,
		SweepKind::Auxiliary,
	];

	pub fn name(&self) -> &'static str {
		match self {
			SweepKind::Jdbc => "jdbc",
			SweepKind::Threads => "threads",
			SweepKind::ThreadLocals => "thread-locals",
			SweepKind::RmiTargets => "rmi-targets",
			SweepKind::SerializationCache => "serialization-cache",
			SweepKind::Auxiliary => "auxiliary",
		}
	}
}

impl Display for SweepKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SweepOutcome {
	/// Ran to the end; `actions` counts what it cleared, stopped or reported.
	Completed { actions: usize },
	Disabled,
	/// The host runtime does not offer the capability.
	Unavailable,
	Failed(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Severity {
	Debug,
	Warn,
	Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeakFinding {
	pub sweep: SweepKind,
	pub severity: Severity,
	pub message: String,
}

/// What a shutdown sweep did.
#[derive(Clone, Debug, Default)]
pub struct LeakReport {
	pub skipped: bool,
	pub outcomes: Vec<(SweepKind, SweepOutcome)>,
	pub findings: Vec<LeakFinding>,
}

impl LeakReport {
	pub fn skipped() -> LeakReport {
		LeakReport {
			skipped: true,
			..LeakReport::default()
		}
	}

	pub fn outcome(&self, sweep: SweepKind) -> Option<&SweepOutcome> {
		self.outcomes
			.iter()
			.find(|(kind, _)| *kind == sweep)
			.map(|(_, outcome)| outcome)
	}

	pub fn findings_of(&self, sweep: SweepKind) -> impl Iterator<Item = &LeakFinding> {
		self.findings.iter().filter(move |finding| finding.sweep == sweep)
	}

	pub fn count(&self, sweep: SweepKind, severity: Severity) -> usize {
		self.findings_of(sweep)
			.filter(|finding| finding.severity == severity)
			.count()
	}

	pub fn has_errors(&self) -> bool {
		self.findings.iter().any(|finding| finding.severity == Severity::Error)
	}
}

/// Collects findings for one sweep and logs each as it is recorded.
pub(crate) struct Findings<'a> {
	sweep: SweepKind,
	context: &'a str,
	out: &'a mut Vec<LeakFinding>,
}

impl<'a> Findings<'a> {
	pub fn new(sweep: SweepKind, context: &'a str, out: &'a mut Vec<LeakFinding>) -> Findings<'a> {
		Findings { sweep, context, out }
	}

	pub fn record(&mut self, severity: Severity, message: String) {
		let context = self.context;
		match severity {
			Severity::Debug => debug!(context = %context, "{message}"),
			Severity::Warn => warn!(context = %context, "{message}"),
			Severity::Error => error!(context = %context, "{message}"),
		}
		self.out.push(LeakFinding {
			sweep: self.sweep,
			severity,
			message,
		});
	}

	pub fn debug(&mut self, message: String) {
		self.record(Severity::Debug, message);
	}

	pub fn warn(&mut self, message: String) {
		self.record(Severity::Warn, message);
	}

	pub fn error(&mut self, message: String) {
		self.record(Severity::Error, message);
	}
}
