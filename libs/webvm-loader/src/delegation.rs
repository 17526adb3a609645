use serde::{Deserialize, Serialize};

/// Whether a name handed to the filter is a binary class name (`a.b.C`) or a resource
/// name (`a/b/C.class`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NameKind {
	Class,
	Resource,
}

/// Forces parent-first delegation for every name under `prefix`, unless the name also
/// falls under one of the `exceptions`. Prefixes are written in dotted form and end with
/// a dot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DelegationRule {
	pub prefix: String,
	#[serde(default)]
	pub exceptions: Vec<String>,
}

impl DelegationRule {
	pub fn new(prefix: impl Into<String>) -> DelegationRule {
		DelegationRule {
			prefix: prefix.into(),
			exceptions: vec![],
		}
	}

	pub fn except(mut self, prefix: impl Into<String>) -> DelegationRule {
		self.exceptions.push(prefix.into());
		self
	}

	/// `Some(true)` when the rule forces delegation, `Some(false)` when an exception
	/// vetoes it and `None` when the name is outside the rule.
	fn decide(&self, name: &str, kind: NameKind) -> Option<bool> {
		if !has_prefix(name, &self.prefix, kind) {
			return None;
		}
		let excepted = self
			.exceptions
			.iter()
			.any(|exception| has_prefix(name, exception, kind));
		Some(!excepted)
	}
}

fn has_prefix(name: &str, prefix: &str, kind: NameKind) -> bool {
	match kind {
		NameKind::Class => name.starts_with(prefix),
		NameKind::Resource => {
			name.len() >= prefix.len()
				&& name
					.bytes()
					.zip(prefix.bytes())
					.all(|(n, p)| n == if p == b'.' { b'/' } else { p })
		}
	}
}

/// Decides which names are always delegated to the parent first, so that a web
/// application cannot shadow the container's own API classes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DelegationFilter {
	rules: Vec<DelegationRule>,
}

impl DelegationFilter {
	pub fn new(rules: Vec<DelegationRule>) -> DelegationFilter {
		DelegationFilter { rules }
	}

	/// No forced delegation at all.
	pub fn empty() -> DelegationFilter {
		DelegationFilter { rules: vec![] }
	}

	/// The servlet container API and implementation packages.
	pub fn container_default() -> DelegationFilter {
		DelegationFilter::new(vec![
			DelegationRule::new("jakarta.annotation."),
			DelegationRule::new("jakarta.el."),
			DelegationRule::new("jakarta.servlet.").except("jakarta.servlet.jsp.jstl."),
			DelegationRule::new("jakarta.websocket."),
			DelegationRule::new("jakarta.security.auth.message."),
			DelegationRule::new("javax.websocket."),
			DelegationRule::new("org.apache.el."),
			DelegationRule::new("org.apache.catalina."),
			DelegationRule::new("org.apache.jasper."),
			DelegationRule::new("org.apache.juli."),
			DelegationRule::new("org.apache.tomcat.").except("org.apache.tomcat.jdbc."),
			DelegationRule::new("org.apache.naming."),
			DelegationRule::new("org.apache.coyote."),
		])
	}

	pub fn rules(&self) -> &[DelegationRule] {
		&self.rules
	}

	/// True if `name` must be searched in the parent before the local repositories. The
	/// first rule whose prefix matches decides.
	pub fn matches(&self, name: &str, kind: NameKind) -> bool {
		self.rules
			.iter()
			.find_map(|rule| rule.decide(name, kind))
			.unwrap_or(false)
	}
}

impl Default for DelegationFilter {
	fn default() -> Self {
		DelegationFilter::container_default()
	}
}
