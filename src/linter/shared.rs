// std
use std::{collections::HashSet, path::PathBuf, process::Command};

// self
use super::token::TokenBuffer;
use crate::prelude::*;

pub(crate) const RULE_CODES: [&str; 9] = [
	"ReturnSpacing",
	"TagSpacing",
	"MissingReturn",
	"VoidReturnTagFound",
	"DocblockType",
	"TypeCast",
	"TypeDeclaration",
	"ConflictingEdit",
	"FixLoopLimit",
];

#[derive(Debug, Clone)]
pub(crate) struct Violation {
	pub(crate) file: PathBuf,
	pub(crate) line: usize,
	pub(crate) column: usize,
	pub(crate) rule: &'static str,
	pub(crate) message: String,
	pub(crate) fixable: bool,
}

impl Violation {
	pub(crate) fn format(&self) -> String {
		format!(
			"{}:{}:{}: [{}] {}{}",
			self.file.display(),
			self.line,
			self.column,
			self.rule,
			self.message,
			if self.fixable { " (fixable)" } else { "" }
		)
	}
}

#[derive(Debug, Clone)]
pub(crate) struct RunSummary {
	pub(crate) file_count: usize,
	pub(crate) violation_count: usize,
	pub(crate) unfixable_count: usize,
	pub(crate) applied_fix_count: usize,
	pub(crate) output_lines: Vec<String>,
}

/// Accumulates violations for one file and suppresses duplicates keyed by
/// `(token position, rule code)`, so the same logical defect found through
/// two scan paths is reported once.
#[derive(Debug)]
pub(crate) struct Reporter {
	file: PathBuf,
	fixing: bool,
	seen: HashSet<(usize, &'static str)>,
	violations: Vec<Violation>,
}

impl Reporter {
	pub(crate) fn new(file: PathBuf, fixing: bool) -> Self {
		Self { file, fixing, seen: HashSet::new(), violations: Vec::new() }
	}

	/// Record a violation at `position`. Returns true when the caller should
	/// build a fix: fixing is enabled, the violation is fixable, and this is
	/// the first report at this position for this rule.
	pub(crate) fn report(
		&mut self,
		buffer: &TokenBuffer,
		position: usize,
		rule: &'static str,
		message: impl Into<String>,
		fixable: bool,
	) -> bool {
		if !self.seen.insert((position, rule)) {
			return false;
		}

		let (line, column) =
			buffer.get(position).map_or((1, 1), |token| (token.line, token.column));

		self.violations.push(Violation {
			file: self.file.clone(),
			line,
			column,
			rule,
			message: message.into(),
			fixable,
		});

		self.fixing && fixable
	}

	/// Internal diagnostics (edit conflicts, iteration cap) go through the
	/// same violation stream with reserved codes, never as process errors.
	pub(crate) fn diagnostic(&mut self, rule: &'static str, message: impl Into<String>) {
		self.violations.push(Violation {
			file: self.file.clone(),
			line: 1,
			column: 1,
			rule,
			message: message.into(),
			fixable: false,
		});
	}

	pub(crate) fn into_violations(self) -> Vec<Violation> {
		self.violations
	}
}

pub(crate) fn resolve_files(requested_files: &[PathBuf]) -> Result<Vec<PathBuf>> {
	if !requested_files.is_empty() {
		let mut files = Vec::new();

		for file in requested_files {
			if file.extension().is_some_and(|ext| ext == "php") {
				files.push(file.clone());
			}
		}

		return Ok(files);
	}

	git_ls_files_php()
}

fn git_ls_files_php() -> Result<Vec<PathBuf>> {
	let output = Command::new("git")
		.args(["ls-files", "*.php"])
		.output()
		.map_err(|err| eyre::eyre!("Failed to run git ls-files: {err}."))?;

	if !output.status.success() {
		return Err(eyre::eyre!("git ls-files failed with status {}.", output.status));
	}

	let stdout = String::from_utf8(output.stdout)?;
	let mut files = Vec::new();

	for line in stdout.lines() {
		if !line.is_empty() {
			files.push(PathBuf::from(line));
		}
	}

	Ok(files)
}

#[cfg(test)]
mod tests {
	// std
	use std::path::Path;

	// self
	use super::{super::lexer, *};

	#[test]
	fn reporter_dedupes_same_position_and_rule() {
		let buffer = lexer::tokenize("<?php $x = 1;");
		let mut reporter = Reporter::new(PathBuf::from("a.php"), true);

		assert!(reporter.report(&buffer, 2, "TagSpacing", "first", true));
		assert!(!reporter.report(&buffer, 2, "TagSpacing", "second", true));
		assert!(reporter.report(&buffer, 2, "ReturnSpacing", "other rule", true));
		assert_eq!(reporter.into_violations().len(), 2);
	}

	#[test]
	fn report_returns_false_when_not_fixing() {
		let buffer = lexer::tokenize("<?php $x = 1;");
		let mut reporter = Reporter::new(PathBuf::from("a.php"), false);

		assert!(!reporter.report(&buffer, 0, "TagSpacing", "msg", true));
		assert_eq!(reporter.into_violations().len(), 1);
	}

	#[test]
	fn violation_format_marks_fixable() {
		let violation = Violation {
			file: PathBuf::from("src/a.php"),
			line: 3,
			column: 4,
			rule: "TypeCast",
			message: "msg".to_owned(),
			fixable: true,
		};

		assert_eq!(violation.format(), "src/a.php:3:4: [TypeCast] msg (fixable)");
	}

	#[test]
	fn resolve_files_filters_php_extension() {
		let requested =
			vec![PathBuf::from("a.php"), PathBuf::from("b.rs"), Path::new("c.php").to_path_buf()];
		let files = resolve_files(&requested).expect("resolve");

		assert_eq!(files, vec![PathBuf::from("a.php"), PathBuf::from("c.php")]);
	}
}
