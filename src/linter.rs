//! PHP docblock linting engine.
//!
//! A scan tokenizes each file into a [`token::TokenBuffer`], dispatches the
//! rule catalog over it, and collects violations. Fix mode additionally
//! commits the queued changesets, rewrites the source, and re-scans until no
//! rule produces an edit or the pass cap is reached.

pub(crate) mod dispatch;
pub(crate) mod fixer;
pub(crate) mod lexer;
pub(crate) mod long_type_name;
pub(crate) mod return_annotation;
pub(crate) mod shared;
pub(crate) mod tag_spacing;
pub(crate) mod token;

// std
use std::{
	fs,
	path::{Path, PathBuf},
};

// self
pub(crate) use self::shared::RunSummary;

use self::{
	fixer::Fixer,
	shared::{RULE_CODES, Reporter, Violation},
};
use crate::prelude::*;

/// Commit rounds per file before the engine gives up and reports
/// `FixLoopLimit`. Well-behaved rules converge in two or three.
const MAX_FIX_PASSES: usize = 5;

pub(crate) fn run_check(requested_files: &[PathBuf]) -> Result<RunSummary> {
	let files = shared::resolve_files(requested_files)?;
	let mut violations = Vec::new();

	for file in &files {
		let text = read_file(file)?;

		violations.extend(check_text(file, &text));
	}

	Ok(summarize(files.len(), 0, violations))
}

pub(crate) fn run_fix(requested_files: &[PathBuf]) -> Result<RunSummary> {
	let files = shared::resolve_files(requested_files)?;
	let mut violations = Vec::new();
	let mut applied = 0;

	for file in &files {
		let text = read_file(file)?;
		let outcome = fix_text(file, &text)?;

		if outcome.text != text {
			fs::write(file, &outcome.text)
				.map_err(|err| eyre::eyre!("Failed to write {}: {err}.", file.display()))?;
		}

		applied += outcome.applied;

		violations.extend(outcome.violations);
	}

	Ok(summarize(files.len(), applied, violations))
}

pub(crate) fn print_coverage() {
	for code in RULE_CODES {
		println!("{code}\timplemented");
	}
}

/// One detection-only scan of `text`.
fn check_text(file: &Path, text: &str) -> Vec<Violation> {
	let buffer = lexer::tokenize(text);
	let mut reporter = Reporter::new(file.to_path_buf(), false);
	let mut fixer = Fixer::new();

	dispatch::run_pass(&buffer, &mut dispatch::build_rules(), &mut reporter, &mut fixer);

	reporter.into_violations()
}

struct FixOutcome {
	text: String,
	applied: usize,
	violations: Vec<Violation>,
}

/// The fix loop for one file. Each round tokenizes the current text, runs
/// the rules with fixing enabled, and commits the changesets. The buffer is
/// rebuilt between rounds so every changeset always addresses fresh token
/// positions. A rejected changeset is surfaced as a `ConflictingEdit`
/// diagnostic (once per rule) even when the losing rule re-applies cleanly
/// on a later round. A final detection-only scan reports what survived.
fn fix_text(file: &Path, text: &str) -> Result<FixOutcome> {
	let mut current = text.to_owned();
	let mut applied = 0;
	let mut diagnostics: Vec<(&'static str, String)> = Vec::new();
	let mut conflicted: Vec<&'static str> = Vec::new();
	let mut pass = 0;

	loop {
		pass += 1;

		let buffer = lexer::tokenize(&current);
		let mut reporter = Reporter::new(file.to_path_buf(), true);
		let mut fixer = Fixer::new();

		dispatch::run_pass(&buffer, &mut dispatch::build_rules(), &mut reporter, &mut fixer);

		if !fixer.has_changesets() {
			break;
		}
		if pass > MAX_FIX_PASSES {
			diagnostics.push((
				"FixLoopLimit",
				format!("Fixing did not settle after {MAX_FIX_PASSES} passes; run fix again."),
			));

			break;
		}

		let outcome = fixer.commit(&buffer)?;

		applied += outcome.applied;

		for rule in outcome.rejected {
			if !conflicted.contains(&rule) {
				conflicted.push(rule);
			}
		}

		if outcome.text == current {
			break;
		}

		current = outcome.text;
	}

	for rule in conflicted {
		diagnostics.push((
			"ConflictingEdit",
			format!("Fix from {rule} conflicted with an earlier fix and was skipped."),
		));
	}

	let mut violations = check_text(file, &current);
	let mut diagnostic_reporter = Reporter::new(file.to_path_buf(), false);

	for (rule, message) in diagnostics {
		diagnostic_reporter.diagnostic(rule, message);
	}

	violations.extend(diagnostic_reporter.into_violations());

	Ok(FixOutcome { text: current, applied, violations })
}

fn read_file(file: &Path) -> Result<String> {
	fs::read_to_string(file)
		.map_err(|err| eyre::eyre!("Failed to read {}: {err}.", file.display()))
}

fn summarize(file_count: usize, applied: usize, mut violations: Vec<Violation>) -> RunSummary {
	violations.sort_by(|a, b| {
		(&a.file, a.line, a.column, a.rule).cmp(&(&b.file, b.line, b.column, b.rule))
	});

	RunSummary {
		file_count,
		violation_count: violations.len(),
		unfixable_count: violations.iter().filter(|violation| !violation.fixable).count(),
		applied_fix_count: applied,
		output_lines: violations.iter().map(Violation::format).collect(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn check(text: &str) -> Vec<Violation> {
		check_text(Path::new("test.php"), text)
	}

	fn fix(text: &str) -> FixOutcome {
		fix_text(Path::new("test.php"), text).expect("fix")
	}

	fn codes(violations: &[Violation]) -> Vec<&'static str> {
		violations.iter().map(|violation| violation.rule).collect()
	}

	#[test]
	fn tag_spacing_collapses_separator_but_keeps_description_alignment() {
		let source = "<?php\n/**\n * @param int   $number     Description.\n */\nfunction f($number) {\n\treturn $number;\n}\n";
		let outcome = fix(source);

		assert!(outcome.text.contains(" * @param int $number     Description.\n"));
	}

	#[test]
	fn return_tag_gets_a_blank_line_before_it() {
		let source = "<?php\n/**\n * @param int $x The value.\n * @return int\n */\nfunction f($x) {\n\treturn $x;\n}\n";
		let violations = check(source);

		assert!(codes(&violations).contains(&"ReturnSpacing"));

		let outcome = fix(source);

		assert!(outcome.text.contains(" * @param int $x The value.\n *\n * @return int\n"));
		assert!(outcome.violations.is_empty());
	}

	#[test]
	fn missing_return_tag_is_appended_as_mixed() {
		let source = "<?php\n/**\n * Adds one.\n *\n * @param int $x The value.\n */\nfunction add_one($x) {\n\treturn $x + 1;\n}\n";
		let violations = check(source);

		assert_eq!(codes(&violations), vec!["MissingReturn"]);

		let outcome = fix(source);

		assert_eq!(
			outcome.text,
			"<?php\n/**\n * Adds one.\n *\n * @param int $x The value.\n *\n * @return mixed\n */\nfunction add_one($x) {\n\treturn $x + 1;\n}\n"
		);
		assert!(outcome.violations.is_empty());
	}

	#[test]
	fn generator_without_return_tag_gets_iterable() {
		let source = "<?php\n/**\n * Walks.\n */\nfunction walk($xs) {\n\tyield 1;\n}\n";
		let outcome = fix(source);

		assert_eq!(
			outcome.text,
			"<?php\n/**\n * Walks.\n *\n * @return iterable\n */\nfunction walk($xs) {\n\tyield 1;\n}\n"
		);
	}

	#[test]
	fn void_return_tag_is_removed_from_constructor() {
		let source = "<?php\nclass A {\n\t/**\n\t * Ctor.\n\t *\n\t * @return void\n\t */\n\tpublic function __construct() {\n\t\t$this->x = 1;\n\t}\n}\n";
		let violations = check(source);

		assert_eq!(codes(&violations), vec!["VoidReturnTagFound"]);

		let outcome = fix(source);

		assert_eq!(
			outcome.text,
			"<?php\nclass A {\n\t/**\n\t * Ctor.\n\t */\n\tpublic function __construct() {\n\t\t$this->x = 1;\n\t}\n}\n"
		);

		// The rewritten file must be a fixed point.
		let again = fix(&outcome.text);

		assert_eq!(again.text, outcome.text);
		assert_eq!(again.applied, 0);
	}

	#[test]
	fn empty_docblock_gets_return_tag_and_closer_on_own_lines() {
		let source = "<?php\n/** */\nfunction f() {\n\treturn 1;\n}\n";
		let outcome = fix(source);

		assert_eq!(
			outcome.text,
			"<?php\n/**\n * @return mixed\n */\nfunction f() {\n\treturn 1;\n}\n"
		);

		let again = fix(&outcome.text);

		assert_eq!(again.text, outcome.text);
		assert_eq!(again.applied, 0);
	}

	#[test]
	fn long_cast_is_shortened() {
		let source = "<?php\n$x = (boolean) $y;\n";
		let violations = check(source);

		assert_eq!(codes(&violations), vec!["TypeCast"]);

		let outcome = fix(source);

		assert_eq!(outcome.text, "<?php\n$x = (bool) $y;\n");
	}

	#[test]
	fn docblock_type_and_missing_return_fix_the_same_docblock_in_one_round() {
		let source = "<?php\n/**\n * @param boolean $flag Whether enabled.\n */\nfunction f($flag) {\n\treturn $flag;\n}\n";
		let violations = check(source);

		assert!(codes(&violations).contains(&"DocblockType"));
		assert!(codes(&violations).contains(&"MissingReturn"));

		let outcome = fix(source);

		assert_eq!(
			outcome.text,
			"<?php\n/**\n * @param bool $flag Whether enabled.\n *\n * @return mixed\n */\nfunction f($flag) {\n\treturn $flag;\n}\n"
		);
		assert!(outcome.violations.is_empty());
	}

	#[test]
	fn conflicting_edits_settle_over_multiple_passes_and_are_reported() {
		// TagSpacing and LongTypeName both rewrite the @param string; the
		// loser of the first round wins the second, and the rejection still
		// surfaces as a ConflictingEdit diagnostic.
		let source = "<?php\n/**\n * @param boolean   $flag On.\n */\nfunction f($flag) {\n\treturn $flag;\n}\n";
		let outcome = fix(source);

		assert!(outcome.text.contains(" * @param bool $flag On.\n"));
		assert!(outcome.text.contains(" * @return mixed\n"));
		assert_eq!(codes(&outcome.violations), vec!["ConflictingEdit"]);
		assert!(!outcome.violations[0].fixable);
		assert!(outcome.violations[0].message.contains("DocblockType"));
	}

	#[test]
	fn closure_return_does_not_force_a_return_tag_on_void_outer() {
		let source = "<?php\n/**\n * Runs a callback.\n */\nfunction run($xs) {\n\t$g = function ($x) {\n\t\treturn $x;\n\t};\n\t$g(1);\n}\n";

		assert!(check(source).is_empty());
	}

	#[test]
	fn property_type_declaration_is_shortened() {
		let source = "<?php\nclass A {\n\tpublic boolean $flag;\n}\n";
		let violations = check(source);

		assert_eq!(codes(&violations), vec!["TypeDeclaration"]);
		assert!(violations[0].message.contains("for property type"));

		let outcome = fix(source);

		assert_eq!(outcome.text, "<?php\nclass A {\n\tpublic bool $flag;\n}\n");
		assert!(outcome.violations.is_empty());
	}

	#[test]
	fn typed_parameter_after_visibility_is_not_a_property() {
		// `boolean` here belongs to the parameter list, so only the
		// parameter path must flag it.
		let source = "<?php\nclass A {\n\tpublic function f(boolean $x) {\n\t\treturn $x;\n\t}\n}\n";
		let violations = check(source);

		assert_eq!(codes(&violations), vec!["TypeDeclaration"]);
		assert!(violations[0].message.contains("for parameter type"));

		let outcome = fix(source);

		assert!(outcome.text.contains("public function f(bool $x) {"));
	}

	#[test]
	fn return_type_declaration_is_shortened() {
		let source = "<?php\nfunction f($x): integer {\n\treturn $x;\n}\n";
		let violations = check(source);

		assert!(codes(&violations).contains(&"TypeDeclaration"));

		let outcome = fix(source);

		assert!(outcome.text.contains("function f($x): int {"));
	}

	#[test]
	fn check_reports_are_sorted_and_marked_fixable() {
		let source = "<?php\n$a = (integer) $b;\n$c = (boolean) $d;\n";
		let summary = summarize(1, 0, check(source));

		assert_eq!(summary.violation_count, 2);
		assert_eq!(summary.unfixable_count, 0);
		assert!(summary.output_lines[0].starts_with("test.php:2:"));
		assert!(summary.output_lines[0].ends_with("(fixable)"));
		assert!(summary.output_lines[1].starts_with("test.php:3:"));
	}
}
