// std
use std::collections::HashSet;
// crates.io
use once_cell::sync::Lazy;
use regex::Regex;
// self
use super::{
	dispatch::{Rule, Sink},
	token::{TokenBuffer, TokenKind},
};

/// Long alias to canonical scalar name. The short names are the real type
/// names; the long forms are accepted by PHP but only as aliases.
const TYPE_ALIASES: [(&str, &str); 2] = [("boolean", "bool"), ("integer", "int")];
/// A docblock tag carries a type when its name contains one of these.
/// Substring matching covers vendor-prefixed tags such as `@phpstan-param`.
const TYPEABLE_TAGS: [&str; 5] = ["param", "return", "var", "property", "method"];

static CAST_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^\(([^)]+)\)").expect("Expected operation to succeed."));
static GENERIC_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^([^<]+<[^>]+>)").expect("Expected operation to succeed."));
static LONG_TYPE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)\b(boolean|integer)\b").expect("Expected operation to succeed."));
static ALIAS_RES: Lazy<Vec<(&'static str, &'static str, Regex)>> = Lazy::new(|| {
	TYPE_ALIASES
		.iter()
		.map(|(long, short)| {
			(
				*long,
				*short,
				Regex::new(&format!(r"(?i)\b{long}\b")).expect("Expected operation to succeed."),
			)
		})
		.collect()
});

/// Rewrites the long scalar type aliases `boolean` and `integer` to their
/// canonical short names in docblocks, type declarations and casts.
pub(crate) struct LongTypeNameRule {
	processed: HashSet<usize>,
}
impl LongTypeNameRule {
	pub(crate) fn new() -> Self {
		Self { processed: HashSet::new() }
	}

	fn check_type_token(
		&mut self,
		buffer: &TokenBuffer,
		position: usize,
		context: Context,
		sink: &mut Sink,
	) {
		// A token can be reached through several paths in one pass; only
		// the first path gets to report it.
		if !self.processed.insert(position) {
			return;
		}

		let Some(content) = buffer.get(position).map(|token| token.text.clone()) else {
			return;
		};
		let found = extract_types(&content);

		if found.is_empty() {
			return;
		}

		let mut replaced = content.clone();
		let mut fix = false;

		for long in &found {
			let Some((_, short, re)) =
				ALIAS_RES.iter().find(|(alias, _, _)| *alias == long.as_str())
			else {
				continue;
			};
			let next = re.replace_all(&replaced, *short).into_owned();

			if next == replaced {
				continue;
			}

			replaced = next;
			fix |= sink.reporter.report(
				buffer,
				position,
				context.code(),
				&context.message(long, short),
				true,
			);
		}

		if fix {
			sink.fixer.begin_changeset(context.code());
			sink.fixer.replace_token(position, replaced);
			sink.fixer.end_changeset();
		}
	}

	fn process_doc_tag(&mut self, buffer: &TokenBuffer, tag: usize, sink: &mut Sink) {
		let Some(tag_name) = buffer.get(tag).map(|token| token.text.clone()) else {
			return;
		};
		let bare = tag_name.trim_start_matches('@');

		if !TYPEABLE_TAGS.iter().any(|typeable| bare.contains(typeable)) {
			return;
		}

		let close = buffer.find_next(&[TokenKind::DocClose], tag + 1, None);
		let Some(string) = buffer.find_next(&[TokenKind::DocString], tag + 1, close) else {
			return;
		};

		self.check_type_token(buffer, string, Context::Docblock(tag_name), sink);
	}

	fn process_function_types(&mut self, buffer: &TokenBuffer, function: usize, sink: &mut Sink) {
		let Some(open_paren) = buffer.find_next(&[TokenKind::OpenParen], function + 1, None) else {
			return;
		};
		let Some(close_paren) = buffer.get(open_paren).and_then(|token| token.paren_closer) else {
			return;
		};

		// Parameter types, singular or union.
		for position in open_paren + 1..close_paren {
			if buffer.get(position).is_some_and(|token| token.kind == TokenKind::Ident) {
				self.check_type_token(buffer, position, Context::Declaration("parameter"), sink);
			}
		}

		// The return type sits between the colon and the body brace (or the
		// semicolon of an abstract signature); colons inside the body are
		// ternaries and must not match.
		let Some(brace_or_semi) = buffer
			.find_next(&[TokenKind::OpenCurly, TokenKind::Semicolon], close_paren + 1, None)
		else {
			return;
		};
		let Some(colon) =
			buffer.find_next(&[TokenKind::Colon], close_paren + 1, Some(brace_or_semi))
		else {
			return;
		};

		for position in colon + 1..brace_or_semi {
			if buffer.get(position).is_some_and(|token| token.kind == TokenKind::Ident) {
				self.check_type_token(buffer, position, Context::Declaration("return"), sink);
			}
		}
	}

	fn process_property_type(&mut self, buffer: &TokenBuffer, variable: usize, sink: &mut Sink) {
		if variable == 0 {
			return;
		}

		let Some(visibility) = buffer.find_prev(
			&[
				TokenKind::Visibility,
				TokenKind::Semicolon,
				TokenKind::OpenCurly,
				TokenKind::CloseCurly,
			],
			variable - 1,
			None,
		) else {
			return;
		};

		if buffer.get(visibility).is_some_and(|token| token.kind != TokenKind::Visibility) {
			return;
		}
		// A function keyword or parenthesis in between means this variable
		// is a parameter, not a property.
		if buffer
			.find_next(
				&[TokenKind::Function, TokenKind::Closure, TokenKind::OpenParen],
				visibility + 1,
				Some(variable),
			)
			.is_some()
		{
			return;
		}

		for position in visibility + 1..variable {
			if buffer.get(position).is_some_and(|token| token.kind == TokenKind::Ident) {
				self.check_type_token(buffer, position, Context::Declaration("property"), sink);
			}
		}
	}
}
impl Rule for LongTypeNameRule {
	fn interested_kinds(&self) -> &'static [TokenKind] {
		&[
			TokenKind::DocTag,
			TokenKind::Function,
			TokenKind::Closure,
			TokenKind::Variable,
			TokenKind::Cast,
		]
	}

	fn visit(&mut self, buffer: &TokenBuffer, position: usize, sink: &mut Sink) {
		let Some(kind) = buffer.get(position).map(|token| token.kind) else {
			return;
		};

		match kind {
			TokenKind::DocTag => self.process_doc_tag(buffer, position, sink),
			TokenKind::Function | TokenKind::Closure =>
				self.process_function_types(buffer, position, sink),
			TokenKind::Variable => self.process_property_type(buffer, position, sink),
			TokenKind::Cast => self.check_type_token(buffer, position, Context::Cast, sink),
			_ => (),
		}
	}
}

enum Context {
	Docblock(String),
	Cast,
	Declaration(&'static str),
}
impl Context {
	fn code(&self) -> &'static str {
		match self {
			Self::Docblock(_) => "DocblockType",
			Self::Cast => "TypeCast",
			Self::Declaration(_) => "TypeDeclaration",
		}
	}

	fn message(&self, long: &str, short: &str) -> String {
		match self {
			Self::Docblock(tag) => format!(
				"Short type names must be used in docblocks: \"{long}\" must be \"{short}\" in \"{tag}\" tags."
			),
			Self::Cast => format!(
				"Short type names must be used in type casting: \"{long}\" must be \"{short}\"."
			),
			Self::Declaration(kind) => format!(
				"Short type names must be used in type declarations: \"{long}\" must be \"{short}\" for {kind} type."
			),
		}
	}
}

/// Pulls every long-form alias out of a token's text. Cast syntax wins
/// outright, then generic syntax, then the first whitespace-separated word
/// split on `|` for union types. Results are lowercased and deduplicated.
fn extract_types(content: &str) -> Vec<String> {
	let mut found = Vec::new();

	if let Some(captures) = CAST_RE.captures(content) {
		push_alias(&mut found, captures[1].trim());

		return found;
	}

	let trimmed = content.trim();

	if let Some(captures) = GENERIC_RE.captures(trimmed) {
		for capture in LONG_TYPE_RE.captures_iter(&captures[1]) {
			push_alias(&mut found, &capture[1]);
		}
	}

	let first = trimmed.split(' ').next().unwrap_or_default();

	for part in first.split('|') {
		push_alias(&mut found, part.trim());
	}

	found
}

fn push_alias(found: &mut Vec<String>, candidate: &str) {
	let lowered = candidate.to_ascii_lowercase();

	if TYPE_ALIASES.iter().any(|(long, _)| *long == lowered) && !found.contains(&lowered) {
		found.push(lowered);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn extracts_cast_type() {
		assert_eq!(extract_types("(boolean)"), vec!["boolean"]);
		assert_eq!(extract_types("(bool)"), Vec::<String>::new());
	}

	#[test]
	fn extracts_first_word_and_union_members() {
		assert_eq!(extract_types("integer $count The count."), vec!["integer"]);
		assert_eq!(extract_types("string|integer|boolean $x"), vec!["integer", "boolean"]);
		assert_eq!(extract_types("int $x boolean is fine in prose"), Vec::<String>::new());
	}

	#[test]
	fn extracts_generic_members() {
		assert_eq!(extract_types("Map<string, boolean> $flags"), vec!["boolean"]);
		assert_eq!(extract_types("array<integer> $xs"), vec!["integer"]);
	}

	#[test]
	fn mixed_case_aliases_are_normalized() {
		assert_eq!(extract_types("Boolean $flag"), vec!["boolean"]);
	}

	#[test]
	fn deduplicates_repeated_aliases() {
		assert_eq!(extract_types("array<integer, integer> $xs"), vec!["integer"]);
	}
}
