// crates.io
use once_cell::sync::Lazy;
use regex::Regex;

// self
use super::{
	dispatch::{Rule, Sink},
	token::{TokenBuffer, TokenKind},
};

static VARIABLE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\$\w+").expect("Expected operation to succeed."));
static TOUCHING_VARIABLE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^(\S+?)(\$\w+)$").expect("Expected operation to succeed."));
static MULTI_SPACE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r" {2,}").expect("Expected operation to succeed."));

/// Enforces docblock tag spacing: exactly one empty line before `@return`
/// when other tags precede it, and exactly one space between a tag, its
/// type, and its `$variable`.
pub(crate) struct TagSpacingRule;

impl Rule for TagSpacingRule {
	fn interested_kinds(&self) -> &'static [TokenKind] {
		&[TokenKind::DocTag]
	}

	fn visit(&mut self, buffer: &TokenBuffer, position: usize, sink: &mut Sink) {
		if buffer.get(position).is_some_and(|token| token.text == "@return") {
			check_return_blank_line(buffer, position, sink);
		}

		check_tag_spacing(buffer, position, sink);
	}
}

fn check_return_blank_line(buffer: &TokenBuffer, tag: usize, sink: &mut Sink) {
	let Some(doc_open) = buffer.find_prev(&[TokenKind::DocOpen], tag, None) else {
		return;
	};

	// Without an earlier tag in the same docblock no empty line is required.
	if buffer.find_next(&[TokenKind::DocTag], doc_open + 1, Some(tag)).is_none() {
		return;
	}
	if tag == 0 {
		return;
	}

	let Some(prev) = buffer.find_prev_not(
		&[TokenKind::DocWhitespace, TokenKind::DocStar],
		tag - 1,
		Some(doc_open),
	) else {
		return;
	};
	// One empty line shows up as two newline-bearing whitespace runs: the one
	// ending the content line and the one ending the blank line.
	let newline_runs = (prev + 1..tag)
		.filter(|position| {
			buffer.get(*position).is_some_and(|token| {
				token.kind == TokenKind::DocWhitespace && token.text.contains('\n')
			})
		})
		.count();

	if newline_runs == 2 {
		return;
	}
	if !sink.reporter.report(
		buffer,
		tag,
		"ReturnSpacing",
		"There must be exactly 1 empty line before @return tag",
		true,
	) {
		return;
	}

	// Reuse the block's own star indentation so tab-indented docblocks keep
	// their tabs.
	let indent = buffer
		.find_prev(&[TokenKind::DocStar], tag - 1, Some(doc_open))
		.and_then(|star| star.checked_sub(1))
		.and_then(|before| buffer.get(before))
		.filter(|token| token.kind == TokenKind::DocWhitespace && !token.text.contains('\n'))
		.map_or_else(|| " ".to_owned(), |token| token.text.clone());

	sink.fixer.begin_changeset("ReturnSpacing");

	for position in prev + 1..tag {
		sink.fixer.replace_token(position, "");
	}

	sink.fixer.insert_after(prev, format!("\n{indent}*\n{indent}* "));
	sink.fixer.end_changeset();
}

fn check_tag_spacing(buffer: &TokenBuffer, tag: usize, sink: &mut Sink) {
	let Some(tag_name) = buffer.get(tag).map(|token| token.text.clone()) else {
		return;
	};
	let mut whitespace = None;
	let mut content = None;

	match buffer.get(tag + 1) {
		Some(next) if next.kind == TokenKind::DocWhitespace && !next.text.contains('\n') => {
			whitespace = Some(tag + 1);

			if buffer.get(tag + 2).is_some_and(|token| token.kind == TokenKind::DocString) {
				content = Some(tag + 2);
			}
		},
		Some(next) if next.kind == TokenKind::DocString => content = Some(tag + 1),
		_ => {},
	}

	// A tag without content on its own line is left alone; anything further
	// on belongs to a later line or docblock.
	let Some(content) = content else {
		return;
	};
	let Some(original) = buffer.get(content).map(|token| token.text.clone()) else {
		return;
	};
	let mut needs_fixing =
		whitespace.and_then(|position| buffer.get(position)).is_some_and(|token| token.text != " ");
	let normalized = normalize_content(&original);

	if normalized != original {
		needs_fixing = true;
	}
	if !needs_fixing {
		return;
	}

	let message = format!("There must be exactly 1 space between elements in {tag_name}");

	if !sink.reporter.report(buffer, content, "TagSpacing", message, true) {
		return;
	}

	sink.fixer.begin_changeset("TagSpacing");

	if let Some(whitespace) = whitespace {
		sink.fixer.replace_token(whitespace, " ");
	}

	sink.fixer.replace_token(content, normalized);
	sink.fixer.end_changeset();
}

/// Normalize the `type $variable` head of tag content: collapse 2+ space
/// runs and insert the missing space between a type and an adjacent
/// `$variable`. Description text after the variable is kept verbatim;
/// without a variable the whole content collapses.
fn normalize_content(content: &str) -> String {
	if let Some(variable) = VARIABLE_RE.find(content) {
		let head = &content[..variable.end()];
		let tail = &content[variable.end()..];
		let collapsed = MULTI_SPACE_RE.replace_all(head, " ");
		let joined = TOUCHING_VARIABLE_RE.replace(&collapsed, "$1 $2");

		format!("{joined}{tail}")
	} else {
		MULTI_SPACE_RE.replace_all(content, " ").into_owned()
	}
}
