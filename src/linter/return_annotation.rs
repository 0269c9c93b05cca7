// self
use super::{
	dispatch::{Rule, Sink},
	token::{TokenBuffer, TokenKind},
};

/// Magic methods that conventionally return void; they are processed only in
/// the tag-removal direction, never the missing-tag direction.
const ALLOWED_VOID_MAGIC: [&str; 7] =
	["__construct", "__destruct", "__clone", "__set", "__unset", "__wakeup", "__unserialize"];

/// Requires an `@return` tag on functions that return a value (or generate),
/// and strips `@return` tags from functions that return void.
pub(crate) struct ReturnAnnotationRule;

impl Rule for ReturnAnnotationRule {
	fn interested_kinds(&self) -> &'static [TokenKind] {
		&[TokenKind::Function, TokenKind::Closure]
	}

	fn visit(&mut self, buffer: &TokenBuffer, position: usize, sink: &mut Sink) {
		process_function(buffer, position, sink);
	}
}

fn process_function(buffer: &TokenBuffer, function: usize, sink: &mut Sink) {
	let magic_void_only = match function_name(buffer, function) {
		Some(name) if name.starts_with("__") => {
			if !ALLOWED_VOID_MAGIC.contains(&name.to_ascii_lowercase().as_str()) {
				return;
			}

			true
		},
		_ => false,
	};
	// Functions without an adjacent docblock are skipped entirely.
	let Some(close) = adjacent_docblock_close(buffer, function) else {
		return;
	};
	let Some(open) = buffer.get(close).and_then(|token| token.comment_opener) else {
		return;
	};
	let return_tag = find_return_tag(buffer, open, close);
	let has_void = has_void_return(buffer, function);
	let is_generator = is_generator_function(buffer, function);

	if magic_void_only {
		if has_void && !is_generator {
			if let Some(tag) = return_tag {
				report_void_tag(buffer, open, close, tag, sink);
			}
		}

		return;
	}
	if is_generator {
		if return_tag.is_none() {
			report_missing(buffer, function, open, close, "iterable", sink);
		}

		return;
	}
	if !has_void {
		if return_tag.is_none() {
			report_missing(buffer, function, open, close, "mixed", sink);
		}

		return;
	}
	if let Some(tag) = return_tag {
		report_void_tag(buffer, open, close, tag, sink);
	}
}

fn function_name(buffer: &TokenBuffer, function: usize) -> Option<String> {
	if buffer.get(function)?.kind != TokenKind::Function {
		return None;
	}

	let open_paren = buffer.find_next(&[TokenKind::OpenParen], function + 1, None);
	let name = buffer.find_next(&[TokenKind::Ident], function + 1, open_paren)?;

	Some(buffer.get(name)?.text.clone())
}

/// The docblock only counts when nothing but whitespace, visibility
/// keywords and `final`/`abstract` sit between its closer and the function.
fn adjacent_docblock_close(buffer: &TokenBuffer, function: usize) -> Option<usize> {
	let mut cursor = function;

	while cursor > 0 {
		cursor -= 1;

		let token = buffer.get(cursor)?;

		match token.kind {
			TokenKind::Whitespace | TokenKind::Visibility => continue,
			TokenKind::Ident
				if matches!(token.text.to_ascii_lowercase().as_str(), "final" | "abstract") =>
				continue,
			TokenKind::DocClose => return Some(cursor),
			_ => return None,
		}
	}

	None
}

fn find_return_tag(buffer: &TokenBuffer, open: usize, close: usize) -> Option<usize> {
	(open..=close).find(|position| {
		buffer
			.get(*position)
			.is_some_and(|token| token.kind == TokenKind::DocTag && token.text == "@return")
	})
}

fn has_void_return(buffer: &TokenBuffer, function: usize) -> bool {
	has_explicit_void(buffer, function) || has_implicit_void_return(buffer, function)
}

fn has_explicit_void(buffer: &TokenBuffer, function: usize) -> bool {
	let Some(open_paren) = buffer.find_next(&[TokenKind::OpenParen], function + 1, None) else {
		return false;
	};
	let Some(close_paren) = buffer.get(open_paren).and_then(|token| token.paren_closer) else {
		return false;
	};
	let bound = buffer
		.get(function)
		.and_then(|token| token.scope_opener)
		.or_else(|| buffer.find_next(&[TokenKind::Semicolon], close_paren + 1, None));
	let Some(colon) = buffer.find_next(&[TokenKind::Colon], close_paren + 1, bound) else {
		return false;
	};
	let Some(ty) = buffer.find_next(&[TokenKind::Ident], colon + 1, bound) else {
		return false;
	};

	buffer.get(ty).is_some_and(|token| token.text.eq_ignore_ascii_case("void"))
}

/// No `return <expr>;` in the function's own scope means it implicitly
/// returns void. Returns inside closures defined within the body do not
/// count.
fn has_implicit_void_return(buffer: &TokenBuffer, function: usize) -> bool {
	let Some(token) = buffer.get(function) else {
		return false;
	};
	let (Some(opener), Some(closer)) = (token.scope_opener, token.scope_closer) else {
		// Abstract function or interface method.
		return false;
	};
	let mut cursor = opener;

	while let Some(ret) = buffer.find_next(&[TokenKind::Return], cursor + 1, Some(closer)) {
		cursor = ret;

		if in_nested_scope(buffer, opener, ret) {
			continue;
		}

		let next = buffer.find_next_not(
			&[TokenKind::Whitespace, TokenKind::CommentLine, TokenKind::CommentBlock],
			ret + 1,
			None,
		);

		if next.is_some_and(|position| {
			buffer.get(position).is_some_and(|token| token.kind != TokenKind::Semicolon)
		}) {
			return false;
		}
	}

	true
}

fn is_generator_function(buffer: &TokenBuffer, function: usize) -> bool {
	let Some(token) = buffer.get(function) else {
		return false;
	};
	let (Some(opener), Some(closer)) = (token.scope_opener, token.scope_closer) else {
		return false;
	};
	let mut cursor = opener;

	while let Some(yield_pos) = buffer.find_next(&[TokenKind::Yield], cursor + 1, Some(closer)) {
		cursor = yield_pos;

		if !in_nested_scope(buffer, opener, yield_pos) {
			return true;
		}
	}

	false
}

/// A statement belongs to a nested function when the nearest preceding
/// function token between our scope opener and the statement has a scope
/// that strictly contains it.
fn in_nested_scope(buffer: &TokenBuffer, opener: usize, position: usize) -> bool {
	let mut cursor = position;

	while cursor > opener + 1 {
		let Some(found) = buffer.find_prev(
			&[TokenKind::Function, TokenKind::Closure],
			cursor - 1,
			Some(opener + 1),
		) else {
			return false;
		};

		if let Some(token) = buffer.get(found) {
			if let (Some(nested_open), Some(nested_close)) = (token.scope_opener, token.scope_closer)
			{
				if nested_open < position && position < nested_close {
					return true;
				}
			}
		}

		cursor = found;
	}

	false
}

fn report_missing(
	buffer: &TokenBuffer,
	function: usize,
	open: usize,
	close: usize,
	return_type: &str,
	sink: &mut Sink,
) {
	if !sink.reporter.report(
		buffer,
		function,
		"MissingReturn",
		"Missing @return tag in function comment",
		true,
	) {
		return;
	}

	let last = buffer
		.find_prev_not(&[TokenKind::DocWhitespace, TokenKind::DocStar], close - 1, Some(open))
		.unwrap_or(open);
	let indent = star_indent(buffer, open, close);

	sink.fixer.begin_changeset("MissingReturn");

	if last == open {
		// An empty docblock has no content line to append after; rebuild the
		// interior so the closer keeps its own line.
		for position in open + 1..close {
			sink.fixer.replace_token(position, "");
		}

		sink.fixer.insert_after(open, format!("\n{indent}* @return {return_type}\n{indent}"));
	} else {
		sink.fixer.insert_after(last, format!("\n{indent}*\n{indent}* @return {return_type}"));
	}

	sink.fixer.end_changeset();
}

/// The whitespace run that indents the docblock's `*` lines, taken verbatim
/// so tab-indented blocks stay tab-indented. A block without any `*` line
/// falls back to the run in front of its closer.
fn star_indent(buffer: &TokenBuffer, open: usize, close: usize) -> String {
	let before = |position: usize| {
		position
			.checked_sub(1)
			.and_then(|prev| buffer.get(prev))
			.filter(|token| token.kind == TokenKind::DocWhitespace && !token.text.contains('\n'))
			.map(|token| token.text.clone())
	};

	buffer
		.find_next(&[TokenKind::DocStar], open + 1, Some(close))
		.and_then(|star| before(star))
		.or_else(|| before(close))
		.unwrap_or_else(|| " ".to_owned())
}

fn report_void_tag(buffer: &TokenBuffer, open: usize, close: usize, tag: usize, sink: &mut Sink) {
	if !sink.reporter.report(
		buffer,
		tag,
		"VoidReturnTagFound",
		"@return tag found in void function comment",
		true,
	) {
		return;
	}

	let Some(tag_line) = buffer.get(tag).map(|token| token.line) else {
		return;
	};

	sink.fixer.begin_changeset("VoidReturnTagFound");

	for position in open + 1..close {
		if buffer.get(position).is_some_and(|token| token.line == tag_line) {
			sink.fixer.delete_token(position);
		}
	}

	// A bare `*` line directly above the tag goes too.
	let prev_line = tag_line.saturating_sub(1);
	let open_line = buffer.get(open).map_or(0, |token| token.line);

	if prev_line > open_line {
		let prev_positions = (open + 1..close)
			.filter(|position| buffer.get(*position).is_some_and(|token| token.line == prev_line))
			.collect::<Vec<_>>();
		let bare = !prev_positions.is_empty()
			&& prev_positions.iter().all(|position| {
				buffer.get(*position).is_some_and(|token| {
					matches!(token.kind, TokenKind::DocWhitespace | TokenKind::DocStar)
				})
			});

		if bare {
			for position in prev_positions {
				sink.fixer.delete_token(position);
			}
		}
	}

	sink.fixer.end_changeset();
}

#[cfg(test)]
mod tests {
	// self
	use super::{super::lexer, *};

	fn function_at(buffer: &TokenBuffer) -> usize {
		buffer
			.find_next(&[TokenKind::Function, TokenKind::Closure], 0, None)
			.expect("function token")
	}

	#[test]
	fn implicit_void_with_no_returns() {
		let buffer = lexer::tokenize("<?php function f($x) { echo $x; }");

		assert!(has_implicit_void_return(&buffer, function_at(&buffer)));
	}

	#[test]
	fn bare_return_is_still_void() {
		let buffer = lexer::tokenize("<?php function f($x) { if ($x) { return; } echo $x; }");

		assert!(has_implicit_void_return(&buffer, function_at(&buffer)));
	}

	#[test]
	fn value_return_is_not_void() {
		let buffer = lexer::tokenize("<?php function f($x) { return $x; }");

		assert!(!has_implicit_void_return(&buffer, function_at(&buffer)));
	}

	#[test]
	fn nested_closure_return_does_not_count() {
		let buffer = lexer::tokenize(
			"<?php function f($xs) { $g = function ($x) { return $x * 2; }; echo $g(1); }",
		);

		assert!(has_implicit_void_return(&buffer, function_at(&buffer)));
	}

	#[test]
	fn top_level_return_counts_despite_nested_closure() {
		let buffer = lexer::tokenize(
			"<?php function f($xs) { $g = function ($x) { return $x; }; return $g(1); }",
		);

		assert!(!has_implicit_void_return(&buffer, function_at(&buffer)));
	}

	#[test]
	fn explicit_void_declaration_detected() {
		let buffer = lexer::tokenize("<?php function f(): void { echo 1; }");

		assert!(has_explicit_void(&buffer, function_at(&buffer)));
	}

	#[test]
	fn generator_detected_in_own_scope_only() {
		let own = lexer::tokenize("<?php function f() { yield 1; }");
		let nested =
			lexer::tokenize("<?php function f() { $g = function () { yield 1; }; echo $g; }");

		assert!(is_generator_function(&own, function_at(&own)));
		assert!(!is_generator_function(&nested, function_at(&nested)));
	}

	#[test]
	fn docblock_adjacency_allows_visibility_keywords() {
		let buffer = lexer::tokenize("<?php /** @return int */ public static function f() {}");
		let function = function_at(&buffer);

		assert!(adjacent_docblock_close(&buffer, function).is_some());
	}

	#[test]
	fn intervening_statement_breaks_adjacency() {
		let buffer = lexer::tokenize("<?php /** doc */ $x = 1; function f() {}");
		let function = buffer.find_next(&[TokenKind::Function], 0, None).expect("function");

		assert!(adjacent_docblock_close(&buffer, function).is_none());
	}
}
