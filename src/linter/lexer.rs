// self
use super::token::{Token, TokenBuffer, TokenKind};

const CAST_TYPES: [&str; 12] = [
	"int", "integer", "bool", "boolean", "float", "double", "real", "string", "binary", "array",
	"object", "unset",
];

/// Tokenize PHP source into a linked token arena.
///
/// The lexer never fails: unknown bytes become `Op` tokens and unterminated
/// constructs run to end of input. Structural links (paren, scope, doc
/// comment) are resolved in a post-pass; constructs that cannot be linked are
/// simply left without links.
pub(crate) fn tokenize(text: &str) -> TokenBuffer {
	let mut lexer = Lexer::new(text);

	lexer.run();

	let mut buffer = TokenBuffer::new(lexer.tokens);

	link_parens(&mut buffer);
	link_function_scopes(&mut buffer);

	buffer
}

struct Lexer {
	chars: Vec<char>,
	idx: usize,
	line: usize,
	column: usize,
	tokens: Vec<Token>,
}

impl Lexer {
	fn new(text: &str) -> Self {
		Self { chars: text.chars().collect(), idx: 0, line: 1, column: 1, tokens: Vec::new() }
	}

	fn run(&mut self) {
		self.lex_leading_html();

		while self.idx < self.chars.len() {
			let ch = self.chars[self.idx];

			match ch {
				'<' if self.starts_with("<?php") => {
					self.emit(TokenKind::OpenTag, "<?php".to_owned());
				},
				ch if ch.is_whitespace() => {
					let run = self.peek_run(char::is_whitespace);

					self.emit(TokenKind::Whitespace, run);
				},
				'$' if self.peek(1).is_some_and(is_ident_start) => {
					let name = format!("${}", self.peek_run_at(1, is_ident_char));

					self.emit(TokenKind::Variable, name);
				},
				ch if is_ident_start(ch) => self.lex_ident(),
				ch if ch.is_ascii_digit() => {
					let run = self.peek_run(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

					self.emit(TokenKind::Number, run);
				},
				'\'' | '"' => {
					let literal = self.peek_string(ch);

					self.emit(TokenKind::StringLiteral, literal);
				},
				'/' if self.starts_with("/**") => self.lex_doc_comment(),
				'/' if self.starts_with("/*") => {
					let comment = self.peek_block_comment();

					self.emit(TokenKind::CommentBlock, comment);
				},
				'/' if self.starts_with("//") => {
					let comment = self.peek_run(|c| c != '\n');

					self.emit(TokenKind::CommentLine, comment);
				},
				'#' => {
					let comment = self.peek_run(|c| c != '\n');

					self.emit(TokenKind::CommentLine, comment);
				},
				'(' => {
					if let Some(cast) = self.peek_cast() {
						self.emit(TokenKind::Cast, cast);
					} else {
						self.emit(TokenKind::OpenParen, "(".to_owned());
					}
				},
				')' => self.emit(TokenKind::CloseParen, ")".to_owned()),
				'{' => self.emit(TokenKind::OpenCurly, "{".to_owned()),
				'}' => self.emit(TokenKind::CloseCurly, "}".to_owned()),
				';' => self.emit(TokenKind::Semicolon, ";".to_owned()),
				',' => self.emit(TokenKind::Comma, ",".to_owned()),
				':' =>
					if self.starts_with("::") {
						self.emit(TokenKind::Op, "::".to_owned());
					} else {
						self.emit(TokenKind::Colon, ":".to_owned());
					},
				other => self.emit(TokenKind::Op, other.to_string()),
			}
		}
	}

	fn lex_leading_html(&mut self) {
		if self.starts_with("<?php") {
			return;
		}

		let text = self.chars.iter().collect::<String>();
		// Without an open tag anywhere, lex the whole input as PHP so snippets work.
		let Some(open) = text.find("<?php") else {
			return;
		};
		let html = text[..open].to_owned();

		if !html.is_empty() {
			self.emit(TokenKind::InlineHtml, html);
		}
	}

	fn lex_ident(&mut self) {
		let word = self.peek_run(is_ident_char);
		let kind = match word.to_ascii_lowercase().as_str() {
			"function" => {
				// Anonymous functions are immediately followed by `(`.
				if self.next_non_space_after(word.chars().count()) == Some('(') {
					TokenKind::Closure
				} else {
					TokenKind::Function
				}
			},
			"fn" => TokenKind::Closure,
			"return" => TokenKind::Return,
			"yield" => TokenKind::Yield,
			"public" | "private" | "protected" | "static" | "var" => TokenKind::Visibility,
			_ => TokenKind::Ident,
		};

		self.emit(kind, word);
	}

	/// Tokenize a `/** ... */` block the way PHP_CodeSniffer does: newlines,
	/// indent runs, `*` markers, `@tags` and rest-of-line content strings all
	/// become separate tokens, so docblock rules can address each piece.
	fn lex_doc_comment(&mut self) {
		let opener = self.tokens.len();

		self.emit(TokenKind::DocOpen, "/**".to_owned());

		loop {
			if self.idx >= self.chars.len() {
				return;
			}
			if self.starts_with("*/") {
				let closer = self.tokens.len();

				self.emit(TokenKind::DocClose, "*/".to_owned());
				self.tokens[opener].comment_closer = Some(closer);
				self.tokens[closer].comment_opener = Some(opener);

				return;
			}

			let ch = self.chars[self.idx];

			if ch == '\n' {
				self.emit(TokenKind::DocWhitespace, "\n".to_owned());
			} else if ch == ' ' || ch == '\t' || ch == '\r' {
				let run = self.peek_run(|c| c == ' ' || c == '\t' || c == '\r');

				self.emit(TokenKind::DocWhitespace, run);
			} else if ch == '*' {
				self.emit(TokenKind::DocStar, "*".to_owned());
			} else if ch == '@' {
				let name = self.peek_run_at(1, |c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

				self.emit(TokenKind::DocTag, format!("@{name}"));

				let spaces = self.peek_run(|c| c == ' ' || c == '\t');

				if !spaces.is_empty() {
					self.emit(TokenKind::DocWhitespace, spaces);
				}

				self.lex_doc_rest_of_line();
			} else {
				self.lex_doc_rest_of_line();
			}
		}
	}

	/// Consume content up to the newline or the closing `*/`, emitting one
	/// `DocString` plus a trailing `DocWhitespace` when the line ends at the
	/// closer.
	fn lex_doc_rest_of_line(&mut self) {
		let mut content = String::new();
		let mut cursor = self.idx;

		while cursor < self.chars.len()
			&& self.chars[cursor] != '\n'
			&& !(self.chars[cursor] == '*' && self.chars.get(cursor + 1) == Some(&'/'))
		{
			content.push(self.chars[cursor]);
			cursor += 1;
		}

		if content.is_empty() {
			return;
		}

		let trimmed = content.trim_end_matches([' ', '\t']).to_owned();
		let trailing = content[trimmed.len()..].to_owned();

		if !trimmed.is_empty() {
			self.emit(TokenKind::DocString, trimmed);
		}
		if !trailing.is_empty() {
			self.emit(TokenKind::DocWhitespace, trailing);
		}
	}

	fn peek_string(&self, quote: char) -> String {
		let mut text = String::from(quote);
		let mut cursor = self.idx + 1;
		let mut escaped = false;

		while cursor < self.chars.len() {
			let ch = self.chars[cursor];

			text.push(ch);
			cursor += 1;

			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == quote {
				break;
			}
		}

		text
	}

	fn peek_block_comment(&self) -> String {
		let mut text = String::from("/*");
		let mut cursor = self.idx + 2;

		while cursor < self.chars.len() {
			if self.chars[cursor] == '*' && self.chars.get(cursor + 1) == Some(&'/') {
				text.push_str("*/");

				return text;
			}

			text.push(self.chars[cursor]);
			cursor += 1;
		}

		text
	}

	fn peek_cast(&self) -> Option<String> {
		let mut cursor = self.idx + 1;
		let mut inner = String::new();

		while self.chars.get(cursor).is_some_and(|c| *c == ' ' || *c == '\t') {
			inner.push(self.chars[cursor]);
			cursor += 1;
		}

		let word_start = cursor;

		while self.chars.get(cursor).is_some_and(|c| c.is_ascii_alphabetic()) {
			inner.push(self.chars[cursor]);
			cursor += 1;
		}

		let word = self.chars[word_start..cursor].iter().collect::<String>();

		if word.is_empty() || !CAST_TYPES.contains(&word.to_ascii_lowercase().as_str()) {
			return None;
		}

		while self.chars.get(cursor).is_some_and(|c| *c == ' ' || *c == '\t') {
			inner.push(self.chars[cursor]);
			cursor += 1;
		}

		if self.chars.get(cursor) != Some(&')') {
			return None;
		}

		Some(format!("({inner})"))
	}

	/// Record a token at the current position and consume its text.
	fn emit(&mut self, kind: TokenKind, text: String) {
		let token = Token::new(kind, text, self.line, self.column);

		self.idx += token.text.chars().count();

		for ch in token.text.chars() {
			if ch == '\n' {
				self.line += 1;
				self.column = 1;
			} else {
				self.column += 1;
			}
		}

		self.tokens.push(token);
	}

	fn peek_run(&self, predicate: impl Fn(char) -> bool) -> String {
		self.peek_run_at(0, predicate)
	}

	fn peek_run_at(&self, offset: usize, predicate: impl Fn(char) -> bool) -> String {
		let mut run = String::new();
		let mut cursor = self.idx + offset;

		while self.chars.get(cursor).is_some_and(|c| predicate(*c)) {
			run.push(self.chars[cursor]);
			cursor += 1;
		}

		run
	}

	fn next_non_space_after(&self, offset: usize) -> Option<char> {
		self.chars[self.idx + offset..].iter().find(|c| !c.is_whitespace()).copied()
	}

	fn starts_with(&self, needle: &str) -> bool {
		let mut cursor = self.idx;

		for ch in needle.chars() {
			if self.chars.get(cursor) != Some(&ch) {
				return false;
			}

			cursor += 1;
		}

		true
	}

	fn peek(&self, offset: usize) -> Option<char> {
		self.chars.get(self.idx + offset).copied()
	}
}

fn is_ident_start(ch: char) -> bool {
	ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || ch == '_'
}

fn link_parens(buffer: &mut TokenBuffer) {
	let mut stack = Vec::new();

	for position in 0..buffer.len() {
		match buffer.get(position).map(|token| token.kind) {
			Some(TokenKind::OpenParen) => stack.push(position),
			Some(TokenKind::CloseParen) =>
				if let Some(opener) = stack.pop() {
					if let Some(token) = buffer.get_mut(opener) {
						token.paren_closer = Some(position);
					}
				},
			_ => {},
		}
	}
}

/// Resolve `scope_opener`/`scope_closer` for every function and closure.
///
/// The body brace is the first `{` after the parameter list, skipping the
/// optional `use (...)` capture list and `: type` return declaration. A `;`
/// first means an abstract/interface signature, which gets no links.
fn link_function_scopes(buffer: &mut TokenBuffer) {
	for position in 0..buffer.len() {
		let Some(token) = buffer.get(position) else {
			continue;
		};

		if !matches!(token.kind, TokenKind::Function | TokenKind::Closure) {
			continue;
		}

		let Some((opener, closer)) = resolve_scope(buffer, position) else {
			continue;
		};

		if let Some(token) = buffer.get_mut(position) {
			token.scope_opener = Some(opener);
			token.scope_closer = Some(closer);
		}
	}
}

fn resolve_scope(buffer: &TokenBuffer, function: usize) -> Option<(usize, usize)> {
	let open_paren = buffer.find_next(&[TokenKind::OpenParen], function + 1, None)?;
	let close_paren = buffer.get(open_paren)?.paren_closer?;
	let mut cursor = close_paren + 1;

	let opener = loop {
		let token = buffer.get(cursor)?;

		match token.kind {
			TokenKind::OpenCurly => break cursor,
			TokenKind::Semicolon => return None,
			// Skip a closure's `use (...)` capture list.
			TokenKind::OpenParen => cursor = token.paren_closer? + 1,
			_ => cursor += 1,
		}
	};

	let mut depth = 1_usize;
	let mut cursor = opener + 1;

	while cursor < buffer.len() {
		match buffer.get(cursor)?.kind {
			TokenKind::OpenCurly => depth += 1,
			TokenKind::CloseCurly => {
				depth -= 1;

				if depth == 0 {
					return Some((opener, cursor));
				}
			},
			_ => {},
		}

		cursor += 1;
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn kinds_of(text: &str) -> Vec<TokenKind> {
		tokenize(text).tokens().iter().map(|token| token.kind).collect()
	}

	#[test]
	fn lexes_variables_and_keywords() {
		let buffer = tokenize("<?php\nfunction greet() { return; }\n");
		let tokens = buffer.tokens();

		assert!(tokens.iter().any(|t| t.kind == TokenKind::OpenTag));
		assert!(tokens.iter().any(|t| t.kind == TokenKind::Function));
		assert!(tokens.iter().any(|t| t.kind == TokenKind::Return));
	}

	#[test]
	fn distinguishes_closures_from_named_functions() {
		let buffer = tokenize("<?php $f = function ($x) { return $x; };\nfunction named() {}\n");
		let kinds = buffer.tokens().iter().map(|t| t.kind).collect::<Vec<_>>();

		assert!(kinds.contains(&TokenKind::Closure));
		assert!(kinds.contains(&TokenKind::Function));
	}

	#[test]
	fn round_trips_source_text() {
		let text =
			"<?php\n/**\n * Adds.\n *\n * @param int $a Left.\n */\nfunction add($a) { return $a; }\n";

		assert_eq!(tokenize(text).render(), text);
	}

	#[test]
	fn doc_comment_structure_is_token_addressable() {
		let buffer = tokenize("<?php\n/**\n * @param int $a Left side\n */\n");
		let tokens = buffer.tokens();
		let tag = tokens.iter().position(|t| t.kind == TokenKind::DocTag).expect("tag");

		assert_eq!(tokens[tag].text, "@param");
		assert_eq!(tokens[tag + 1].kind, TokenKind::DocWhitespace);
		assert_eq!(tokens[tag + 2].kind, TokenKind::DocString);
		assert_eq!(tokens[tag + 2].text, "int $a Left side");
	}

	#[test]
	fn doc_open_links_to_close() {
		let buffer = tokenize("<?php /** @return void */ function f() {}");
		let open = buffer.find_next(&[TokenKind::DocOpen], 0, None).expect("open");
		let close = buffer.get(open).and_then(|t| t.comment_closer).expect("closer");

		assert_eq!(buffer.get(close).map(|t| t.kind), Some(TokenKind::DocClose));
		assert_eq!(buffer.get(close).and_then(|t| t.comment_opener), Some(open));
	}

	#[test]
	fn recognizes_casts_but_not_calls() {
		let cast = tokenize("<?php $b = (boolean) $value;");
		let call = tokenize("<?php $b = intval($value);");

		assert!(cast.tokens().iter().any(|t| t.kind == TokenKind::Cast && t.text == "(boolean)"));
		assert!(!call.tokens().iter().any(|t| t.kind == TokenKind::Cast));
	}

	#[test]
	fn parameter_list_is_not_a_cast() {
		let buffer = tokenize("<?php function f(bool $flag) {}");

		assert!(!buffer.tokens().iter().any(|t| t.kind == TokenKind::Cast));
	}

	#[test]
	fn function_scope_links_span_the_body() {
		let buffer = tokenize("<?php function f() { if (true) { echo 1; } }");
		let function = buffer.find_next(&[TokenKind::Function], 0, None).expect("function");
		let token = buffer.get(function).expect("token");
		let opener = token.scope_opener.expect("opener");
		let closer = token.scope_closer.expect("closer");

		assert_eq!(buffer.get(opener).map(|t| t.kind), Some(TokenKind::OpenCurly));
		assert_eq!(closer, buffer.len() - 1);
	}

	#[test]
	fn abstract_signature_gets_no_scope_links() {
		let buffer = tokenize("<?php abstract class A { abstract function f(); }");
		let function = buffer.find_next(&[TokenKind::Function], 0, None).expect("function");

		assert_eq!(buffer.get(function).and_then(|t| t.scope_opener), None);
	}

	#[test]
	fn leading_html_is_one_token() {
		let kinds = kinds_of("<html>\n<?php echo 1;");

		assert_eq!(kinds[0], TokenKind::InlineHtml);
		assert_eq!(kinds[1], TokenKind::OpenTag);
	}

	#[test]
	fn line_and_column_are_one_based() {
		let buffer = tokenize("<?php\n$x = 1;\n");
		let variable = buffer.find_next(&[TokenKind::Variable], 0, None).expect("variable");
		let token = buffer.get(variable).expect("token");

		assert_eq!((token.line, token.column), (2, 1));
	}
}
