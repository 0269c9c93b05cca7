/// Lexical token classes produced by the PHP lexer.
///
/// Doc-comment interiors get their own kinds so the docblock rules can walk
/// tag/content/whitespace structure without re-parsing comment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TokenKind {
	InlineHtml,
	OpenTag,
	Whitespace,
	Variable,
	Ident,
	Function,
	Closure,
	Visibility,
	Return,
	Yield,
	Colon,
	Semicolon,
	Comma,
	OpenParen,
	CloseParen,
	OpenCurly,
	CloseCurly,
	Cast,
	StringLiteral,
	Number,
	CommentLine,
	CommentBlock,
	DocOpen,
	DocClose,
	DocStar,
	DocWhitespace,
	DocTag,
	DocString,
	Op,
}

/// One lexical token plus the structural links the rules rely on.
///
/// Links are resolved by the lexer's post-pass; absent links mean the
/// construct was abstract or malformed and rules must degrade to no match.
#[derive(Debug, Clone)]
pub(crate) struct Token {
	pub(crate) kind: TokenKind,
	pub(crate) text: String,
	pub(crate) line: usize,
	pub(crate) column: usize,
	pub(crate) scope_opener: Option<usize>,
	pub(crate) scope_closer: Option<usize>,
	pub(crate) paren_closer: Option<usize>,
	pub(crate) comment_opener: Option<usize>,
	pub(crate) comment_closer: Option<usize>,
}

impl Token {
	pub(crate) fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
		Self {
			kind,
			text: text.into(),
			line,
			column,
			scope_opener: None,
			scope_closer: None,
			paren_closer: None,
			comment_opener: None,
			comment_closer: None,
		}
	}

	pub(crate) fn is(&self, kinds: &[TokenKind]) -> bool {
		kinds.contains(&self.kind)
	}
}

/// Arena of tokens for one file, addressed by stable integer position.
///
/// Positions stay valid for the duration of one dispatcher pass; committed
/// changesets re-render the text and the next pass re-tokenizes it.
#[derive(Debug)]
pub(crate) struct TokenBuffer {
	tokens: Vec<Token>,
}

impl TokenBuffer {
	pub(crate) fn new(tokens: Vec<Token>) -> Self {
		Self { tokens }
	}

	pub(crate) fn len(&self) -> usize {
		self.tokens.len()
	}

	pub(crate) fn get(&self, position: usize) -> Option<&Token> {
		self.tokens.get(position)
	}

	pub(crate) fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut Token> {
		self.tokens.get_mut(position)
	}

	/// First position in `start..end` whose kind is in `kinds`.
	pub(crate) fn find_next(
		&self,
		kinds: &[TokenKind],
		start: usize,
		end: Option<usize>,
	) -> Option<usize> {
		let end = end.unwrap_or(self.tokens.len()).min(self.tokens.len());

		(start..end).find(|position| self.tokens[*position].is(kinds))
	}

	/// First position in `start..end` whose kind is NOT in `kinds`.
	pub(crate) fn find_next_not(
		&self,
		kinds: &[TokenKind],
		start: usize,
		end: Option<usize>,
	) -> Option<usize> {
		let end = end.unwrap_or(self.tokens.len()).min(self.tokens.len());

		(start..end).find(|position| !self.tokens[*position].is(kinds))
	}

	/// Last position in `stop..=start` whose kind is in `kinds`.
	pub(crate) fn find_prev(
		&self,
		kinds: &[TokenKind],
		start: usize,
		stop: Option<usize>,
	) -> Option<usize> {
		if self.tokens.is_empty() {
			return None;
		}

		let start = start.min(self.tokens.len() - 1);
		let stop = stop.unwrap_or(0);

		(stop..=start).rev().find(|position| self.tokens[*position].is(kinds))
	}

	/// Last position in `stop..=start` whose kind is NOT in `kinds`.
	pub(crate) fn find_prev_not(
		&self,
		kinds: &[TokenKind],
		start: usize,
		stop: Option<usize>,
	) -> Option<usize> {
		if self.tokens.is_empty() {
			return None;
		}

		let start = start.min(self.tokens.len() - 1);
		let stop = stop.unwrap_or(0);

		(stop..=start).rev().find(|position| !self.tokens[*position].is(kinds))
	}

	/// Reassemble the file content from token texts.
	pub(crate) fn render(&self) -> String {
		self.tokens.iter().map(|token| token.text.as_str()).collect()
	}
}
