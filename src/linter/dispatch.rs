// std
use std::collections::HashMap;

// self
use super::{
	fixer::Fixer,
	long_type_name::LongTypeNameRule,
	return_annotation::ReturnAnnotationRule,
	shared::Reporter,
	tag_spacing::TagSpacingRule,
	token::{TokenBuffer, TokenKind},
};

/// Everything a rule may do while visiting: report violations and queue
/// changesets. Rules never mutate the buffer directly.
pub(crate) struct Sink<'a> {
	pub(crate) reporter: &'a mut Reporter,
	pub(crate) fixer: &'a mut Fixer,
}

/// One self-contained detector+fixer. Rules declare the token kinds they
/// want and get called back at every occurrence, in position order.
pub(crate) trait Rule {
	fn interested_kinds(&self) -> &'static [TokenKind];

	fn visit(&mut self, buffer: &TokenBuffer, position: usize, sink: &mut Sink);
}

/// The closed, compile-time rule catalog. Instances are created fresh per
/// scan pass so per-pass rule state (dedup caches) never leaks across files.
pub(crate) fn build_rules() -> Vec<Box<dyn Rule>> {
	vec![
		Box::new(TagSpacingRule),
		Box::new(ReturnAnnotationRule),
		Box::new(LongTypeNameRule::new()),
	]
}

/// One left-to-right scan: every `(token, rule)` pair whose kind matches the
/// rule's interest set is visited exactly once, position-ascending with
/// registration order breaking ties.
pub(crate) fn run_pass(
	buffer: &TokenBuffer,
	rules: &mut [Box<dyn Rule>],
	reporter: &mut Reporter,
	fixer: &mut Fixer,
) {
	let mut interest: HashMap<TokenKind, Vec<usize>> = HashMap::new();

	for (index, rule) in rules.iter().enumerate() {
		for kind in rule.interested_kinds() {
			interest.entry(*kind).or_default().push(index);
		}
	}

	for position in 0..buffer.len() {
		let Some(token) = buffer.get(position) else {
			break;
		};
		let Some(indices) = interest.get(&token.kind) else {
			continue;
		};

		for index in indices {
			let mut sink = Sink { reporter: &mut *reporter, fixer: &mut *fixer };

			rules[*index].visit(buffer, position, &mut sink);
		}
	}
}
