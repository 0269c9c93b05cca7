// std
use std::collections::{HashMap, HashSet};

// self
use super::token::TokenBuffer;
use crate::prelude::*;

/// A primitive token edit. `Replace` swaps the token's text, `InsertAfter`
/// splices raw text into the gap behind the token, `Delete` is
/// `Replace("")`.
#[derive(Debug, Clone)]
pub(crate) enum EditOp {
	Replace(String),
	InsertAfter(String),
	Delete,
}

#[derive(Debug, Clone)]
pub(crate) struct Edit {
	pub(crate) position: usize,
	pub(crate) op: EditOp,
}

/// An atomic group of edits from one rule: all of it commits or none of it.
#[derive(Debug, Clone)]
pub(crate) struct Changeset {
	pub(crate) rule: &'static str,
	pub(crate) edits: Vec<Edit>,
	sequence: usize,
}

impl Changeset {
	fn first_position(&self) -> usize {
		self.edits.iter().map(|edit| edit.position).min().unwrap_or(usize::MAX)
	}
}

/// Claim granularity for conflict detection: a token's text slot and the
/// insertion gap behind it are independent, so a `Replace` and an
/// `InsertAfter` at the same position compose instead of conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ClaimKey {
	Slot(usize),
	Gap(usize),
}

fn claim_key(edit: &Edit) -> ClaimKey {
	match edit.op {
		EditOp::Replace(_) | EditOp::Delete => ClaimKey::Slot(edit.position),
		EditOp::InsertAfter(_) => ClaimKey::Gap(edit.position),
	}
}

#[derive(Debug)]
pub(crate) struct CommitOutcome {
	pub(crate) text: String,
	pub(crate) applied: usize,
	pub(crate) rejected: Vec<&'static str>,
}

/// Transactional edit log over the token buffer. Rules open a changeset,
/// queue ordered edits, and close it; nothing touches the buffer until
/// `commit` runs after the dispatcher pass.
#[derive(Debug, Default)]
pub(crate) struct Fixer {
	changesets: Vec<Changeset>,
	open: Option<Changeset>,
	next_sequence: usize,
}

impl Fixer {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn begin_changeset(&mut self, rule: &'static str) {
		// An unclosed changeset is a rule bug; drop it rather than merge edits
		// from two rules into one atomic group.
		self.open = Some(Changeset { rule, edits: Vec::new(), sequence: self.next_sequence });
		self.next_sequence += 1;
	}

	pub(crate) fn replace_token(&mut self, position: usize, text: impl Into<String>) {
		self.push_edit(position, EditOp::Replace(text.into()));
	}

	pub(crate) fn insert_after(&mut self, position: usize, text: impl Into<String>) {
		self.push_edit(position, EditOp::InsertAfter(text.into()));
	}

	pub(crate) fn delete_token(&mut self, position: usize) {
		self.push_edit(position, EditOp::Delete);
	}

	pub(crate) fn end_changeset(&mut self) {
		if let Some(changeset) = self.open.take() {
			if !changeset.edits.is_empty() {
				self.changesets.push(changeset);
			}
		}
	}

	pub(crate) fn has_changesets(&self) -> bool {
		!self.changesets.is_empty()
	}

	fn push_edit(&mut self, position: usize, op: EditOp) {
		// Edits outside a changeset are silently dropped; the engine only
		// commits closed groups.
		if let Some(changeset) = self.open.as_mut() {
			changeset.edits.push(Edit { position, op });
		}
	}

	/// Commit all closed changesets against the buffer, returning the
	/// re-rendered text. Changesets are applied in (first position, open
	/// order); a changeset that claims a slot or gap already claimed by an
	/// earlier-accepted one is rejected whole and its rule name returned for
	/// diagnostics.
	pub(crate) fn commit(mut self, buffer: &TokenBuffer) -> Result<CommitOutcome> {
		self.changesets
			.sort_by(|a, b| a.first_position().cmp(&b.first_position()).then(a.sequence.cmp(&b.sequence)));

		let mut claimed: HashSet<ClaimKey> = HashSet::new();
		let mut replacements: HashMap<usize, String> = HashMap::new();
		let mut insertions: HashMap<usize, String> = HashMap::new();
		let mut applied = 0_usize;
		let mut rejected = Vec::new();

		for changeset in &self.changesets {
			if let Some(edit) =
				changeset.edits.iter().find(|edit| edit.position >= buffer.len())
			{
				return Err(eyre::eyre!(
					"Invalid edit position {} for buffer length {}.",
					edit.position,
					buffer.len()
				));
			}

			let keys = changeset.edits.iter().map(claim_key).collect::<Vec<_>>();

			if keys.iter().any(|key| claimed.contains(key)) {
				rejected.push(changeset.rule);

				continue;
			}

			claimed.extend(keys);

			for edit in &changeset.edits {
				match &edit.op {
					EditOp::Replace(text) => {
						replacements.insert(edit.position, text.clone());
					},
					EditOp::Delete => {
						replacements.insert(edit.position, String::new());
					},
					EditOp::InsertAfter(text) => {
						insertions.entry(edit.position).or_default().push_str(text);
					},
				}
			}

			applied += 1;
		}

		let mut text = String::new();

		for position in 0..buffer.len() {
			match replacements.get(&position) {
				Some(replacement) => text.push_str(replacement),
				None =>
					if let Some(token) = buffer.get(position) {
						text.push_str(&token.text);
					},
			}

			if let Some(insertion) = insertions.get(&position) {
				text.push_str(insertion);
			}
		}

		Ok(CommitOutcome { text, applied, rejected })
	}
}
