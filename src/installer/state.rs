//! The Installer's lifecycle state machine (§4.7): `Start → Parsed →
//! Resolved → Fetched → Validated → Staged → Registered → Touched → Done`,
//! with failure states that short-circuit the happy path.
//!
//! A crash between `Fetched` and `Registered` must leave only the
//! `.Download/*.partial` temp file behind — never a half-written install
//! directory or index (§8 invariant 7). The state machine enforces this by
//! only ever writing into the final install directory and indices from the
//! `Staged → Registered` transition, which is the one step wrapped by the
//! pack-root lock and performed as a sequence of individually-atomic writes.

/// One step of an add/update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Start,
	Parsed,
	Resolved,
	Fetched,
	Validated,
	Staged,
	Registered,
	Touched,
	Done,
	EulaRejected,
	CorruptArchive,
	Collision,
	IndexWriteFail,
}

impl State {
	/// Whether this is a terminal failure state.
	#[must_use]
	pub fn is_failure(self) -> bool {
		matches!(
			self,
			State::EulaRejected | State::CorruptArchive | State::Collision | State::IndexWriteFail
		)
	}

	/// Whether this is the terminal success state.
	#[must_use]
	pub fn is_done(self) -> bool {
		self == State::Done
	}
}

/// Tracks the sequence of states an operation has passed through, rejecting
/// any transition that isn't the next step of the happy path or a defined
/// failure exit.
#[derive(Debug, Clone)]
pub struct Transition {
	current: State,
}

impl Default for Transition {
	fn default() -> Self {
		Self { current: State::Start }
	}
}

impl Transition {
	#[must_use]
	pub fn current(&self) -> State {
		self.current
	}

	/// Advances to `next`, rejecting any transition not in the table below.
	pub fn advance(&mut self, next: State) -> Result<(), errors::TransitionError> {
		let allowed = match self.current {
			State::Start => matches!(next, State::Parsed),
			State::Parsed => matches!(next, State::Resolved),
			State::Resolved => matches!(next, State::Fetched | State::EulaRejected),
			State::Fetched => matches!(next, State::Validated | State::CorruptArchive),
			State::Validated => matches!(next, State::Staged | State::Collision | State::EulaRejected),
			State::Staged => matches!(next, State::Registered | State::IndexWriteFail),
			State::Registered => matches!(next, State::Touched),
			State::Touched => matches!(next, State::Done),
			State::Done
			| State::EulaRejected
			| State::CorruptArchive
			| State::Collision
			| State::IndexWriteFail => false,
		};

		if allowed {
			self.current = next;
			Ok(())
		} else {
			Err(errors::TransitionError::Illegal { from: self.current, to: next })
		}
	}
}

pub mod errors {
	use thiserror::Error;

	#[derive(Debug, Error)]
	#[non_exhaustive]
	pub enum TransitionError {
		#[error("illegal state transition from {from:?} to {to:?}")]
		Illegal { from: super::State, to: super::State },
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn happy_path_reaches_done() {
		let mut t = Transition::default();
		for next in [
			State::Parsed,
			State::Resolved,
			State::Fetched,
			State::Validated,
			State::Staged,
			State::Registered,
			State::Touched,
			State::Done,
		] {
			t.advance(next).unwrap();
		}
		assert!(t.current().is_done());
	}

	#[test]
	fn rejects_skipping_a_state() {
		let mut t = Transition::default();
		assert!(t.advance(State::Resolved).is_err());
	}

	#[test]
	fn eula_rejection_is_a_terminal_exit_from_validated() {
		// the license text only becomes available once the manifest has been
		// fetched and parsed, so the EULA prompt — and its rejection exit —
		// happens after `Validated`, not `Resolved`.
		let mut t = Transition::default();
		t.advance(State::Parsed).unwrap();
		t.advance(State::Resolved).unwrap();
		t.advance(State::Fetched).unwrap();
		t.advance(State::Validated).unwrap();
		t.advance(State::EulaRejected).unwrap();
		assert!(t.current().is_failure());
		assert!(t.advance(State::Staged).is_err());
	}

	#[test]
	fn crash_between_fetched_and_registered_cannot_skip_validation_or_staging() {
		// a process that died right after `Fetched` never advanced past it;
		// resuming must go through `Validated`/`Staged` again, never jump
		// straight to `Registered` on stale state.
		let mut t = Transition::default();
		t.advance(State::Parsed).unwrap();
		t.advance(State::Resolved).unwrap();
		t.advance(State::Fetched).unwrap();
		assert!(t.advance(State::Registered).is_err());
	}
}
