//! Interactive EULA prompting (§4.7) via `inquire`.

use cpackget::reporters::{errors::EulaPromptError, EulaPrompter};
use is_terminal::IsTerminal as _;

/// Prompts on a real terminal; refuses to block a non-interactive run rather
/// than hang waiting for input that will never arrive.
pub struct TerminalEulaPrompter;

impl EulaPrompter for TerminalEulaPrompter {
	fn confirm(&self, eula_text: &str) -> Result<bool, EulaPromptError> {
		if !std::io::stdin().is_terminal() {
			return Err(EulaPromptError::NoTty);
		}

		println!("{eula_text}\n");
		inquire::Confirm::new("Do you agree to the end-user license agreement above?")
			.with_default(false)
			.prompt()
			.map_err(|e| match e {
				inquire::InquireError::IO(io_err) => EulaPromptError::Io(io_err),
				_ => EulaPromptError::NoTty,
			})
	}
}
