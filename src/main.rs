//! PHP docblock style checker executable.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

mod cli;
mod linter;

mod prelude {
	pub use color_eyre::{Result, eyre};
}

// std
use std::process::ExitCode;
// crates.io
use clap::Parser;
// self
use crate::cli::Cli;

fn normalize_args(mut args: Vec<String>) -> Vec<String> {
	if args.get(1).is_some_and(|arg| arg == "phpstyle") {
		args.remove(1);
	}

	args
}

fn normalized_cli_args() -> Vec<String> {
	normalize_args(std::env::args().collect::<Vec<_>>())
}

fn main() -> ExitCode {
	if let Err(err) = color_eyre::install() {
		eprintln!("Failed to initialize error reporter: {err}.");

		return ExitCode::FAILURE;
	}

	match Cli::parse_from(normalized_cli_args()).run() {
		Ok(code) => code,
		Err(err) => {
			eprintln!("{err:?}");

			ExitCode::FAILURE
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn normalize_args_strips_cargo_subcommand_name() {
		let args = vec!["cargo-phpstyle".to_owned(), "phpstyle".to_owned(), "check".to_owned()];
		assert_eq!(normalize_args(args), vec!["cargo-phpstyle".to_owned(), "check".to_owned()]);
	}

	#[test]
	fn normalize_args_keeps_plain_invocation() {
		let args = vec!["phpstyle-bin".to_owned(), "check".to_owned()];
		assert_eq!(normalize_args(args.clone()), args);
	}
}
