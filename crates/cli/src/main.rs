use std::process::ExitCode;

fn main() -> ExitCode {
    soundchain_cli::run()
}
