use soundchain_core::licensing::rights::validate_usage_rights;

use super::{CommandResult, EXIT_INVALID_INPUT, EXIT_REJECTED};

const COMMAND: &str = "rights";

/// Exits non-zero when any requested right falls outside the allowed set.
pub fn run(requested: &[String], allowed: &[String]) -> CommandResult {
    if requested.is_empty() {
        return CommandResult::failure(
            COMMAND,
            "invalid_input",
            "--requested must name at least one usage right",
            EXIT_INVALID_INPUT,
        );
    }

    let validation = validate_usage_rights(requested, allowed);
    let result = serde_json::to_value(&validation).ok();
    if validation.valid {
        CommandResult::success_with(COMMAND, validation.message, result)
    } else {
        CommandResult::failure_with(
            COMMAND,
            "rights_not_allowed",
            validation.message,
            EXIT_REJECTED,
            result,
        )
    }
}
