use tracing::debug;

/// Resolve a configured value. Values starting with '$' name an environment
/// variable; an unset variable resolves to `None` so the caller can prompt.
pub fn resolve_credential(value: &str) -> Option<String> {
    match value.strip_prefix('$') {
        Some(var_name) => match std::env::var(var_name) {
            Ok(resolved) if !resolved.is_empty() => {
                debug!(var = %var_name, "Resolved credential from environment");
                Some(resolved)
            }
            _ => {
                debug!(var = %var_name, "Environment variable not set");
                None
            }
        },
        None if value.is_empty() => None,
        None => Some(value.to_string()),
    }
}

/// Mask the values of password arguments in a command line before it is logged.
/// Handles `--password X`, `--password=X` and `-p X`.
pub fn redact_args(args: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            redacted.push("[REDACTED]".to_string());
            mask_next = false;
        } else if arg.starts_with("--password=") {
            redacted.push("--password=[REDACTED]".to_string());
        } else {
            mask_next = arg == "--password" || arg == "-p";
            redacted.push(arg.clone());
        }
    }
    redacted
}
