//! Terminal detection

use is_terminal::IsTerminal;
use std::env;
use std::io::stdout;

const CI_VARS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "JENKINS_URL",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "TF_BUILD",
];

/// Whether stdout is an interactive terminal outside CI
pub fn is_interactive() -> bool {
    stdout().is_terminal() && !is_ci_environment()
}

/// Whether ANSI colors should be written to stdout
pub fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    let term = env::var("TERM").unwrap_or_default();
    is_interactive() && !term.is_empty() && term != "dumb"
}

/// Enable or disable colored output for the rest of the process
pub fn configure_color(enabled: bool) {
    colored::control::set_override(enabled && supports_color());
}

fn is_ci_environment() -> bool {
    CI_VARS.iter().any(|var| env::var_os(var).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_does_not_panic() {
        let _ = is_ci_environment();
        let _ = is_interactive();
        let _ = supports_color();
    }
}
