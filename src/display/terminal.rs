//! TTY detection and color support logic

use std::io::IsTerminal;

/// Determine if colors should be used based on environment and TTY status
pub fn should_use_colors() -> bool {
    colors_enabled(|name| std::env::var(name).ok(), std::io::stdout().is_terminal())
}

/// Decision table behind [`should_use_colors`], with the environment injected.
///
/// 1. `NO_COLOR` disables colors (https://no-color.org/)
/// 2. `CLICOLOR_FORCE` other than `0` enables them even when piped
/// 3. `CLICOLOR=0` disables them
/// 4. otherwise colors follow the TTY status of stdout
pub(crate) fn colors_enabled<F>(env: F, is_tty: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if env("NO_COLOR").is_some() {
        return false;
    }

    if let Some(val) = env("CLICOLOR_FORCE") {
        if val != "0" {
            return true;
        }
    }

    if env("CLICOLOR").as_deref() == Some("0") {
        return false;
    }

    is_tty
}
