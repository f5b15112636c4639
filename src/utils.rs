use std::env;

use log::debug;

/// Picks the interpreter for local commands: configured shell first, then
/// `$SHELL`, then the platform default. Resolved through `PATH` when possible.
pub fn detect_shell(config_shell: Option<&String>) -> String {
    let shell = config_shell
        .cloned()
        .or_else(|| env::var("SHELL").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| if cfg!(windows) { "cmd".to_string() } else { "sh".to_string() });

    match which::which(&shell) {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(e) => {
            debug!("could not resolve shell '{}' on PATH: {}", shell, e);
            shell
        }
    }
}

/// "cmd" takes `/C`; every POSIX-like shell (and powershell) takes `-c`.
pub fn shell_flag(shell_cmd: &str) -> &'static str {
    if shell_cmd.contains("cmd") && !shell_cmd.contains("sh") {
        "/C"
    } else {
        "-c"
    }
}
