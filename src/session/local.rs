use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

use super::{OutputSink, ScopeConfig, Session, SessionSettings};
use crate::error::{ChainError, Result};
use crate::utils::shell_flag;

/// Runs commands through a shell interpreter on this machine.
#[derive(Debug, Clone)]
pub struct LocalSession {
    shell: String,
    env: HashMap<String, String>,
    sink: OutputSink,
}

impl LocalSession {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            shell: settings.shell.clone(),
            env: settings.env.clone(),
            sink: OutputSink::Stdout,
        }
    }

    pub fn with_shell(shell: &str) -> Self {
        Self {
            shell: shell.to_string(),
            env: HashMap::new(),
            sink: OutputSink::Stdout,
        }
    }
}

impl Session for LocalSession {
    fn run(&mut self, command_line: &str) -> Result<()> {
        let mut command = Command::new(&self.shell);
        command
            .arg(shell_flag(&self.shell))
            .arg(command_line)
            .envs(&self.env)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit());

        let spawn_failed =
            |e: std::io::Error| ChainError::exec(self.identify(), command_line, format!("failed to spawn '{}': {}", self.shell, e));

        let status = match &self.sink {
            OutputSink::Stdout => {
                command.stdout(Stdio::inherit());
                command.status().map_err(spawn_failed)?
            }
            OutputSink::Buffer(buffer) => {
                command.stdout(Stdio::piped());
                let output = command.output().map_err(spawn_failed)?;
                buffer.clone().write_all(&output.stdout)?;
                output.status
            }
        };

        if !status.success() {
            return Err(ChainError::exec(
                self.identify(),
                command_line,
                format!("exit code: {:?}", status.code()),
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_output_sink(&mut self, sink: OutputSink) -> OutputSink {
        std::mem::replace(&mut self.sink, sink)
    }

    fn output_sink(&self) -> &OutputSink {
        &self.sink
    }

    fn configure(&mut self, _scope: &ScopeConfig) {}

    fn identify(&self) -> String {
        "localhost".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SharedBuffer;
    use std::fs;

    #[test]
    fn test_run_writes_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let mut session = LocalSession::with_shell("sh");
        session
            .run(&format!("echo test > {}", target.to_string_lossy()))
            .unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap().trim(), "test");
    }

    #[test]
    fn test_non_zero_exit_is_exec_error() {
        let mut session = LocalSession::with_shell("sh");
        let err = session.run("exit 4").unwrap_err();
        match err {
            ChainError::Exec { target, command, reason } => {
                assert_eq!(target, "localhost");
                assert_eq!(command, "exit 4");
                assert!(reason.contains('4'));
            }
            other => panic!("expected Exec error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_shell_is_exec_error() {
        let mut session = LocalSession::with_shell("/nonexistent/shell");
        assert!(matches!(session.run("true"), Err(ChainError::Exec { .. })));
    }

    #[test]
    fn test_env_is_injected() {
        let mut settings = SessionSettings::default();
        settings.env.insert("CHAIN_TEST_VAR".to_string(), "injected".to_string());
        let mut session = LocalSession::new(&settings);
        let buffer = SharedBuffer::default();
        session.set_output_sink(OutputSink::Buffer(buffer.clone()));
        session.run("echo $CHAIN_TEST_VAR").unwrap();
        assert_eq!(buffer.to_string_lossy().trim(), "injected");
    }
}
