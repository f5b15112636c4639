use std::ops::{Deref, DerefMut};

use super::{OutputSink, Session, SharedBuffer};
use crate::error::Result;

/// Redirects a session's output for as long as the guard lives.
/// The previous sink is put back on drop, whichever way the scope is left.
pub struct RedirectGuard<'a> {
    session: &'a mut dyn Session,
    previous: Option<OutputSink>,
}

impl<'a> RedirectGuard<'a> {
    pub fn new(session: &'a mut dyn Session, sink: OutputSink) -> Self {
        let previous = session.set_output_sink(sink);
        Self {
            session,
            previous: Some(previous),
        }
    }
}

impl<'a> Deref for RedirectGuard<'a> {
    type Target = dyn Session + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl<'a> DerefMut for RedirectGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl Drop for RedirectGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.session.set_output_sink(previous);
        }
    }
}

/// Runs a command and returns its stdout instead of streaming it.
pub fn capture_output(session: &mut dyn Session, command_line: &str) -> Result<String> {
    let buffer = SharedBuffer::default();
    {
        let mut guard = RedirectGuard::new(session, OutputSink::Buffer(buffer.clone()));
        guard.run(command_line)?;
    }
    Ok(buffer.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LocalSession;

    #[test]
    fn test_capture_restores_sink_on_success() {
        let mut session = LocalSession::with_shell("sh");
        let out = capture_output(&mut session, "echo captured").unwrap();
        assert_eq!(out.trim(), "captured");
        assert!(matches!(session.output_sink(), OutputSink::Stdout));
    }

    #[test]
    fn test_capture_restores_sink_on_failure() {
        let mut session = LocalSession::with_shell("sh");
        let original = SharedBuffer::default();
        session.set_output_sink(OutputSink::Buffer(original.clone()));

        assert!(capture_output(&mut session, "echo lost; exit 3").is_err());

        session.run("echo kept").unwrap();
        assert_eq!(original.to_string_lossy().trim(), "kept");
    }
}
