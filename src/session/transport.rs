//! Capability interface for remote shells.
//!
//! `RemoteSession` only ever talks to these traits; the production
//! implementation lives in `session::ssh`.

use std::io::Write;

use anyhow::Result;

use super::{ConnectionParams, SessionSettings};

pub trait Transport: Send + Sync {
    fn dial(&self, params: &ConnectionParams, settings: &SessionSettings) -> Result<Box<dyn Connection>>;
}

/// An established, authenticated connection.
pub trait Connection {
    /// Opens a fresh execution channel. Channels are never reused.
    fn open_channel(&mut self) -> Result<Box<dyn ExecChannel>>;

    fn close(&mut self) -> Result<()>;
}

pub trait ExecChannel {
    /// Runs the command to completion with its stdin closed and returns
    /// its exit status. stderr goes to the local stderr.
    fn run(&mut self, command_line: &str, stdout: &mut dyn Write) -> Result<i32>;

    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use anyhow::bail;

    use super::*;

    pub type EventLog = Arc<Mutex<Vec<String>>>;

    /// Records every dial, command and close instead of touching the network.
    #[derive(Default, Clone)]
    pub struct RecordingTransport {
        pub events: EventLog,
        /// Command line -> stdout it produces.
        pub responses: HashMap<String, String>,
        /// Commands containing any of these exit with status 1.
        pub failing: Vec<String>,
        pub unreachable: Vec<String>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, command: &str, stdout: &str) -> Self {
            self.responses.insert(command.to_string(), stdout.to_string());
            self
        }

        pub fn fail_on(mut self, fragment: &str) -> Self {
            self.failing.push(fragment.to_string());
            self
        }

        pub fn unreachable(mut self, address: &str) -> Self {
            self.unreachable.push(address.to_string());
            self
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn dial(&self, params: &ConnectionParams, _settings: &SessionSettings) -> Result<Box<dyn Connection>> {
            self.events.lock().unwrap().push(format!(
                "dial {} as {} with {} auth",
                params.address,
                params.user,
                params.auth.len()
            ));
            if self.unreachable.contains(&params.address) {
                bail!("connection refused");
            }
            Ok(Box::new(RecordingConnection {
                address: params.address.clone(),
                transport: self.clone(),
            }))
        }
    }

    struct RecordingConnection {
        address: String,
        transport: RecordingTransport,
    }

    impl Connection for RecordingConnection {
        fn open_channel(&mut self) -> Result<Box<dyn ExecChannel>> {
            Ok(Box::new(RecordingChannel {
                address: self.address.clone(),
                transport: self.transport.clone(),
            }))
        }

        fn close(&mut self) -> Result<()> {
            self.transport.events.lock().unwrap().push(format!("disconnect {}", self.address));
            Ok(())
        }
    }

    struct RecordingChannel {
        address: String,
        transport: RecordingTransport,
    }

    impl ExecChannel for RecordingChannel {
        fn run(&mut self, command_line: &str, stdout: &mut dyn Write) -> Result<i32> {
            self.transport
                .events
                .lock()
                .unwrap()
                .push(format!("run {}: {}", self.address, command_line));
            if let Some(out) = self.transport.responses.get(command_line) {
                stdout.write_all(out.as_bytes())?;
            }
            if self.transport.failing.iter().any(|f| command_line.contains(f.as_str())) {
                return Ok(1);
            }
            Ok(0)
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}
