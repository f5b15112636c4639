use std::io::Write;
use std::sync::Arc;

use log::{debug, error, info};

use super::transport::{Connection, Transport};
use super::{AuthMethod, ConnectionParams, LocalSession, OutputSink, ScopeConfig, Session, SessionSettings};
use crate::error::{ChainError, Result};

/// A shell on another machine, reached through a [`Transport`].
///
/// The connection is dialed on first use and reused by every later `run`
/// until `close`. Without an address the session never dials and runs
/// commands locally instead.
pub struct RemoteSession {
    params: ConnectionParams,
    settings: Arc<SessionSettings>,
    transport: Arc<dyn Transport>,
    connection: Option<Box<dyn Connection>>,
    sink: OutputSink,
    fallback: LocalSession,
}

impl RemoteSession {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<SessionSettings>) -> Self {
        let fallback = LocalSession::new(&settings);
        Self {
            params: ConnectionParams::default(),
            settings,
            transport,
            connection: None,
            sink: OutputSink::Stdout,
            fallback,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn address(&self) -> &str {
        &self.params.address
    }
}

impl Session for RemoteSession {
    fn connect(&mut self) -> Result<()> {
        if self.params.address.is_empty() || self.is_connected() {
            return Ok(());
        }
        info!(
            "connecting to remote session: {}@{}",
            self.params.user, self.params.address
        );
        match self.transport.dial(&self.params, &self.settings) {
            Ok(connection) => {
                self.connection = Some(connection);
                Ok(())
            }
            Err(e) => {
                error!("connection to {} failed: {:#}", self.params.address, e);
                Err(ChainError::connect(&self.params.address, format!("{:#}", e)))
            }
        }
    }

    fn run(&mut self, command_line: &str) -> Result<()> {
        if self.params.address.is_empty() {
            return self.fallback.run(command_line);
        }
        self.connect()?;

        let target = self.identify();
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| ChainError::connect(&target, "not connected"))?;
        let mut channel = connection
            .open_channel()
            .map_err(|e| ChainError::exec(&target, command_line, format!("{:#}", e)))?;

        let mut writer = self.sink.writer();
        let outcome = channel.run(command_line, &mut *writer);
        if let Err(e) = writer.flush() {
            debug!("failed to flush output of '{}': {}", command_line, e);
        }
        if let Err(e) = channel.close() {
            debug!("failed to close channel on {}: {:#}", target, e);
        }

        match outcome {
            Ok(0) => Ok(()),
            Ok(status) => Err(ChainError::exec(target, command_line, format!("exit status: {}", status))),
            Err(e) => Err(ChainError::exec(target, command_line, format!("{:#}", e))),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(mut connection) => {
                debug!("closing connection to {}", self.params.address);
                connection
                    .close()
                    .map_err(|e| ChainError::connect(&self.params.address, format!("{:#}", e)))
            }
            None => Ok(()),
        }
    }

    fn set_output_sink(&mut self, sink: OutputSink) -> OutputSink {
        self.fallback.set_output_sink(sink.clone());
        std::mem::replace(&mut self.sink, sink)
    }

    fn output_sink(&self) -> &OutputSink {
        &self.sink
    }

    fn configure(&mut self, scope: &ScopeConfig) {
        if let Some(addr) = &scope.addr {
            self.params.address = addr.clone();
        }
        if let Some(user) = &scope.user {
            self.params.user = user.clone();
        }
        if let Some(password) = &scope.password {
            self.params.auth.push(AuthMethod::Password(password.clone()));
        }
    }

    fn identify(&self) -> String {
        if self.params.address.is_empty() {
            "localhost".to_string()
        } else {
            self.params.address.clone()
        }
    }

    fn is_pass_through(&self) -> bool {
        self.params.address.is_empty()
    }

    fn connection_params(&self) -> Option<&ConnectionParams> {
        Some(&self.params)
    }

    fn connection_params_mut(&mut self) -> Option<&mut ConnectionParams> {
        Some(&mut self.params)
    }
}
