pub mod capture;
pub mod local;
pub mod remote;
pub mod ssh;
pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::credentials::DiscoverySettings;
use crate::error::Result;

pub use capture::{RedirectGuard, capture_output};
pub use local::LocalSession;
pub use remote::RemoteSession;

/// An execution target: something a command line can be run against.
pub trait Session {
    /// Runs one command line, streaming its stdout into the current sink.
    fn run(&mut self, command_line: &str) -> Result<()>;

    /// Establishes the underlying connection. Idempotent.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()>;

    /// Swaps the output sink, handing back the previous one.
    fn set_output_sink(&mut self, sink: OutputSink) -> OutputSink;

    fn output_sink(&self) -> &OutputSink;

    /// Merges scope configuration into the connection parameters.
    fn configure(&mut self, scope: &ScopeConfig);

    /// Human-readable target name for logs.
    fn identify(&self) -> String;

    /// True when the session has no target of its own and its scope
    /// should run wherever the enclosing scope runs.
    fn is_pass_through(&self) -> bool {
        false
    }

    fn connection_params(&self) -> Option<&ConnectionParams> {
        None
    }

    fn connection_params_mut(&mut self) -> Option<&mut ConnectionParams> {
        None
    }
}

/// Where command stdout goes.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    #[default]
    Stdout,
    Buffer(SharedBuffer),
}

impl OutputSink {
    pub fn writer(&self) -> Box<dyn Write> {
        match self {
            OutputSink::Stdout => Box::new(io::stdout()),
            OutputSink::Buffer(buffer) => Box::new(buffer.clone()),
        }
    }
}

// Cloning shares the underlying bytes, so a session can write into a
// buffer that the caller still holds.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, PartialEq)]
pub enum AuthMethod {
    Password(String),
    /// PEM-encoded private key and where it was found.
    PrivateKey { source: String, pem: String },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => write!(f, "Password([REDACTED])"),
            AuthMethod::PrivateKey { source, .. } => write!(f, "PrivateKey({})", source),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionParams {
    /// `host:port`; empty means no remote host was declared.
    pub address: String,
    pub user: String,
    pub auth: Vec<AuthMethod>,
}

pub const RESERVED_KEYS: [&str; 3] = ["addr", "user", "password"];

/// Connection settings collected from one chain's own entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeConfig {
    pub addr: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ScopeConfig {
    pub fn is_reserved(key: &str) -> bool {
        RESERVED_KEYS.contains(&key)
    }

    /// Records a recognized key; returns false for anything else.
    pub fn apply(&mut self, key: &str, value: &str) -> bool {
        let slot = match key {
            "addr" => &mut self.addr,
            "user" => &mut self.user,
            "password" => &mut self.password,
            _ => return false,
        };
        *slot = Some(value.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.addr.is_none() && self.user.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyPolicy {
    /// Accept whatever key the server presents.
    AcceptAny,
    /// Require a matching entry in an OpenSSH known_hosts file.
    KnownHosts(PathBuf),
}

/// Everything a compiler needs to construct sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
    pub shell: String,
    pub env: HashMap<String, String>,
    pub discovery: Option<DiscoverySettings>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            host_key_policy: HostKeyPolicy::AcceptAny,
            shell: "sh".to_string(),
            env: HashMap::new(),
            discovery: None,
        }
    }
}
