use std::sync::Arc;

use log::{debug, warn};

use super::{ChainNode, CommandsChain, SingleCommand};
use crate::document::DocumentNode;
use crate::session::ssh::SshTransport;
use crate::session::transport::Transport;
use crate::session::{LocalSession, RemoteSession, ScopeConfig, Session, SessionSettings};

/// Turns a document tree into an executable chain.
pub struct ChainCompiler {
    settings: Arc<SessionSettings>,
    transport: Arc<dyn Transport>,
}

impl ChainCompiler {
    pub fn new(settings: SessionSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings: Arc::new(settings),
            transport,
        }
    }

    pub fn with_ssh(settings: SessionSettings) -> Self {
        Self::new(settings, Arc::new(SshTransport))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn local_session(&self) -> LocalSession {
        LocalSession::new(&self.settings)
    }

    /// Compiles `node` into a chain named `name`.
    ///
    /// Returns `None` when `node` is not a sequence. Each scope gets a fresh,
    /// address-less remote session unless `inherited` is given; single-key
    /// `addr`/`user`/`password` entries configure that session and never
    /// become children. Entries of any other shape are skipped.
    pub fn compile(&self, name: &str, node: &DocumentNode, inherited: Option<Box<dyn Session>>) -> Option<CommandsChain> {
        let DocumentNode::Sequence(entries) = node else {
            debug!("'{}' is a {}, not a chain", name, node.kind());
            return None;
        };

        let session = inherited
            .unwrap_or_else(|| Box::new(RemoteSession::new(self.transport.clone(), self.settings.clone())) as Box<dyn Session>);
        let mut chain = CommandsChain::new(name, session, self.settings.discovery.clone());
        let mut scope = ScopeConfig::default();

        for entry in entries {
            match entry {
                DocumentNode::Scalar(command_line) => {
                    chain.push(ChainNode::Command(SingleCommand::new(command_line.as_str())));
                }
                DocumentNode::KeyedBlock { key, value } if ScopeConfig::is_reserved(key) => match value.as_scalar() {
                    Some(value) => {
                        scope.apply(key, value);
                    }
                    None => warn!(
                        "'{}' in chain '{}' is a reserved configuration key; its {} value is ignored and not run as a sub-chain",
                        key,
                        name,
                        value.kind()
                    ),
                },
                DocumentNode::KeyedBlock { key, value } => match self.compile(key, value, None) {
                    Some(sub_chain) => {
                        chain.push(ChainNode::Chain(sub_chain));
                    }
                    None => warn!(
                        "skipping '{}' in chain '{}': expected a sequence, found {}",
                        key,
                        name,
                        value.kind()
                    ),
                },
                other => warn!("skipping {} entry in chain '{}'", other.kind(), name),
            }
        }

        if !scope.is_empty() {
            chain.session_mut().configure(&scope);
        }
        Some(chain)
    }
}
