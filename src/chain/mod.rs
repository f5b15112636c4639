pub mod compiler;


use std::fmt;

use colored::*;
use log::{debug, error, info, warn};

use crate::credentials::{self, DiscoverySettings};
use crate::error::{ChainError, Result};
use crate::session::Session;

pub use compiler::ChainCompiler;

/// Lifecycle of one chain's scope during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Unconnected,
    Connecting,
    Ready,
    Closed,
    Failed,
}

#[derive(Debug)]
pub enum ChainNode {
    Command(SingleCommand),
    Chain(CommandsChain),
}

impl ChainNode {
    /// Runs the node against the session of its enclosing scope.
    pub fn execute(&mut self, session: Option<&mut dyn Session>) -> Result<()> {
        match self {
            ChainNode::Command(command) => command.execute(session),
            ChainNode::Chain(chain) => chain.execute(session),
        }
    }

    pub fn as_command(&self) -> Option<&SingleCommand> {
        match self {
            ChainNode::Command(command) => Some(command),
            ChainNode::Chain(_) => None,
        }
    }

    pub fn as_chain(&self) -> Option<&CommandsChain> {
        match self {
            ChainNode::Chain(chain) => Some(chain),
            ChainNode::Command(_) => None,
        }
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        match self {
            ChainNode::Command(command) => {
                out.push_str(&format!("{}$ {}\n", "  ".repeat(depth), command.command_line));
            }
            ChainNode::Chain(chain) => chain.render_into(depth, out),
        }
    }
}

/// A single shell command. It owns no session; the enclosing chain hands
/// one over when it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleCommand {
    command_line: String,
}

impl SingleCommand {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
        }
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn execute(&self, session: Option<&mut dyn Session>) -> Result<()> {
        let Some(session) = session else {
            error!("no session bound for '{}'", self.command_line);
            return Err(ChainError::Binding(self.command_line.clone()));
        };
        info!("{}: {} {}", session.identify().cyan(), "$".bold(), self.command_line);
        session.run(&self.command_line).inspect_err(|e| error!("{} {}", "❌".red(), e))
    }
}

/// A named scope of commands and sub-chains sharing one session.
pub struct CommandsChain {
    name: String,
    session: Box<dyn Session>,
    children: Vec<ChainNode>,
    state: ChainState,
    discovery: Option<DiscoverySettings>,
}

impl CommandsChain {
    pub fn new(name: impl Into<String>, session: Box<dyn Session>, discovery: Option<DiscoverySettings>) -> Self {
        Self {
            name: name.into(),
            session,
            children: Vec::new(),
            state: ChainState::Unconnected,
            discovery,
        }
    }

    pub fn push(&mut self, node: ChainNode) -> &mut Self {
        self.children.push(node);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[ChainNode] {
        &self.children
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> &mut dyn Session {
        self.session.as_mut()
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Runs every child in document order and stops at the first failure.
    /// The chain's own session is closed on the way out, whatever happened.
    pub fn execute(&mut self, parent: Option<&mut dyn Session>) -> Result<()> {
        info!("{} {}", "run chain".blue(), self.name.bold());
        let result = self.run_children(parent);

        let closed = self.session.close();
        if let Err(e) = &closed {
            warn!("failed to close session of chain {}: {}", self.name, e);
        }
        self.state = if result.is_ok() && closed.is_ok() {
            ChainState::Closed
        } else {
            ChainState::Failed
        };
        info!("{} {}", "finished chain".blue(), self.name.bold());
        result.and(closed)
    }

    fn run_children(&mut self, parent: Option<&mut dyn Session>) -> Result<()> {
        let Self {
            name,
            session,
            children,
            state,
            discovery,
        } = self;

        let target: &mut dyn Session = match parent {
            Some(parent) if session.is_pass_through() => {
                debug!("chain {} runs on enclosing scope {}", name, parent.identify());
                *state = ChainState::Ready;
                parent
            }
            parent => {
                *state = ChainState::Connecting;
                if let Err(e) = connect_host(session.as_mut(), parent, discovery.as_ref()) {
                    *state = ChainState::Failed;
                    return Err(e);
                }
                *state = ChainState::Ready;
                session.as_mut()
            }
        };

        for child in children.iter_mut() {
            let scope: &mut dyn Session = &mut *target;
            child.execute(Some(scope))?;
        }
        Ok(())
    }

    /// Indented outline of the chain: names, targets and commands.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        // An address-less root has no enclosing scope and runs locally.
        let target = if depth > 0 && self.session.is_pass_through() {
            "enclosing scope".to_string()
        } else {
            self.session.identify()
        };
        out.push_str(&format!("{}{} [{}]\n", "  ".repeat(depth), self.name, target));
        for child in &self.children {
            child.render_into(depth + 1, out);
        }
    }
}

impl fmt::Debug for CommandsChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandsChain")
            .field("name", &self.name)
            .field("target", &self.session.identify())
            .field("state", &self.state)
            .field("children", &self.children)
            .finish()
    }
}

fn connect_host(
    session: &mut dyn Session,
    parent: Option<&mut dyn Session>,
    discovery: Option<&DiscoverySettings>,
) -> Result<()> {
    if session.is_pass_through() {
        return Ok(());
    }
    if let Some(settings) = discovery {
        match parent {
            Some(parent) => {
                credentials::enrich(session, parent, settings);
            }
            None => debug!("no enclosing session to discover keys through for {}", session.identify()),
        }
    }
    session.connect()
}

/// A compiled document, ready to run once.
#[derive(Debug)]
pub struct Chain {
    root: CommandsChain,
}

impl Chain {
    pub fn new(root: CommandsChain) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &CommandsChain {
        &self.root
    }

    pub fn execute(&mut self) -> Result<()> {
        self.root.execute(None)
    }

    pub fn render(&self) -> String {
        self.root.render()
    }
}
