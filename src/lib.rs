//! Runs a YAML tree of shell commands, each nested chain in its own scope
//! on the local machine or on a remote host reached over SSH.
//!
//! ```yaml
//! root:
//!   - echo "on the local machine"
//!   - web:
//!       - addr: 10.0.0.5:22
//!       - user: deploy
//!       - password: secret
//!       - systemctl restart app
//! ```

pub mod chain;
pub mod config;
pub mod credentials;
pub mod document;
pub mod error;
pub mod loader;
pub mod logger;
pub mod session;
pub mod utils;

pub use chain::{Chain, ChainCompiler};
pub use error::{ChainError, Result};
pub use loader::load_chain;
