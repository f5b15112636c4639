use std::fs;
use std::io;

use log::debug;

use crate::chain::{Chain, ChainCompiler};
use crate::document::{DocumentNode, parse_document};
use crate::error::{ChainError, Result};

/// Loads a chain from a file path, or from `source` itself when `is_raw`.
pub fn load_chain(source: &str, is_raw: bool, compiler: &ChainCompiler) -> Result<Chain> {
    let text = if is_raw {
        source.to_string()
    } else {
        debug!("reading chain document {}", source);
        fs::read_to_string(source).map_err(|e| io::Error::new(e.kind(), format!("{}: {}", source, e)))?
    };
    let document = parse_document(&text)?;
    compile_document(&document, compiler)
}

/// The document must be a single named chain (`root: [...]`). The root
/// scope runs on the local machine unless it declares its own `addr`.
pub fn compile_document(document: &DocumentNode, compiler: &ChainCompiler) -> Result<Chain> {
    let DocumentNode::KeyedBlock { key, value } = document else {
        return Err(ChainError::Compile(format!(
            "expected a single top-level chain such as 'root:', found {}",
            document.kind()
        )));
    };

    let root = compiler
        .compile(key, value, None)
        .ok_or_else(|| ChainError::Compile(format!("chain '{}' must be a sequence, found {}", key, value.kind())))?;
    Ok(Chain::new(root))
}
