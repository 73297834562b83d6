//! CLI command implementations.

pub mod pending;
pub mod purge;
pub mod tables;
pub mod tokens;

use docsync_store::{FileDocumentStore, FileTokenStore, DOCUMENTS_FILE, TOKENS_FILE};
use std::path::Path;

pub(crate) type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

fn open_documents(path: &Path) -> CommandResult<FileDocumentStore> {
    if !path.join(DOCUMENTS_FILE).exists() {
        return Err(format!("No pending operation store found at {:?}", path).into());
    }
    Ok(FileDocumentStore::open_dir(path)?)
}

fn open_tokens(path: &Path) -> CommandResult<FileTokenStore> {
    if !path.join(TOKENS_FILE).exists() {
        return Err(format!("No token store found at {:?}", path).into());
    }
    Ok(FileTokenStore::open_dir(path)?)
}
