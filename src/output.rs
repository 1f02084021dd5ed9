//! Tree document output

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ChannelTree;
use crate::utils::write_atomic;

/// Write the tree as pretty-printed JSON, replacing any previous document
///
/// # Errors
///
/// Any failure is [`Error::Fatal`]: a run without its tree document produced nothing.
pub async fn write_tree(tree: &ChannelTree, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(tree)
        .map_err(|e| Error::Fatal(format!("cannot serialize tree: {e}")))?;
    write_atomic(path, &json)
        .await
        .map_err(|e| Error::Fatal(format!("cannot write tree to {}: {e}", path.display())))?;

    tracing::info!(
        path = %path.display(),
        categories = tree.children.len(),
        bytes = json.len(),
        "Tree written"
    );
    Ok(())
}

/// Read a tree document written by [`write_tree`]
pub async fn read_tree(path: &Path) -> Result<ChannelTree> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}
