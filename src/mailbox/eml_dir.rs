use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};

use crate::error::MailboxError;
use crate::mailbox::Mailbox;

/// Mailbox backed by a directory of `.eml` files. Identifiers are file
/// names, listed in lexical order.
pub struct EmlDirectoryMailbox {
    dir: PathBuf,
}

impl EmlDirectoryMailbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        EmlDirectoryMailbox { dir: dir.into() }
    }

    fn is_eml(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("eml"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Mailbox for EmlDirectoryMailbox {
    async fn list_ids(&self, limit: Option<usize>) -> Result<Vec<String>, MailboxError> {
        info!("Listing .eml files in {}", self.dir.display());

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| MailboxError::Transport(format!("{}: {}", self.dir.display(), e)))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !Self::is_eml(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(name.to_string());
            }
        }
        ids.sort();

        if let Some(limit) = limit {
            ids.truncate(limit);
        }

        info!("Found {} email file(s)", ids.len());
        Ok(ids)
    }

    async fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, MailboxError> {
        // Identifiers are bare file names
        if id.contains(['/', '\\']) || id == ".." {
            return Err(MailboxError::NotFound(id.to_string()));
        }

        let path = self.dir.join(id);
        debug!("Reading {}", path.display());

        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MailboxError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}
