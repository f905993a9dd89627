//! Run configuration: client-secrets location, target documents, output layout.
//!
//! Two required inputs, both resolved before any network call is made:
//! - `GOOGLE_OAUTH_CLIENT_SECRETS`: path to the OAuth client secrets JSON
//! - at least one target document, from `GOOGLE_DOCUMENT_ID` and/or a
//!   `documents.toml` in the working directory

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CLIENT_SECRETS_ENV: &str = "GOOGLE_OAUTH_CLIENT_SECRETS";
pub const DOCUMENT_ID_ENV: &str = "GOOGLE_DOCUMENT_ID";

const DOCUMENTS_FILE: &str = "documents.toml";

/// A document targeted by this run.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRef {
    /// Opaque Drive file ID.
    pub id: String,
    /// Optional folder name overriding the ID in the output layout.
    pub name: Option<String>,
}

impl DocumentRef {
    /// Folder under `revisions/` holding this document's snapshots.
    pub fn folder(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// `documents.toml` entry: either a bare ID string or an `{ id, name }` table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentEntry {
    Bare(String),
    Named { id: String, name: Option<String> },
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsFile {
    #[serde(default)]
    documents: Vec<DocumentEntry>,
}

/// Resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the OAuth client secrets JSON.
    pub client_secrets: PathBuf,
    /// Target documents, env-configured document first, de-duplicated by ID.
    pub documents: Vec<DocumentRef>,
    /// Base directory for revision snapshots.
    pub revisions_dir: PathBuf,
    /// Base directory for current-content exports.
    pub exports_dir: PathBuf,
    /// Where token material is persisted between runs.
    pub token_path: PathBuf,
}

impl Config {
    /// Resolve configuration from the environment and the optional
    /// `documents.toml` in the working directory.
    pub fn load() -> Result<Self> {
        resolve(
            std::env::var(CLIENT_SECRETS_ENV).ok(),
            std::env::var(DOCUMENT_ID_ENV).ok(),
            Path::new(DOCUMENTS_FILE),
        )
    }

    /// Documents targeted by this run. Commands that need a target call this
    /// before touching the network, so an empty set fails fast.
    pub fn require_documents(&self) -> Result<&[DocumentRef]> {
        if self.documents.is_empty() {
            return Err(Error::Config(format!(
                "no target documents; set {DOCUMENT_ID_ENV} or list them in {DOCUMENTS_FILE}"
            )));
        }
        Ok(&self.documents)
    }
}

fn resolve(
    client_secrets: Option<String>,
    env_document: Option<String>,
    documents_file: &Path,
) -> Result<Config> {
    let client_secrets = client_secrets.filter(|s| !s.is_empty()).ok_or_else(|| {
        Error::Config(format!(
            "{CLIENT_SECRETS_ENV} is not set; export it with the path to your OAuth client secrets file, e.g.\n  export {CLIENT_SECRETS_ENV}=~/client_secrets.json"
        ))
    })?;

    let mut documents: Vec<DocumentRef> = Vec::new();
    if let Some(id) = env_document.filter(|s| !s.is_empty()) {
        documents.push(DocumentRef { id, name: None });
    }
    for doc in load_documents_file(documents_file) {
        if !documents.iter().any(|d| d.id == doc.id) {
            documents.push(doc);
        }
    }

    Ok(Config {
        client_secrets: PathBuf::from(client_secrets),
        documents,
        revisions_dir: PathBuf::from("revisions"),
        exports_dir: PathBuf::from("exports"),
        token_path: default_token_path(),
    })
}

/// Default token location, `<config_dir>/docrev/token.json`.
pub fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("docrev"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("token.json")
}

/// Documents listed in `documents.toml`. A missing file yields nothing, and
/// so does a malformed one: the env-configured document still works.
fn load_documents_file(path: &Path) -> Vec<DocumentRef> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    let parsed: DocumentsFile = match toml::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    parsed
        .documents
        .into_iter()
        .map(|entry| match entry {
            DocumentEntry::Bare(id) => DocumentRef { id, name: None },
            DocumentEntry::Named { id, name } => DocumentRef { id, name },
        })
        .filter(|d| !d.id.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn documents_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_client_secrets_fails_fast() {
        let result = resolve(None, Some("doc-1".to_string()), Path::new("/nonexistent"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_document_only() {
        let config = resolve(
            Some("secrets.json".to_string()),
            Some("doc-1".to_string()),
            Path::new("/nonexistent"),
        )
        .unwrap();
        assert_eq!(config.documents.len(), 1);
        assert_eq!(config.documents[0].id, "doc-1");
        assert_eq!(config.documents[0].folder(), "doc-1");
    }

    #[test]
    fn test_named_format() {
        let file = documents_file(
            r#"
[[documents]]
id = "1Q-qMIRexwd"
name = "cv-matt"

[[documents]]
id = "2A-bNkPstu"
"#,
        );
        let config = resolve(Some("secrets.json".to_string()), None, file.path()).unwrap();
        assert_eq!(config.documents.len(), 2);
        assert_eq!(config.documents[0].folder(), "cv-matt");
        assert_eq!(config.documents[1].folder(), "2A-bNkPstu");
    }

    #[test]
    fn test_simple_format() {
        let file = documents_file(r#"documents = ["1Q-qMIRexwd", "2A-bNkPstu"]"#);
        let config = resolve(Some("secrets.json".to_string()), None, file.path()).unwrap();
        assert_eq!(config.documents.len(), 2);
        assert!(config.documents.iter().all(|d| d.name.is_none()));
    }

    #[test]
    fn test_env_document_wins_over_duplicate_entry() {
        let file = documents_file(
            r#"
[[documents]]
id = "doc-1"
name = "renamed"
"#,
        );
        let config = resolve(
            Some("secrets.json".to_string()),
            Some("doc-1".to_string()),
            file.path(),
        )
        .unwrap();
        // The env entry is kept; the file entry for the same ID is dropped.
        assert_eq!(config.documents.len(), 1);
        assert_eq!(config.documents[0].folder(), "doc-1");
    }

    #[test]
    fn test_malformed_documents_file_is_ignored() {
        let file = documents_file("documents = [ this is not toml");
        let config = resolve(
            Some("secrets.json".to_string()),
            Some("doc-1".to_string()),
            file.path(),
        )
        .unwrap();
        assert_eq!(config.documents.len(), 1);
    }

    #[test]
    fn test_require_documents_empty() {
        let config = resolve(
            Some("secrets.json".to_string()),
            None,
            Path::new("/nonexistent"),
        )
        .unwrap();
        assert!(matches!(config.require_documents(), Err(Error::Config(_))));
    }
}
