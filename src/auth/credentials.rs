//! Static username/password store loaded from a flat file.
//!
//! File format: one `user password` pair per line, separated by whitespace.
//! Lines that do not split into exactly two fields are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Directory auth files are expected under in container deployments.
pub const DATA_DIR: &str = "/data";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid auth file path: {0}")]
    Path(PathBuf),
    #[error("failed to open auth file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read auth file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Roots an auth file may live under: the data directory and the temp dir.
pub fn default_allowed_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(DATA_DIR), std::env::temp_dir()]
}

/// Credentials the protocol handler checks clients against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// No authentication required.
    #[default]
    None,
    /// Fixed user → password map.
    Static(HashMap<String, String>),
}

impl Credentials {
    /// Load credentials from `path`, which must sit under one of `allowed_roots`.
    ///
    /// No path, or a file without a single valid line, means no authentication.
    pub fn load(path: Option<&Path>, allowed_roots: &[PathBuf]) -> Result<Self, AuthError> {
        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            tracing::info!("no auth file configured");
            return Ok(Self::None);
        };

        let path = check_path(path, allowed_roots)?;
        let file = File::open(&path).map_err(|source| AuthError::Open {
            path: path.clone(),
            source,
        })?;
        let users = parse(BufReader::new(file)).map_err(|source| AuthError::Read {
            path: path.clone(),
            source,
        })?;

        let credentials = Self::from_users(users);
        match &credentials {
            Self::None => tracing::info!(path = %path.display(), "no credentials found"),
            Self::Static(_) => tracing::info!(
                path = %path.display(),
                users = %credentials.users().join(", "),
                "found credentials"
            ),
        }
        Ok(credentials)
    }

    pub fn from_users(users: HashMap<String, String>) -> Self {
        if users.is_empty() {
            Self::None
        } else {
            Self::Static(users)
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    /// Check a user/password pair. Always true when no auth is required.
    pub fn verify(&self, user: &str, password: &str) -> bool {
        match self {
            Self::None => true,
            Self::Static(users) => users.get(user).is_some_and(|p| p == password),
        }
    }

    /// Known user names, sorted.
    pub fn users(&self) -> Vec<&str> {
        let mut users: Vec<&str> = match self {
            Self::None => Vec::new(),
            Self::Static(users) => users.keys().map(String::as_str).collect(),
        };
        users.sort_unstable();
        users
    }
}

/// Parse `user password` lines.
pub fn parse(reader: impl BufRead) -> io::Result<HashMap<String, String>> {
    let mut users = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        if let (Some(user), Some(password), None) = (fields.next(), fields.next(), fields.next()) {
            users.insert(user.to_string(), password.to_string());
        }
    }
    Ok(users)
}

/// Reject relative traversal and paths outside the allowed roots.
fn check_path(path: &Path, allowed_roots: &[PathBuf]) -> Result<PathBuf, AuthError> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(AuthError::Path(path.to_path_buf()));
    }
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if allowed_roots.iter().any(|root| normalized.starts_with(root)) {
        Ok(normalized)
    } else {
        Err(AuthError::Path(normalized))
    }
}
