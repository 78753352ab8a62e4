//! JSON File Directory
//!
//! Read-only [`Directory`] adapter backed by a JSON file loaded once at
//! startup. Lookups are by exact id; the file is never re-read while the
//! hub runs.
//!
//! # File Format
//!
//! ```json
//! {
//!   "users": [
//!     {
//!       "user_id": "u1",
//!       "user_name": "Number One",
//!       "role": {"type": "customer"},
//!       "watchlist": ["ACME"],
//!       "bank_id": "b7"
//!     },
//!     {
//!       "user_id": "bk1",
//!       "user_name": "Desk One",
//!       "role": {"type": "broker", "accounts": ["u1"]}
//!     }
//!   ],
//!   "stocks": ["ACME", "GLOBO", "INITECH"]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::Directory;
use crate::domain::directory::{StockCode, User, UserId};

// =============================================================================
// Error Types
// =============================================================================

/// Errors loading the directory file.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The file could not be read.
    #[error("failed to read directory file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file content is not valid directory JSON.
    #[error("failed to parse directory file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Two user records share an id.
    #[error("duplicate user id in directory: {user_id}")]
    DuplicateUser {
        /// The id that appeared twice.
        user_id: UserId,
    },
}

// =============================================================================
// File Shape
// =============================================================================

/// On-disk shape of the directory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFile {
    /// User records.
    #[serde(default)]
    pub users: Vec<User>,
    /// Listed stock codes.
    #[serde(default)]
    pub stocks: Vec<StockCode>,
}

// =============================================================================
// JSON Directory
// =============================================================================

/// In-memory directory built from a JSON file.
#[derive(Debug)]
pub struct JsonDirectory {
    users: HashMap<UserId, User>,
    stocks: HashSet<StockCode>,
}

impl JsonDirectory {
    /// Load the directory from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the file cannot be read or parsed,
    /// or contains duplicate user ids.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file: DirectoryFile =
            serde_json::from_str(&content).map_err(|source| DirectoryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let directory = Self::from_parts(file.users, file.stocks)?;

        tracing::info!(
            path = %path.display(),
            users = directory.user_count(),
            stocks = directory.stock_count(),
            "Directory loaded"
        );

        Ok(directory)
    }

    /// Build a directory from already-parsed records.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::DuplicateUser`] if two records share an
    /// id. Duplicate stock codes collapse silently.
    pub fn from_parts(
        users: Vec<User>,
        stocks: Vec<StockCode>,
    ) -> Result<Self, DirectoryError> {
        let mut by_id = HashMap::with_capacity(users.len());

        for user in users {
            let user_id = user.user_id.clone();
            if by_id.insert(user_id.clone(), user).is_some() {
                return Err(DirectoryError::DuplicateUser { user_id });
            }
        }

        Ok(Self {
            users: by_id,
            stocks: stocks.into_iter().collect(),
        })
    }

    /// Number of user records.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of listed stocks.
    #[must_use]
    pub fn stock_count(&self) -> usize {
        self.stocks.len()
    }
}

impl Directory for JsonDirectory {
    fn find_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).cloned()
    }

    fn is_valid_stock(&self, code: &str) -> bool {
        self.stocks.contains(code)
    }

    fn users(&self) -> Vec<User> {
        let mut users: Vec<_> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    fn stock_codes(&self) -> Vec<StockCode> {
        let mut codes: Vec<_> = self.stocks.iter().cloned().collect();
        codes.sort();
        codes
    }
}

// =============================================================================
// Tests
// =============================================================================
