//! Shared transactional types for all database backends (SQLite, PostgreSQL)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Session metadata
// ============================================================================

/// Administrative attributes of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub id: String,
    pub project_id: String,
    pub bookmarked: bool,
    pub public: bool,
    pub environment: String,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// Accounts
// ============================================================================

/// Role marker decoded from an account's metadata blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserKind {
    Real,
    Synthetic { prompt_name: String },
    Snapshot { session: String, turn: i64 },
}

#[derive(Deserialize)]
struct AccountMetadataBlob {
    synthetic: Option<SyntheticMarker>,
    snapshot: Option<SnapshotMarker>,
}

#[derive(Deserialize)]
struct SyntheticMarker {
    #[serde(default)]
    prompt_name: String,
}

#[derive(Deserialize)]
struct SnapshotMarker {
    #[serde(default)]
    session: String,
    #[serde(default)]
    turn: i64,
}

impl UserKind {
    /// Decode the metadata blob stored next to an account.
    ///
    /// Missing, null or unparseable blobs decode to `Real`. A synthetic
    /// marker wins over a snapshot marker.
    pub fn from_metadata(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Self::Real;
        };
        match serde_json::from_str::<Option<AccountMetadataBlob>>(raw) {
            Ok(Some(AccountMetadataBlob {
                synthetic: Some(marker),
                ..
            })) => Self::Synthetic {
                prompt_name: marker.prompt_name,
            },
            Ok(Some(AccountMetadataBlob {
                snapshot: Some(marker),
                ..
            })) => Self::Snapshot {
                session: marker.session,
                turn: marker.turn,
            },
            Ok(_) => Self::Real,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable account metadata, treating as real");
                Self::Real
            }
        }
    }

    pub fn kind(&self) -> AccountKind {
        match self {
            Self::Real => AccountKind::Real,
            Self::Synthetic { .. } => AccountKind::Synthetic,
            Self::Snapshot { .. } => AccountKind::Snapshot,
        }
    }
}

/// Account kind selector for directory reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Real,
    Synthetic,
    Snapshot,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Synthetic => write!(f, "synthetic"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "synthetic" => Ok(Self::Synthetic),
            "snapshot" => Ok(Self::Snapshot),
            _ => Err(format!(
                "Invalid account kind '{}'. Valid options: real, synthetic, snapshot",
                s
            )),
        }
    }
}

/// Account row with its metadata already decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRow {
    pub id: String,
    pub username: String,
    #[serde(flatten)]
    pub user_kind: UserKind,
    pub created_at: i64,
}
