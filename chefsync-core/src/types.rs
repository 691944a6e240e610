//! Domain types for chefsync.
//!
//! Artifact names and version tokens are opaque strings: the source decides
//! their spelling and their order, chefsync never parses or compares them
//! semantically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a single artifact (cookbook, environment, role or data bag).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(pub String);

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ArtifactName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque identifier of one historical revision of a cookbook.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(pub String);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for VersionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Configured name of a replica (the `slave` name of the CLI).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaName(pub String);

impl fmt::Display for ReplicaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ReplicaName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReplicaName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// The four kinds of artifact held in a Chef repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "cookbooks", alias = "cookbook")]
    Cookbook,
    #[serde(rename = "environments", alias = "environment")]
    Environment,
    #[serde(rename = "roles", alias = "role")]
    Role,
    #[serde(rename = "data_bags", alias = "databag", alias = "data_bag")]
    DataBag,
}

impl ArtifactKind {
    /// Every kind, cookbooks first.
    pub fn all() -> &'static [ArtifactKind] {
        &[
            ArtifactKind::Cookbook,
            ArtifactKind::Environment,
            ArtifactKind::Role,
            ArtifactKind::DataBag,
        ]
    }

    /// Directory name of this kind inside a Chef repository.
    pub fn repo_dir(self) -> &'static str {
        match self {
            ArtifactKind::Cookbook => "cookbooks",
            ArtifactKind::Environment => "environments",
            ArtifactKind::Role => "roles",
            ArtifactKind::DataBag => "data_bags",
        }
    }

    /// Only cookbooks keep a version history.
    pub fn is_versioned(self) -> bool {
        matches!(self, ArtifactKind::Cookbook)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Cookbook => write!(f, "cookbook"),
            ArtifactKind::Environment => write!(f, "environment"),
            ArtifactKind::Role => write!(f, "role"),
            ArtifactKind::DataBag => write!(f, "databag"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cookbook" | "cookbooks" => Ok(ArtifactKind::Cookbook),
            "environment" | "environments" => Ok(ArtifactKind::Environment),
            "role" | "roles" => Ok(ArtifactKind::Role),
            "databag" | "data_bag" | "data_bags" => Ok(ArtifactKind::DataBag),
            other => Err(format!(
                "unknown artifact kind '{other}'; expected: cookbook, environment, role, databag"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One explicit cookbook revision, as requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CookbookVersion {
    pub name: ArtifactName,
    pub version: VersionToken,
}

impl CookbookVersion {
    pub fn new(name: impl Into<ArtifactName>, version: impl Into<VersionToken>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for CookbookVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
