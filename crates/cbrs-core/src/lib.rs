//! CBRS Core - Data model, errors, and shared types
//!
//! This crate defines the abstractions shared by the evaluation toolkit:
//! - Rating records and ordered rating frames (the canonical table schema)
//! - Item popularity counters
//! - Named user groups
//! - Common error types
//! - Configuration management

pub mod config;
pub mod frame;

pub use config::{AppConfig, ConfigError, EvalConfig, GroupSpec, LoggingConfig, PlotConfig};
pub use frame::{ItemPopularity, RatingFrame};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for CBRS operations
#[derive(Error, Debug)]
pub enum CbrsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CbrsError>;

// ============================================================================
// Rating Records
// ============================================================================

/// A single interaction between a user and an item.
///
/// Used both for ground-truth profiles and for recommendation lists, where
/// `rating` holds the relevance score assigned by the recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// User identifier
    pub user_id: String,

    /// Item identifier
    pub item_id: String,

    /// Numeric rating or relevance score
    pub rating: f64,

    /// Rating as it appeared in the raw source, before normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_rating: Option<String>,

    /// Raw timestamp of the interaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl RatingRecord {
    /// Create a new record without original rating or timestamp
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>, rating: f64) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating,
            original_rating: None,
            timestamp: None,
        }
    }

    /// Set the raw rating value
    pub fn with_original_rating(mut self, original: impl Into<String>) -> Self {
        self.original_rating = Some(original.into());
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

// ============================================================================
// User Groups
// ============================================================================

/// A named set of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    /// Group name (e.g., "niche", "bb_focused")
    pub name: String,

    /// Members of the group
    pub users: BTreeSet<String>,
}

/// Ordered collection of named user groups.
///
/// Iteration follows insertion order so metric tables list groups in the
/// order the caller supplied them. Groups may overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroups {
    groups: Vec<UserGroup>,
}

impl UserGroups {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group, replacing the members of an existing group with the same name
    pub fn insert<I, S>(&mut self, name: impl Into<String>, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let users: BTreeSet<String> = users.into_iter().map(Into::into).collect();

        match self.groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.users = users,
            None => self.groups.push(UserGroup { name, users }),
        }
    }

    /// Builder-style insert
    pub fn with_group<I, S>(mut self, name: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, users);
        self
    }

    /// Look up a group's members by name
    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.groups.iter().find(|g| g.name == name).map(|g| &g.users)
    }

    /// Iterate over groups in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &UserGroup> {
        self.groups.iter()
    }

    /// Group names in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Check that every group fraction lies in (0, 1] and that they do not
/// add up to more than the whole user base.
pub fn validate_group_specs(specs: &[GroupSpec]) -> Result<()> {
    for spec in specs {
        if !(spec.fraction > 0.0 && spec.fraction <= 1.0) {
            return Err(CbrsError::InvalidArgument(format!(
                "fraction of group '{}' must be in (0, 1], got {}",
                spec.name, spec.fraction
            )));
        }
    }

    let total: f64 = specs.iter().map(|s| s.fraction).sum();
    if total > 1.0 + 1e-9 {
        return Err(CbrsError::InvalidArgument(format!(
            "group fractions add up to {total}, more than 1"
        )));
    }

    Ok(())
}

impl<'a> IntoIterator for &'a UserGroups {
    type Item = &'a UserGroup;
    type IntoIter = std::slice::Iter<'a, UserGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
