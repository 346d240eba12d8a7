pub mod auth;
pub mod comment;
pub mod follow;
pub mod identity;
pub mod page;
pub mod post;

use crate::{
    model::{
        comment::EmptyCommentError, follow::SelfFollowError, post::DuplicateCategoryError,
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{fmt::Display, marker::PhantomData, str::FromStr};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    EmptyComment(#[from] EmptyCommentError),
    #[error(transparent)]
    SelfFollow(#[from] SelfFollowError),
    #[error(transparent)]
    DuplicateCategory(#[from] DuplicateCategoryError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
}

/// A server-assigned integer identity, made nominal by its marker.
///
/// Two ids with different markers are different types, so a profile id can
/// never stand in for an account id without an explicit conversion.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize)]
#[serde(transparent)]
pub struct Id<Marker>(u64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(value)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s.trim()).map(Id::new)
    }
}

// The backend is not consistent about sending ids as numbers or as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

impl<'de, Marker> Deserialize<'de> for Id<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match WireId::deserialize(deserializer)? {
            WireId::Number(id) => Ok(Id::new(id)),
            WireId::Text(text) => text
                .parse()
                .map_err(|_| Error::invalid_value(Unexpected::Str(&text), &"an integer id")),
        }
    }
}
