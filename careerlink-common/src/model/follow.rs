use crate::model::identity::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Account {0} cannot follow itself")]
pub struct SelfFollowError(AccountId);

/// A directed relationship between two distinct accounts.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct FollowEdge {
    follower: AccountId,
    following: AccountId,
}

impl FollowEdge {
    pub fn new(follower: AccountId, following: AccountId) -> Result<Self, SelfFollowError> {
        if follower == following {
            Err(SelfFollowError(follower))
        } else {
            Ok(Self {
                follower,
                following,
            })
        }
    }

    #[must_use]
    pub fn follower(self) -> AccountId {
        self.follower
    }

    #[must_use]
    pub fn following(self) -> AccountId {
        self.following
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    pub followers_count: u64,
    pub following_count: u64,
}
