use crate::model::Id;
use serde::{Deserialize, Serialize};

/// Identity scoped to the community feature, used for display and as the
/// foreign key on posts and comments.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ProfileMarker;

/// The durable login identity. The only identity valid for authorization.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AccountMarker;

pub type ProfileId = Id<ProfileMarker>;
pub type AccountId = Id<AccountMarker>;

/// Somebody who authored a post or comment, as seen by the viewing client.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Actor {
    pub profile_id: ProfileId,
    account_id: Option<AccountId>,
    pub display_name: String,
    pub job_title: Option<String>,
    pub avatar_url: Option<String>,
}

impl Actor {
    #[must_use]
    pub fn new(profile_id: ProfileId, account_id: Option<AccountId>, display_name: String) -> Self {
        Self {
            profile_id,
            account_id,
            display_name,
            job_title: None,
            avatar_url: None,
        }
    }

    /// The account backing this profile, if the backend disclosed one.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }
}

/// The signed-in actor on whose behalf every mutation is made.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct Viewer {
    pub account_id: AccountId,
    pub profile_id: Option<ProfileId>,
}

impl Viewer {
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            profile_id: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile_id: ProfileId) -> Self {
        self.profile_id = Some(profile_id);
        self
    }

    #[must_use]
    pub fn owns(&self, actor: &Actor) -> bool {
        actor.account_id() == Some(self.account_id)
    }
}
