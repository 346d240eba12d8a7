use crate::error::AuthorizationError;
use careerlink_common::model::{
    comment::Comment,
    identity::{AccountId, Actor, ProfileId, Viewer},
};
use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Mutex, PoisonError},
};
use tracing::warn;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
enum Backing {
    Account(AccountId),
    // Seen with two different accounts. Never resolved again.
    Conflicting,
}

/// Authorization only ever compares account identities. A profile identity
/// is converted with [`IdentityResolver::account_of`] first, never compared.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    accounts: Mutex<HashMap<ProfileId, Backing>>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learns the account behind `actor`'s profile, if it was disclosed.
    pub fn register(&self, actor: &Actor) {
        let Some(account) = actor.account_id() else {
            return;
        };

        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        match accounts.entry(actor.profile_id) {
            Entry::Vacant(entry) => {
                entry.insert(Backing::Account(account));
            }
            Entry::Occupied(mut entry) => {
                if let Backing::Account(previous) = *entry.get()
                    && previous != account
                {
                    warn!(
                        profile = %actor.profile_id,
                        %previous,
                        %account,
                        "Profile seen with two accounts, no longer resolving it"
                    );
                    entry.insert(Backing::Conflicting);
                }
            }
        }
    }

    pub fn register_all<'a>(&self, actors: impl IntoIterator<Item = &'a Actor>) {
        for actor in actors {
            self.register(actor);
        }
    }

    #[must_use]
    pub fn account_of(&self, profile: ProfileId) -> Option<AccountId> {
        match self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&profile)
        {
            Some(Backing::Account(account)) => Some(*account),
            Some(Backing::Conflicting) | None => None,
        }
    }

    /// The account behind `actor`, from the actor itself or what was learned earlier.
    #[must_use]
    pub fn resolve(&self, actor: &Actor) -> Option<AccountId> {
        actor
            .account_id()
            .or_else(|| self.account_of(actor.profile_id))
    }

    pub fn authorize_comment_delete(
        &self,
        viewer: &Viewer,
        comment: &Comment,
    ) -> Result<(), AuthorizationError> {
        let author = self
            .resolve(&comment.author)
            .ok_or(AuthorizationError::UnknownAuthorAccount {
                comment: comment.id,
            })?;

        if author == viewer.account_id {
            Ok(())
        } else {
            Err(AuthorizationError::NotCommentAuthor {
                comment: comment.id,
            })
        }
    }
}
