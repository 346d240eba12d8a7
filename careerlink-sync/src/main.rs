use careerlink_client::{ApiClient, api::PostFilter, client::ApiClientBuildError};
use careerlink_common::model::{
    auth::BearerToken,
    identity::{AccountId, ProfileId, Viewer},
};
use careerlink_sync::{
    config::{ConfigError, ENV_PREFIX, SyncConfig},
    error::SyncError,
    session::FeedSession,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error building api client: {0}")]
    Client(#[from] ApiClientBuildError),
    #[error("Error loading feed: {0}")]
    Feed(#[from] SyncError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    api_base_url: String,
    api_token: Option<String>,
    viewer_account_id: AccountId,
    viewer_profile_id: Option<ProfileId>,
    search_query: Option<String>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "careerlink_sync=debug,\
                careerlink_client=debug,\
                careerlink_common=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run() -> Result<(), InitError> {
    let config = SyncConfig::from_env()?;
    let env: Env = envy::prefixed(ENV_PREFIX).from_env()?;

    let api = ApiClient::new(
        &env.api_base_url,
        env.api_token.map(BearerToken::new),
        config.request_timeout.get(),
    )?;
    let viewer = match env.viewer_profile_id {
        Some(profile) => Viewer::new(env.viewer_account_id).with_profile(profile),
        None => Viewer::new(env.viewer_account_id),
    };
    let session = FeedSession::new(Arc::new(api), config, viewer);

    let report = session.load_feed(PostFilter::All).await?;
    if let Some(partial) = &report.partial {
        warn!(failed = ?partial.failed, "{partial}");
    }
    for post in session.feed() {
        info!(
            post = %post.id,
            author = %post.author.display_name,
            likes = post.counters.like_count,
            comments = post.counters.comment_count,
            liked = post.viewer.liked,
            following = post.viewer.following_author,
            "Feed post"
        );
    }

    if let Some(query) = env.search_query {
        let results = session.search(&query).await;
        info!(
            query = %results.query,
            status = ?results.status,
            results = results.posts.len(),
            "Searched posts"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();

    run().await.inspect_err(|err| error!(%err, "Session failed"))
}
