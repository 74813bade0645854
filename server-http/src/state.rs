use engagement::persistence::SledUserObjectStore;
use engagement::ports::UserObjectStore;
use engagement::LikesStore;
use shared::config::Config;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use upstream_http::{HttpUserObjectStore, UpstreamClient};

/// Server state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub likes: Arc<LikesStore>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserObjectStore>) -> Self {
        Self {
            likes: Arc::new(LikesStore::new(users)),
        }
    }

    /// Use the remote identity provider when one is configured, otherwise
    /// keep user objects in a local sled database under `data_dir`.
    pub fn from_config(config: &Config) -> shared::Result<Self> {
        let users: Arc<dyn UserObjectStore> = match UpstreamClient::identity_from_config(config)? {
            Some(client) => {
                info!("User objects stored by the remote identity provider");
                Arc::new(HttpUserObjectStore::new(client))
            }
            None => {
                let path = Path::new(&config.data_dir).join("users.sled");
                info!("User objects stored locally at {}", path.display());
                Arc::new(SledUserObjectStore::new(path)?)
            }
        };

        Ok(Self::new(users))
    }
}
