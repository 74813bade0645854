//! reqwest adapters for the collaborators the engagement core talks to.

mod client;
pub mod content;
pub mod identity;
pub mod likes;

pub use client::UpstreamClient;
pub use content::HttpContentApi;
pub use identity::HttpUserObjectStore;
pub use likes::HttpLikesClient;
