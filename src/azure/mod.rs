pub mod client;
pub mod credential;
pub mod query;

pub use client::AzureClient;
pub use credential::BearerTokenCredential;
