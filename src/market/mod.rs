pub mod ingestion;
pub mod rest_poller;
pub mod stream_client;

pub use ingestion::{MarketDataService, ProviderCascade, ProviderState};
pub use rest_poller::RestPoller;
pub use stream_client::StreamClient;
