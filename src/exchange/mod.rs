pub mod client;
pub mod dto;
pub mod rate_limiter;

pub use client::ExchangeClient;
pub use rate_limiter::SlidingWindowRateLimiter;
