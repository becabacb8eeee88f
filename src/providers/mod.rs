pub mod chain;
pub mod http_json;

pub use chain::ProviderChain;
pub use http_json::JsonRateProvider;
