pub mod cache;

pub use cache::{spawn_refresher, ChainData, ConfigCache};
