pub mod feed;
pub mod health;
pub mod impressions;

pub use feed::get_feed;
pub use health::health;
pub use impressions::record_impressions;
