// Adapters layer: concrete implementations of the domain ports (http list source, Mastodon admin API).

pub mod http;
pub mod mastodon;
pub mod source;
