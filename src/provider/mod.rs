//! Tile provider configuration.
//!
//! A provider is a named external tile source: a URL template with `{x}`, `{y}`
//! and `{z}` placeholders, an optional `{s}` shard placeholder, a zoom range and
//! the native tile size in pixels.
//!
//! Providers are loaded once at startup into an immutable [`ProviderRegistry`]
//! which is handed to every component that needs it. Jobs never look providers
//! up again after enqueueing: each job carries its own [`Provider`] snapshot.
//!
//! # File Format
//!
//! The provider file is a JSON array:
//!
//! ```json
//! [
//!   {
//!     "name": "osm",
//!     "min_zoom": 0,
//!     "max_zoom": 19,
//!     "scale": 256,
//!     "url": "https://[abc].tile.openstreetmap.org/{z}/{x}/{y}.png",
//!     "attribution": "© OpenStreetMap contributors"
//!   }
//! ]
//! ```
//!
//! A bracketed alphabet such as `[abc]` inside the URL is rewritten to `{s}`
//! and its characters become the shard alphabet. The alphabet can also be given
//! explicitly through a `shards` field next to a URL that already uses `{s}`.

mod registry;

pub use registry::{Provider, ProviderDefinition, ProviderRegistry, MAX_SUPPORTED_ZOOM};
