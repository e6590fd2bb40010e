//! Named in-memory caches backed by Moka.
//!
//! - `CacheRegistry` - registry of named caches
//! - `TypedCache` - typed wrapper with TTL/TTI support
//! - `CacheConfig` - size and expiry presets
//!
//! ```rust,ignore
//! let admins = registry.get_or_create::<(String, String), bool>(
//!     "group_admins",
//!     CacheConfig::group_metadata(),
//! );
//! ```

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
