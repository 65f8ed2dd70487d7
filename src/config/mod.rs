//! Tiered configuration.
//!
//! Tiers, lowest priority first, merged field by field:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/blog-import/config.yaml`
//! 3. **User** - `~/.blog-import/config.yaml`
//! 4. **Environment**
//!
//! ## Environment Variables
//! - `BLOG_IMPORT_CONFIG_PATH` - Explicit config file (skips the file tiers)
//! - `BLOG_IMPORT_DB_PATH` - Destination database path
//! - `BLOG_IMPORT_PROJECT_DIR` - Project config dir (default: `./blog-import`)
//! - `BLOG_IMPORT_USER_DIR` - User config dir (default: `~/.blog-import`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::{Config, DatabaseConfig, ImportConfig};
