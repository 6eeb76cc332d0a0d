//! Server Module
//!
//! Server initialization and configuration.
//!
//! # Architecture
//!
//! - **`state`** - `AppState` and `FromRef` implementations
//! - **`config`** - `ServerConfig` loaded from the environment
//! - **`init`** - `create_app`
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Environment configuration
//! └── init.rs         - App creation
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::ServerConfig;
pub use init::create_app;
pub use state::AppState;
