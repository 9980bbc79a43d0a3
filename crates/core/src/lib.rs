//! Core types, quota accounting, and admission control for the import engine.

pub mod admission;
pub mod backends;
pub mod error;
pub mod events;
pub mod job;
pub mod limits;
pub mod platform;
pub mod quota;
pub mod retention;
pub mod tenant;

pub use admission::*;
pub use backends::*;
pub use error::{Error, Result};
pub use events::*;
pub use job::*;
pub use platform::{CanonicalRow, ImportPlatform, PlatformRegistry};
pub use quota::*;
pub use retention::*;
pub use tenant::*;
