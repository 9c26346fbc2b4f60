pub mod collection;
pub mod config;
pub mod item;
pub mod workspace;

pub use collection::*;
pub use config::*;
pub use item::*;
pub use workspace::*;
