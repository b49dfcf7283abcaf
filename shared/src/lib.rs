pub mod protocol;
pub mod stats;
pub mod weapons;
pub mod modifiers;
pub mod experience;
pub mod error;

pub use protocol::*;
pub use stats::*;
pub use weapons::*;
pub use modifiers::*;
pub use experience::*;
pub use error::*;
