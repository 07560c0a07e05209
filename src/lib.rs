pub mod aggregate;
pub mod config;
pub mod error;
pub mod memory;
pub mod observability;
pub mod protocol;
pub mod provider;
pub mod stream;

mod util;

pub use aggregate::merge_responses;
pub use error::CanonicalError;
pub use memory::SessionMemory;
pub use provider::Provider;
pub use stream::{FunctionCallMerger, StreamAccumulator};
