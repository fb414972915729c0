mod backend;
mod backends;
pub mod decode;
pub mod labels;
mod lazy;
mod registry;
mod result;

pub use backend::ClassifierBackend;
pub use backends::{SyntheticBackend, SyntheticConfig};
#[cfg(feature = "backend-remote")]
pub use backends::{RemoteBackend, RemoteConfig};
#[cfg(feature = "backend-tract")]
pub use backends::{LocalModelConfig, TractBackend};
pub use lazy::{LazyModel, DEFAULT_LOAD_RETRY};
pub use registry::BackendRegistry;
pub use result::{largest_index, sanitize, BoundingBox, Detection};
