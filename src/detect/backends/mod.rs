pub mod synthetic;

#[cfg(feature = "backend-remote")]
pub mod remote;
#[cfg(feature = "backend-tract")]
pub mod tract;

pub use synthetic::{SyntheticBackend, SyntheticConfig};

#[cfg(feature = "backend-remote")]
pub use remote::{RemoteBackend, RemoteConfig};
#[cfg(feature = "backend-tract")]
pub use tract::{LocalModelConfig, TractBackend};
