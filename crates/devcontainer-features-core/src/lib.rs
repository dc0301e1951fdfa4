//! C9 (version resolution, lockfile) and C10 (collection pack/publish).

pub mod lockfile;
pub mod pack;
pub mod publish;
pub mod version;

pub use devcontainer_features_common::{Error, Result};
