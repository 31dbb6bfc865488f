//! Gateway configuration, loaded from the environment by `hub-config`.

pub use hub_config::*;
