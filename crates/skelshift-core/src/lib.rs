// skelshift-core: transform math, chain roles, configuration files and errors
// shared by every skelshift crate.

pub mod config;
pub mod error;
pub mod types;

pub use error::{ConfigError, FrameError, HierarchyError, MappingError, SkelshiftError};
pub use types::{ChainRole, Side, Transform, slerp_rotation};

pub mod prelude {
    pub use crate::config::{
        BoneRange, ChainConfig, ChainMode, Extrapolation, NameRule, RetargetConfigFile,
        RetargetSettings, TranslationScale, UnmappedPolicy,
    };
    pub use crate::error::{ConfigError, FrameError, HierarchyError, MappingError, SkelshiftError};
    pub use crate::types::{ChainRole, Side, Transform};
}
