#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod json;
pub mod resolver;
pub mod source;
pub mod version;

pub use config::Config;
pub use error::{Error, ResolveError};
pub use json::{JsonError, JsonObject, JsonValue};
pub use resolver::{
    is_typescript_path, ModuleFormat, ModuleResolver, PackageDescriptor, PackageType,
    ResolveMode, ResolveTrace, ResolvedModule, ResolverConfig,
};
pub use source::{BundleSource, DiskSource, FileSource, StorageKind};
pub use version::VERSION;
