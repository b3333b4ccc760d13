//! Module system for modhost.
//!
//! Drives an embedder-supplied script engine through the [`Engine`] trait:
//! CommonJS execution with an exactly-once module cache, JSON modules,
//! ES modules (native, or rewritten to CommonJS) and optional TypeScript.
//!
//! ## Usage
//!
//! ```ignore
//! use modhost_runtime::ModuleSystem;
//! use modhost_core::ModuleResolver;
//!
//! let system = ModuleSystem::new(engine, ModuleResolver::filesystem("/app"));
//! system.install_globals();
//! system.load_entry("main.js")?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cjs;
mod engine;
mod error;
mod module_system;
pub mod transpile;

#[cfg(test)]
mod mock;

pub use engine::{Engine, NativeFunction, NoTypeScript, TypeScriptTranspiler};
pub use error::ModuleError;
pub use module_system::ModuleSystem;
pub use transpile::esm_to_cjs;
