pub mod resolve;
pub mod transpile;
pub mod version;
