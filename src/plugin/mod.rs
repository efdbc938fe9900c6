pub mod abi;
pub mod core;


pub use self::abi::*;
pub use self::core::{PluginChecksumProvider, PluginDigest, load_plugin};
