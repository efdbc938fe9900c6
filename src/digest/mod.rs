pub mod core;
pub mod hex;


pub use self::core::*;
pub use self::hex::{hex_encode, parse_hex_bytes, parse_hex_u32};
