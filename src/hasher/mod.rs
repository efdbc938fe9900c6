pub mod core;
pub mod crc32;
pub mod md5;

#[cfg(test)]
mod tests;

pub use self::core::*;
pub use self::crc32::Crc32Hasher;
pub use self::md5::Md5Hasher;
