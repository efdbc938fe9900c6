pub mod core;
pub mod md5;
pub mod sfv;


pub use self::core::*;
pub use self::md5::Md5Provider;
pub use self::sfv::SfvProvider;
