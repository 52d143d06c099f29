//! Boot-image artifacts.
//!
//! - `cpio` - uncompressed newc archives appended to existing initrds
//! - `iso` - checksum implant for finished boot ISOs

pub mod cpio;
pub mod iso;

pub use cpio::build_cpio;
pub use iso::implant_isomd5;
