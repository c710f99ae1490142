//! DearDiary Common Library
//!
//! Shared frame types and on-disk path resolution used by both the diary
//! core library and the CLI.

pub mod paths;
pub mod types;

pub use types::*;
