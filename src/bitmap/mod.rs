//! 位图操作
//!
//! 以 `u64` 字为单位存储的位图，供槽位池记录空闲槽位。

mod ops;

pub use ops::*;
