#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

pub mod billing;
pub mod error;
pub mod load;
pub mod quantity;
pub mod report;
pub mod tariff;
pub mod urdb;

pub use self::error::{Error, Result};
