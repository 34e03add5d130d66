pub mod actors;
pub mod at;
pub mod commanders;
pub mod config;
pub mod error;
pub mod gateway;
pub mod gsm;
pub mod literals;
pub mod messages;
pub mod service;
pub mod sms_commands;
pub mod storage;

pub use error::{AppError, Result};
