//! Certificate Sync Library
//!
//! Pushes a local TLS certificate to an Aliyun OSS custom domain and to a
//! SafeLine WAF certificate store, replacing the remote one once it has 72
//! hours or less left.

pub mod aliyun;
pub mod certificate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod logging;
pub mod renewal;
pub mod safeline;

pub use config::{AliyunConfig, SafelineConfig};
pub use dispatch::Mode;
pub use error::{Result, SyncError};
