//! # chefsync-knife
//!
//! Process-backed adapters for the chefsync engine: [`KnifeClient`] drives
//! the `knife` CLI against one Chef server, [`RsyncReplica`] mirrors the
//! workspace to a replica host and triggers the remote apply over ssh.

pub mod command;
pub mod error;
pub mod knife;
pub mod rsync;

pub use command::Invocation;
pub use error::ToolError;
pub use knife::KnifeClient;
pub use rsync::RsyncReplica;
