//! MCP tool server for the OpenACR toolchain.
//!
//! - [`client`] runs `acr`, `acr_ed`, `amc` and `abt` as child processes and
//!   parses their ssim output
//! - [`headers`] finds and parses amc-generated headers
//! - [`tools`] maps tool calls onto the two; [`authoring`] holds the
//!   schema-editing tools
//! - [`server`] speaks JSON-RPC over stdio

pub mod authoring;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod protocol;
pub mod server;
pub mod tools;

pub use client::{AcrClient, AcrResult};
pub use error::{ClientError, HeaderError, ToolError};
pub use server::Server;
pub use tools::Toolbox;
