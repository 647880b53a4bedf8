//! Switchboard manages connections to Model Context Protocol providers and
//! validates model-made capability selections.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns configuration loading and persistence for the provider
//!   registry.
//! - [`mcp`] connects configured servers, discovers their tools and resources,
//!   synthesizes resource wrappers around tools, and routes reads.
//! - [`selection`] turns free-form model replies into schema-validated tool
//!   and resource choices, with corrective retry prompts on rejection.
//!
//! A typical embedding loads a [`core::config::Config`], reconciles a
//! [`mcp::ConnectionManager`] against it, captures a
//! [`mcp::ProviderSnapshot`], and runs [`selection::select_tool`] or
//! [`selection::select_resource`] against that snapshot.

pub mod core;
pub mod mcp;
pub mod selection;
