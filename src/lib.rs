//! gitpress: a blog engine whose plugins live in the content repository.
//!
//! Plugin modules are Rhai scripts tracked under a directory of the git
//! repository. They are indexed per revision, imported through a resolver
//! chain under a dotted namespace and activated against the running
//! application once every module of a load pass has executed.

pub mod app;
pub mod cli;
pub mod config;
pub mod content;
pub mod logging;
pub mod plugin;
