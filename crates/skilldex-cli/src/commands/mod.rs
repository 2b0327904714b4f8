//! One module per subcommand, each exposing an `execute` entry point that
//! `main.rs` dispatches to.

pub mod block;
pub mod context;
pub mod crawl;
pub mod scan;
pub mod stats;
pub mod worker;
