//! # Command line
//!
//! The `apiroute` binary serves the demo controllers and publishes their
//! OpenAPI description.
//!
//! ```bash
//! # Serve on the address from the config file (default 0.0.0.0:8080)
//! apiroute --config apiroute.yaml serve
//!
//! # Print the document as YAML, checking it against the OpenAPI model
//! apiroute openapi --format yaml --check
//!
//! # List the routing table
//! apiroute routes
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands, DocFormat};
