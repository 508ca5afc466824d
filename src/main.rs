//! ciexec - run CI build commands on the host or in a container
//!
//! ## Quick Start
//!
//! ```bash
//! # Run commands on the host, stopping at the first failure
//! ciexec run --dir ./repo "npm install" "npm test"
//!
//! # Run the same commands inside a container
//! ciexec run --dir ./repo --image node:18-alpine "npm install" "npm test"
//!
//! # Run the build commands of an analysis record
//! ciexec plan analysis.json --dir ./repo --json
//!
//! # Check the container runtime
//! ciexec probe --runtime podman
//! ```
//!
//! Set `CIEXEC_DEBUG` for debug logging and `CIEXEC_VERBOSE` for detailed
//! error chains.

use std::process::ExitCode;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if std::env::var("CIEXEC_VERBOSE").is_ok() {
                eprintln!("{e:?}");
            }
            ExitCode::FAILURE
        }
    }
}
