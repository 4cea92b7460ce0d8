//! sling-env — runtime environment bootstrap.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Resolve runtime settings and init logger
//!   3. Resolve the config snapshot
//!   4. Print the variables a child process must inherit

use sling_env::Runtime;
use tracing::{debug, info};

fn main() {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let runtime = Runtime::initialize();
    let snapshot = runtime.resolve_config();

    info!(
        concurrency_limit = snapshot.concurrency_limit(),
        sample_size = snapshot.sample_size(),
        send_anon_usage = runtime.settings().send_anon_usage,
        "config resolved"
    );
    debug!(?snapshot, "resolved variables");

    for (key, value) in runtime.propagated_env() {
        println!("{key}={value}");
    }
}
