use std::sync::OnceLock;

use consta_common::observability::{init_logging, LogConfig};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| init_logging(LogConfig::for_tests()).unwrap_or_default());
}
