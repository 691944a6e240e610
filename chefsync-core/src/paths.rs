//! On-disk state layout.
//!
//! ```text
//! <state>/
//!   config.yaml
//!   manifests/<cookbook>.json     (durable version manifests)
//!   workspace/                    (staging tree, mirrored to replicas)
//!     repo/<kind dir>/...
//!     versions/<version>/<cookbook>/
//!     staged/<cookbook>.json
//!   logs/chefsync.log
//! ```

use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".chefsync";
pub const CONFIG_FILE: &str = "config.yaml";
pub const LOG_FILE: &str = "chefsync.log";

pub fn state_root(home: &Path) -> PathBuf {
    home.join(STATE_DIR)
}

pub fn config_path(home: &Path) -> PathBuf {
    state_root(home).join(CONFIG_FILE)
}

pub fn manifests_dir(state: &Path) -> PathBuf {
    state.join("manifests")
}

pub fn workspace_dir(state: &Path) -> PathBuf {
    state.join("workspace")
}

pub fn logs_dir(state: &Path) -> PathBuf {
    state.join("logs")
}

pub fn log_path(state: &Path) -> PathBuf {
    logs_dir(state).join(LOG_FILE)
}
