//! Host platform utility functions

use std::path::PathBuf;

/// Environment variable holding the root directory of the software installation.
///
/// Parameter files are read from `<root>/params` and sessions are created in
/// `<root>/sessions`.
pub const SW_ROOT_ENV_VAR: &str = "CHAIN_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_chain_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
