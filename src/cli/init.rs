//! `ccmem init`: create the storage directory tree.

use crate::config::Config;
use crate::error::CcmemError;
use crate::paths::Paths;

pub fn run(config: &Config) -> Result<(), CcmemError> {
    let paths = Paths::new(config);
    if paths.is_initialized() {
        return Err(CcmemError::AlreadyInitialized);
    }
    paths.ensure_dirs()?;
    println!("initialized ccmem storage at {}", paths.base().display());
    Ok(())
}
