//! `ccmem processor run`: long-lived background queue drainer.

use crate::config::Config;
use crate::error::CcmemError;
use crate::processor::run_forever;

pub async fn run(config: &Config) -> Result<(), CcmemError> {
    run_forever(config).await
}
