mod sled_record_store;
pub use sled_record_store::*;

#[cfg(test)]
mod sled_record_store_test;

use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::StorageConfig;

// -----------------------------------------------------------------------------
// Database namespaces
/// Sled database tree namespaces
pub(crate) const RECORDS_TREE: &str = "records";
pub(crate) const OPLOG_TREE: &str = "_oplog";

/// Opens the record database under `<db_root_dir>/records`
pub fn init_sled_record_db(config: &StorageConfig) -> std::result::Result<sled::Db, std::io::Error> {
    debug!("init_sled_record_db from path: {:?}", &config.db_root_dir);

    let record_db_path = config.db_root_dir.join("records");
    open_sled_db(&record_db_path, config.cache_capacity)
}

fn open_sled_db(
    path: &Path,
    cache_capacity: u64,
) -> std::result::Result<sled::Db, std::io::Error> {
    sled::Config::default()
        .path(path)
        .cache_capacity(cache_capacity)
        .flush_every_ms(Some(500))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            warn!("Try to open DB at this location: {:?} and failed: {:?}", path, e);
            std::io::Error::other(e)
        })
}
