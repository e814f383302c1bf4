use rstdev_storage::engine::rocksdb::db::DB;
use rstdev_storage::engine::rocksdb::executor::Executor;
use rstdev_storage::engine::rocksdb::options::Options;

use rst_common::with_logging::log::debug;

use crate::common::types::CommonError;
use crate::config::Database;

/// Builder opens the snapshot store described by the `[database]` section
pub struct Builder {
    database: Database,
}

impl Builder {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn build(&self) -> Result<Executor, CommonError> {
        let path = self.database.path();
        let cf_name = self.database.cf_name();
        let wal_dir = self.database.wal_dir();
        let create = self.database.create_if_missing();
        debug!("[db:build] path: {path} | cf name: {cf_name} | wal: {wal_dir}");

        let mut db_opts = Options::new(path, cf_name.clone());
        db_opts.build_default_opts().set_db_opts(move |opt| {
            opt.create_if_missing(create);
            opt.create_missing_column_families(create);
            opt.set_error_if_exists(false);
            opt.set_wal_dir(wal_dir);

            opt
        });

        let mut db = DB::new(db_opts).map_err(|err| CommonError::DBError(err.to_string()))?;
        let db_instance = db
            .build()
            .map_err(|err| CommonError::DBError(err.to_string()))?;

        db.set_db(db_instance);
        Ok(Executor::new(db, cf_name))
    }
}
