use std::fs;
use std::path::Path;

use homedir::my_home;
use rst_common::with_logging::log::debug;

use crate::types::CliError;

pub fn setup_homedir(dir: &str) -> Result<String, CliError> {
    let current_homedir = my_home().map_err(|err| CliError::HomeDirError(err.to_string()))?;

    match current_homedir {
        Some(current_dir) => {
            let pairwise_dir = format!("{}/{}", current_dir.display(), dir);
            let pairwise_path = Path::new(pairwise_dir.as_str()).to_owned();

            if !pairwise_path.exists() {
                debug!("pairwise directory still not exists");
                fs::create_dir_all(pairwise_path.clone())
                    .map_err(|err| CliError::HomeDirError(err.to_string()))?;
            }

            debug!("pairwise home directory: {}", pairwise_path.display());
            Ok(pairwise_path.display().to_string())
        }
        None => Err(CliError::HomeDirError(
            "unknown home directory path".to_string(),
        )),
    }
}
