// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented hoist.yml template.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, DEFAULT_BUILD_COMMAND, DEFAULT_LOCAL_PATH, DEFAULT_RELOAD_COMMAND};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, template_yaml())?;
    Ok(())
}

fn template_yaml() -> String {
    format!(
        r#"host: server.example.com
port: 22
username: deploy
# Authentication: set private_key, or password (literal or from the environment).
# With neither, the SSH agent and ~/.ssh/id_* keys are tried.
# private_key: ~/.ssh/id_ed25519
# password:
#   env: HOIST_PASSWORD

local_path: {local}
remote_path: /var/www/my-app
build_command: {build}

# Reload a dependent service after upload (and again after a rollback).
reload: true
reload_command: {reload}

# Keep this many timestamped backups of previous deployments.
backup_keep: 5

# upload_concurrency: 10
# command_timeout: 5m
# trust_first_connection: true
"#,
        local = DEFAULT_LOCAL_PATH,
        build = DEFAULT_BUILD_COMMAND,
        reload = DEFAULT_RELOAD_COMMAND,
    )
}
