use super::{constant::*, ConfigEntity};
use crate::{logging, utils, Error, Result};
use serde_yaml;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

// load_config_with_yaml loads the configuration from the YAML file under the provided path,
// then applies the overrides from the system environment.
pub fn load_config_with_yaml(config_path: &mut String) -> Result<ConfigEntity> {
    // Priority: system environment > YAML file > default config
    let mut entity = apply_yaml_config_file(config_path)?;
    override_items_from_system_env(&mut entity)?;
    Ok(entity)
}

// apply_yaml_config_file loads general configuration from the given YAML file.
fn apply_yaml_config_file(config_path: &mut String) -> Result<ConfigEntity> {
    if utils::is_blank(config_path) {
        // If the config file path is absent, try to resolve it from the system env.
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_config_from_yaml_file(config_path)
}

fn load_config_from_yaml_file(path_str: &str) -> Result<ConfigEntity> {
    if path_str == CONFIG_FILENAME {
        return Ok(ConfigEntity::default());
    }
    let path = Path::new(path_str);
    if !path.exists() {
        return Err(Error::msg("YAML configuration file does not exist!"));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    Ok(entity)
}

pub fn override_items_from_system_env(entity: &mut ConfigEntity) -> Result<()> {
    override_items_from(entity, |key| env::var(key).ok())
}

// override_items_from applies the overrides found by `lookup`, then re-checks the entity.
pub(crate) fn override_items_from<F>(entity: &mut ConfigEntity, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(app_name) = lookup(APP_NAME_ENV_KEY) {
        if !utils::is_blank(&app_name) {
            entity.config.app.app_name = app_name;
        }
    }
    if let Some(limit) = lookup(CONCURRENCY_LIMIT_ENV_KEY) {
        entity.config.concurrency_limit.limit = limit.trim().parse::<u64>().map_err(|err| {
            Error::msg(format!(
                "illegal {} value {:?}: {}",
                CONCURRENCY_LIMIT_ENV_KEY, limit, err
            ))
        })?;
    }
    if let Some(enforce) = lookup(CONCURRENCY_ENFORCE_ENV_KEY) {
        entity.config.concurrency_limit.enforce = parse_flag(&enforce).ok_or_else(|| {
            Error::msg(format!(
                "illegal {} value {:?}",
                CONCURRENCY_ENFORCE_ENV_KEY, enforce
            ))
        })?;
    }
    entity.check()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn init_log(entity: &ConfigEntity) {
    logging::logger_init(Some(entity.config.log.config_file.clone()));
    logging::info!(
        "[Config] App name resolved, appName {}",
        entity.config.app.app_name
    );
    logging::info!(
        "[Config] Print effective global config, globalConfig {:?}",
        entity
    );
}
