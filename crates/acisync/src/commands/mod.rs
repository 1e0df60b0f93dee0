//! Subcommand handlers.

pub mod config_cmd;
pub mod kinds;
pub mod sync;

use acisync_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config file and environment, then apply global CLI overrides.
pub fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = acisync_config::load(global.config.as_deref())?;
    if let Some(host) = &global.aci_host {
        cfg.apic.host = Some(host.clone());
    }
    if let Some(user) = &global.aci_username {
        cfg.apic.username.clone_from(user);
    }
    if let Some(url) = &global.netbox_url {
        cfg.netbox.url = Some(url.clone());
    }
    Ok(cfg)
}
