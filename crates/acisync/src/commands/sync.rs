//! `acisync sync`: one reconciliation pass.

use secrecy::SecretString;
use tracing::{debug, info, warn};

use acisync_api::{ApicClient, NetBoxClient};
use acisync_config::Config;
use acisync_core::{Orchestrator, PreloadFailure, Selection, SyncSettings};

use crate::cli::{GlobalOpts, PreloadPolicy, SyncArgs};
use crate::commands::effective_config;
use crate::error::CliError;
use crate::output;

/// Fold the sync flags over the `[sync]` section.
fn settings(cfg: &Config, args: &SyncArgs) -> SyncSettings {
    let mut settings = cfg.sync.settings(args.tenant.clone());
    settings.dry_run |= args.dry_run;
    if args.no_verify {
        settings.verify = false;
    }
    if let Some(keep_going) = args.continue_on_error {
        settings.continue_on_error = keep_going;
    }
    settings.abort_run_on_fatal |= args.abort_run_on_fatal;
    if let Some(policy) = args.on_preload_failure {
        settings.on_preload_failure = match policy {
            PreloadPolicy::AbortKind => PreloadFailure::AbortKind,
            PreloadPolicy::AssumeEmpty => PreloadFailure::AssumeEmpty,
        };
    }
    settings
}

pub async fn handle(args: &SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let selection = Selection::from_words(&args.only, &args.skip).map_err(|e| CliError::Selection {
        reason: e.to_string(),
    })?;
    let cfg = effective_config(global)?;
    cfg.validate()?;
    let settings = settings(&cfg, args);

    // validate() guarantees both endpoints are present.
    let host = cfg.apic.host.clone().unwrap_or_default();
    let netbox_url = cfg.netbox.url.clone().unwrap_or_default();

    let password = match &global.aci_password {
        Some(pw) => SecretString::from(pw.clone()),
        None => acisync_config::resolve_apic_password(&cfg.apic)?,
    };
    let token = match &global.netbox_token {
        Some(token) => SecretString::from(token.clone()),
        None => acisync_config::resolve_netbox_token(&cfg.netbox)?,
    };

    let apic = ApicClient::new(&host, &cfg.apic.transport())
        .map_err(|e| CliError::from_api("APIC", &host, e))?;
    apic.login(&cfg.apic.username, &password)
        .await
        .map_err(|e| CliError::from_api("APIC", &host, e))?;
    info!(apic = %apic.base_url(), user = %cfg.apic.username, "logged in to APIC");

    let netbox = NetBoxClient::from_token(&netbox_url, &token, &cfg.netbox.transport())
        .map_err(|e| CliError::from_api("NetBox", &netbox_url, e))?;
    let status = netbox
        .status()
        .await
        .map_err(|e| CliError::from_api("NetBox", &netbox_url, e))?;
    info!(
        netbox = %netbox.base_url(),
        version = status.netbox_version.as_deref().unwrap_or("unknown"),
        "connected to NetBox"
    );
    if !status.plugins.contains_key("netbox_aci_plugin") {
        warn!("netbox_aci_plugin is not listed as installed; ACI endpoints may be missing");
    }

    let orchestrator = Orchestrator::new(apic, netbox, settings, selection);
    let report = orchestrator.run().await;

    if let Err(e) = orchestrator.source().logout(&cfg.apic.username).await {
        debug!("APIC logout failed: {e}");
    }

    let color = output::should_color(global.color);
    let rendered = output::render_report(global.output, &report, color)?;
    output::print_output(&rendered, global.quiet);

    if report.success() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed: report.totals().failed,
            aborted: report.kinds.iter().filter(|k| k.is_aborted()).count(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn sync_args(argv: &[&str]) -> SyncArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Sync(args) => args,
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_section() {
        let args = sync_args(&[
            "acisync",
            "sync",
            "--dry-run",
            "--no-verify",
            "--continue-on-error",
            "false",
            "--on-preload-failure",
            "assume-empty",
            "--tenant",
            "prod",
        ]);
        let s = settings(&Config::default(), &args);
        assert!(s.dry_run);
        assert!(!s.verify);
        assert!(!s.continue_on_error);
        assert!(s.fatal_stops_run());
        assert_eq!(s.on_preload_failure, PreloadFailure::AssumeEmpty);
        assert_eq!(s.tenant.as_deref(), Some("prod"));
    }

    #[test]
    fn config_section_applies_without_flags() {
        let mut cfg = Config::default();
        cfg.sync.dry_run = true;
        cfg.sync.abort_run_on_fatal = true;
        let s = settings(&cfg, &sync_args(&["acisync", "sync"]));
        assert!(s.dry_run);
        assert!(s.abort_run_on_fatal);
        assert!(s.verify);
    }

    #[test]
    fn only_and_skip_conflict() {
        let err = Cli::try_parse_from(["acisync", "sync", "--only", "vrfs", "--skip", "epgs"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn comma_separated_kinds() {
        let args = sync_args(&["acisync", "sync", "--only", "tenants,vrfs", "--only", "bds"]);
        assert_eq!(args.only, vec!["tenants", "vrfs", "bds"]);
    }
}
