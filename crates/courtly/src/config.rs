//! Flag-aware configuration resolution.
//!
//! `courtly-config` owns the file format, profile selection, and the
//! token chain. This module layers `GlobalOpts` overrides on top and
//! hands commands a finished `ServiceConfig`. Core never sees flags.

use secrecy::SecretString;

use courtly_config::{self as config, Config, Profile};
use courtly_core::{ServiceConfig, Session};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name (flag > config default).
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.defaults.profile.clone())
}

/// Resolve everything a command needs to talk to the service.
///
/// A profile supplies the baseline; `--server`, `--token`, `--insecure`,
/// and `--timeout` override individual fields. `--server` alone is
/// enough to run without any config file.
pub fn resolve_service(global: &GlobalOpts) -> Result<(ServiceConfig, Option<Session>), CliError> {
    let cfg = config::load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = if let Some(server) = global.server.as_deref() {
        cfg.profiles
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Profile::for_server(server))
    } else if cfg.profiles.is_empty() && global.profile.is_none() {
        return Err(CliError::NoConfig {
            path: config::config_path().display().to_string(),
        });
    } else {
        let (_, selected) = config::select_profile(&cfg, global.profile.as_deref())?;
        selected.clone()
    };

    // Flag overrides. The token is applied after bridging so it wins
    // over the profile's whole credential chain.
    if let Some(server) = global.server.as_deref() {
        profile.server_url = server.to_string();
    }
    if global.insecure {
        profile.verify_tls = Some(false);
    }
    profile.timeout_secs = Some(global.timeout);

    let session = config::profile_session(&profile);
    let mut service = config::profile_to_service_config(&profile, &name)?;

    if let Some(token) = global.token.as_deref() {
        if !token.is_empty() {
            service.token = Some(SecretString::from(token.to_string()));
        }
    }

    Ok((service, session))
}
