//! Config subcommand handlers.

use dialoguer::{Input, Select};

use courtly_config::{self as config, Config, Profile};
use courtly_core::{OperatingWindow, Role};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::active_profile_name;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Clone of the config with plaintext tokens masked for display.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some("<redacted>".into());
        }
    }
    cfg
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init_wizard(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let masked = redacted(&cfg);
            let out = output::render_single(
                &global.output,
                &masked,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |_| config::config_path().display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let requested = profile.unwrap_or_else(|| active_profile_name(global, &cfg));

            // The profile must exist so the token has somewhere to belong.
            let (name, _) = config::select_profile(&cfg, Some(&requested))?;

            let token = rpassword::prompt_password("Token: ").map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }

            config::store_token(name, &token)?;
            eprintln!("✓ Token stored in system keyring for profile '{name}'");
            Ok(())
        }
    }
}

// ── Init wizard ─────────────────────────────────────────────────────

fn init_wizard() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("Courtly configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let server_url: String = Input::new()
        .with_prompt("Service URL")
        .default("https://courts.example.club".into())
        .interact_text()
        .map_err(prompt_err)?;

    let user_ref: String = Input::new()
        .with_prompt("User reference (blank for anonymous browsing)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let roles = &["client", "staff", "admin"];
    let role_selection = Select::new()
        .with_prompt("Role granted by the service")
        .items(roles)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    let role = match role_selection {
        1 => Role::Staff,
        2 => Role::Admin,
        _ => Role::Client,
    };

    let open_hour: u32 = Input::new()
        .with_prompt("Opening hour (0-23)")
        .default(16)
        .interact_text()
        .map_err(prompt_err)?;
    let close_hour: u32 = Input::new()
        .with_prompt("Closing hour (1-24)")
        .default(24)
        .interact_text()
        .map_err(prompt_err)?;
    OperatingWindow::new(open_hour, close_hour)
        .validate()
        .map_err(|e| CliError::Validation {
            field: "open_hour/close_hour".into(),
            reason: e.to_string(),
        })?;

    let token = rpassword::prompt_password("Bearer token (blank to skip): ").map_err(prompt_err)?;
    let token_field = if token.is_empty() {
        None
    } else {
        let store_choices = &[
            "Store in system keyring (recommended)",
            "Save to config file (plaintext)",
        ];
        let store_selection = Select::new()
            .with_prompt("Where to store the token?")
            .items(store_choices)
            .default(0)
            .interact()
            .map_err(prompt_err)?;

        if store_selection == 0 {
            config::store_token(&profile_name, &token)?;
            eprintln!("   ✓ Token stored in system keyring");
            None
        } else {
            Some(token)
        }
    };

    let new_profile = Profile {
        server_url,
        user_ref: if user_ref.is_empty() {
            None
        } else {
            Some(user_ref)
        },
        role,
        open_hour: Some(open_hour),
        close_hour: Some(close_hour),
        verify_tls: None,
        timeout_secs: None,
        token: token_field,
    };

    // Existing profiles are kept; the new one becomes the default.
    let mut cfg = config::load_config_or_default();
    cfg.defaults.profile = profile_name.clone();
    cfg.profiles.insert(profile_name.clone(), new_profile);

    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Try it: courtly courts list");

    Ok(())
}
