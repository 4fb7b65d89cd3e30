//! Config command handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Profile summary (tokens redacted) ───────────────────────────────

#[derive(Clone, Serialize, Tabled)]
struct ProfileSummary {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "API URL")]
    api_url: String,
    #[tabled(rename = "Token source")]
    token_source: String,
    #[tabled(rename = "Push cluster")]
    push_cluster: String,
    #[tabled(rename = "Default")]
    default: String,
}

fn token_source(profile: &config::Profile) -> String {
    if let Some(ref env) = profile.token_env {
        format!("env:{env}")
    } else if profile.token.is_some() {
        "plaintext".into()
    } else {
        "keyring / CORRAL_TOKEN".into()
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.clone().unwrap_or_default();

            let mut summaries: Vec<ProfileSummary> = cfg
                .profiles
                .iter()
                .map(|(name, profile)| ProfileSummary {
                    name: name.clone(),
                    api_url: profile.api_url.clone(),
                    token_source: token_source(profile),
                    push_cluster: profile
                        .push
                        .as_ref()
                        .map(|p| p.cluster.clone())
                        .unwrap_or_default(),
                    default: if *name == default { "*".into() } else { String::new() },
                })
                .collect();
            summaries.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(
                &global.output,
                &summaries,
                Clone::clone,
                |s| s.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init) => handle_init(init, global),

        ConfigCommand::SetToken { profile } => {
            let token = dialoguer::Password::new()
                .with_prompt(format!("Bearer token for profile '{profile}'"))
                .interact()
                .map_err(|e| CliError::Io(std::io::Error::other(e)))?;

            corral_config::store_token(&profile, &token)?;
            if !global.quiet {
                eprintln!("Token stored in the system keyring");
            }
            Ok(())
        }
    }
}

fn handle_init(init: ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();

    let push = match (init.push_key, init.push_cluster) {
        (Some(app_key), Some(cluster)) => Some(config::PushProfile {
            app_key,
            cluster,
            endpoint: init.push_endpoint,
        }),
        (None, None) => None,
        _ => {
            return Err(CliError::Validation {
                field: "push".into(),
                reason: "--push-key and --push-cluster must be given together".into(),
            });
        }
    };

    cfg.profiles.insert(
        init.profile.clone(),
        config::Profile {
            api_url: init.api_url,
            token_env: init.token_env,
            push,
            ..config::Profile::default()
        },
    );

    if init.default || cfg.default_profile.is_none() {
        cfg.default_profile = Some(init.profile.clone());
    }

    config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!(
            "Profile '{}' saved to {}",
            init.profile,
            config::config_path().display()
        );
    }
    Ok(())
}
