//! CLI configuration — thin wrapper around `corral_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --token, etc.).

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use corral_api::transport::{TlsMode, TransportConfig};
use corral_config::ResolvedProfile;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use corral_config::{
    Config, Profile, PushProfile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve connection settings from config, profile, and CLI overrides.
///
/// CLI flag overrides take priority over profile values. Works without
/// a config file when `--api-url` and a token are supplied directly.
pub fn resolve(global: &GlobalOpts) -> Result<ResolvedProfile, CliError> {
    let config = load_config_or_default();
    let profile_name = active_profile_name(global, &config);

    if let Some(profile) = config.profiles.get(&profile_name) {
        return resolve_with_overrides(profile, &profile_name, global);
    }

    // An explicitly named profile that doesn't exist is its own error.
    if global.profile.is_some() && global.api_url.is_none() {
        let mut available: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available.join(", "),
        });
    }

    // No profile found -- try to build from CLI flags / env vars alone.
    let url_str = global.api_url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let api_url: Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "api-url".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;

    let token = global
        .token
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoToken {
            profile: profile_name,
        })?;

    Ok(ResolvedProfile {
        api_url,
        token,
        transport: transport_from_flags(global, None),
        push: None,
    })
}

/// Translate a `Profile` + global flags into resolved settings.
fn resolve_with_overrides(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<ResolvedProfile, CliError> {
    let mut resolved = if let Some(ref token) = global.token {
        // The flag short-circuits the profile's credential chain.
        let profile_with_token = Profile {
            token: Some(token.clone()),
            token_env: None,
            ..clone_profile(profile)
        };
        let mut resolved = corral_config::resolve_profile(&profile_with_token, profile_name)?;
        resolved.token = SecretString::from(token.clone());
        resolved
    } else {
        corral_config::resolve_profile(profile, profile_name)?
    };

    if let Some(ref url_str) = global.api_url {
        resolved.api_url = url_str.parse().map_err(|_| CliError::Validation {
            field: "api-url".into(),
            reason: format!("invalid URL: {url_str}"),
        })?;
    }

    resolved.transport = transport_from_flags(global, profile.insecure);
    if let Some(ref ca_path) = profile.ca_cert {
        if !global.insecure {
            resolved.transport.tls = TlsMode::CustomCa(ca_path.clone());
        }
    }

    Ok(resolved)
}

fn transport_from_flags(global: &GlobalOpts, profile_insecure: Option<bool>) -> TransportConfig {
    let tls = if global.insecure || profile_insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else {
        TlsMode::System
    };
    TransportConfig {
        tls,
        timeout: Duration::from_secs(global.timeout),
    }
}

// `Profile` carries no secrets worth a custom Clone upstream; rebuild it
// field by field for the token-override path.
fn clone_profile(profile: &Profile) -> Profile {
    Profile {
        api_url: profile.api_url.clone(),
        token: profile.token.clone(),
        token_env: profile.token_env.clone(),
        push: profile.push.clone(),
        ca_cert: profile.ca_cert.clone(),
        insecure: profile.insecure,
        timeout: profile.timeout,
    }
}
