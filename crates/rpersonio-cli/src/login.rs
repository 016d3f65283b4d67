//! Credential resolution and the interactive login flow.

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use rpersonio_core::auth::CredentialStore;
use rpersonio_core::{ApiError, AttendanceService, Config, Credentials};

use crate::cli::Cli;

/// Whether prompting on the terminal is allowed.
pub fn interactive(cli: &Cli) -> bool {
    !cli.no_input && io::stdin().is_terminal()
}

/// Collect credentials from flags, environment, config, keychain, and prompts,
/// in that order.
pub fn resolve_credentials(cli: &Cli, config: &Config, interactive: bool) -> Result<Credentials> {
    let email = match cli.email.clone().or_else(|| config.email.clone()) {
        Some(email) => email,
        None if interactive => prompt_line("Email: ")?,
        None => bail!("No email given. Pass --email or set PERSONIO_EMAIL"),
    };
    if email.is_empty() {
        bail!("Email must not be empty");
    }

    let password = match cli.password.clone() {
        Some(password) => password,
        None => match CredentialStore::get_password(&email) {
            Ok(password) => {
                debug!("Using password from the OS keychain");
                password
            }
            Err(_) if interactive => prompt_password()?,
            Err(_) => bail!(
                "No password given. Pass --password, set PERSONIO_PASSWORD, \
                 or run `rpersonio login --remember` once"
            ),
        },
    };

    let credentials = Credentials::new(email, password);
    Ok(match (&cli.csrf_token, &cli.email_token) {
        (Some(csrf), Some(token)) => credentials.with_challenge_response(csrf, token),
        (None, None) => credentials,
        _ => bail!("--csrf-token and --email-token must be given together"),
    })
}

/// Log in, answering a new-device challenge on the terminal when allowed.
pub async fn login(
    service: &mut AttendanceService,
    credentials: &Credentials,
    interactive: bool,
) -> Result<()> {
    let outcome = service
        .login(credentials)
        .await
        .map(|session| session.employee_id);

    let csrf_token = match outcome {
        Ok(employee_id) => {
            info!(employee_id, "Logged in");
            return Ok(());
        }
        Err(ApiError::AuthChallengeRequired { csrf_token }) => csrf_token,
        Err(e) => return Err(e.into()),
    };

    if credentials.has_challenge_response() {
        bail!("Personio rejected the email token; request a new one by logging in again");
    }

    if !interactive {
        bail!(
            "Personio sent a one-time token to {} to confirm this device. \
             Rerun with --csrf-token {} --email-token <token>",
            credentials.email,
            csrf_token
        );
    }

    warn!("New device challenge");
    eprintln!(
        "Personio does not recognize this device and emailed a token to {}.",
        credentials.email
    );
    let token = prompt_line("Token: ")?;
    let retry = credentials.with_challenge_response(csrf_token, token);
    let employee_id = service.login(&retry).await?.employee_id;
    info!(employee_id, "Logged in after device challenge");
    Ok(())
}

fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
