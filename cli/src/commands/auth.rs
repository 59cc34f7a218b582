use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use crate::api::ApiClient;
use crate::config::Settings;
use crate::state::StateStore;
use pantry_core::session::{AuthState, SessionStatus};

use super::helpers::{exit_not_found, prompt_password};

fn anonymous_client(settings: &Settings) -> Result<ApiClient> {
    ApiClient::new(&settings.api_url, settings.timeout(), AuthState::Anonymous)
}

pub(crate) fn cmd_login(
    settings: &Settings,
    state: &StateStore,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };
    let client = anonymous_client(settings)?;
    let token = client.login(email, &password)?;
    let user = client.profile_for_token(&token)?;
    let session = settings.session.start(token, user, Utc::now())?;
    state.save_session(&session)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "user": session.user,
                "expires_at": session.expires_at,
            }))?
        );
    } else {
        println!(
            "Logged in as {} <{}>",
            session.user.name, session.user.email
        );
    }
    Ok(())
}

pub(crate) fn cmd_register(
    settings: &Settings,
    name: &str,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };
    anonymous_client(settings)?.register(name, email, &password)?;
    if json {
        println!("{}", json!({ "registered": email }));
    } else {
        println!("Registered {email}. Log in with: pantry login {email}");
    }
    Ok(())
}

pub(crate) fn cmd_logout(state: &StateStore, json: bool) -> Result<()> {
    if !state.clear_session()? {
        exit_not_found("Not logged in", json);
    }
    if json {
        println!("{}", json!({ "logged_out": true }));
    } else {
        println!("Logged out");
    }
    Ok(())
}

pub(crate) fn cmd_whoami(settings: &Settings, client: &ApiClient, json: bool) -> Result<()> {
    let Some(session) = client.auth().session() else {
        exit_not_found("Not logged in. Run `pantry login` first", json);
    };
    let now = Utc::now();
    let status = settings.session.status(session, now);
    let user = client.profile()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "user": user,
                "expires_at": session.expires_at,
                "expiring_soon": status == SessionStatus::ExpiringSoon,
            }))?
        );
        return Ok(());
    }

    println!("{} <{}>", user.name, user.email);
    let minutes = session.remaining(now).num_minutes();
    match status {
        SessionStatus::ExpiringSoon => {
            println!("Session expires in {minutes} min. Log in again to renew it.");
        }
        _ => println!("Session valid for {}h {}m", minutes / 60, minutes % 60),
    }
    Ok(())
}
