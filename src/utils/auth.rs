use std::time::Duration;
use anyhow::Result;
use log::{debug, info};
use crate::utils::browser::Session;
use crate::utils::config::Config;

// Microsoft SSO form controls, as served by login.microsoftonline.com.
pub const USERNAME_FIELD: &str = r#"input[name="loginfmt"]"#;
pub const PASSWORD_FIELD: &str = r#"input[name="passwd"]"#;
pub const SUBMIT_BUTTON: &str = "#idSIButton9";
// "No" on the "Stay signed in?" prompt.
pub const STAY_SIGNED_IN_NO: &str = "#idBtn_Back";

const STAY_SIGNED_IN_WAIT: Duration = Duration::from_secs(5);

// Drives the SSO login so the session ends up authenticated against the LMS.
pub async fn login(session: &Session, config: &Config) -> Result<()> {
    info!("Logging in...");
    session.goto(config.login_url()?.as_str()).await?;

    session.fill(USERNAME_FIELD, &config.username).await?;
    session.click(SUBMIT_BUTTON, session.wait_timeout()).await?;
    // The password step reuses the submit button, so wait for the username step to leave the screen.
    session.wait_hidden(USERNAME_FIELD, session.wait_timeout()).await?;

    session.fill(PASSWORD_FIELD, &config.password).await?;
    session.click(SUBMIT_BUTTON, session.wait_timeout()).await?;
    session.wait_hidden(PASSWORD_FIELD, session.wait_timeout()).await?;

    // The prompt only shows up for some tenants.
    match session.click(STAY_SIGNED_IN_NO, STAY_SIGNED_IN_WAIT).await {
        Ok(()) => debug!("Dismissed the stay signed in prompt"),
        Err(e) => debug!("No stay signed in prompt: {}", e),
    }
    session.settle().await?;

    info!("Logged in: {}", session.url().await?);
    Ok(())
}
