use std::io;

use crate::api::auth::{AuthClient, Credentials, Registration};
use crate::config::{OAUTH_POLL_ATTEMPTS, OAUTH_POLL_INTERVAL};
use crate::session::Session;

/// Reads a secret without echoing it.
type SecretPrompt = fn(&str) -> io::Result<String>;

fn terminal_prompt(label: &str) -> io::Result<String> {
    rpassword::prompt_password(label)
}

/// Run secret prompts off the async runtime; the terminal read blocks.
async fn with_secret_prompt<T, F>(read: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(SecretPrompt) -> io::Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || read(terminal_prompt)).await??)
}

fn login_password(password: Option<String>, prompt: SecretPrompt) -> io::Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt("Password: "),
    }
}

fn registration_passwords(
    password: Option<String>,
    prompt: SecretPrompt,
) -> io::Result<(String, String)> {
    match password {
        Some(p) => Ok((p.clone(), p)),
        None => Ok((prompt("Password: ")?, prompt("Confirm password: ")?)),
    }
}

pub async fn login(
    client: &AuthClient,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = with_secret_prompt(move |prompt| login_password(password, prompt)).await?;
    let credentials = Credentials {
        email: email.trim().to_string(),
        password,
    };
    client.login(&credentials).await?;
    println!("Logged in as {}", credentials.email);
    Ok(())
}

pub async fn register(
    client: &AuthClient,
    email: &str,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let (password, confirm_password) =
        with_secret_prompt(move |prompt| registration_passwords(password, prompt)).await?;
    let registration = Registration {
        email: email.trim().to_string(),
        password,
        confirm_password,
        username: username.trim().to_string(),
    };
    client.register(&registration).await?;
    println!("Account created for {}. You can now log in.", registration.email);
    Ok(())
}

pub fn logout(session: &Session) {
    if !session.is_authenticated() {
        println!("Not logged in.");
        return;
    }
    session.clear();
    println!("Logged out.");
}

pub async fn oauth(client: &AuthClient, wait: bool) -> anyhow::Result<()> {
    println!("Open this URL in your browser to sign in with Google:");
    println!("  {}", client.oauth_url());

    if !wait {
        return Ok(());
    }

    println!("Waiting for the auth service to recognize this client...");
    println!("(The browser's session cookie is not shared with this CLI.)");
    if client
        .wait_for_oauth(OAUTH_POLL_INTERVAL, OAUTH_POLL_ATTEMPTS)
        .await?
    {
        println!("Logged in.");
        Ok(())
    } else {
        anyhow::bail!(
            "Timed out after {} attempts waiting for the OAuth login; \
             the browser session is not visible to this client, use `fintrust login` instead",
            OAUTH_POLL_ATTEMPTS
        )
    }
}
