use std::io::{self, BufRead, Write};

use zeroize::Zeroizing;

use crate::errors::{PaAuthError, Result};

/// Source of interactively entered login and password
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    /// Read an echoed line (the login)
    async fn read_line(&self, prompt: &str) -> Result<String>;

    /// Read a password with echo disabled.
    ///
    /// The returned string is zeroized when dropped.
    async fn read_password(&self, prompt: &str) -> Result<Zeroizing<String>>;
}

/// Prompts on the controlling terminal.
///
/// Password entry goes through `rpassword`, which restores terminal echo on
/// every exit path including errors.
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompter;

#[async_trait::async_trait]
impl Prompter for TerminalPrompter {
    async fn read_line(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.to_string();
        blocking(move || {
            let mut stderr = io::stderr();
            write!(stderr, "{prompt}")?;
            stderr.flush()?;

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await
    }

    async fn read_password(&self, prompt: &str) -> Result<Zeroizing<String>> {
        let prompt = prompt.to_string();
        blocking(move || Ok(Zeroizing::new(rpassword::prompt_password(prompt)?))).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PaAuthError::Prompt(io::Error::other(e)))?
        .map_err(PaAuthError::Prompt)
}

/// Fixed answers, for tests and non-interactive use
#[derive(Debug, Clone)]
pub struct StaticPrompter {
    login: String,
    password: String,
}

impl StaticPrompter {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

#[async_trait::async_trait]
impl Prompter for StaticPrompter {
    async fn read_line(&self, _prompt: &str) -> Result<String> {
        Ok(self.login.clone())
    }

    async fn read_password(&self, _prompt: &str) -> Result<Zeroizing<String>> {
        Ok(Zeroizing::new(self.password.clone()))
    }
}
