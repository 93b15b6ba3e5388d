// src/storage/mod.rs

//! Object-storage side of staging: credentials and source locations.

use std::fmt;

use thiserror::Error;

pub mod location;

pub use location::{S3Location, TemplateError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("environment variable {0} is not set")]
    MissingVar(String),

    #[error("environment variable {0} is empty")]
    EmptyVar(String),
}

/// An access/secret key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"****")
            .finish()
    }
}

/// Resolves credentials at task execution time.
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    fn resolve(&self) -> Result<Credentials, CredentialError>;
}

/// Reads the pair from two environment variables on every resolution.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    access_key_var: String,
    secret_key_var: String,
}

impl EnvCredentials {
    pub const DEFAULT_ACCESS_KEY_VAR: &'static str = "AWS_ACCESS_KEY_ID";
    pub const DEFAULT_SECRET_KEY_VAR: &'static str = "AWS_SECRET_ACCESS_KEY";

    pub fn new(access_key_var: impl Into<String>, secret_key_var: impl Into<String>) -> Self {
        Self {
            access_key_var: access_key_var.into(),
            secret_key_var: secret_key_var.into(),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ACCESS_KEY_VAR, Self::DEFAULT_SECRET_KEY_VAR)
    }
}

impl CredentialProvider for EnvCredentials {
    fn resolve(&self) -> Result<Credentials, CredentialError> {
        Ok(Credentials {
            access_key: read_var(&self.access_key_var)?,
            secret_key: read_var(&self.secret_key_var)?,
        })
    }
}

fn read_var(name: &str) -> Result<String, CredentialError> {
    let value =
        std::env::var(name).map_err(|_| CredentialError::MissingVar(name.to_string()))?;
    if value.trim().is_empty() {
        return Err(CredentialError::EmptyVar(name.to_string()));
    }
    Ok(value)
}

/// Fixed credentials, mostly for tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn resolve(&self) -> Result<Credentials, CredentialError> {
        Ok(self.0.clone())
    }
}
