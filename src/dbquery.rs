//! Single-query Oracle reader (`file-reader query-db`).
//!
//! Connection settings come from the environment (a `.env` file is loaded
//! first). The command fetches the most recent source history row and logs
//! it.

use anyhow::{Context, Result};

/// Environment variables that must all be set and non-empty.
pub const REQUIRED_VARS: [&str; 5] = [
    "ORACLE_USERNAME",
    "ORACLE_PASSWORD",
    "ORACLE_HOST",
    "ORACLE_PORT",
    "ORACLE_SERVICE_NAME",
];

const LATEST_SOURCE_QUERY: &str = "
    SELECT s.name, h.text
    FROM src#1 s
    JOIN src_hist h ON s.id = h.src_id
    ORDER BY h.seq_nr DESC
    FETCH FIRST 1 ROW ONLY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub service_name: String,
}

impl DbSettings {
    /// Reads settings through `lookup`; on failure returns every missing
    /// variable name.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, Vec<&'static str>> {
        let values: Vec<(&'static str, Option<String>)> = REQUIRED_VARS
            .iter()
            .map(|&name| (name, lookup(name).filter(|v| !v.is_empty())))
            .collect();

        let missing: Vec<&'static str> = values
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let mut values = values.into_iter().map(|(_, v)| v.unwrap_or_default());
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            username: next(),
            password: next(),
            host: next(),
            port: next(),
            service_name: next(),
        })
    }

    pub fn from_env() -> std::result::Result<Self, Vec<&'static str>> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Easy Connect string: `host:port/service`.
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service_name)
    }
}

/// Latest `(name, text)` row, or `None` when the query returns nothing.
pub fn fetch_latest(settings: &DbSettings) -> Result<Option<(String, Option<String>)>> {
    let conn = oracle::Connection::connect(
        &settings.username,
        &settings.password,
        settings.connect_string(),
    )
    .with_context(|| format!("Error connecting to database at {}", settings.connect_string()))?;

    let mut rows = conn
        .query_as::<(String, Option<String>)>(LATEST_SOURCE_QUERY, &[])
        .context("Error executing query")?;
    let row = rows.next().transpose().context("Error reading result row")?;

    Ok(row)
}

/// CLI entry point. Loads `.env`, then queries with the process
/// environment.
pub fn run_query() -> Result<()> {
    let _ = dotenvy::dotenv();
    run_query_with(|name| std::env::var(name).ok())
}

/// Runs the query with settings read through `lookup`. Missing settings
/// and database failures are returned to the caller.
pub fn run_query_with(lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    let settings = DbSettings::from_lookup(lookup).map_err(|missing| {
        anyhow::anyhow!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )
    })?;

    match fetch_latest(&settings)? {
        Some((name, text)) => {
            tracing::info!("Name: {}", name);
            tracing::info!("Text: {}", text.unwrap_or_default());
        }
        None => tracing::info!("No data found"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn all_variables_present() {
        let settings = DbSettings::from_lookup(lookup(&[
            ("ORACLE_USERNAME", "scott"),
            ("ORACLE_PASSWORD", "tiger"),
            ("ORACLE_HOST", "db.local"),
            ("ORACLE_PORT", "1521"),
            ("ORACLE_SERVICE_NAME", "ORCL"),
        ]))
        .unwrap();

        assert_eq!(settings.username, "scott");
        assert_eq!(settings.service_name, "ORCL");
        assert_eq!(settings.connect_string(), "db.local:1521/ORCL");
    }

    #[test]
    fn missing_and_empty_variables_are_all_reported() {
        let missing = DbSettings::from_lookup(lookup(&[
            ("ORACLE_USERNAME", "scott"),
            ("ORACLE_PASSWORD", ""),
            ("ORACLE_PORT", "1521"),
        ]))
        .unwrap_err();

        assert_eq!(
            missing,
            vec!["ORACLE_PASSWORD", "ORACLE_HOST", "ORACLE_SERVICE_NAME"]
        );
    }

    #[test]
    fn missing_settings_are_returned_as_an_error() {
        let err = run_query_with(lookup(&[("ORACLE_USERNAME", "scott")])).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Missing required environment variables: ORACLE_PASSWORD, ORACLE_HOST, ORACLE_PORT, ORACLE_SERVICE_NAME"
        );
    }
}
