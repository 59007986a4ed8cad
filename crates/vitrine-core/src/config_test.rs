use std::collections::HashMap;
use std::env::VarError;

use crate::config::build_app_config;
use crate::{ConfigError, Environment};

fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| map.get(key).map(|v| (*v).to_string()).ok_or(VarError::NotPresent)
}

#[test]
fn minimal_env_uses_defaults() {
    let mut env = HashMap::new();
    env.insert("DATABASE_URL", "postgres://localhost/vitrine");

    let config = build_app_config(lookup_from(&env)).expect("config should load");

    assert_eq!(config.database_url, "postgres://localhost/vitrine");
    assert_eq!(config.env, Environment::Development);
    assert_eq!(config.bind_addr.port(), 3000);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.db_max_connections, 10);
    assert_eq!(config.db_min_connections, 1);
    assert_eq!(config.db_acquire_timeout_secs, 10);
}

#[test]
fn missing_database_url_is_an_error() {
    let env = HashMap::new();
    let err = build_app_config(lookup_from(&env)).expect_err("should fail");
    assert!(matches!(err, ConfigError::MissingEnvVar(var) if var == "DATABASE_URL"));
}

#[test]
fn explicit_values_override_defaults() {
    let mut env = HashMap::new();
    env.insert("DATABASE_URL", "postgres://db/vitrine");
    env.insert("VITRINE_ENV", "production");
    env.insert("VITRINE_BIND_ADDR", "127.0.0.1:8080");
    env.insert("VITRINE_LOG_LEVEL", "debug");
    env.insert("VITRINE_DB_MAX_CONNECTIONS", "25");

    let config = build_app_config(lookup_from(&env)).expect("config should load");

    assert_eq!(config.env, Environment::Production);
    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.db_max_connections, 25);
}

#[test]
fn invalid_bind_addr_is_an_error() {
    let mut env = HashMap::new();
    env.insert("DATABASE_URL", "postgres://db/vitrine");
    env.insert("VITRINE_BIND_ADDR", "not-an-address");

    let err = build_app_config(lookup_from(&env)).expect_err("should fail");
    assert!(matches!(err, ConfigError::InvalidEnvVar { var, .. } if var == "VITRINE_BIND_ADDR"));
}

#[test]
fn unknown_env_name_falls_back_to_development() {
    let mut env = HashMap::new();
    env.insert("DATABASE_URL", "postgres://db/vitrine");
    env.insert("VITRINE_ENV", "staging");

    let config = build_app_config(lookup_from(&env)).expect("config should load");
    assert_eq!(config.env, Environment::Development);
}

#[test]
fn redacting_debug_hides_database_url() {
    let mut env = HashMap::new();
    env.insert("DATABASE_URL", "postgres://user:secret@db/vitrine");

    let config = build_app_config(lookup_from(&env)).expect("config should load");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("[redacted]"));
}
