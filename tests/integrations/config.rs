use clap::Parser;
use notifyd::{
    cli::Cli,
    config::{Config, SenderKind},
    core::ChannelId,
};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    test_fn(file.path().to_path_buf());
}

fn cli_with_config(path: PathBuf) -> Cli {
    Cli {
        config: Some(path),
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        [core]
        log_level = "debug"

        [server]
        listen_address = "127.0.0.1:8080"

        [dispatch]
        priority = ["telegram", "email"]
        attempt_timeout_ms = 2500
        record_exhausted_incidents = true

        [channels.email]
        kind = "webhook"
        webhook_url = "http://mailer.internal/send"
        subject = "Alert"

        [channels.sms]
        kind = "log"

        [incidents]
        database_path = "/var/lib/notifyd/incidents.db"

        [metrics]
        enabled = true
        listen_address = "127.0.0.1:9100"
    "#;

    with_config_file(toml_content, |path| {
        let config = Config::load(&cli_with_config(path)).unwrap();

        assert_eq!(config.core.log_level, "debug");
        assert_eq!(config.server.listen_address, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(
            config.dispatch.priority,
            vec![ChannelId::Telegram, ChannelId::Email]
        );
        assert_eq!(config.dispatch.attempt_timeout(), Duration::from_millis(2500));
        assert!(config.dispatch.record_exhausted_incidents);
        assert_eq!(config.channels.email.kind, SenderKind::Webhook);
        assert_eq!(config.channels.email.subject.as_deref(), Some("Alert"));
        assert_eq!(config.channels.email.timeout_ms, 5_000);
        assert_eq!(config.channels.telegram.kind, SenderKind::Log);
        assert_eq!(
            config.incidents.database_path,
            PathBuf::from("/var/lib/notifyd/incidents.db")
        );
        assert!(config.metrics.enabled);
    });
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    with_config_file("[core]\nlog_level = \"warn\"\n", |path| {
        let config = Config::load(&cli_with_config(path)).unwrap();
        let defaults = Config::default();

        assert_eq!(config.core.log_level, "warn");
        assert_eq!(config.dispatch, defaults.dispatch);
        assert_eq!(config.server, defaults.server);
        assert_eq!(config.channels, defaults.channels);
    });
}

#[test]
#[serial]
fn test_missing_explicit_config_file_is_an_error() {
    let cli = cli_with_config(PathBuf::from("/definitely/not/here/notifyd.toml"));
    let err = Config::load(&cli).unwrap_err();
    assert!(err.to_string().contains("config file not found"));
}

#[test]
#[serial]
fn test_duplicate_priority_fails_to_load() {
    with_config_file("[dispatch]\npriority = [\"sms\", \"sms\"]\n", |path| {
        let err = Config::load(&cli_with_config(path)).unwrap_err();
        assert!(err.to_string().contains("dispatch.priority"));
    });
}

#[test]
#[serial]
fn test_unknown_channel_in_priority_fails_to_load() {
    with_config_file("[dispatch]\npriority = [\"email\", \"fax\"]\n", |path| {
        assert!(Config::load(&cli_with_config(path)).is_err());
    });
}

#[test]
#[serial]
fn test_webhook_without_url_fails_to_load() {
    with_config_file("[channels.telegram]\nkind = \"webhook\"\n", |path| {
        let err = Config::load(&cli_with_config(path)).unwrap_err();
        assert!(err.to_string().contains("channels.telegram"));
    });
}

#[test]
#[serial]
fn test_env_overrides_file() {
    with_config_file("[dispatch]\nattempt_timeout_ms = 2500\n", |path| {
        std::env::set_var("NOTIFYD_DISPATCH__ATTEMPT_TIMEOUT_MS", "750");
        std::env::set_var("NOTIFYD_SERVER__LISTEN_ADDRESS", "127.0.0.1:7000");
        let result = Config::load(&cli_with_config(path));
        std::env::remove_var("NOTIFYD_DISPATCH__ATTEMPT_TIMEOUT_MS");
        std::env::remove_var("NOTIFYD_SERVER__LISTEN_ADDRESS");

        let config = result.unwrap();
        assert_eq!(config.dispatch.attempt_timeout_ms, 750);
        assert_eq!(config.server.listen_address, "127.0.0.1:7000".parse().unwrap());
    });
}

#[test]
#[serial]
fn test_cli_overrides_env_and_file() {
    with_config_file("[core]\nlog_level = \"warn\"\n[metrics]\nenabled = false\n", |path| {
        std::env::set_var("NOTIFYD_CORE__LOG_LEVEL", "error");
        let cli = Cli::parse_from([
            "notifyd",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "trace",
            "--listen",
            "127.0.0.1:9999",
            "--database",
            "/tmp/other.db",
            "--attempt-timeout-ms",
            "100",
            "--metrics",
        ]);
        let result = Config::load(&cli);
        std::env::remove_var("NOTIFYD_CORE__LOG_LEVEL");

        let config = result.unwrap();
        assert_eq!(config.core.log_level, "trace");
        assert_eq!(config.server.listen_address, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.incidents.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.dispatch.attempt_timeout_ms, 100);
        assert!(config.metrics.enabled);
    });
}
