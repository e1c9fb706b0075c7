// ABOUTME: Integration tests for configuration discovery, parsing and resolution.
// ABOUTME: Covers file lookup order, env interpolation, and settings derivation.

use sandcastle::config::*;
use sandcastle::error::Error;
use sandcastle::runtime::RuntimeType;
use sandcastle::sandbox::SandboxSettings;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
image: node:22-bookworm
network: previews
working_dir: /workspace
ports: [3000, 4321]
command: ["sleep", "infinity"]

env:
  NODE_ENV: development
  NPM_TOKEN:
    env: SANDCASTLE_TEST_UNUSED
    default: none

labels:
  team: web

stop_timeout: 30s
exec_timeout: 2m

allocation:
  start: 20000
  bind_host: 127.0.0.1
  max_attempts: 50

readiness:
  host: localhost
  attempts: 40
  interval: 250ms
  timeout: 1s

runtime: podman
socket: /run/user/1000/podman/podman.sock
event_capacity: 64
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.image, "node:22-bookworm");
        assert_eq!(config.network, "previews");
        assert_eq!(config.working_dir, "/workspace");
        assert_eq!(config.ports, vec![3000, 4321]);
        assert_eq!(config.command, vec!["sleep", "infinity"]);
        assert_eq!(
            config.env.get("NODE_ENV"),
            Some(&EnvValue::Literal("development".to_string()))
        );
        assert_eq!(config.labels.get("team").map(String::as_str), Some("web"));
        assert_eq!(config.stop_timeout, Duration::from_secs(30));
        assert_eq!(config.exec_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.allocation.start, Some(20000));
        assert_eq!(config.allocation.bind_host, "127.0.0.1");
        assert_eq!(config.allocation.max_attempts, 50);
        assert_eq!(config.readiness.host, "localhost");
        assert_eq!(config.readiness.attempts, 40);
        assert_eq!(config.readiness.interval, Duration::from_millis(250));
        assert_eq!(config.readiness.timeout, Duration::from_secs(1));
        assert_eq!(config.runtime.runtime, Some(RuntimeType::Podman));
        assert_eq!(
            config.runtime.socket.as_deref(),
            Some("/run/user/1000/podman/podman.sock")
        );
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = Config::from_yaml("image: python:3.12-slim\n").unwrap();
        let defaults = Config::default();
        assert_eq!(config.image, "python:3.12-slim");
        assert_eq!(config.ports, defaults.ports);
        assert_eq!(config.network, defaults.network);
        assert_eq!(config.readiness, defaults.readiness);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "image: ''",
            "ports: [0]",
            "command: []",
            "exec_timeout: 0s",
            "allocation:\n  max_attempts: 0",
            "event_capacity: 0",
        ] {
            let err = Config::from_yaml(yaml).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfig(_)),
                "expected InvalidConfig for {yaml:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = Config::from_yaml("ports: [3000").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(p) if p == dir.path()));
    }

    #[test]
    fn primary_filename_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "image: primary:1\n").unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "image: alt:1\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.image, "primary:1");
    }

    #[test]
    fn alternate_extension_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "image: alt:1\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.image, "alt:1");
    }

    #[test]
    fn dot_directory_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".sandcastle")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "network: hidden\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.network, "hidden");
    }

    #[test]
    fn init_output_is_discoverable() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("ruby:3.3"), false).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.image, "ruby:3.3");
        assert_eq!(config.ports, Config::default().ports);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, false).unwrap();

        let err = init_config(dir.path(), None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        init_config(dir.path(), Some("bun:1"), true).unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().image, "bun:1");
    }
}

mod settings {
    use super::*;

    #[test]
    fn env_is_resolved_from_host() {
        let yaml = r#"
env:
  API_URL:
    env: SANDCASTLE_TEST_API_URL
  MODE:
    env: SANDCASTLE_TEST_MODE
    default: preview
  LITERAL: plain
"#;
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_vars(
            [
                ("SANDCASTLE_TEST_API_URL", Some("https://api.internal")),
                ("SANDCASTLE_TEST_MODE", None),
            ],
            || {
                let settings = SandboxSettings::from_config(&config).unwrap();
                assert_eq!(settings.env["API_URL"], "https://api.internal");
                assert_eq!(settings.env["MODE"], "preview");
                assert_eq!(settings.env["LITERAL"], "plain");
            },
        );
    }

    #[test]
    fn missing_host_variable_fails_resolution() {
        let yaml = "env:\n  SECRET:\n    env: SANDCASTLE_TEST_SECRET\n";
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_var_unset("SANDCASTLE_TEST_SECRET", || {
            let err = SandboxSettings::from_config(&config).unwrap_err();
            assert!(matches!(
                err,
                Error::MissingEnvVar { ref key, ref var }
                    if key == "SECRET" && var == "SANDCASTLE_TEST_SECRET"
            ));
        });
    }

    #[test]
    fn settings_carry_allocation_and_readiness() {
        let yaml = "allocation:\n  start: 41000\n  bind_host: 127.0.0.1\nexec_timeout: null\n";
        let settings = SandboxSettings::from_config(&Config::from_yaml(yaml).unwrap()).unwrap();
        assert_eq!(settings.port_search_start, Some(41000));
        assert_eq!(settings.bind_host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(settings.exec_timeout, None);
        assert_eq!(settings.readiness, ReadinessConfig::default());
    }
}
