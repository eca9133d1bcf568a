use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use tempfile::TempDir;

const ALL_VARS: &[&str] = &[
    "LUMEN_PORT",
    "LUMEN_BIND_ADDR",
    "LUMEN_STORAGE_PATH",
    "LUMEN_BACKEND",
    "LUMEN_DATABASE_URL",
    "LUMEN_EMBEDDING_URL",
    "LUMEN_EMBEDDING_API_KEY",
    "LUMEN_EMBEDDING_MODEL",
    "LUMEN_EMBEDDING_DIM",
    "LUMEN_EMBEDDING_TIMEOUT_MS",
    "LUMEN_UPSTREAM_MODEL",
    "LUMEN_UPSTREAM_TIMEOUT_SECS",
    "LUMEN_MOCK_PROVIDER",
    "LUMEN_SIMILARITY_THRESHOLD",
    "LUMEN_SEARCH_LIMIT",
    "LUMEN_CANDIDATE_WINDOW",
    "LUMEN_INITIAL_CONFIDENCE",
    "LUMEN_MIN_CONFIDENCE",
    "LUMEN_DAYS_UNUSED",
    "LUMEN_MAINTENANCE_INTERVAL_SECS",
    "LUMEN_MAINTENANCE_ENABLED",
    "LUMEN_AVG_TOKENS_PER_CALL",
    "LUMEN_COST_PER_1K_TOKENS",
    "LUMEN_MEMO_CAPACITY",
    "LUMEN_REQUEST_TIMEOUT_SECS",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    clear_lumen_env();
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    clear_lumen_env();
    result
}

fn clear_lumen_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in ALL_VARS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert_eq!(config.storage_path, PathBuf::from("./.data"));
    assert_eq!(config.backend, BackendKind::Memory);
    assert_eq!(config.similarity_threshold, 0.85);
    assert_eq!(config.search_limit, 3);
    assert_eq!(config.candidate_window, 50);
    assert_eq!(config.initial_confidence, 0.8);
    assert_eq!(config.min_confidence, 0.3);
    assert_eq!(config.days_unused, 90);
    assert_eq!(config.avg_tokens_per_call, 2000);
    assert_eq!(config.cost_per_1k_tokens, 0.01);
    assert!(!config.mock_provider);
    assert!(config.embedding_dim.is_none());
}

#[test]
fn test_socket_addr() {
    let config = Config::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");

    let config = Config {
        port: 3000,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    let config = with_env_vars(&[], || Config::from_env().expect("should parse with defaults"));

    assert_eq!(config.port, 8080);
    assert_eq!(config.backend, BackendKind::Memory);
    assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
}

#[test]
#[serial]
fn test_from_env_custom_port() {
    let config = with_env_vars(&[("LUMEN_PORT", "9090")], || Config::from_env().unwrap());
    assert_eq!(config.port, 9090);
}

#[test]
#[serial]
fn test_from_env_ipv6_bind_addr() {
    let config = with_env_vars(&[("LUMEN_BIND_ADDR", "::1")], || Config::from_env().unwrap());
    assert_eq!(config.bind_addr, "::1".parse::<IpAddr>().unwrap());
}

#[test]
#[serial]
fn test_invalid_port_zero() {
    let err = with_env_vars(&[("LUMEN_PORT", "0")], || Config::from_env().unwrap_err());
    assert!(matches!(err, ConfigError::InvalidPort { .. }));
}

#[test]
#[serial]
fn test_invalid_port_not_number() {
    let err = with_env_vars(&[("LUMEN_PORT", "http")], || Config::from_env().unwrap_err());
    assert!(matches!(err, ConfigError::PortParseError { .. }));
}

#[test]
#[serial]
fn test_invalid_bind_addr() {
    let err = with_env_vars(&[("LUMEN_BIND_ADDR", "not-an-ip")], || {
        Config::from_env().unwrap_err()
    });
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
}

#[test]
#[serial]
fn test_full_config_parse() {
    let config = with_env_vars(
        &[
            ("LUMEN_PORT", "7000"),
            ("LUMEN_BIND_ADDR", "0.0.0.0"),
            ("LUMEN_STORAGE_PATH", "/var/lib/lumen"),
            ("LUMEN_BACKEND", "SQLite"),
            ("LUMEN_EMBEDDING_URL", "http://embed.local:8000"),
            ("LUMEN_EMBEDDING_API_KEY", "secret"),
            ("LUMEN_EMBEDDING_MODEL", "bge-small"),
            ("LUMEN_EMBEDDING_DIM", "384"),
            ("LUMEN_EMBEDDING_TIMEOUT_MS", "2500"),
            ("LUMEN_UPSTREAM_MODEL", "claude-3-haiku"),
            ("LUMEN_UPSTREAM_TIMEOUT_SECS", "30"),
            ("LUMEN_MOCK_PROVIDER", "true"),
            ("LUMEN_SIMILARITY_THRESHOLD", "0.9"),
            ("LUMEN_SEARCH_LIMIT", "5"),
            ("LUMEN_CANDIDATE_WINDOW", "200"),
            ("LUMEN_INITIAL_CONFIDENCE", "0.7"),
            ("LUMEN_MIN_CONFIDENCE", "0.25"),
            ("LUMEN_DAYS_UNUSED", "30"),
            ("LUMEN_MAINTENANCE_INTERVAL_SECS", "600"),
            ("LUMEN_MAINTENANCE_ENABLED", "off"),
            ("LUMEN_AVG_TOKENS_PER_CALL", "1500"),
            ("LUMEN_COST_PER_1K_TOKENS", "0.002"),
            ("LUMEN_MEMO_CAPACITY", "500"),
            ("LUMEN_REQUEST_TIMEOUT_SECS", "15"),
        ],
        || Config::from_env().unwrap(),
    );

    assert_eq!(config.port, 7000);
    assert_eq!(config.storage_path, PathBuf::from("/var/lib/lumen"));
    assert_eq!(config.backend, BackendKind::Sqlite);
    assert_eq!(config.database_url(), "sqlite:///var/lib/lumen/knowledge.db");
    assert_eq!(config.embedding_url, "http://embed.local:8000");
    assert_eq!(config.embedding_api_key.as_deref(), Some("secret"));
    assert_eq!(config.embedding_model, "bge-small");
    assert_eq!(config.embedding_dim, Some(384));
    assert_eq!(config.embedding_timeout, Duration::from_millis(2500));
    assert_eq!(config.upstream_model, "claude-3-haiku");
    assert_eq!(config.upstream_timeout, Duration::from_secs(30));
    assert!(config.mock_provider);
    assert_eq!(config.similarity_threshold, 0.9);
    assert_eq!(config.search_limit, 5);
    assert_eq!(config.candidate_window, 200);
    assert_eq!(config.initial_confidence, 0.7);
    assert_eq!(config.min_confidence, 0.25);
    assert_eq!(config.days_unused, 30);
    assert_eq!(config.maintenance_interval, Duration::from_secs(600));
    assert!(!config.maintenance_enabled);
    assert_eq!(config.avg_tokens_per_call, 1500);
    assert_eq!(config.cost_per_1k_tokens, 0.002);
    assert_eq!(config.memo_capacity, 500);
    assert_eq!(config.request_timeout, Duration::from_secs(15));
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_unknown_backend() {
    let err = with_env_vars(&[("LUMEN_BACKEND", "postgres")], || {
        Config::from_env().unwrap_err()
    });
    assert!(matches!(err, ConfigError::UnknownBackend { .. }));
}

#[test]
#[serial]
fn test_unparseable_number_is_an_error() {
    let err = with_env_vars(&[("LUMEN_SIMILARITY_THRESHOLD", "high")], || {
        Config::from_env().unwrap_err()
    });
    match err {
        ConfigError::InvalidValue { name, value, .. } => {
            assert_eq!(name, "LUMEN_SIMILARITY_THRESHOLD");
            assert_eq!(value, "high");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
#[serial]
fn test_blank_values_fall_back_to_defaults() {
    let config = with_env_vars(
        &[("LUMEN_SEARCH_LIMIT", "  "), ("LUMEN_EMBEDDING_DIM", "")],
        || Config::from_env().unwrap(),
    );
    assert_eq!(config.search_limit, DEFAULT_SEARCH_LIMIT);
    assert!(config.embedding_dim.is_none());
}

#[test]
fn test_validate_ranges() {
    let cases = [
        Config {
            similarity_threshold: 1.5,
            ..Default::default()
        },
        Config {
            initial_confidence: 1.1,
            ..Default::default()
        },
        Config {
            min_confidence: -0.5,
            ..Default::default()
        },
        Config {
            search_limit: 0,
            ..Default::default()
        },
        Config {
            candidate_window: 0,
            ..Default::default()
        },
        Config {
            embedding_dim: Some(0),
            ..Default::default()
        },
        Config {
            memo_capacity: 0,
            ..Default::default()
        },
        Config {
            cost_per_1k_tokens: f64::NAN,
            ..Default::default()
        },
        Config {
            request_timeout: Duration::ZERO,
            ..Default::default()
        },
        Config {
            maintenance_interval: Duration::ZERO,
            ..Default::default()
        },
    ];

    for config in cases {
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }), "{err}");
    }

    let disabled = Config {
        maintenance_interval: Duration::ZERO,
        maintenance_enabled: false,
        ..Default::default()
    };
    assert!(disabled.validate().is_ok());
}

#[test]
fn test_validate_storage_path_is_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"x").unwrap();

    let config = Config {
        storage_path: file,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NotADirectory { .. })
    ));
}

#[test]
fn test_validate_success_with_defaults() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_explicit_database_url_wins() {
    let config = Config {
        database_url: Some("sqlite::memory:".to_string()),
        ..Default::default()
    };
    assert_eq!(config.database_url(), "sqlite::memory:");
}

#[test]
fn test_component_configs() {
    let config = Config {
        embedding_dim: Some(384),
        candidate_window: 10,
        similarity_threshold: 0.9,
        min_confidence: 0.4,
        maintenance_enabled: false,
        ..Default::default()
    };

    let store = config.store_config();
    assert_eq!(store.embedding_dim, Some(384));
    assert_eq!(store.candidate_window, 10);

    let responder = config.responder_config();
    assert_eq!(responder.similarity_threshold, 0.9);
    assert_eq!(responder.maintenance.min_confidence, 0.4);
    assert!(responder.validate().is_ok());

    assert!(!config.maintenance_config().enabled);

    let http = config.http_embedder_config();
    assert_eq!(http.dimensions, Some(384));
    assert!(http.validate().is_ok());

    assert!(
        config
            .snapshot_file()
            .path()
            .starts_with(&config.storage_path)
    );
}

#[test]
fn test_error_messages_are_descriptive() {
    let err = ConfigError::OutOfRange {
        name: "LUMEN_SEARCH_LIMIT",
        value: "0".to_string(),
        expected: "> 0",
    };
    let msg = err.to_string();
    assert!(msg.contains("LUMEN_SEARCH_LIMIT"));
    assert!(msg.contains("> 0"));

    let err = ConfigError::UnknownBackend {
        value: "redis".to_string(),
    };
    assert!(err.to_string().contains("redis"));
}
