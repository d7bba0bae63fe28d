use std::io::Write;

use lodge::config::{AuthMode, Config, SessionBackend};

#[test]
fn test_config_defaults() {
    let cfg = Config::resolve(None, None).unwrap();

    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.session.backend, SessionBackend::Memory);
    assert_eq!(cfg.session.timeout_secs, 120);
    assert_eq!(cfg.auth.mode, AuthMode::Flag);
    assert_eq!(cfg.auth.username, "admin");
    assert_eq!(cfg.auth.password, "password");
}

#[test]
fn test_config_listen_override() {
    let cfg = Config::resolve(None, Some("0.0.0.0:3000".to_string())).unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
}

#[test]
fn test_config_custom_address_from_env() {
    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:5000");
    }
    let cfg = Config::load().unwrap();
    assert!(cfg.server.listen_addr.starts_with("0.0.0.0"));
    unsafe {
        std::env::remove_var("LISTEN");
    }
}

#[test]
fn test_config_partial_yaml_keeps_defaults() {
    let cfg = Config::from_yaml(
        "session:\n  backend: durable\n  timeout_secs: 30\nauth:\n  mode: session\n",
    )
    .unwrap();

    assert_eq!(cfg.session.backend, SessionBackend::Durable);
    assert_eq!(cfg.session.timeout_secs, 30);
    assert_eq!(cfg.session.sweep_interval_secs, 60);
    assert_eq!(cfg.auth.mode, AuthMode::Session);
    assert_eq!(cfg.auth.username, "admin");
    assert_eq!(cfg.server.max_header_bytes, 64 * 1024);
}

#[test]
fn test_config_rejects_unknown_backend() {
    assert!(Config::from_yaml("session:\n  backend: redis\n").is_err());
}

#[test]
fn test_config_from_file_then_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  listen_addr: 10.0.0.1:80\ncontent:\n  base_dir: /srv/site").unwrap();

    let from_file = Config::resolve(Some(file.path()), None).unwrap();
    assert_eq!(from_file.server.listen_addr, "10.0.0.1:80");
    assert_eq!(from_file.content.base_dir.to_str(), Some("/srv/site"));

    let overridden = Config::resolve(Some(file.path()), Some("127.0.0.1:9".to_string())).unwrap();
    assert_eq!(overridden.server.listen_addr, "127.0.0.1:9");
}

#[test]
fn test_config_missing_file_is_an_error() {
    assert!(Config::resolve(Some(std::path::Path::new("/nonexistent/lodge.yaml")), None).is_err());
}
