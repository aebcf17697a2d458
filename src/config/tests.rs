use super::*;
use std::sync::Mutex;

// Process environment is global — serialize the tests that touch it.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const REQUIRED: &[(&str, &str)] = &[
    ("LINE_CHANNEL_SECRET", "secret"),
    ("LINE_CHANNEL_ACCESS_TOKEN", "token"),
    ("PGHOST", "localhost"),
    ("PGPORT", "5432"),
    ("PGDATABASE", "linedrop"),
    ("PGUSER", "relay"),
    ("PGPASSWORD", "hunter2"),
    ("GOOGLE_DRIVE_FOLDER_ID", "root-folder"),
    ("GOOGLE_CREDENTIALS_JSON", "{\"token\": \"t\"}"),
    ("PORT", "8080"),
];

fn set_required_vars() {
    for (name, value) in REQUIRED {
        unsafe { env::set_var(name, value) };
    }
}

fn clear_optional_vars() {
    for name in ["HOST", "OUTPUT_DIR", "USER_MAPPING_JSON", "PERSIST_ALBUMS"] {
        unsafe { env::remove_var(name) };
    }
}

#[test]
fn test_from_env_happy_path_with_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    set_required_vars();
    clear_optional_vars();

    let config = Config::from_env().unwrap();
    assert_eq!(config.line.channel_secret, "secret");
    assert_eq!(config.database.port, 5432);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.output_dir, PathBuf::from("./output"));
    assert!(config.user_mapping.is_empty());
    assert!(!config.persist_albums);
}

#[test]
fn test_from_env_parses_optional_vars() {
    let _guard = ENV_LOCK.lock().unwrap();
    set_required_vars();
    clear_optional_vars();
    unsafe {
        env::set_var("USER_MAPPING_JSON", r#"{"U_alice": "小美"}"#);
        env::set_var("PERSIST_ALBUMS", "true");
        env::set_var("OUTPUT_DIR", "/var/lib/linedrop");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.user_mapping.get("U_alice").map(String::as_str), Some("小美"));
    assert!(config.persist_albums);
    assert_eq!(config.output_dir, PathBuf::from("/var/lib/linedrop"));
    clear_optional_vars();
}

#[test]
fn test_missing_required_var_is_config_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    set_required_vars();
    clear_optional_vars();
    unsafe { env::remove_var("LINE_CHANNEL_SECRET") };

    let err = Config::from_env().unwrap_err();
    assert!(err.is_fatal());
    assert!(
        err.to_string().contains("LINE_CHANNEL_SECRET"),
        "error names the missing variable: {}",
        err
    );
}

#[test]
fn test_bad_user_mapping_is_config_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    set_required_vars();
    clear_optional_vars();
    unsafe { env::set_var("USER_MAPPING_JSON", "not json") };

    assert!(Config::from_env().is_err());
    clear_optional_vars();
}

#[test]
fn test_debug_redacts_secrets() {
    let line = LineConfig {
        channel_secret: "s3cret".into(),
        access_token: "t0ken".into(),
    };
    let rendered = format!("{:?}", line);
    assert!(!rendered.contains("s3cret"));
    assert!(!rendered.contains("t0ken"));
    assert!(rendered.contains("[REDACTED]"));

    let db = DatabaseConfig {
        host: "db.internal".into(),
        port: 5432,
        name: "linedrop".into(),
        user: "relay".into(),
        password: "hunter2".into(),
    };
    let rendered = format!("{:?}", db);
    assert!(rendered.contains("db.internal"));
    assert!(!rendered.contains("hunter2"));
}
