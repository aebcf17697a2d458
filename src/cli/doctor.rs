//! Connectivity checks for the external collaborators: configuration,
//! local output tree, Postgres and Google Drive. The database check is a
//! full insert/update/delete round-trip through the store's maintenance
//! operations, so a misconfigured grant shows up here instead of as
//! silent write failures at runtime.

use crate::config::Config;
use crate::drive::DriveStore;
use crate::drive::auth::DriveCredentials;
use crate::persist::{MessageStore, PgMessageStore};
use anyhow::Result;
use chrono::Local;

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

impl CheckResult {
    fn label(&self) -> &'static str {
        match self {
            Self::Pass(_) => "PASS",
            Self::Fail(_) => "FAIL",
            Self::Skip(_) => "SKIP",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Self::Pass(s) | Self::Fail(s) | Self::Skip(s) => s,
        }
    }

    fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }
}

fn print_check(name: &str, result: &CheckResult) {
    println!("  {:<6} {:<24} {}", result.label(), name, result.detail());
}

fn check_config() -> (CheckResult, Option<Config>) {
    match Config::from_env() {
        Ok(config) => (CheckResult::Pass("all required variables set".into()), Some(config)),
        Err(e) => (CheckResult::Fail(e.to_string()), None),
    }
}

fn check_output_dir(config: Option<&Config>) -> CheckResult {
    let Some(config) = config else {
        return CheckResult::Skip("config not available".into());
    };
    match std::fs::create_dir_all(&config.output_dir) {
        Ok(()) => {
            let probe = config.output_dir.join(".doctor_test");
            match std::fs::write(&probe, "test") {
                Ok(()) => {
                    let _ = std::fs::remove_file(&probe);
                    CheckResult::Pass(format!("{} (writable)", config.output_dir.display()))
                }
                Err(e) => CheckResult::Fail(format!(
                    "{} (not writable: {})",
                    config.output_dir.display(),
                    e
                )),
            }
        }
        Err(e) => CheckResult::Fail(format!("{}: {}", config.output_dir.display(), e)),
    }
}

/// Insert a probe row, read it back, rewrite it, delete it.
async fn check_database(config: Option<&Config>) -> CheckResult {
    let Some(config) = config else {
        return CheckResult::Skip("config not available".into());
    };
    let store = PgMessageStore::new(&config.database);

    if let Err(e) = store.init_schema().await {
        return CheckResult::Fail(e.to_string());
    }
    let id = match store
        .insert(Local::now(), "doctor", "Doctor", "connectivity probe")
        .await
    {
        Ok(id) => id,
        Err(e) => return CheckResult::Fail(format!("insert: {}", e)),
    };
    if let Err(e) = store.update_text(id, "connectivity probe (updated)").await {
        return CheckResult::Fail(format!("update: {}", e));
    }
    let seen = match store.fetch_recent(10).await {
        Ok(rows) => rows.iter().any(|r| r.id == id),
        Err(e) => return CheckResult::Fail(format!("select: {}", e)),
    };
    if let Err(e) = store.delete(id).await {
        return CheckResult::Fail(format!("delete: {}", e));
    }
    if seen {
        CheckResult::Pass(format!("insert/update/select/delete ok (probe id {})", id))
    } else {
        CheckResult::Fail("probe row not visible in recent messages".into())
    }
}

async fn check_drive(config: Option<&Config>) -> CheckResult {
    let Some(config) = config else {
        return CheckResult::Skip("config not available".into());
    };
    let credentials = match DriveCredentials::from_json(&config.drive.credentials_json) {
        Ok(c) => c,
        Err(e) => return CheckResult::Fail(e.to_string()),
    };
    let store = DriveStore::new(credentials, &config.drive.root_folder_id);
    match store.root_folder_name().await {
        Ok(name) => CheckResult::Pass(format!("root folder '{}' reachable", name)),
        Err(e) => CheckResult::Fail(e.to_string()),
    }
}

pub async fn run() -> Result<()> {
    println!("linedrop doctor");
    println!();

    let (config_result, config) = check_config();
    print_check("configuration", &config_result);
    let output_result = check_output_dir(config.as_ref());
    print_check("output directory", &output_result);
    let db_result = check_database(config.as_ref()).await;
    print_check("postgres", &db_result);
    let drive_result = check_drive(config.as_ref()).await;
    print_check("google drive", &drive_result);

    println!();
    let failed = [&config_result, &output_result, &db_result, &drive_result]
        .iter()
        .filter(|r| r.is_fail())
        .count();
    if failed == 0 {
        println!("All checks passed.");
        Ok(())
    } else {
        println!("{} check(s) failed.", failed);
        std::process::exit(1);
    }
}
