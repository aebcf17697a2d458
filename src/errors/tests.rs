use super::*;

#[test]
fn test_config_errors_are_fatal() {
    assert!(RelayError::Config("PGHOST missing".into()).is_fatal());
}

#[test]
fn test_runtime_errors_are_not_fatal() {
    assert!(!RelayError::Auth("bad signature".into()).is_fatal());
    assert!(!RelayError::ProfileLookup("404".into()).is_fatal());
    assert!(!RelayError::Upload("network".into()).is_fatal());
    assert!(!RelayError::Persistence("connrefused".into()).is_fatal());
    assert!(!RelayError::CommandParse("格式不正確".into()).is_fatal());
}

#[test]
fn test_command_parse_carries_user_reply() {
    let err = RelayError::CommandParse("日期格式不正確，請使用 YYYY-MM-DD 格式".into());
    assert_eq!(
        err.user_reply(),
        Some("日期格式不正確，請使用 YYYY-MM-DD 格式")
    );
    assert_eq!(RelayError::Upload("x".into()).user_reply(), None);
}

#[test]
fn test_anyhow_converts_via_internal() {
    fn inner() -> Result<(), RelayError> {
        Err(anyhow::anyhow!("leaf failure"))?;
        Ok(())
    }
    let err = inner().unwrap_err();
    assert!(matches!(err, RelayError::Internal(_)));
}
