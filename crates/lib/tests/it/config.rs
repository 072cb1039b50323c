use std::io::Write;

use aclread::AclReadConfig;
use aclread::request::Scope;

use crate::helpers::*;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"enabled": false}}"#).unwrap();

    let config = AclReadConfig::load_from_file(file.path()).unwrap();
    assert!(!config.enabled);
}

#[test]
fn test_load_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = AclReadConfig::load_from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(err.module(), "config");
}

#[tokio::test]
async fn test_file_config_drives_module() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{}}").unwrap();
    let config = AclReadConfig::load_from_file(file.path()).unwrap();

    let fixture = Fixture::with_config(TableChecker::new().deny_read("cn"), config);
    let result = fixture
        .acl
        .search(
            user_search(
                "cn=alice,ou=people,dc=example",
                Scope::Base,
                "(objectClass=*)",
            )
            .with_attributes(["cn"]),
        )
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    // Missing keys keep the default, which filters.
    assert!(result.entries[0].is_empty());
}
