//! Searches that are forwarded without filtering.

use std::sync::Arc;

use aclread::AclReadConfig;
use aclread::request::{Control, Principal, Scope, SearchRequest};

use crate::helpers::*;

fn restricted() -> TableChecker {
    TableChecker::new()
        .deny_read("cn")
        .hide_children_of("ou=hidden,dc=example")
}

async fn assert_unfiltered(fixture: &Fixture, request: SearchRequest) {
    let search = fixture.acl.search(request).await.unwrap();
    assert!(!search.is_filtered());
    let result = search.collect().await.unwrap();

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].attribute_names(), vec!["cn"]);
    assert_eq!(fixture.checker.attribute_checks(), 0);
    assert_eq!(fixture.checker.dn_checks(), 0);
}

fn dave_cn() -> SearchRequest {
    user_search(
        "cn=dave,ou=hidden,dc=example",
        Scope::Base,
        "(objectClass=*)",
    )
    .with_attributes(["cn"])
}

#[tokio::test]
async fn test_disabled_module_passes_through() {
    let fixture = Fixture::with_config(restricted(), AclReadConfig::disabled());
    assert!(!fixture.acl.config().enabled);
    assert_unfiltered(&fixture, dave_cn()).await;
}

#[tokio::test]
async fn test_system_principal_passes_through() {
    let fixture = Fixture::new(restricted());
    let request = dave_cn().with_principal(Arc::new(Principal::system()));
    assert_unfiltered(&fixture, request).await;
}

#[tokio::test]
async fn test_as_system_control_passes_through() {
    let fixture = Fixture::new(restricted());
    assert_unfiltered(&fixture, dave_cn().with_control(Control::AsSystem)).await;
}

#[tokio::test]
async fn test_trusted_request_passes_through() {
    let fixture = Fixture::new(restricted());
    let mut request = dave_cn();
    request.flags.untrusted = false;
    assert_unfiltered(&fixture, request).await;
}

#[tokio::test]
async fn test_special_base_passes_through() {
    let directory = test_directory();
    directory.insert(
        aclread::Entry::new(dn("@ATTRIBUTES"))
            .with_attribute("cn", ["attributes"])
            .with_attribute("objectClass", ["top"]),
    );
    let fixture = Fixture::with_directory(restricted(), AclReadConfig::default(), directory);
    let request = user_search("@ATTRIBUTES", Scope::Base, "(objectClass=*)").with_attributes(["cn"]);
    assert_unfiltered(&fixture, request).await;
}

#[tokio::test]
async fn test_untrusted_user_is_filtered() {
    let fixture = Fixture::new(restricted());
    let request = user_search(
        "cn=alice,ou=people,dc=example",
        Scope::Base,
        "(objectClass=*)",
    )
    .with_attributes(["cn"]);

    let search = fixture.acl.search(request).await.unwrap();
    assert!(search.is_filtered());
    let result = search.collect().await.unwrap();
    assert!(result.entries[0].is_empty());
    assert_eq!(fixture.checker.attribute_checks(), 1);
}

#[tokio::test]
async fn test_config_from_json_disables_filtering() {
    let config = AclReadConfig::from_json(r#"{"enabled": false}"#).unwrap();
    let fixture = Fixture::with_config(restricted(), config);
    assert_unfiltered(&fixture, dave_cn()).await;
}
