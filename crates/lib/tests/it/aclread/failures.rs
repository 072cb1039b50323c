//! Fatal errors abort the search that raised them, and only that search.

use std::sync::Arc;

use aclread::aclread::{AclReadError, SearchContext};
use aclread::backend::{BackendError, SearchReply};
use aclread::request::Scope;
use aclread::{Entry, Error};

use crate::helpers::*;

/// Pull every reply until the stream ends, returning the entries seen and
/// the first error.
async fn drain(search: &mut aclread::FilteredSearch) -> (Vec<Entry>, Option<Error>) {
    let mut entries = Vec::new();
    while let Some(reply) = search.next().await {
        match reply {
            Ok(SearchReply::Entry { entry, .. }) => entries.push(entry),
            Ok(SearchReply::Done { .. }) => return (entries, None),
            Ok(SearchReply::Referral(_)) => {}
            Err(e) => {
                assert!(search.next().await.is_none(), "stream continued after error");
                return (entries, Some(e));
            }
        }
    }
    panic!("stream ended without Done or an error");
}

fn entry_without_descriptor() -> Entry {
    let mut bob = user("cn=bob,ou=people,dc=example", 1105);
    bob.remove_attribute("nTSecurityDescriptor");
    bob
}

#[tokio::test]
async fn test_missing_descriptor_aborts_search() {
    let directory = test_directory();
    directory.insert(entry_without_descriptor());
    let fixture = Fixture::with_directory(TableChecker::new(), Default::default(), directory);

    let mut search = fixture
        .acl
        .search(user_search(
            "ou=people,dc=example",
            Scope::OneLevel,
            "(objectClass=*)",
        ))
        .await
        .unwrap();
    let (entries, err) = drain(&mut search).await;

    // alice precedes bob and was already relayed.
    assert_eq!(names(&entries), vec!["cn=alice,ou=people,dc=example"]);
    let err = err.unwrap();
    assert!(err.is_operational());
    assert!(matches!(err, Error::AclRead(AclReadError::Operations)));
}

#[tokio::test]
async fn test_descriptor_errors_are_reported_in_detail() {
    let fixture = Fixture::new(TableChecker::new());
    let filter = fixture.acl.entry_filter();
    let schema = Arc::new(test_schema());
    let request = || user_search("dc=example", Scope::Subtree, "(objectClass=*)");

    let mut ctx = SearchContext::new(request(), schema.clone());
    let err = filter
        .filter(&mut ctx, entry_without_descriptor())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AclRead(AclReadError::MissingDescriptor { .. })
    ));

    let two_values = user("cn=bob,ou=people,dc=example", 1105).with_attribute(
        "nTSecurityDescriptor",
        [descriptor_blob(DOMAIN_ADMINS), descriptor_blob(ALICE_SID)],
    );
    let err = filter.filter(&mut ctx, two_values).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AclRead(AclReadError::MultiValuedDescriptor { count: 2, .. })
    ));

    let garbage = user("cn=bob,ou=people,dc=example", 1105)
        .with_attribute("nTSecurityDescriptor", [b"not json".to_vec()]);
    let err = filter.filter(&mut ctx, garbage).await.unwrap_err();
    match err {
        Error::AclRead(err) => assert!(err.is_descriptor_error()),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_descriptor_leaves_cache_intact() {
    let fixture = Fixture::new(TableChecker::new());
    let filter = fixture.acl.entry_filter();
    let mut ctx = SearchContext::new(
        user_search("dc=example", Scope::Subtree, "(objectClass=*)"),
        Arc::new(test_schema()),
    );

    let alice_entry = user("cn=alice,ou=people,dc=example", 1104);
    filter.filter(&mut ctx, alice_entry.clone()).await.unwrap();
    let garbage = user("cn=bob,ou=people,dc=example", 1105)
        .with_attribute("nTSecurityDescriptor", [b"{".to_vec()]);
    filter.filter(&mut ctx, garbage).await.unwrap_err();
    filter.filter(&mut ctx, alice_entry).await.unwrap();

    assert_eq!(fixture.decoder.calls(), 2);
    assert_eq!(filter.descriptor_cache().hits(), 1);
}

#[tokio::test]
async fn test_schema_misses_are_fatal() {
    let fixture = Fixture::new(TableChecker::new());
    let filter = fixture.acl.entry_filter();
    let mut ctx = SearchContext::new(
        user_search("dc=example", Scope::Subtree, "(objectClass=*)"),
        Arc::new(test_schema()),
    );

    let unknown = user("cn=bob,ou=people,dc=example", 1105).with_attribute("favouriteColour", ["blue"]);
    let err = filter.filter(&mut ctx, unknown).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AclRead(AclReadError::UnknownAttribute { ref attribute, .. }) if attribute == "favouriteColour"
    ));

    let classless = user("cn=bob,ou=people,dc=example", 1105).with_attribute("objectClass", ["top", "unknownClass"]);
    let err = filter.filter(&mut ctx, classless).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AclRead(AclReadError::NoStructuralClass { .. })
    ));
}

#[tokio::test]
async fn test_checker_failure_is_fatal() {
    let fixture = Fixture::new(TableChecker::new().fail_on_attribute("description"));
    let mut search = fixture
        .acl
        .search(user_search(
            "ou=people,dc=example",
            Scope::OneLevel,
            "(objectClass=*)",
        ))
        .await
        .unwrap();

    let (entries, err) = drain(&mut search).await;
    assert!(entries.is_empty());
    assert!(err.unwrap().is_operational());
}

#[tokio::test]
async fn test_parent_check_failure_is_fatal() {
    let fixture = Fixture::new(TableChecker::new().fail_on_dn("ou=people,dc=example"));
    let filter = fixture.acl.entry_filter();
    let mut ctx = SearchContext::new(
        user_search("dc=example", Scope::Subtree, "(objectClass=*)"),
        Arc::new(test_schema()),
    );

    let err = filter
        .filter(&mut ctx, user("cn=alice,ou=people,dc=example", 1104))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AclRead(AclReadError::AccessCheck {
            attribute: None,
            ..
        })
    ));
    // Failures are not cached.
    filter
        .filter(&mut ctx, user("cn=bob,ou=people,dc=example", 1105))
        .await
        .unwrap_err();
    assert_eq!(fixture.checker.dn_checks(), 2);
}

#[tokio::test]
async fn test_base_check_failure_is_operational() {
    let fixture = Fixture::new(TableChecker::new().fail_on_dn("ou=people,dc=example"));
    let err = fixture
        .acl
        .search(user_search(
            "cn=alice,ou=people,dc=example",
            Scope::Base,
            "(objectClass=*)",
        ))
        .await
        .unwrap_err();

    assert!(err.is_operational());
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_backend_error_ends_stream() {
    let (acl, _) = scripted(
        vec![
            entry_reply(user("cn=alice,ou=people,dc=example", 1104)),
            Err(BackendError::Unavailable {
                reason: "disk on fire".to_string(),
            }
            .into()),
            entry_reply(user("cn=bob,ou=people,dc=example", 1105)),
            done(),
        ],
        TableChecker::new(),
    );

    let mut search = acl.search(user_search("", Scope::Subtree, "(objectClass=*)")).await.unwrap();
    let (entries, err) = drain(&mut search).await;

    assert_eq!(entries.len(), 1);
    assert!(matches!(
        err,
        Some(Error::Backend(BackendError::Unavailable { .. }))
    ));
}

#[tokio::test]
async fn test_stream_without_done_is_reported() {
    let (acl, _) = scripted(
        vec![entry_reply(user("cn=alice,ou=people,dc=example", 1104))],
        TableChecker::new(),
    );

    let err = acl
        .search(user_search("", Scope::Subtree, "(objectClass=*)"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend(BackendError::StreamClosed)));
}

#[tokio::test]
async fn test_failed_search_does_not_affect_others() {
    let directory = test_directory();
    directory.insert(entry_without_descriptor());
    let fixture = Fixture::with_directory(TableChecker::new(), Default::default(), directory);

    let failing = fixture
        .acl
        .search(user_search(
            "ou=people,dc=example",
            Scope::OneLevel,
            "(objectClass=*)",
        ))
        .await
        .unwrap();
    let healthy = fixture
        .acl
        .search(user_search(
            "ou=hidden,dc=example",
            Scope::OneLevel,
            "(objectClass=*)",
        ))
        .await
        .unwrap();

    assert!(failing.collect().await.is_err());
    let result = healthy.collect().await.unwrap();
    assert_eq!(names(&result.entries), vec!["cn=dave,ou=hidden,dc=example"]);
}
