//! Reply relaying and concurrent use of one module.

use std::sync::Arc;

use aclread::Entry;
use aclread::backend::{Backend, SearchReply};
use aclread::entry::Value;
use aclread::request::{Control, Scope};

use crate::helpers::*;

fn paging_control() -> Control {
    Control::Other {
        oid: "1.2.840.113556.1.4.319".to_string(),
        critical: false,
        value: Some(Value::new(vec![0x30, 0x00])),
    }
}

/// alice as a backend returns her for `cn` and `mail` plus the bookkeeping
/// attributes.
fn projected_alice() -> Entry {
    let full = user("cn=alice,ou=people,dc=example", 1104);
    let wanted = [
        "objectClass",
        "cn",
        "mail",
        "instanceType",
        "objectSid",
        "nTSecurityDescriptor",
    ];
    let attributes = full
        .attributes()
        .iter()
        .filter(|a| wanted.iter().any(|w| a.is_named(w)))
        .cloned()
        .collect();
    Entry::from_parts(full.dn().clone(), attributes)
}

#[tokio::test]
async fn test_referrals_controls_and_done_pass_through() {
    let (acl, backend) = scripted(
        vec![
            Ok(SearchReply::Entry {
                entry: projected_alice(),
                controls: vec![paging_control()],
            }),
            Ok(SearchReply::Referral(
                "ldap://branch.example/ou=branch,dc=example".to_string(),
            )),
            Ok(SearchReply::Done {
                controls: vec![paging_control()],
            }),
        ],
        TableChecker::new().deny_read("mail"),
    );

    let mut search = acl
        .search(user_search("", Scope::Subtree, "(objectClass=*)").with_attributes(["cn", "mail"]))
        .await
        .unwrap();

    match search.next().await.unwrap().unwrap() {
        SearchReply::Entry { entry, controls } => {
            assert_eq!(entry.attribute_names(), vec!["cn"]);
            assert_eq!(controls, vec![paging_control()]);
        }
        other => panic!("expected an entry, got {other:?}"),
    }
    assert_eq!(
        search.next().await.unwrap().unwrap(),
        SearchReply::Referral("ldap://branch.example/ou=branch,dc=example".to_string())
    );
    assert_eq!(
        search.next().await.unwrap().unwrap(),
        SearchReply::Done {
            controls: vec![paging_control()]
        }
    );
    assert!(search.next().await.is_none());

    // The backend saw the augmented list with the caller's filter and controls.
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].attributes,
        vec![
            "cn",
            "mail",
            "instanceType",
            "objectSid",
            "objectClass",
            "nTSecurityDescriptor",
        ]
    );
    assert_eq!(requests[0].filter.to_string(), "(objectClass=*)");
}

#[tokio::test]
async fn test_module_is_a_backend() {
    let fixture = Fixture::new(TableChecker::new().deny_read("mail"));
    let backend: Arc<dyn Backend> = Arc::new(fixture.acl);

    let result = backend
        .search(user_search("ou=people,dc=example", Scope::OneLevel, "(cn=*)"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(result.entries.len(), 3);
    assert!(result.entries.iter().all(|e| !e.has_attribute("mail")));
}

#[tokio::test]
async fn test_module_as_backend_reports_hidden_base() {
    let fixture = Fixture::new(TableChecker::new().hide_children_of("ou=hidden,dc=example"));
    let backend: Arc<dyn Backend> = Arc::new(fixture.acl);

    let err = backend
        .search(user_search(
            "cn=dave,ou=hidden,dc=example",
            Scope::Base,
            "(objectClass=*)",
        ))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_share_module() {
    let fixture = Fixture::new(
        TableChecker::new()
            .deny_read("mail")
            .hide_children_of("ou=hidden,dc=example"),
    );
    let acl = Arc::new(fixture.acl);

    // Warm the descriptor cache so concurrent misses cannot race.
    acl.search(user_search("dc=example", Scope::Base, "(objectClass=*)"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let acl = acl.clone();
        handles.push(tokio::spawn(async move {
            let request = if i % 2 == 0 {
                user_search("dc=example", Scope::Subtree, "(objectClass=*)")
            } else {
                user_search("ou=people,dc=example", Scope::OneLevel, "(cn=*)").dirsync()
            };
            acl.search(request).await.unwrap().collect().await.unwrap()
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        let expected = if i % 2 == 0 { 6 } else { 3 };
        assert_eq!(result.entries.len(), expected);
        assert!(result.entries.iter().all(|e| !e.has_attribute("mail")));
    }
    assert_eq!(fixture.decoder.calls(), 1);
}

#[tokio::test]
async fn test_dropping_stream_stops_filtering() {
    let fixture = Fixture::new(TableChecker::new());
    let mut stream = fixture
        .acl
        .search(user_search("dc=example", Scope::Subtree, "(objectClass=*)"))
        .await
        .unwrap()
        .into_stream();

    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, SearchReply::Entry { .. }));
    drop(stream);

    // The module stays usable after a consumer walks away.
    let result = fixture
        .acl
        .search(user_search("ou=people,dc=example", Scope::OneLevel, "(objectClass=*)"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(result.entries.len(), 3);
}
