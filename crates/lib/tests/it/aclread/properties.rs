//! Invariants of the filter that hold for every search.

use std::sync::Arc;

use aclread::aclread::{FilterOutcome, SearchContext, Suppression};
use aclread::backend::{Backend, SearchReply};
use aclread::request::{Principal, Scope};
use aclread::security::AccessMask;

use crate::helpers::*;

const BOOKKEEPING: [&str; 4] = [
    "instanceType",
    "objectSid",
    "objectClass",
    "nTSecurityDescriptor",
];

#[tokio::test]
async fn test_synthetic_attributes_never_leak() {
    for checker in [
        TableChecker::new(),
        TableChecker::new().deny_read("objectSid").deny_read("cn"),
        TableChecker::new().deny("nTSecurityDescriptor", AccessMask::READ_CONTROL),
    ] {
        let fixture = Fixture::new(checker);
        for dirsync in [false, true] {
            let mut request = user_search("dc=example", Scope::Subtree, "(objectClass=user)")
                .with_attributes(["cn", "mail"]);
            if dirsync {
                request = request.dirsync();
            }

            let result = fixture.acl.search(request).await.unwrap().collect().await.unwrap();

            assert_eq!(result.entries.len(), 4);
            for entry in &result.entries {
                for name in BOOKKEEPING {
                    assert!(
                        !entry.has_attribute(name),
                        "{name} leaked on {}",
                        entry.dn()
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn test_requested_bookkeeping_attribute_is_returned() {
    let fixture = Fixture::new(TableChecker::new());
    let request = user_search(
        "cn=alice,ou=people,dc=example",
        Scope::Base,
        "(objectClass=*)",
    )
    .with_attributes(["cn", "objectSid"]);

    let result = fixture.acl.search(request).await.unwrap().collect().await.unwrap();

    assert_eq!(result.entries[0].attribute_names(), vec!["cn", "objectSid"]);
}

#[tokio::test]
async fn test_siblings_share_one_parent_check() {
    let fixture = Fixture::new(TableChecker::new());
    let request = user_search("ou=people,dc=example", Scope::OneLevel, "(objectClass=*)");

    let mut search = fixture.acl.search(request).await.unwrap();
    // The base check asked about dc=example.
    assert_eq!(fixture.checker.dn_checks(), 1);

    let mut emitted = 0;
    while let Some(reply) = search.next().await {
        match reply.unwrap() {
            SearchReply::Entry { .. } => emitted += 1,
            SearchReply::Done { .. } => break,
            SearchReply::Referral(_) => {}
        }
    }

    assert_eq!(emitted, 3);
    assert_eq!(fixture.checker.dn_checks(), 2);
    assert_eq!(search.context().unwrap().parent_cache().hits(), 2);
}

#[tokio::test]
async fn test_identical_descriptors_decode_once() {
    let fixture = Fixture::new(TableChecker::new());
    let request = user_search("dc=example", Scope::Subtree, "(objectClass=*)");

    let result = fixture.acl.search(request).await.unwrap().collect().await.unwrap();
    assert_eq!(result.entries.len(), 7);
    assert_eq!(fixture.decoder.calls(), 1);

    // The cache belongs to the module and outlives the search.
    let request = user_search("ou=people,dc=example", Scope::OneLevel, "(objectClass=*)");
    fixture.acl.search(request).await.unwrap().collect().await.unwrap();
    assert_eq!(fixture.decoder.calls(), 1);
    assert_eq!(fixture.acl.descriptor_cache().misses(), 1);
}

#[tokio::test]
async fn test_changed_descriptor_bytes_are_decoded() {
    let directory = test_directory();
    let mut bob = directory.get(&dn("cn=bob,ou=people,dc=example")).unwrap();
    bob.set("nTSecurityDescriptor", [descriptor_blob(ALICE_SID)]);
    directory.insert(bob);
    let fixture = Fixture::with_directory(TableChecker::new(), Default::default(), directory);

    let request = user_search("ou=people,dc=example", Scope::OneLevel, "(objectClass=*)");
    let result = fixture.acl.search(request).await.unwrap().collect().await.unwrap();

    // alice, bob, carol alternate between two blobs.
    assert_eq!(result.entries.len(), 3);
    assert_eq!(fixture.decoder.calls(), 3);
}

#[tokio::test]
async fn test_filtering_is_idempotent() {
    let fixture = Fixture::new(TableChecker::new().deny_read("mail").deny_read("sn"));
    let schema = Arc::new(test_schema());
    let alice_entry = fixture
        .directory
        .get(&dn("cn=alice,ou=people,dc=example"))
        .unwrap();
    let filter = fixture.acl.entry_filter();

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let request = user_search("ou=people,dc=example", Scope::OneLevel, "(cn=*)");
        let mut ctx = SearchContext::new(request, schema.clone());
        outputs.push(filter.filter(&mut ctx, alice_entry.clone()).await.unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
    let entry = outputs.remove(0).into_entry().unwrap();
    assert!(!entry.has_attribute("mail"));
    assert!(!entry.has_attribute("sn"));
}

#[tokio::test]
async fn test_suppression_reasons_are_distinct() {
    let fixture = Fixture::new(
        TableChecker::new()
            .hide_children_of("ou=hidden,dc=example")
            .deny_read("mail"),
    );
    let schema = Arc::new(test_schema());
    let filter = fixture.acl.entry_filter();

    let dave = fixture
        .directory
        .get(&dn("cn=dave,ou=hidden,dc=example"))
        .unwrap();
    let request = user_search("dc=example", Scope::Subtree, "(mail=*)");
    let mut ctx = SearchContext::new(request, schema.clone());
    assert_eq!(
        filter.filter(&mut ctx, dave).await.unwrap(),
        FilterOutcome::Suppressed(Suppression::ParentNotVisible)
    );

    let alice_entry = fixture
        .directory
        .get(&dn("cn=alice,ou=people,dc=example"))
        .unwrap();
    let request = user_search("dc=example", Scope::Subtree, "(mail=*)");
    let mut ctx = SearchContext::new(request, schema);
    assert_eq!(
        filter.filter(&mut ctx, alice_entry).await.unwrap(),
        FilterOutcome::Suppressed(Suppression::FilterAttributeHidden {
            attribute: "mail".to_string()
        })
    );
}

#[tokio::test]
async fn test_output_order_follows_backend_order() {
    let fixture = Fixture::new(
        TableChecker::new()
            .hide_children_of("ou=hidden,dc=example")
            .deny_read("description"),
    );

    let unfiltered = fixture
        .directory
        .search(
            user_search("dc=example", Scope::Subtree, "(objectClass=*)")
                .with_principal(Arc::new(Principal::system())),
        )
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    let filtered = fixture
        .acl
        .search(user_search("dc=example", Scope::Subtree, "(objectClass=*)"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let all = names(&unfiltered.entries);
    let mut remaining = all.iter();
    for name in names(&filtered.entries) {
        assert!(
            remaining.any(|n| *n == name),
            "{name} out of backend order"
        );
    }
    assert_eq!(filtered.entries.len(), all.len() - 1);
}
