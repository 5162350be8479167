use serde_json::{json, Value};

use crate::{
    error::UNAUTHORIZED_FIELD_CODE,
    guard::AuthorizationDecision,
    tests::fixtures::{context_for, guard, viewer, TestUser},
    tree::{ObjectNode, ResultField, ResultNode, ResultTree},
};

fn profile_tree(is_public: bool) -> ResultTree {
    let profile = ObjectNode::new(
        "Profile",
        json!({
            "user_id": 1,
            "name": "Ada",
            "email": "ada@example.com",
            "phone": "555-0100",
            "is_public": is_public,
        }),
    )
    .select("name")
    .select("email")
    .select("phone");

    ResultTree::new("Query").field(ResultField::new("profile", profile.into()).at(1, 3))
}

async fn profile_as(principal: Option<TestUser>, is_public: bool) -> (Value, Vec<String>) {
    let tree = profile_tree(is_public);
    let decision = guard()
        .authorize_result(&context_for(principal), &tree)
        .await
        .unwrap();

    let codes = decision
        .errors()
        .iter()
        .map(|error| error.code().unwrap_or_default().to_string())
        .collect();
    let data = decision.into_response(&tree)["data"]["profile"].clone();
    (data, codes)
}

#[tokio::test]
async fn public_profile_shows_the_dynamic_field() {
    let (profile, codes) = profile_as(Some(viewer(2, "user")), true).await;

    assert_eq!(
        profile,
        json!({ "name": "Ada", "email": null, "phone": "555-0100" })
    );
    assert_eq!(codes, vec![UNAUTHORIZED_FIELD_CODE]);
}

#[tokio::test]
async fn hidden_profile_nulls_private_fields_for_strangers() {
    let tree = profile_tree(false);
    let decision = guard()
        .authorize_result(&context_for(Some(viewer(2, "user"))), &tree)
        .await
        .unwrap();

    let AuthorizationDecision::Modified { tree, errors } = decision else {
        panic!("expected a modified tree");
    };
    assert_eq!(
        tree.to_data(),
        json!({ "profile": { "name": "Ada", "email": null, "phone": null } })
    );
    let messages: Vec<_> = errors.iter().map(|error| error.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Not authorized to access field email",
            "Not authorized to access field phone"
        ]
    );
}

#[tokio::test]
async fn owner_sees_private_fields() {
    let (profile, codes) = profile_as(Some(viewer(1, "user")), false).await;

    assert_eq!(profile["email"], json!("ada@example.com"));
    assert_eq!(profile["phone"], json!("555-0100"));
    assert!(codes.is_empty());
}

#[tokio::test]
async fn super_role_always_sees_private_fields() {
    let (profile, codes) = profile_as(Some(viewer(99, "admin")), false).await;

    assert_eq!(profile["email"], json!("ada@example.com"));
    assert!(codes.is_empty());
}

#[tokio::test]
async fn anonymous_viewer_sees_only_public_data() {
    let (profile, codes) = profile_as(None, true).await;

    assert_eq!(profile["name"], json!("Ada"));
    assert_eq!(profile["email"], json!(null));
    assert_eq!(profile["phone"], json!("555-0100"));
    assert_eq!(codes.len(), 1);
}

fn contact_tree(type_name: &str) -> ResultTree {
    let contact = ObjectNode::new(
        type_name,
        json!({ "user_id": 1, "name": "Ada", "email": "ada@example.com" }),
    )
    .select("name")
    .select("email");

    ResultTree::new("Query").field(ResultField::new(
        "contact",
        ResultNode::abstract_type("Contact", contact.into()),
    ))
}

#[tokio::test]
async fn interface_privacy_applies_to_implementing_objects() {
    let tree = contact_tree("Member");

    let stranger = guard()
        .authorize_result(&context_for(Some(viewer(2, "user"))), &tree)
        .await
        .unwrap();
    assert_eq!(stranger.errors().len(), 1);
    assert_eq!(
        stranger.into_response(&tree)["data"]["contact"],
        json!({ "name": "Ada", "email": null })
    );

    let owner = guard()
        .authorize_result(&context_for(Some(viewer(1, "user"))), &tree)
        .await
        .unwrap();
    assert!(matches!(owner, AuthorizationDecision::NoChange));
}

#[tokio::test]
async fn object_field_meta_overrides_the_interface() {
    let tree = contact_tree("Listing");

    let decision = guard()
        .authorize_result(&context_for(Some(viewer(2, "user"))), &tree)
        .await
        .unwrap();

    assert!(matches!(decision, AuthorizationDecision::NoChange));
}

#[test]
fn interface_privacy_reaches_the_field_middleware() {
    let guard = guard();

    assert!(guard.metadata().field("Member", "email").is_some());
    assert!(guard.metadata().field("Listing", "email").is_none());
    assert!(guard.metadata().field("Contact", "email").is_none());
    assert_eq!(guard.middleware("Member", "email", vec![]).len(), 1);
    assert!(guard.middleware("Listing", "email", vec![]).is_empty());
}
