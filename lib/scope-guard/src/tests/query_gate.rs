use std::{borrow::Cow, sync::Arc};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    context::RequestContext,
    error::{ConfigurationError, UNAUTHORIZED_CODE},
    guard::ScopeGuard,
    policy::AccessPolicy,
    query_gate::QueryOutcome,
    role::{ExemptRoles, RoleRegistry},
    scope::{Rule, ScopeTarget},
    tests::fixtures::{
        config, context_for, guard, policy_of, schema, viewer, OwnershipPolicy, TestUser,
    },
};

fn denied_message(outcome: QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Denied(error) => {
            assert_eq!(error.code, UNAUTHORIZED_CODE);
            error.message
        }
        other => panic!("expected a denial, got {:?}", other),
    }
}

#[tokio::test]
async fn owner_updates_own_user() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let outcome = guard
        .check_query(&context, "Mutation", "updateUser", &json!({ "id": 1 }))
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Authorized);
    assert_eq!(policy_of(&context).calls(), 1);
}

#[tokio::test]
async fn non_owner_is_denied_with_return_type_message() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let outcome = guard
        .check_query(&context, "Mutation", "updateUser", &json!({ "id": 2 }))
        .await
        .unwrap();

    insta::assert_snapshot!(denied_message(outcome), @"Not authorized to access this user");
}

#[tokio::test]
async fn super_role_skips_the_scope_check() {
    let guard = guard();
    let context = context_for(Some(viewer(99, "admin")));

    let outcome = guard
        .check_query(&context, "Mutation", "updateUser", &json!({ "id": 2 }))
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Exempt);
    assert_eq!(policy_of(&context).calls(), 0);
}

#[tokio::test]
async fn role_failure_stops_before_the_scope_check() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let outcome = guard
        .check_query(&context, "Mutation", "rename", &json!({ "id": 1 }))
        .await
        .unwrap();

    insta::assert_snapshot!(denied_message(outcome), @"unauthorized");
    assert_eq!(policy_of(&context).calls(), 0);
}

#[tokio::test]
async fn anonymous_principal_only_passes_the_wildcard() {
    let guard = guard();
    let context = context_for(None);

    let me = guard
        .check_query(&context, "Query", "me", &json!({}))
        .await
        .unwrap();
    assert!(!me.is_allowed());

    let profile = guard
        .check_query(&context, "Query", "profile", &json!({}))
        .await
        .unwrap();
    assert!(profile.is_allowed());
}

#[tokio::test]
async fn unknown_principal_role_fails_role_checks() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "guest")));

    let outcome = guard
        .check_query(&context, "Query", "me", &json!({}))
        .await
        .unwrap();
    assert!(!outcome.is_allowed());
}

#[tokio::test]
async fn optional_argument_absent_authorizes_without_the_hook() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let outcome = guard
        .check_query(&context, "Mutation", "createWallet", &json!({ "name": "savings" }))
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Authorized);
    assert_eq!(policy_of(&context).calls(), 0);

    let outcome = guard
        .check_query(
            &context,
            "Mutation",
            "createWallet",
            &json!({ "params": { "owner_id": 2 } }),
        )
        .await
        .unwrap();
    insta::assert_snapshot!(denied_message(outcome), @"Not authorized to access this wallet");
    assert_eq!(policy_of(&context).calls(), 1);
}

#[tokio::test]
async fn required_argument_absent_is_a_configuration_error() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let error = guard
        .check_query(&context, "Mutation", "updateUser", &json!({}))
        .await
        .unwrap_err();

    insta::assert_snapshot!(error, @"no argument found at path id in {}");
    assert_eq!(policy_of(&context).calls(), 0);
}

#[tokio::test]
async fn list_arguments_check_every_element() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let own = json!({ "input": { "members": [{ "user_id": 1 }, { "user_id": 1 }] } });
    let outcome = guard
        .check_query(&context, "Mutation", "mergeUsers", &own)
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Authorized);
    assert_eq!(policy_of(&context).calls(), 2);

    let mixed = json!({ "input": { "members": [{ "user_id": 1 }, { "user_id": 2 }] } });
    let outcome = guard
        .check_query(&context, "Mutation", "mergeUsers", &mixed)
        .await
        .unwrap();
    assert!(!outcome.is_allowed());
}

#[tokio::test]
async fn multi_field_arguments_must_all_pass() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let outcome = guard
        .check_query(
            &context,
            "Mutation",
            "transfer",
            &json!({ "from_id": 1, "target": { "user_id": 1 } }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Authorized);

    let outcome = guard
        .check_query(
            &context,
            "Mutation",
            "transfer",
            &json!({ "from_id": 1, "target": { "user_id": 3 } }),
        )
        .await
        .unwrap();
    assert!(!outcome.is_allowed());

    assert_eq!(
        policy_of(&context).fields(),
        ["from", "to", "from", "to"].map(|name| Some(name.to_string()))
    );

    let error = guard
        .check_query(&context, "Mutation", "transfer", &json!({ "from_id": 1 }))
        .await
        .unwrap_err();
    assert!(matches!(error, ConfigurationError::MissingArgument { .. }));
}

#[tokio::test]
async fn null_is_forwarded_with_the_declared_rule() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let outcome = guard
        .check_query(&context, "Mutation", "claimWallet", &json!({ "owner_id": null }))
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Authorized);
    assert_eq!(
        policy_of(&context).seen(),
        vec![(
            "User".to_string(),
            json!(null),
            "allow_unowned".to_string()
        )]
    );
}

#[tokio::test]
async fn default_rule_applies_when_none_is_declared() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    guard
        .check_query(&context, "Query", "user", &json!({ "id": 1 }))
        .await
        .unwrap();

    let seen = policy_of(&context).seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].2, "default");
}

#[tokio::test]
async fn missing_policy_is_a_configuration_error() {
    let guard = guard();
    let context = crate::context::RequestContext::new().with(viewer(1, "user"));

    let error = guard
        .check_query(&context, "Query", "me", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(error, ConfigurationError::PolicyNotRegistered);
}

#[tokio::test]
async fn unknown_root_field() {
    let guard = guard();
    let context = context_for(Some(viewer(1, "user")));

    let error = guard
        .check_query(&context, "Query", "nope", &json!({}))
        .await
        .unwrap_err();
    insta::assert_snapshot!(error, @"field 'nope' is not defined on type 'Query'");
}

/// Exempts auditors from scope checks instead of the configured set.
#[derive(Default)]
struct AuditorsExempt {
    ownership: OwnershipPolicy,
}

#[async_trait]
impl AccessPolicy for AuditorsExempt {
    type Principal = TestUser;

    fn current_principal(&self, context: &RequestContext) -> Option<Arc<TestUser>> {
        context.get::<TestUser>()
    }

    async fn has_access(
        &self,
        principal: &TestUser,
        target: &ScopeTarget,
        field: Option<&str>,
        value: &Value,
        rule: &Rule,
    ) -> bool {
        self.ownership
            .has_access(principal, target, field, value, rule)
            .await
    }

    fn exempt_roles<'r>(&'r self, roles: &'r RoleRegistry) -> Cow<'r, ExemptRoles> {
        Cow::Owned(roles.exempt_set(["auditor"]).unwrap())
    }
}

#[tokio::test]
async fn policy_can_replace_the_exempt_roles() {
    let context = RequestContext::new().with(AuditorsExempt::default());
    context.insert(viewer(7, "auditor"));
    let args = json!({ "id": 2 });

    let custom = ScopeGuard::<AuditorsExempt>::new(&config(), &schema()).unwrap();
    let outcome = custom
        .check_query(&context, "Mutation", "updateUser", &args)
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Exempt);
    let policy = context.get::<AuditorsExempt>().unwrap();
    assert_eq!(policy.ownership.calls(), 0);

    // the configured set does not cover auditors
    let context = context_for(Some(viewer(7, "auditor")));
    let outcome = guard()
        .check_query(&context, "Mutation", "updateUser", &args)
        .await
        .unwrap();

    assert!(!outcome.is_allowed());
    assert_eq!(policy_of(&context).calls(), 1);
}
