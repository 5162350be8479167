use ahash::HashSet;
use lasso2::{Rodeo, RodeoReader, Spur};
use scope_guard_config::authorization::ALL_ROLES;

use crate::error::ConfigurationError;

/// Interned role name. Only configured roles are ever interned, so holding a
/// `RoleId` means the role is valid.
pub type RoleId = Spur;

/// A role requirement as declared in schema metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permit {
    All,
    Role(String),
    AnyOf(Vec<String>),
}

/// A validated role requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRequirement {
    /// No restriction, passes for every principal including unauthenticated ones.
    All,
    Role(RoleId),
    /// Passes when the principal's role is one of these.
    AnyOf(Vec<RoleId>),
}

/// Roles that skip scope checks once their role check passed.
#[derive(Debug, Clone, Default)]
pub struct ExemptRoles {
    /// The wildcard requirement is exempt.
    pub all: bool,
    pub roles: HashSet<RoleId>,
}

impl ExemptRoles {
    pub fn covers(
        &self,
        role: Option<RoleId>,
        requirement: Option<&PermissionRequirement>,
    ) -> bool {
        if self.all && matches!(requirement, Some(PermissionRequirement::All)) {
            return true;
        }

        role.is_some_and(|role| self.roles.contains(&role))
    }
}

/// The closed role set, its super roles and exempt roles.
#[derive(Debug)]
pub struct RoleRegistry {
    interner: RodeoReader,
    super_roles: HashSet<RoleId>,
    exempt: ExemptRoles,
}

impl RoleRegistry {
    pub fn new(
        roles: &[String],
        super_roles: &[String],
        exempt_roles: &[String],
    ) -> Result<Self, ConfigurationError> {
        let mut interner = Rodeo::new();
        for role in roles {
            if role == ALL_ROLES {
                return Err(ConfigurationError::ReservedRole(role.clone()));
            }
            interner.get_or_intern(role);
        }

        let lookup = |role: &String, site: &str| {
            interner
                .get(role)
                .ok_or_else(|| ConfigurationError::UnknownRole {
                    role: role.clone(),
                    site: site.to_string(),
                })
        };

        let super_roles = super_roles
            .iter()
            .map(|role| lookup(role, "super_roles"))
            .collect::<Result<HashSet<_>, _>>()?;

        let mut registry = Self {
            interner: interner.into_reader(),
            super_roles,
            exempt: ExemptRoles::default(),
        };
        registry.exempt = registry.exempt_set(exempt_roles.iter().map(String::as_str))?;

        Ok(registry)
    }

    /// Builds an exempt set from role names, `ALL` stands for the wildcard
    /// requirement.
    pub fn exempt_set<'n>(
        &self,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<ExemptRoles, ConfigurationError> {
        let mut exempt = ExemptRoles::default();
        for name in names {
            if name == ALL_ROLES {
                exempt.all = true;
                continue;
            }
            let role = self
                .role_id(name)
                .ok_or_else(|| ConfigurationError::UnknownRole {
                    role: name.to_string(),
                    site: "exempt_roles".to_string(),
                })?;
            exempt.roles.insert(role);
        }

        Ok(exempt)
    }

    /// Resolves a principal's role name. Unknown roles resolve to `None`,
    /// which only satisfies the wildcard requirement.
    pub fn role_id(&self, name: &str) -> Option<RoleId> {
        self.interner.get(name)
    }

    pub fn role_name(&self, role: RoleId) -> &str {
        self.interner.resolve(&role)
    }

    pub fn is_super(&self, role: Option<RoleId>) -> bool {
        role.is_some_and(|role| self.super_roles.contains(&role))
    }

    pub fn exempt_roles(&self) -> &ExemptRoles {
        &self.exempt
    }

    /// Validates a declared requirement against the configured roles.
    pub fn requirement(
        &self,
        permit: &Permit,
        site: &str,
    ) -> Result<PermissionRequirement, ConfigurationError> {
        let lookup = |role: &String| {
            self.role_id(role)
                .ok_or_else(|| ConfigurationError::UnknownRole {
                    role: role.clone(),
                    site: site.to_string(),
                })
        };

        match permit {
            Permit::All => Ok(PermissionRequirement::All),
            Permit::Role(role) if role == ALL_ROLES => Ok(PermissionRequirement::All),
            Permit::Role(role) => lookup(role).map(PermissionRequirement::Role),
            Permit::AnyOf(roles) if roles.iter().any(|role| role == ALL_ROLES) => {
                Ok(PermissionRequirement::All)
            }
            Permit::AnyOf(roles) => {
                if roles.is_empty() {
                    return Err(ConfigurationError::InvalidOption {
                        site: site.to_string(),
                        key: "authorize".to_string(),
                        expected: "a non-empty list of roles",
                        found: "an empty list".to_string(),
                    });
                }
                roles
                    .iter()
                    .map(lookup)
                    .collect::<Result<Vec<_>, _>>()
                    .map(PermissionRequirement::AnyOf)
            }
        }
    }

    /// Decides whether `role` satisfies `requirement`.
    ///
    /// The wildcard passes for everyone, super roles pass everything, an
    /// unauthenticated principal (`None`) passes only the wildcard.
    pub fn authorized(&self, role: Option<RoleId>, requirement: &PermissionRequirement) -> bool {
        match (requirement, role) {
            (PermissionRequirement::All, _) => true,
            (_, None) => false,
            (_, Some(role)) if self.super_roles.contains(&role) => true,
            (PermissionRequirement::Role(required), Some(role)) => *required == role,
            (PermissionRequirement::AnyOf(required), Some(role)) => required.contains(&role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Permit, PermissionRequirement, RoleRegistry};
    use crate::error::ConfigurationError;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn registry() -> RoleRegistry {
        RoleRegistry::new(
            &strings(&["user", "admin", "auditor"]),
            &strings(&["admin"]),
            &strings(&["ALL", "admin"]),
        )
        .unwrap()
    }

    #[test]
    fn wildcard_passes_everyone() {
        let roles = registry();
        let user = roles.role_id("user");

        assert!(roles.authorized(user, &PermissionRequirement::All));
        assert!(roles.authorized(None, &PermissionRequirement::All));
    }

    #[test]
    fn super_role_passes_every_requirement() {
        let roles = registry();
        let admin = roles.role_id("admin");
        let auditor = roles.role_id("auditor").unwrap();

        assert!(roles.authorized(admin, &PermissionRequirement::Role(auditor)));
        assert!(roles.authorized(admin, &PermissionRequirement::AnyOf(vec![auditor])));
    }

    #[test]
    fn single_and_set_requirements() {
        let roles = registry();
        let user = roles.role_id("user").unwrap();
        let auditor = roles.role_id("auditor").unwrap();

        assert!(roles.authorized(Some(user), &PermissionRequirement::Role(user)));
        assert!(!roles.authorized(Some(auditor), &PermissionRequirement::Role(user)));
        assert!(roles.authorized(
            Some(auditor),
            &PermissionRequirement::AnyOf(vec![user, auditor])
        ));
        assert!(!roles.authorized(Some(auditor), &PermissionRequirement::AnyOf(vec![user])));
    }

    #[test]
    fn unauthenticated_fails_everything_but_wildcard() {
        let roles = registry();
        let user = roles.role_id("user").unwrap();

        assert!(!roles.authorized(None, &PermissionRequirement::Role(user)));
        assert!(!roles.authorized(None, &PermissionRequirement::AnyOf(vec![user])));
    }

    #[test]
    fn unknown_principal_role_resolves_to_none() {
        let roles = registry();
        assert_eq!(roles.role_id("guest"), None);
    }

    #[test]
    fn declared_roles_must_be_configured() {
        let roles = registry();

        let error = roles
            .requirement(&Permit::Role("guest".to_string()), "Query.me")
            .unwrap_err();
        insta::assert_snapshot!(
            error,
            @"role 'guest' used on Query.me is not one of the configured roles"
        );

        assert_eq!(
            roles.requirement(&Permit::AnyOf(vec!["user".into(), "ALL".into()]), "Query.me"),
            Ok(PermissionRequirement::All)
        );
        assert!(matches!(
            roles.requirement(&Permit::AnyOf(vec![]), "Query.me"),
            Err(ConfigurationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn super_roles_must_be_configured() {
        let error = RoleRegistry::new(&strings(&["user"]), &strings(&["root"]), &[]).unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::UnknownRole {
                role: "root".to_string(),
                site: "super_roles".to_string(),
            }
        );
    }

    #[test]
    fn all_is_reserved() {
        let error = RoleRegistry::new(&strings(&["ALL"]), &[], &[]).unwrap_err();
        assert_eq!(error, ConfigurationError::ReservedRole("ALL".to_string()));
    }

    #[test]
    fn exemption_covers_wildcard_and_exempt_roles() {
        let roles = registry();
        let exempt = roles.exempt_roles();
        let user = roles.role_id("user");
        let admin = roles.role_id("admin");
        let user_requirement = PermissionRequirement::Role(user.unwrap());

        assert!(exempt.covers(user, Some(&PermissionRequirement::All)));
        assert!(exempt.covers(admin, Some(&user_requirement)));
        assert!(!exempt.covers(user, Some(&user_requirement)));
        assert!(!exempt.covers(None, None));
    }
}
