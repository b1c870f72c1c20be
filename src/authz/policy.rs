use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::domain::{Action, DomainKind, Resource, Role};

/// The policy document shipped with the binary. Allow-only: a request is
/// denied unless some rule covers it. The `org-*` / `school-*` domain
/// patterns select which tenant boundary a rule applies to; the engine
/// supplies the concrete membership lookup.
const POLICY_JSON: &str = r#"
{
  "version": "duotopia-policy-v1",
  "rules": [
    { "role": "org_owner", "domain": "org-*", "resource": "organization",
      "actions": ["read", "update", "delete", "manage"] },
    { "role": "org_owner", "domain": "org-*", "resource": "school",
      "actions": ["create", "read", "update", "delete", "manage"] },
    { "role": "org_owner", "domain": "org-*", "resource": "teacher",
      "actions": ["create", "read", "update", "delete"] },
    { "role": "org_owner", "domain": "org-*", "resource": "subscription",
      "actions": ["read", "update", "manage"] },
    { "role": "org_owner", "domain": "school-*", "resource": "school",
      "actions": ["read", "update", "delete", "manage"] },
    { "role": "org_owner", "domain": "school-*", "resource": "teacher",
      "actions": ["create", "read", "update", "delete"] },
    { "role": "org_owner", "domain": "school-*", "resource": "classroom",
      "actions": ["create", "read", "update", "delete", "manage"] },
    { "role": "org_owner", "domain": "school-*", "resource": "student",
      "actions": ["create", "read", "update", "delete", "manage"] },
    { "role": "org_owner", "domain": "school-*", "resource": "assignment",
      "actions": ["create", "read", "update", "delete", "manage"] },
    { "role": "org_owner", "domain": "school-*", "resource": "manage_materials",
      "actions": ["create", "read", "update", "delete", "manage"] },

    { "role": "org_admin", "domain": "org-*", "resource": "organization",
      "actions": ["read", "update"] },
    { "role": "org_admin", "domain": "org-*", "resource": "school",
      "actions": ["create", "read", "update"] },
    { "role": "org_admin", "domain": "org-*", "resource": "teacher",
      "actions": ["create", "read", "update"] },
    { "role": "org_admin", "domain": "org-*", "resource": "subscription",
      "actions": ["read"] },
    { "role": "org_admin", "domain": "school-*", "resource": "school",
      "actions": ["read", "update"] },
    { "role": "org_admin", "domain": "school-*", "resource": "teacher",
      "actions": ["create", "read", "update"] },
    { "role": "org_admin", "domain": "school-*", "resource": "classroom",
      "actions": ["create", "read", "update", "delete"] },
    { "role": "org_admin", "domain": "school-*", "resource": "student",
      "actions": ["create", "read", "update"] },
    { "role": "org_admin", "domain": "school-*", "resource": "assignment",
      "actions": ["create", "read", "update", "manage"] },
    { "role": "org_admin", "domain": "school-*", "resource": "manage_materials",
      "actions": ["create", "read", "update"] },

    { "role": "school_admin", "domain": "school-*", "resource": "school",
      "actions": ["read", "update"] },
    { "role": "school_admin", "domain": "school-*", "resource": "teacher",
      "actions": ["create", "read", "update", "delete"] },
    { "role": "school_admin", "domain": "school-*", "resource": "classroom",
      "actions": ["create", "read", "update", "delete"] },
    { "role": "school_admin", "domain": "school-*", "resource": "student",
      "actions": ["create", "read", "update", "delete"] },
    { "role": "school_admin", "domain": "school-*", "resource": "assignment",
      "actions": ["create", "read", "update", "delete", "manage"] },
    { "role": "school_admin", "domain": "school-*", "resource": "manage_materials",
      "actions": ["create", "read", "update", "delete"] },

    { "role": "teacher", "domain": "school-*", "resource": "school",
      "actions": ["read"] },
    { "role": "teacher", "domain": "school-*", "resource": "classroom",
      "actions": ["read"] },
    { "role": "teacher", "domain": "school-*", "resource": "student",
      "actions": ["read", "update"] },
    { "role": "teacher", "domain": "school-*", "resource": "assignment",
      "actions": ["create", "read", "update"] },
    { "role": "teacher", "domain": "school-*", "resource": "manage_materials",
      "actions": ["read"] }
  ]
}
"#;

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    version: String,
    rules: Vec<PolicyRule>,
}

#[derive(Debug, Deserialize)]
struct PolicyRule {
    role: String,
    domain: String,
    resource: String,
    actions: Vec<String>,
}

/// The policy compiled into a flat allow set. Lookups are hash probes over
/// in-memory data; no file or database access happens per check.
#[derive(Debug)]
pub struct PolicyTable {
    version: String,
    allow: HashSet<(Role, Resource, Action, DomainKind)>,
}

impl PolicyTable {
    /// Compile the embedded policy document. A malformed document is a
    /// startup failure, never a silent deny-all.
    pub fn compile() -> Result<Self> {
        Self::compile_from(POLICY_JSON)
    }

    fn compile_from(raw: &str) -> Result<Self> {
        let doc: PolicyDocument =
            serde_json::from_str(raw).context("failed to parse authorization policy document")?;

        let mut allow = HashSet::new();
        for rule in &doc.rules {
            let role = Role::from_str(&rule.role)
                .map_err(|_| anyhow!("policy rule references unknown role '{}'", rule.role))?;
            let kind = match rule.domain.as_str() {
                "org-*" => DomainKind::Org,
                "school-*" => DomainKind::School,
                other => return Err(anyhow!("policy rule has unknown domain pattern '{}'", other)),
            };
            let resource = parse_resource(&rule.resource)?;
            for action in &rule.actions {
                allow.insert((role, resource, parse_action(action)?, kind));
            }
        }

        Ok(Self {
            version: doc.version,
            allow,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn allows(&self, role: Role, resource: Resource, action: Action, kind: DomainKind) -> bool {
        self.allow.contains(&(role, resource, action, kind))
    }
}

fn parse_resource(s: &str) -> Result<Resource> {
    match s {
        "organization" => Ok(Resource::Organization),
        "school" => Ok(Resource::School),
        "teacher" => Ok(Resource::Teacher),
        "classroom" => Ok(Resource::Classroom),
        "student" => Ok(Resource::Student),
        "assignment" => Ok(Resource::Assignment),
        "subscription" => Ok(Resource::Subscription),
        "manage_materials" => Ok(Resource::ManageMaterials),
        other => Err(anyhow!("policy rule references unknown resource '{}'", other)),
    }
}

fn parse_action(s: &str) -> Result<Action> {
    match s {
        "create" => Ok(Action::Create),
        "read" => Ok(Action::Read),
        "update" => Ok(Action::Update),
        "delete" => Ok(Action::Delete),
        "manage" => Ok(Action::Manage),
        other => Err(anyhow!("policy rule references unknown action '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_policy_compiles() {
        let table = PolicyTable::compile().unwrap();
        assert_eq!(table.version(), "duotopia-policy-v1");
    }

    #[test]
    fn test_org_owner_school_grants() {
        let table = PolicyTable::compile().unwrap();
        assert!(table.allows(
            Role::OrgOwner,
            Resource::Assignment,
            Action::Update,
            DomainKind::School
        ));
        assert!(table.allows(
            Role::OrgOwner,
            Resource::School,
            Action::Create,
            DomainKind::Org
        ));
    }

    #[test]
    fn test_missing_rule_is_deny() {
        let table = PolicyTable::compile().unwrap();
        // Teachers cannot delete assignments.
        assert!(!table.allows(
            Role::Teacher,
            Resource::Assignment,
            Action::Delete,
            DomainKind::School
        ));
        // School-level roles grant nothing in org domains.
        assert!(!table.allows(
            Role::SchoolAdmin,
            Resource::Organization,
            Action::Read,
            DomainKind::Org
        ));
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(PolicyTable::compile_from("{ not json").is_err());
        assert!(PolicyTable::compile_from(
            r#"{"version":"v","rules":[{"role":"wizard","domain":"org-*","resource":"school","actions":["read"]}]}"#
        )
        .is_err());
        assert!(PolicyTable::compile_from(
            r#"{"version":"v","rules":[{"role":"teacher","domain":"classroom-*","resource":"school","actions":["read"]}]}"#
        )
        .is_err());
    }
}
