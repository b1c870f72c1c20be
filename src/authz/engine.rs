use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::RwLock;

use sqlx::PgPool;

use crate::utils::error::{AppError, AppResult};

use super::domain::{Action, Domain, Resource, Role};
use super::policy::PolicyTable;

/// In-memory view of the membership graph. Rebuilt from the database at
/// startup and kept current write-through by grant/revoke and the graph
/// mutations. Checks never touch the database.
#[derive(Debug, Default)]
struct Snapshot {
    /// (teacher, domain) -> roles held there.
    roles: HashMap<(i32, Domain), HashSet<Role>>,
    /// school -> owning organization.
    school_parent: HashMap<i32, i32>,
    /// organization -> owned schools.
    org_schools: HashMap<i32, HashSet<i32>>,
    /// organization -> current org_owner teacher.
    org_owner: HashMap<i32, i32>,
}

pub struct AuthzEngine {
    policy: PolicyTable,
    snapshot: RwLock<Snapshot>,
}

impl AuthzEngine {
    pub fn new(policy: PolicyTable) -> Self {
        Self {
            policy,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Rebuild the snapshot from the membership tables. Inactive rows and
    /// rows under inactive parents are excluded from permission resolution.
    pub async fn load(&self, pool: &PgPool) -> AppResult<()> {
        let schools: Vec<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT s.id, s.organization_id
            FROM schools s
            JOIN organizations o ON o.id = s.organization_id
            WHERE s.is_active AND o.is_active
            "#,
        )
        .fetch_all(pool)
        .await?;

        let org_memberships: Vec<(i32, i32, String)> = sqlx::query_as(
            r#"
            SELECT t.teacher_id, t.organization_id, t.role
            FROM teacher_organizations t
            JOIN organizations o ON o.id = t.organization_id
            WHERE t.is_active AND o.is_active
            "#,
        )
        .fetch_all(pool)
        .await?;

        let school_memberships: Vec<(i32, i32, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT ts.teacher_id, ts.school_id, ts.roles
            FROM teacher_schools ts
            JOIN schools s ON s.id = ts.school_id
            JOIN organizations o ON o.id = s.organization_id
            WHERE ts.is_active AND s.is_active AND o.is_active
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut next = Snapshot::default();
        for (school_id, org_id) in schools {
            next.school_parent.insert(school_id, org_id);
            next.org_schools.entry(org_id).or_default().insert(school_id);
        }
        for (teacher_id, org_id, role) in org_memberships {
            let Ok(role) = Role::from_str(&role) else {
                tracing::warn!("skipping unknown org role '{}' for teacher {}", role, teacher_id);
                continue;
            };
            if role == Role::OrgOwner {
                next.org_owner.insert(org_id, teacher_id);
            }
            next.roles
                .entry((teacher_id, Domain::Org(org_id)))
                .or_default()
                .insert(role);
        }
        for (teacher_id, school_id, roles) in school_memberships {
            for role in roles {
                let Ok(role) = Role::from_str(&role) else {
                    continue;
                };
                next.roles
                    .entry((teacher_id, Domain::School(school_id)))
                    .or_default()
                    .insert(role);
            }
        }

        let mut snap = self.snapshot.write().unwrap();
        *snap = next;
        tracing::info!(
            policy = self.policy.version(),
            principals = snap.roles.len(),
            schools = snap.school_parent.len(),
            "authorization snapshot loaded"
        );
        Ok(())
    }

    /// Decide whether `principal` may perform `action` on `resource` within
    /// `domain`. A `school-Y` request also consults the principal's roles in
    /// the parent organization, which is what makes org_owner/org_admin
    /// authority flow down to owned schools.
    pub fn check(&self, principal: i32, resource: Resource, action: Action, domain: Domain) -> bool {
        let snap = self.snapshot.read().unwrap();

        let mut roles: HashSet<Role> = snap
            .roles
            .get(&(principal, domain))
            .cloned()
            .unwrap_or_default();

        if let Domain::School(school_id) = domain {
            if let Some(org_id) = snap.school_parent.get(&school_id) {
                if let Some(org_roles) = snap.roles.get(&(principal, Domain::Org(*org_id))) {
                    roles.extend(org_roles.iter().copied());
                }
            }
        }

        roles
            .iter()
            .any(|role| self.policy.allows(*role, resource, action, domain.kind()))
    }

    pub fn require(
        &self,
        principal: i32,
        resource: Resource,
        action: Action,
        domain: Domain,
    ) -> AppResult<()> {
        if self.check(principal, resource, action, domain) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "not allowed to {} {} in {}",
                action.as_str(),
                resource.as_str(),
                domain
            )))
        }
    }

    /// Every domain in which the principal may perform (resource, action).
    /// Org-level roles expand to the owned schools, so listing endpoints do
    /// not have to filter row-by-row.
    pub fn visible_domains(
        &self,
        principal: i32,
        resource: Resource,
        action: Action,
    ) -> HashSet<Domain> {
        let snap = self.snapshot.read().unwrap();
        let mut visible = HashSet::new();

        for ((teacher_id, domain), roles) in snap.roles.iter() {
            if *teacher_id != principal {
                continue;
            }
            match domain {
                Domain::Org(org_id) => {
                    if roles
                        .iter()
                        .any(|r| self.policy.allows(*r, resource, action, super::DomainKind::Org))
                    {
                        visible.insert(*domain);
                    }
                    if let Some(schools) = snap.org_schools.get(org_id) {
                        for school_id in schools {
                            if roles.iter().any(|r| {
                                self.policy
                                    .allows(*r, resource, action, super::DomainKind::School)
                            }) {
                                visible.insert(Domain::School(*school_id));
                            }
                        }
                    }
                }
                Domain::School(_) => {
                    if roles.iter().any(|r| {
                        self.policy
                            .allows(*r, resource, action, super::DomainKind::School)
                    }) {
                        visible.insert(*domain);
                    }
                }
            }
        }

        visible
    }

    /// Add `role` for `principal` in `domain`. A second org_owner in the
    /// same organization violates the single-owner invariant.
    pub fn grant(&self, principal: i32, role: Role, domain: Domain) -> AppResult<()> {
        let mut snap = self.snapshot.write().unwrap();

        if role == Role::OrgOwner {
            let Domain::Org(org_id) = domain else {
                return Err(AppError::Validation(
                    "org_owner can only be granted in an organization domain".to_string(),
                ));
            };
            if let Some(existing) = snap.org_owner.get(&org_id) {
                if *existing != principal {
                    return Err(AppError::Conflict(format!(
                        "organization {} already has an owner",
                        org_id
                    )));
                }
            }
            snap.org_owner.insert(org_id, principal);
        }

        snap.roles
            .entry((principal, domain))
            .or_default()
            .insert(role);
        Ok(())
    }

    /// Remove `role` for `principal` in `domain`. Revoking a role that was
    /// never granted is a no-op.
    pub fn revoke(&self, principal: i32, role: Role, domain: Domain) {
        let mut snap = self.snapshot.write().unwrap();

        if let Some(roles) = snap.roles.get_mut(&(principal, domain)) {
            roles.remove(&role);
            if roles.is_empty() {
                snap.roles.remove(&(principal, domain));
            }
        }
        if role == Role::OrgOwner {
            if let Domain::Org(org_id) = domain {
                if snap.org_owner.get(&org_id) == Some(&principal) {
                    snap.org_owner.remove(&org_id);
                }
            }
        }
    }

    /// Record a newly created (or re-activated) school under its owning
    /// organization.
    pub fn register_school(&self, school_id: i32, org_id: i32) {
        let mut snap = self.snapshot.write().unwrap();
        snap.school_parent.insert(school_id, org_id);
        snap.org_schools.entry(org_id).or_default().insert(school_id);
    }

    /// Drop a school and every role held in its domain.
    pub fn unregister_school(&self, school_id: i32) {
        let mut snap = self.snapshot.write().unwrap();
        if let Some(org_id) = snap.school_parent.remove(&school_id) {
            if let Some(schools) = snap.org_schools.get_mut(&org_id) {
                schools.remove(&school_id);
            }
        }
        snap.roles
            .retain(|(_, domain), _| *domain != Domain::School(school_id));
    }

    /// Drop an organization, its schools, and every role held in any of
    /// those domains. Mirrors the soft-delete cascade.
    pub fn unregister_organization(&self, org_id: i32) {
        let mut snap = self.snapshot.write().unwrap();
        let schools = snap.org_schools.remove(&org_id).unwrap_or_default();
        for school_id in &schools {
            snap.school_parent.remove(school_id);
        }
        snap.org_owner.remove(&org_id);
        snap.roles.retain(|(_, domain), _| match domain {
            Domain::Org(id) => *id != org_id,
            Domain::School(id) => !schools.contains(id),
        });
    }
}
