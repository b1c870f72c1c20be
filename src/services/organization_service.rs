use std::str::FromStr;
use std::sync::Arc;

use crate::authz::{Action, AuthzEngine, Domain, Resource, Role};
use crate::models::organization::Organization;
use crate::repositories::organization_repo::OrganizationRepository;
use crate::repositories::school_repo::SchoolRepository;
use crate::utils::error::{AppError, AppResult};

pub struct OrganizationService {
    org_repo: OrganizationRepository,
    school_repo: SchoolRepository,
    authz: Arc<AuthzEngine>,
}

impl OrganizationService {
    pub fn new(
        org_repo: OrganizationRepository,
        school_repo: SchoolRepository,
        authz: Arc<AuthzEngine>,
    ) -> Self {
        Self {
            org_repo,
            school_repo,
            authz,
        }
    }

    /// Create an organization; the creator becomes its org_owner.
    pub async fn create_organization(
        &self,
        caller: i32,
        name: String,
        display_name: Option<String>,
        settings: Option<serde_json::Value>,
    ) -> AppResult<Organization> {
        let settings = settings.unwrap_or_else(|| serde_json::json!({}));

        let org = self
            .org_repo
            .create_organization(&name, display_name.as_deref(), &settings)
            .await?;

        self.org_repo
            .upsert_membership(caller, org.id, Role::OrgOwner.as_str())
            .await?;
        self.authz
            .grant(caller, Role::OrgOwner, Domain::Org(org.id))?;

        Ok(org)
    }

    /// Organizations the caller may read, resolved through visible_domains
    /// rather than row-by-row filtering.
    pub async fn list_organizations(&self, caller: i32) -> AppResult<Vec<Organization>> {
        let domains = self
            .authz
            .visible_domains(caller, Resource::Organization, Action::Read);

        let org_ids: Vec<i32> = domains
            .into_iter()
            .filter_map(|d| match d {
                Domain::Org(id) => Some(id),
                Domain::School(_) => None,
            })
            .collect();

        if org_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.org_repo.find_active_by_ids(&org_ids).await
    }

    pub async fn get_organization(&self, caller: i32, id: i32) -> AppResult<Organization> {
        let org = self
            .org_repo
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        self.authz
            .require(caller, Resource::Organization, Action::Read, Domain::Org(id))?;

        Ok(org)
    }

    pub async fn update_organization(
        &self,
        caller: i32,
        id: i32,
        display_name: Option<String>,
        settings: Option<serde_json::Value>,
        is_active: Option<bool>,
    ) -> AppResult<Organization> {
        // Re-activation is an owner-level operation on an inactive row, so
        // look the row up regardless of its active flag.
        let org = self
            .org_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        if org.is_active {
            self.authz.require(
                caller,
                Resource::Organization,
                Action::Update,
                Domain::Org(id),
            )?;
        } else {
            // The snapshot no longer holds roles for an inactive org; fall
            // back to the stored owner row.
            let owner = self
                .org_repo
                .find_membership(caller, id, Role::OrgOwner.as_str())
                .await?;
            if owner.is_none() {
                return Err(AppError::Forbidden(
                    "only the owner may re-activate an organization".to_string(),
                ));
            }
        }

        if is_active == Some(true) && !org.is_active {
            self.reactivate_organization(id).await?;
        }

        let updated = self
            .org_repo
            .update_organization(id, display_name.as_deref(), settings.as_ref())
            .await?;

        Ok(updated)
    }

    /// Soft-delete: the row survives with active=false, owned schools and
    /// membership rows cascade, classroom links are removed, and every
    /// affected grant leaves the in-memory index.
    pub async fn delete_organization(&self, caller: i32, id: i32) -> AppResult<()> {
        self.org_repo
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Organization,
            Action::Delete,
            Domain::Org(id),
        )?;

        self.org_repo.soft_delete_cascade(id).await?;
        self.authz.unregister_organization(id);

        Ok(())
    }

    /// Re-establish grants from the stored role fields after re-activation.
    async fn reactivate_organization(&self, id: i32) -> AppResult<()> {
        self.org_repo.reactivate(id).await?;

        for school in self.school_repo.list_by_organization(id).await? {
            self.authz.register_school(school.id, id);
            for (teacher_id, _, _, roles) in self.school_repo.list_teachers(school.id).await? {
                for role in roles {
                    if let Ok(role) = Role::from_str(&role) {
                        self.authz.grant(teacher_id, role, Domain::School(school.id))?;
                    }
                }
            }
        }

        for membership in self.org_repo.list_memberships(id).await? {
            if let Ok(role) = Role::from_str(&membership.role) {
                self.authz.grant(membership.teacher_id, role, Domain::Org(id))?;
            }
        }

        Ok(())
    }

    pub async fn list_teachers(
        &self,
        caller: i32,
        organization_id: i32,
    ) -> AppResult<Vec<(i32, String, String, String)>> {
        self.org_repo
            .find_active_by_id(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Read,
            Domain::Org(organization_id),
        )?;

        self.org_repo.list_teachers(organization_id).await
    }

    /// Add a teacher to the organization with an org-level role. The
    /// engine validates the single-owner invariant before the write and
    /// the partial unique index enforces it at the storage layer.
    pub async fn add_teacher(
        &self,
        caller: i32,
        organization_id: i32,
        teacher_id: i32,
        role: &str,
    ) -> AppResult<()> {
        self.org_repo
            .find_active_by_id(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Create,
            Domain::Org(organization_id),
        )?;

        let role = Role::from_str(role)
            .map_err(|_| AppError::Validation(format!("Unknown role: {}", role)))?;
        if !role.is_org_level() {
            return Err(AppError::Validation(format!(
                "Role {} cannot be granted at the organization level",
                role
            )));
        }

        // Engine-side invariant check first, so a conflict never leaves a
        // phantom row behind.
        self.authz
            .grant(teacher_id, role, Domain::Org(organization_id))?;

        match self
            .org_repo
            .upsert_membership(teacher_id, organization_id, role.as_str())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                // Storage rejected the write: roll the in-memory grant back.
                self.authz.revoke(teacher_id, role, Domain::Org(organization_id));
                Err(e)
            }
        }
    }

    /// Remove a teacher from the organization. Removing a teacher that was
    /// never a member is a no-op.
    pub async fn remove_teacher(
        &self,
        caller: i32,
        organization_id: i32,
        teacher_id: i32,
    ) -> AppResult<()> {
        self.org_repo
            .find_active_by_id(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Delete,
            Domain::Org(organization_id),
        )?;

        let revoked = self
            .org_repo
            .deactivate_membership(teacher_id, organization_id)
            .await?;

        for role in revoked {
            if let Ok(role) = Role::from_str(&role) {
                self.authz
                    .revoke(teacher_id, role, Domain::Org(organization_id));
            }
        }

        Ok(())
    }
}
