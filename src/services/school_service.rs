use std::str::FromStr;
use std::sync::Arc;

use crate::authz::{Action, AuthzEngine, Domain, Resource, Role};
use crate::models::school::School;
use crate::repositories::organization_repo::OrganizationRepository;
use crate::repositories::school_repo::SchoolRepository;
use crate::utils::error::{AppError, AppResult};

const SCHOOL_ROLES: [&str; 2] = ["school_admin", "teacher"];

pub struct SchoolService {
    school_repo: SchoolRepository,
    org_repo: OrganizationRepository,
    authz: Arc<AuthzEngine>,
}

impl SchoolService {
    pub fn new(
        school_repo: SchoolRepository,
        org_repo: OrganizationRepository,
        authz: Arc<AuthzEngine>,
    ) -> Self {
        Self {
            school_repo,
            org_repo,
            authz,
        }
    }

    pub async fn create_school(
        &self,
        caller: i32,
        organization_id: i32,
        name: String,
    ) -> AppResult<School> {
        self.org_repo
            .find_active_by_id(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::School,
            Action::Create,
            Domain::Org(organization_id),
        )?;

        let school = self.school_repo.create_school(organization_id, &name).await?;
        self.authz.register_school(school.id, organization_id);

        Ok(school)
    }

    /// Schools the caller may read across every visible domain.
    pub async fn list_schools(&self, caller: i32) -> AppResult<Vec<School>> {
        let domains = self
            .authz
            .visible_domains(caller, Resource::School, Action::Read);

        let school_ids: Vec<i32> = domains
            .into_iter()
            .filter_map(|d| match d {
                Domain::School(id) => Some(id),
                Domain::Org(_) => None,
            })
            .collect();

        if school_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.school_repo.find_active_by_ids(&school_ids).await
    }

    pub async fn get_school(&self, caller: i32, id: i32) -> AppResult<School> {
        let school = self
            .school_repo
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz
            .require(caller, Resource::School, Action::Read, Domain::School(id))?;

        Ok(school)
    }

    pub async fn update_school(
        &self,
        caller: i32,
        id: i32,
        name: Option<String>,
    ) -> AppResult<School> {
        self.school_repo
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz
            .require(caller, Resource::School, Action::Update, Domain::School(id))?;

        self.school_repo.update_school(id, name.as_deref()).await
    }

    pub async fn delete_school(&self, caller: i32, id: i32) -> AppResult<()> {
        self.school_repo
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz
            .require(caller, Resource::School, Action::Delete, Domain::School(id))?;

        self.school_repo.soft_delete_cascade(id).await?;
        self.authz.unregister_school(id);

        Ok(())
    }

    pub async fn list_teachers(
        &self,
        caller: i32,
        school_id: i32,
    ) -> AppResult<Vec<(i32, String, String, Vec<String>)>> {
        self.school_repo
            .find_active_by_id(school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Read,
            Domain::School(school_id),
        )?;

        self.school_repo.list_teachers(school_id).await
    }

    /// Add a teacher to a school with a set of roles. Union semantics: an
    /// existing active membership keeps its roles and gains the new ones.
    pub async fn add_teacher(
        &self,
        caller: i32,
        school_id: i32,
        teacher_id: i32,
        roles: Vec<String>,
    ) -> AppResult<Vec<String>> {
        self.school_repo
            .find_active_by_id(school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Create,
            Domain::School(school_id),
        )?;

        let roles = validate_school_roles(roles)?;

        let membership = self
            .school_repo
            .upsert_membership(teacher_id, school_id, &roles)
            .await?;

        for role in &membership.roles {
            if let Ok(role) = Role::from_str(role) {
                self.authz.grant(teacher_id, role, Domain::School(school_id))?;
            }
        }

        Ok(membership.roles)
    }

    /// Replace a teacher's role set in a school.
    pub async fn update_teacher_roles(
        &self,
        caller: i32,
        school_id: i32,
        teacher_id: i32,
        roles: Vec<String>,
    ) -> AppResult<Vec<String>> {
        self.school_repo
            .find_active_by_id(school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Update,
            Domain::School(school_id),
        )?;

        let previous = self
            .school_repo
            .find_membership(teacher_id, school_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;

        let roles = validate_school_roles(roles)?;

        let membership = self
            .school_repo
            .replace_membership_roles(teacher_id, school_id, &roles)
            .await?
            .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;

        for role in &previous.roles {
            if let Ok(role) = Role::from_str(role) {
                self.authz.revoke(teacher_id, role, Domain::School(school_id));
            }
        }
        for role in &membership.roles {
            if let Ok(role) = Role::from_str(role) {
                self.authz.grant(teacher_id, role, Domain::School(school_id))?;
            }
        }

        Ok(membership.roles)
    }

    /// Remove a teacher from a school. A missing membership is a no-op.
    pub async fn remove_teacher(
        &self,
        caller: i32,
        school_id: i32,
        teacher_id: i32,
    ) -> AppResult<()> {
        self.school_repo
            .find_active_by_id(school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Teacher,
            Action::Delete,
            Domain::School(school_id),
        )?;

        if let Some(roles) = self
            .school_repo
            .deactivate_membership(teacher_id, school_id)
            .await?
        {
            for role in roles {
                if let Ok(role) = Role::from_str(&role) {
                    self.authz.revoke(teacher_id, role, Domain::School(school_id));
                }
            }
        }

        Ok(())
    }
}

fn validate_school_roles(roles: Vec<String>) -> AppResult<Vec<String>> {
    if roles.is_empty() {
        return Err(AppError::Validation(
            "At least one role is required".to_string(),
        ));
    }
    for role in &roles {
        if !SCHOOL_ROLES.contains(&role.as_str()) {
            return Err(AppError::Validation(format!(
                "Role {} cannot be granted at the school level",
                role
            )));
        }
    }
    let mut roles = roles;
    roles.sort();
    roles.dedup();
    Ok(roles)
}
