use sqlx::PgPool;

use crate::models::organization::{Organization, TeacherOrganization};
use crate::utils::error::{AppError, AppResult};

pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT * FROM organizations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }

    pub async fn find_active_by_id(&self, id: i32) -> AppResult<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT * FROM organizations WHERE id = $1 AND is_active
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }

    pub async fn find_active_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Organization>> {
        let orgs = sqlx::query_as::<_, Organization>(
            r#"
            SELECT * FROM organizations
            WHERE id = ANY($1) AND is_active
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(orgs)
    }

    pub async fn create_organization(
        &self,
        name: &str,
        display_name: Option<&str>,
        settings: &serde_json::Value,
    ) -> AppResult<Organization> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, display_name, settings)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(display_name)
        .bind(settings)
        .fetch_one(&self.pool)
        .await?;

        Ok(org)
    }

    pub async fn update_organization(
        &self,
        id: i32,
        display_name: Option<&str>,
        settings: Option<&serde_json::Value>,
    ) -> AppResult<Organization> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET display_name = COALESCE($2, display_name),
                settings = COALESCE($3, settings),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(settings)
        .fetch_one(&self.pool)
        .await?;

        Ok(org)
    }

    /// Soft-delete the organization and cascade to every row whose parent
    /// becomes inactive. Classrooms survive; only their school link goes.
    /// One transaction, all or nothing.
    pub async fn soft_delete_cascade(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE organizations SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE teacher_organizations SET is_active = FALSE, updated_at = NOW()
             WHERE organization_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE teacher_schools SET is_active = FALSE, updated_at = NOW()
             WHERE school_id IN (SELECT id FROM schools WHERE organization_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM classroom_schools
             WHERE school_id IN (SELECT id FROM schools WHERE organization_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE schools SET is_active = FALSE, updated_at = NOW() WHERE organization_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Re-activate a soft-deleted organization together with its schools and
    /// membership rows, so stored role fields can be re-granted.
    pub async fn reactivate(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE organizations SET is_active = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE teacher_organizations SET is_active = TRUE, updated_at = NOW()
             WHERE organization_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE schools SET is_active = TRUE, updated_at = NOW() WHERE organization_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE teacher_schools SET is_active = TRUE, updated_at = NOW()
             WHERE school_id IN (SELECT id FROM schools WHERE organization_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_membership(
        &self,
        teacher_id: i32,
        organization_id: i32,
        role: &str,
    ) -> AppResult<Option<TeacherOrganization>> {
        let membership = sqlx::query_as::<_, TeacherOrganization>(
            r#"
            SELECT * FROM teacher_organizations
            WHERE teacher_id = $1 AND organization_id = $2 AND role = $3
            "#,
        )
        .bind(teacher_id)
        .bind(organization_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    /// Insert or re-activate an org membership row. The partial unique
    /// index on (organization_id) WHERE role='org_owner' AND is_active
    /// enforces the single-owner invariant at the storage layer.
    pub async fn upsert_membership(
        &self,
        teacher_id: i32,
        organization_id: i32,
        role: &str,
    ) -> AppResult<TeacherOrganization> {
        let membership = sqlx::query_as::<_, TeacherOrganization>(
            r#"
            INSERT INTO teacher_organizations (teacher_id, organization_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (teacher_id, organization_id, role)
            DO UPDATE SET is_active = TRUE, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(teacher_id)
        .bind(organization_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Organization already has an owner".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(membership)
    }

    pub async fn deactivate_membership(
        &self,
        teacher_id: i32,
        organization_id: i32,
    ) -> AppResult<Vec<String>> {
        let roles: Vec<(String,)> = sqlx::query_as(
            r#"
            UPDATE teacher_organizations
            SET is_active = FALSE, updated_at = NOW()
            WHERE teacher_id = $1 AND organization_id = $2 AND is_active
            RETURNING role
            "#,
        )
        .bind(teacher_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles.into_iter().map(|(r,)| r).collect())
    }

    pub async fn list_memberships(
        &self,
        organization_id: i32,
    ) -> AppResult<Vec<TeacherOrganization>> {
        let memberships = sqlx::query_as::<_, TeacherOrganization>(
            r#"
            SELECT * FROM teacher_organizations
            WHERE organization_id = $1 AND is_active
            ORDER BY id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    /// Active memberships joined with teacher display fields, for listings.
    pub async fn list_teachers(
        &self,
        organization_id: i32,
    ) -> AppResult<Vec<(i32, String, String, String)>> {
        let rows: Vec<(i32, String, String, String)> = sqlx::query_as(
            r#"
            SELECT t.id, t.name, t.email, m.role
            FROM teacher_organizations m
            JOIN teachers t ON t.id = m.teacher_id
            WHERE m.organization_id = $1 AND m.is_active AND t.is_active
            ORDER BY t.id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
