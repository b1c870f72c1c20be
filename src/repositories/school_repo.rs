use sqlx::PgPool;

use crate::models::school::{School, TeacherSchool};
use crate::utils::error::AppResult;

pub struct SchoolRepository {
    pool: PgPool,
}

impl SchoolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<School>> {
        let school = sqlx::query_as::<_, School>(
            r#"
            SELECT * FROM schools WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(school)
    }

    pub async fn find_active_by_id(&self, id: i32) -> AppResult<Option<School>> {
        let school = sqlx::query_as::<_, School>(
            r#"
            SELECT s.* FROM schools s
            JOIN organizations o ON o.id = s.organization_id
            WHERE s.id = $1 AND s.is_active AND o.is_active
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(school)
    }

    pub async fn find_active_by_ids(&self, ids: &[i32]) -> AppResult<Vec<School>> {
        let schools = sqlx::query_as::<_, School>(
            r#"
            SELECT s.* FROM schools s
            JOIN organizations o ON o.id = s.organization_id
            WHERE s.id = ANY($1) AND s.is_active AND o.is_active
            ORDER BY s.id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(schools)
    }

    pub async fn list_by_organization(&self, organization_id: i32) -> AppResult<Vec<School>> {
        let schools = sqlx::query_as::<_, School>(
            r#"
            SELECT * FROM schools
            WHERE organization_id = $1 AND is_active
            ORDER BY id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(schools)
    }

    pub async fn create_school(&self, organization_id: i32, name: &str) -> AppResult<School> {
        let school = sqlx::query_as::<_, School>(
            r#"
            INSERT INTO schools (organization_id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(school)
    }

    pub async fn update_school(&self, id: i32, name: Option<&str>) -> AppResult<School> {
        let school = sqlx::query_as::<_, School>(
            r#"
            UPDATE schools
            SET name = COALESCE($2, name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(school)
    }

    /// Soft-delete the school and everything scoped under it, in one
    /// transaction. Classrooms keep existing; only the link row goes.
    pub async fn soft_delete_cascade(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE schools SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE teacher_schools SET is_active = FALSE, updated_at = NOW() WHERE school_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM classroom_schools WHERE school_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_membership(
        &self,
        teacher_id: i32,
        school_id: i32,
    ) -> AppResult<Option<TeacherSchool>> {
        let membership = sqlx::query_as::<_, TeacherSchool>(
            r#"
            SELECT * FROM teacher_schools
            WHERE teacher_id = $1 AND school_id = $2
            "#,
        )
        .bind(teacher_id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    /// Insert or extend a school membership. Union semantics: an existing
    /// active row keeps its roles and gains the new ones.
    pub async fn upsert_membership(
        &self,
        teacher_id: i32,
        school_id: i32,
        roles: &[String],
    ) -> AppResult<TeacherSchool> {
        let membership = sqlx::query_as::<_, TeacherSchool>(
            r#"
            INSERT INTO teacher_schools (teacher_id, school_id, roles)
            VALUES ($1, $2, $3)
            ON CONFLICT (teacher_id, school_id)
            DO UPDATE SET
                roles = (
                    SELECT ARRAY(
                        SELECT DISTINCT r FROM unnest(
                            CASE WHEN teacher_schools.is_active
                                 THEN teacher_schools.roles || EXCLUDED.roles
                                 ELSE EXCLUDED.roles
                            END
                        ) AS r
                        ORDER BY r
                    )
                ),
                is_active = TRUE,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(teacher_id)
        .bind(school_id)
        .bind(roles)
        .fetch_one(&self.pool)
        .await?;

        Ok(membership)
    }

    /// Replace the role set of an existing membership.
    pub async fn replace_membership_roles(
        &self,
        teacher_id: i32,
        school_id: i32,
        roles: &[String],
    ) -> AppResult<Option<TeacherSchool>> {
        let membership = sqlx::query_as::<_, TeacherSchool>(
            r#"
            UPDATE teacher_schools
            SET roles = $3, updated_at = NOW()
            WHERE teacher_id = $1 AND school_id = $2 AND is_active
            RETURNING *
            "#,
        )
        .bind(teacher_id)
        .bind(school_id)
        .bind(roles)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    pub async fn deactivate_membership(
        &self,
        teacher_id: i32,
        school_id: i32,
    ) -> AppResult<Option<Vec<String>>> {
        let roles: Option<(Vec<String>,)> = sqlx::query_as(
            r#"
            UPDATE teacher_schools
            SET is_active = FALSE, updated_at = NOW()
            WHERE teacher_id = $1 AND school_id = $2 AND is_active
            RETURNING roles
            "#,
        )
        .bind(teacher_id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(roles.map(|(r,)| r))
    }

    /// Active memberships joined with teacher display fields, for listings.
    pub async fn list_teachers(
        &self,
        school_id: i32,
    ) -> AppResult<Vec<(i32, String, String, Vec<String>)>> {
        let rows: Vec<(i32, String, String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT t.id, t.name, t.email, m.roles
            FROM teacher_schools m
            JOIN teachers t ON t.id = m.teacher_id
            WHERE m.school_id = $1 AND m.is_active AND t.is_active
            ORDER BY t.id
            "#,
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
