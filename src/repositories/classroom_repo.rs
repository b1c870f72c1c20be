use sqlx::PgPool;

use crate::models::classroom::Classroom;
use crate::models::school::ClassroomSchool;
use crate::utils::error::{AppError, AppResult};

pub struct ClassroomRepository {
    pool: PgPool,
}

impl ClassroomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Classroom>> {
        let classroom = sqlx::query_as::<_, Classroom>(
            r#"
            SELECT * FROM classrooms WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(classroom)
    }

    pub async fn find_school_link(&self, classroom_id: i32) -> AppResult<Option<ClassroomSchool>> {
        let link = sqlx::query_as::<_, ClassroomSchool>(
            r#"
            SELECT * FROM classroom_schools WHERE classroom_id = $1
            "#,
        )
        .bind(classroom_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    pub async fn link_to_school(
        &self,
        classroom_id: i32,
        school_id: i32,
    ) -> AppResult<ClassroomSchool> {
        let link = sqlx::query_as::<_, ClassroomSchool>(
            r#"
            INSERT INTO classroom_schools (classroom_id, school_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(classroom_id)
        .bind(school_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Classroom is already linked to a school".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(link)
    }

    pub async fn unlink_from_school(&self, classroom_id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM classroom_schools WHERE classroom_id = $1")
            .bind(classroom_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_school(&self, school_id: i32) -> AppResult<Vec<Classroom>> {
        let classrooms = sqlx::query_as::<_, Classroom>(
            r#"
            SELECT c.* FROM classrooms c
            JOIN classroom_schools cs ON cs.classroom_id = c.id
            WHERE cs.school_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(classrooms)
    }
}
