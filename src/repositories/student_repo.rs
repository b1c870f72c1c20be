use sqlx::PgPool;

use crate::models::student::Student;
use crate::utils::error::AppResult;

pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students WHERE id = $1 AND is_active
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    pub async fn find_by_classroom_and_name(
        &self,
        classroom_id: i32,
        name: &str,
    ) -> AppResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students
            WHERE classroom_id = $1 AND name = $2 AND is_active
            "#,
        )
        .bind(classroom_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

}
