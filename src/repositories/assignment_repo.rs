use sqlx::PgPool;

use crate::models::assignment::{Assignment, Content, ContentItem};
use crate::utils::error::AppResult;

pub struct AssignmentRepository {
    pool: PgPool,
}

impl AssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(
            r#"
            SELECT * FROM assignments WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    pub async fn create_assignment(
        &self,
        teacher_id: i32,
        classroom_id: i32,
        title: &str,
        content_ids: &[i32],
    ) -> AppResult<Assignment> {
        let mut tx = self.pool.begin().await?;

        let assignment = sqlx::query_as::<_, Assignment>(
            r#"
            INSERT INTO assignments (teacher_id, classroom_id, title)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(teacher_id)
        .bind(classroom_id)
        .bind(title)
        .fetch_one(&mut *tx)
        .await?;

        for (order_index, content_id) in content_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO assignment_contents (assignment_id, content_id, order_index)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(assignment.id)
            .bind(content_id)
            .bind(order_index as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(assignment)
    }

    pub async fn list_contents(&self, assignment_id: i32) -> AppResult<Vec<Content>> {
        let contents = sqlx::query_as::<_, Content>(
            r#"
            SELECT c.* FROM contents c
            JOIN assignment_contents ac ON ac.content_id = c.id
            WHERE ac.assignment_id = $1
            ORDER BY ac.order_index
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contents)
    }

    pub async fn list_content_items(&self, content_id: i32) -> AppResult<Vec<ContentItem>> {
        let items = sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT * FROM content_items
            WHERE content_id = $1
            ORDER BY order_index
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Materialize progress rows for every active student in the
    /// assignment's classroom: one StudentAssignment, one content-progress
    /// row per content, one item-progress row per content item. A student
    /// already holding the assignment is skipped.
    pub async fn issue_to_classroom(&self, assignment_id: i32) -> AppResult<i64> {
        let mut tx = self.pool.begin().await?;

        let student_ids: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT s.id FROM students s
            JOIN assignments a ON a.classroom_id = s.classroom_id
            WHERE a.id = $1 AND s.is_active
            ORDER BY s.id
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut issued = 0i64;
        for (student_id,) in student_ids {
            let sa_id: Option<(i32,)> = sqlx::query_as(
                r#"
                INSERT INTO student_assignments (student_id, assignment_id)
                VALUES ($1, $2)
                ON CONFLICT (student_id, assignment_id) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(student_id)
            .bind(assignment_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((sa_id,)) = sa_id else {
                continue;
            };

            sqlx::query(
                r#"
                INSERT INTO student_content_progress (student_assignment_id, content_id, order_index)
                SELECT $1, ac.content_id, ac.order_index
                FROM assignment_contents ac
                WHERE ac.assignment_id = $2
                "#,
            )
            .bind(sa_id)
            .bind(assignment_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO student_item_progress (student_assignment_id, content_item_id)
                SELECT $1, ci.id
                FROM assignment_contents ac
                JOIN content_items ci ON ci.content_id = ac.content_id
                WHERE ac.assignment_id = $2
                ORDER BY ac.order_index, ci.order_index
                "#,
            )
            .bind(sa_id)
            .bind(assignment_id)
            .execute(&mut *tx)
            .await?;

            issued += 1;
        }

        tx.commit().await?;
        Ok(issued)
    }
}
