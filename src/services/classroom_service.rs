use std::sync::Arc;

use crate::authz::{Action, AuthzEngine, Domain, Resource};
use crate::models::classroom::Classroom;
use crate::models::school::ClassroomSchool;
use crate::repositories::classroom_repo::ClassroomRepository;
use crate::repositories::school_repo::SchoolRepository;
use crate::utils::error::{AppError, AppResult};

pub struct ClassroomService {
    classroom_repo: ClassroomRepository,
    school_repo: SchoolRepository,
    authz: Arc<AuthzEngine>,
}

impl ClassroomService {
    pub fn new(
        classroom_repo: ClassroomRepository,
        school_repo: SchoolRepository,
        authz: Arc<AuthzEngine>,
    ) -> Self {
        Self {
            classroom_repo,
            school_repo,
            authz,
        }
    }

    /// Link a classroom to a school. A classroom links to at most one
    /// school; a second link is a conflict until the first is removed.
    pub async fn link_to_school(
        &self,
        caller: i32,
        classroom_id: i32,
        school_id: i32,
    ) -> AppResult<ClassroomSchool> {
        let classroom = self
            .classroom_repo
            .find_by_id(classroom_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

        self.school_repo
            .find_active_by_id(school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        // Linking needs classroom management rights in the target school,
        // or ownership of the classroom itself.
        if classroom.teacher_id != caller {
            self.authz.require(
                caller,
                Resource::Classroom,
                Action::Create,
                Domain::School(school_id),
            )?;
        }

        self.classroom_repo
            .link_to_school(classroom_id, school_id)
            .await
    }

    pub async fn get_school_link(
        &self,
        caller: i32,
        classroom_id: i32,
    ) -> AppResult<ClassroomSchool> {
        let classroom = self
            .classroom_repo
            .find_by_id(classroom_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

        let link = self
            .classroom_repo
            .find_school_link(classroom_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Classroom is not linked to a school".to_string()))?;

        if classroom.teacher_id != caller {
            self.authz.require(
                caller,
                Resource::Classroom,
                Action::Read,
                Domain::School(link.school_id),
            )?;
        }

        Ok(link)
    }

    pub async fn unlink_from_school(&self, caller: i32, classroom_id: i32) -> AppResult<()> {
        let classroom = self
            .classroom_repo
            .find_by_id(classroom_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

        let link = self
            .classroom_repo
            .find_school_link(classroom_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Classroom is not linked to a school".to_string()))?;

        if classroom.teacher_id != caller {
            self.authz.require(
                caller,
                Resource::Classroom,
                Action::Delete,
                Domain::School(link.school_id),
            )?;
        }

        self.classroom_repo.unlink_from_school(classroom_id).await?;
        Ok(())
    }

    pub async fn list_by_school(&self, caller: i32, school_id: i32) -> AppResult<Vec<Classroom>> {
        self.school_repo
            .find_active_by_id(school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        self.authz.require(
            caller,
            Resource::Classroom,
            Action::Read,
            Domain::School(school_id),
        )?;

        self.classroom_repo.list_by_school(school_id).await
    }
}
