use crate::config::Config;
use crate::dto::auth_dto::{AuthResponse, PrincipalResponse};
use crate::repositories::student_repo::StudentRepository;
use crate::repositories::teacher_repo::TeacherRepository;
use crate::utils::error::{AppError, AppResult};
use crate::utils::{jwt, password};

pub struct AuthService {
    teacher_repo: TeacherRepository,
    student_repo: StudentRepository,
    config: Config,
}

impl AuthService {
    pub fn new(
        teacher_repo: TeacherRepository,
        student_repo: StudentRepository,
        config: Config,
    ) -> Self {
        Self {
            teacher_repo,
            student_repo,
            config,
        }
    }

    pub async fn register_teacher(
        &self,
        email: &str,
        raw_password: &str,
        name: &str,
    ) -> AppResult<PrincipalResponse> {
        // Check if email already exists
        if self.teacher_repo.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = password::hash_password(raw_password)?;

        let teacher = self
            .teacher_repo
            .create_teacher(email, &password_hash, name)
            .await?;

        Ok(PrincipalResponse {
            id: teacher.id,
            role: "teacher".to_string(),
            name: teacher.name,
            email: Some(teacher.email),
        })
    }

    pub async fn login_teacher(&self, email: &str, raw_password: &str) -> AppResult<AuthResponse> {
        let teacher = self
            .teacher_repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !teacher.is_active {
            return Err(AppError::Authentication("Account is inactive".to_string()));
        }

        let is_valid = password::verify_password(raw_password, &teacher.password_hash)?;
        if !is_valid {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let access_token = jwt::generate_token(
            teacher.id,
            "teacher",
            teacher.name.clone(),
            Some(teacher.email.clone()),
            &self.config.jwt_secret,
            self.config.jwt_expiration_hours,
        )?;

        let refresh_token = jwt::generate_refresh_token(
            teacher.id,
            "teacher",
            teacher.name.clone(),
            Some(teacher.email.clone()),
            &self.config.jwt_secret,
        )?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_hours * 3600,
            principal: PrincipalResponse {
                id: teacher.id,
                role: "teacher".to_string(),
                name: teacher.name,
                email: Some(teacher.email),
            },
        })
    }

    pub async fn login_student(
        &self,
        classroom_id: i32,
        name: &str,
        raw_password: &str,
    ) -> AppResult<AuthResponse> {
        let student = self
            .student_repo
            .find_by_classroom_and_name(classroom_id, name)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        let is_valid = password::verify_password(raw_password, &student.password_hash)?;
        if !is_valid {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let access_token = jwt::generate_token(
            student.id,
            "student",
            student.name.clone(),
            None,
            &self.config.jwt_secret,
            self.config.jwt_expiration_hours,
        )?;

        let refresh_token = jwt::generate_refresh_token(
            student.id,
            "student",
            student.name.clone(),
            None,
            &self.config.jwt_secret,
        )?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_hours * 3600,
            principal: PrincipalResponse {
                id: student.id,
                role: "student".to_string(),
                name: student.name,
                email: None,
            },
        })
    }

    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> AppResult<crate::dto::auth_dto::RefreshTokenResponse> {
        let claims = jwt::verify_refresh_token(refresh_token, &self.config.jwt_secret)?;

        // The principal must still exist and be active.
        match claims.role.as_str() {
            "teacher" => {
                self.teacher_repo
                    .find_by_id(claims.sub)
                    .await?
                    .ok_or_else(|| AppError::Authentication("Account not found".to_string()))?;
            }
            "student" => {
                self.student_repo
                    .find_by_id(claims.sub)
                    .await?
                    .ok_or_else(|| AppError::Authentication("Account not found".to_string()))?;
            }
            _ => return Err(AppError::Authentication("Invalid token".to_string())),
        }

        let access_token = jwt::generate_token(
            claims.sub,
            &claims.role,
            claims.name,
            claims.email,
            &self.config.jwt_secret,
            self.config.jwt_expiration_hours,
        )?;

        Ok(crate::dto::auth_dto::RefreshTokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_hours * 3600,
        })
    }
}
