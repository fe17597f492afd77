pub mod auth;
pub mod departments;
pub mod files;
pub mod leave;
pub mod notifications;
pub mod payroll;
pub mod projects;
pub mod reports;
pub mod settings;
pub mod tasks;
pub mod timesheets;
pub mod users;

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// Visibility scope for department-structured lists: which user and/or
/// department a list query may be narrowed to for the caller's role.
#[derive(Debug, PartialEq, Eq)]
pub struct ListScope {
    pub user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
}

/// Employees see their own records; managers and leads their department;
/// admins whatever they ask for.
pub fn list_scope(
    current: &CurrentUser,
    requested_user: Option<Uuid>,
    requested_department: Option<Uuid>,
) -> Result<ListScope, ApiError> {
    match current.role {
        Role::Admin => Ok(ListScope {
            user_id: requested_user,
            department_id: requested_department,
        }),
        Role::Manager | Role::Lead => {
            let department = current
                .department_id
                .ok_or_else(|| ApiError::forbidden("No department assigned"))?;
            Ok(ListScope {
                user_id: requested_user,
                department_id: Some(department),
            })
        }
        Role::Employee => Ok(ListScope {
            user_id: Some(current.id),
            department_id: None,
        }),
    }
}

pub fn ensure_admin(current: &CurrentUser) -> Result<(), ApiError> {
    if current.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator access required"))
    }
}

/// Check that the caller may review records owned by `owner_id`: admins
/// always, managers and leads only within their own department.
pub async fn ensure_can_review(
    pool: &PgPool,
    current: &CurrentUser,
    owner_id: Uuid,
) -> Result<(), ApiError> {
    if !current.role.can_review() {
        return Err(ApiError::forbidden("Reviewer access required"));
    }
    if current.role.is_admin() {
        return Ok(());
    }

    let department = current
        .department_id
        .ok_or_else(|| ApiError::forbidden("No department assigned"))?;

    let owner_department: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT department_id FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;

    match owner_department.flatten() {
        Some(d) if d == department => Ok(()),
        _ => Err(ApiError::forbidden("Record is outside your department")),
    }
}

/// True when the caller may read a record owned by `owner_id` in
/// `owner_department`
pub fn can_view_record(
    current: &CurrentUser,
    owner_id: Uuid,
    owner_department: Option<Uuid>,
) -> bool {
    if current.id == owner_id || current.role.is_admin() {
        return true;
    }
    current.role.can_review()
        && current.department_id.is_some()
        && current.department_id == owner_department
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, department: Option<Uuid>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
            department_id: department,
        }
    }

    #[test]
    fn employees_are_scoped_to_themselves() {
        let current = user(Role::Employee, Some(Uuid::new_v4()));
        let scope = list_scope(&current, Some(Uuid::new_v4()), Some(Uuid::new_v4())).unwrap();
        assert_eq!(scope.user_id, Some(current.id));
        assert_eq!(scope.department_id, None);
    }

    #[test]
    fn managers_are_scoped_to_their_department() {
        let dept = Uuid::new_v4();
        let current = user(Role::Manager, Some(dept));
        let other_dept = Uuid::new_v4();
        let scope = list_scope(&current, None, Some(other_dept)).unwrap();
        assert_eq!(scope.department_id, Some(dept));
    }

    #[test]
    fn managers_without_department_are_rejected() {
        let current = user(Role::Lead, None);
        assert!(list_scope(&current, None, None).is_err());
    }

    #[test]
    fn admins_get_what_they_ask_for() {
        let current = user(Role::Admin, None);
        let target_user = Uuid::new_v4();
        let target_dept = Uuid::new_v4();
        let scope = list_scope(&current, Some(target_user), Some(target_dept)).unwrap();
        assert_eq!(scope.user_id, Some(target_user));
        assert_eq!(scope.department_id, Some(target_dept));
    }

    #[test]
    fn record_visibility_rules() {
        let dept = Uuid::new_v4();
        let owner = Uuid::new_v4();

        let admin = user(Role::Admin, None);
        assert!(can_view_record(&admin, owner, Some(dept)));

        let lead = user(Role::Lead, Some(dept));
        assert!(can_view_record(&lead, owner, Some(dept)));
        assert!(!can_view_record(&lead, owner, Some(Uuid::new_v4())));
        assert!(!can_view_record(&lead, owner, None));

        let employee = user(Role::Employee, Some(dept));
        assert!(!can_view_record(&employee, owner, Some(dept)));
        assert!(can_view_record(&employee, employee.id, None));
    }
}
