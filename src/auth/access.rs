use serde::{Deserialize, Serialize};

/// Account roles, stored as text in the users table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Lead,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Lead => "lead",
            Role::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "lead" => Some(Role::Lead),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles allowed to approve/reject timesheets, leave and reports
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Lead)
    }

    /// Roles allowed to create and assign tasks and manage projects
    pub fn can_assign_work(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Lead)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static role -> API section table. The client shell renders its navigation
/// from this; route guards enforce the same boundaries server-side.
pub fn navigation_sections(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[
            "dashboard",
            "users",
            "departments",
            "projects",
            "timesheets",
            "approvals",
            "leave",
            "payroll",
            "tasks",
            "reports",
            "notifications",
            "settings",
        ],
        Role::Manager => &[
            "dashboard",
            "projects",
            "timesheets",
            "approvals",
            "leave",
            "tasks",
            "reports",
            "notifications",
        ],
        Role::Lead => &[
            "dashboard",
            "timesheets",
            "approvals",
            "leave",
            "tasks",
            "reports",
            "notifications",
        ],
        Role::Employee => &[
            "dashboard",
            "timesheets",
            "leave",
            "tasks",
            "reports",
            "notifications",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_round_trip() {
        for role in [Role::Admin, Role::Manager, Role::Lead, Role::Employee] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn only_reviewer_roles_can_review() {
        assert!(Role::Admin.can_review());
        assert!(Role::Manager.can_review());
        assert!(Role::Lead.can_review());
        assert!(!Role::Employee.can_review());
    }

    #[test]
    fn employees_do_not_see_admin_sections() {
        let sections = navigation_sections(Role::Employee);
        assert!(sections.contains(&"timesheets"));
        assert!(!sections.contains(&"users"));
        assert!(!sections.contains(&"settings"));
        assert!(!sections.contains(&"approvals"));
    }

    #[test]
    fn every_role_gets_a_dashboard() {
        for role in [Role::Admin, Role::Manager, Role::Lead, Role::Employee] {
            assert!(navigation_sections(role).contains(&"dashboard"));
        }
    }
}
