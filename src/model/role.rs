#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            _ => None,
        }
    }

    /// HR capability covers Admin as well.
    pub fn has_hr_capability(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }

    /// Only the employee role answers clarifications or edits the leave
    /// content of a submitted application.
    pub fn has_employee_capability(self) -> bool {
        self == Role::Employee
    }
}
