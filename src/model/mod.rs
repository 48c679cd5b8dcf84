pub mod chat;
pub mod employee;
pub mod leave_allocation;
pub mod leave_application;
pub mod role;
pub mod salary_slip;
