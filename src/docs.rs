use crate::api::chat::CreateBroadcast;
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::leave_allocation::{
    AllocationListResponse, AllocationMonth, AllocationPreviewRow, AllocationSummary,
    ProposedAllocation,
};
use crate::api::leave_application::{
    AskClarificationReq, CreateLeave, LeaveDetailResponse, LeaveFilter, LeaveListResponse,
    ReplyReq, UpdateLeave,
};
use crate::api::payroll::{GenerateSlips, GenerateSummary, SlipListResponse};
use crate::api::report::{
    AttendanceReport, AttendanceReportRow, PurchaseReport, PurchaseReportRow, ReportColumn,
    SummaryCard,
};
use crate::leave_rules::{BalanceCheck, BalanceUnit, ProbationInfo};
use crate::model::chat::ChatQueueItem;
use crate::model::employee::Employee;
use crate::model::leave_allocation::LeaveAllocation;
use crate::model::leave_application::LeaveApplication;
use crate::model::salary_slip::SalarySlip;
use crate::workflow::clarification::{ClarificationButton, ClarificationRound};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LeaveDesk API",
        version = "1.0.0",
        description = r#"
## Leave Management Service

HR leave workflow with a multi-round clarification exchange, monthly leave
allocation scheduling, chat broadcasts and tabular reports.

### Key Features
- **Leave Applications**
  - Submit, approve/reject, balance and probation checks
  - Up to 5 HR question / employee reply clarification rounds per application
- **Leave Allocations**
  - Monthly preview and idempotent auto-allocation with Paid Leave carry-forward
- **Chat Broadcasts**
  - Queue-backed bulk messaging with background delivery
- **Reports**
  - Attendance gap analysis and purchase settlement

### Security
Protected endpoints use **JWT Bearer authentication**; HR/Admin roles gate
the approval side of the workflow.
"#,
    ),
    paths(
        crate::api::leave_application::create_leave,
        crate::api::leave_application::leave_list,
        crate::api::leave_application::get_leave,
        crate::api::leave_application::update_leave,
        crate::api::leave_application::approve_leave,
        crate::api::leave_application::reject_leave,
        crate::api::leave_application::ask_clarification,
        crate::api::leave_application::reply_clarification,
        crate::api::leave_application::leave_balance,
        crate::api::leave_application::probation_status,

        crate::api::leave_allocation::allocation_preview,
        crate::api::leave_allocation::auto_allocate,
        crate::api::leave_allocation::list_allocations,

        crate::api::chat::create_broadcast,
        crate::api::chat::send_broadcast,
        crate::api::chat::broadcast_queue,

        crate::api::report::attendance_report,
        crate::api::report::purchase_settlement_report,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,

        crate::api::payroll::generate_slips,
        crate::api::payroll::list_slips,
    ),
    components(
        schemas(
            LeaveApplication,
            LeaveAllocation,
            Employee,
            SalarySlip,
            ChatQueueItem,
            CreateLeave,
            UpdateLeave,
            LeaveFilter,
            LeaveListResponse,
            LeaveDetailResponse,
            AskClarificationReq,
            ReplyReq,
            ClarificationRound,
            ClarificationButton,
            BalanceCheck,
            BalanceUnit,
            ProbationInfo,
            AllocationMonth,
            AllocationPreviewRow,
            ProposedAllocation,
            AllocationSummary,
            AllocationListResponse,
            CreateBroadcast,
            CreateEmployee,
            EmployeeListResponse,
            GenerateSlips,
            GenerateSummary,
            SlipListResponse,
            AttendanceReport,
            AttendanceReportRow,
            PurchaseReport,
            PurchaseReportRow,
            ReportColumn,
            SummaryCard,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave application lifecycle"),
        (name = "Clarification", description = "HR/employee clarification exchange"),
        (name = "Leave Allocation", description = "Monthly allocation scheduling"),
        (name = "Chat", description = "Manual chat broadcasts"),
        (name = "Reports", description = "Tabular reports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
