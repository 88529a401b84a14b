//! Wire types for the admin API

pub mod auth;
pub mod envelope;
pub mod pagination;
pub mod plan;
pub mod role;
pub mod tenant;
pub mod ticket;
mod timestamp;
pub mod user;

pub use auth::{LoginRequest, LoginResponse, RefreshRequest, TokenPair};
pub use envelope::{ApiEnvelope, FieldError};
pub use pagination::{ListQuery, Paginated};
pub use plan::{BillingCycle, CreatePlanRequest, Plan, UpdatePlanRequest};
pub use role::{Permission, Role, RoleRequest};
pub use tenant::{CreateTenantRequest, Tenant, TenantStatus, UpdateTenantRequest};
pub use ticket::{CreateTicketRequest, Ticket, TicketPriority, TicketReply, TicketStatus};
pub use user::{CreateUserRequest, UpdateUserRequest, User};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_deserializes_numeric_price() {
        let plan: Plan = serde_json::from_value(json!({
            "id": "plan_basic",
            "name": "Basic",
            "price": 29.99,
            "billing_cycle": "monthly",
            "features": ["1 register", "email support"]
        }))
        .unwrap();

        assert_eq!(plan.price.to_string(), "29.99");
        assert_eq!(plan.billing_cycle, BillingCycle::Monthly);
        assert!(plan.is_active);
    }

    #[test]
    fn test_ticket_status_wire_names() {
        let ticket: Ticket = serde_json::from_value(json!({
            "id": "t1",
            "subject": "Printer offline",
            "status": "in_progress"
        }))
        .unwrap();

        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert_eq!(
            serde_json::to_value(TicketStatus::InProgress).unwrap(),
            json!("in_progress")
        );
    }

    #[test]
    fn test_user_display_name_falls_back_to_email() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "email": "owner@bakery.test"
        }))
        .unwrap();
        assert_eq!(user.display_name(), "owner@bakery.test");
        assert!(user.is_active);
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let update = UpdateTenantRequest {
            plan_id: Some("plan_pro".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({ "plan_id": "plan_pro" })
        );
    }
}
