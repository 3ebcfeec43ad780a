use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the bearer token scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
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

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ShopDesk API",
        version = "0.3.0",
        description = r#"
# ShopDesk API

Back office for a single shop: customers, products and stock, sale and rental bills,
bookings, plan limits and a dashboard.

## Authentication

Run `POST /api/v1/auth/setup` once to create the owner account, then sign in with
`POST /api/v1/auth/login` and send the returned token on every other request:

```
Authorization: Bearer <token>
```

## Bills

Sale and rental bills are numbered independently. `GET /api/v1/bills/next-serial`
previews the number the next bill of a type will receive.

## Errors

```json
{
  "error": "Conflict",
  "code": "INSUFFICIENT_STOCK",
  "message": "Only 2 units of SKU-1 left",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-12-09T10:30:00.000Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Setup, sign-in and sessions"),
        (name = "admins", description = "Back-office accounts (owner only)"),
        (name = "customers", description = "Customer records"),
        (name = "products", description = "Catalog and stock"),
        (name = "bills", description = "Sale and rental bills"),
        (name = "bookings", description = "Calendar bookings"),
        (name = "plans", description = "Plans and the shop subscription"),
        (name = "dashboard", description = "Summary numbers and reports"),
        (name = "health", description = "Health probes")
    ),
    paths(
        crate::health::health_check,

        crate::handlers::auth::setup,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::auth::change_password,

        crate::handlers::admins::list_admins,
        crate::handlers::admins::create_admin,
        crate::handlers::admins::update_admin,

        crate::handlers::customers::create_customer,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::customer_bills,

        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::low_stock_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::restock_product,
        crate::handlers::products::adjust_stock,
        crate::handlers::products::stock_history,

        crate::handlers::bills::create_bill,
        crate::handlers::bills::list_bills,
        crate::handlers::bills::next_serial,
        crate::handlers::bills::get_bill,
        crate::handlers::bills::record_payment,
        crate::handlers::bills::return_rental,
        crate::handlers::bills::void_bill,

        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::list_bookings,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::update_booking,
        crate::handlers::bookings::update_booking_status,
        crate::handlers::bookings::delete_booking,

        crate::handlers::plans::list_plans,
        crate::handlers::plans::get_subscription,
        crate::handlers::plans::change_subscription,

        crate::handlers::dashboard::dashboard,
        crate::handlers::dashboard::sales_report,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::health::HealthInfo,

            // Enums
            crate::entities::admin::AdminRole,
            crate::entities::bill::BillType,
            crate::entities::bill::PaymentStatus,
            crate::entities::booking::BookingStatus,
            crate::entities::stock_history::StockChangeType,
            crate::entities::subscription::PlanTier,
            crate::entities::subscription::SubscriptionStatus,

            // Auth and admins
            crate::auth::IssuedToken,
            crate::services::admins::AuthSession,
            crate::services::admins::AdminResponse,
            crate::services::admins::CreateAdminInput,
            crate::services::admins::LoginInput,
            crate::services::admins::UpdateAdminInput,
            crate::services::admins::ChangePasswordInput,

            // Customers
            crate::services::customers::CustomerResponse,
            crate::services::customers::CreateCustomerInput,
            crate::services::customers::UpdateCustomerInput,

            // Products
            crate::services::products::ProductResponse,
            crate::services::products::CreateProductInput,
            crate::services::products::UpdateProductInput,
            crate::services::products::RestockInput,
            crate::services::products::AdjustStockInput,
            crate::services::products::StockHistoryResponse,
            crate::services::products::StockMovementResponse,

            // Bills
            crate::services::bills::BillResponse,
            crate::services::bills::BillItemResponse,
            crate::services::bills::CreateBillInput,
            crate::services::bills::BillItemInput,
            crate::services::bills::RecordPaymentInput,
            crate::services::bills::NextSerialResponse,

            // Bookings
            crate::services::bookings::BookingResponse,
            crate::services::bookings::CreateBookingInput,
            crate::services::bookings::UpdateBookingInput,
            crate::services::bookings::UpdateBookingStatusInput,

            // Plans and dashboard
            crate::services::plans::PlanDefinition,
            crate::services::plans::PlanLimits,
            crate::services::plans::PlanUsage,
            crate::services::plans::Feature,
            crate::services::plans::SubscriptionOverview,
            crate::services::plans::ChangePlanInput,
            crate::services::dashboard::DashboardSummary,
            crate::services::dashboard::DailySales,
            crate::services::dashboard::SalesReport,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_shop_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("ShopDesk API"));
        assert!(json.contains("/api/v1/bills/next-serial"));
        assert!(json.contains("/api/v1/bookings/{id}/status"));
        assert!(json.contains("bearer_auth"));
    }
}
