pub mod admins;
pub mod auth;
pub mod bills;
pub mod bookings;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod plans;
pub mod products;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthService;
use crate::cache::InMemoryCache;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    admins::AdminService, bills::BillService, bookings::BookingService,
    customers::CustomerService, dashboard::DashboardService, plans::PlanService,
    products::ProductService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub admins: Arc<AdminService>,
    pub customers: Arc<CustomerService>,
    pub products: Arc<ProductService>,
    pub bills: Arc<BillService>,
    pub bookings: Arc<BookingService>,
    pub plans: Arc<PlanService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: EventSender,
        auth: Arc<AuthService>,
        cache: InMemoryCache,
    ) -> Self {
        let plans = Arc::new(PlanService::new(db.clone(), event_sender.clone()));

        Self {
            admins: Arc::new(AdminService::new(db.clone(), auth)),
            customers: Arc::new(CustomerService::new(
                db.clone(),
                plans.clone(),
                event_sender.clone(),
                cache.clone(),
            )),
            products: Arc::new(ProductService::new(
                db.clone(),
                plans.clone(),
                event_sender.clone(),
                cache.clone(),
                config.low_stock_alerts,
            )),
            bills: Arc::new(BillService::new(
                db.clone(),
                plans.clone(),
                event_sender.clone(),
                cache.clone(),
                config.tax_rate(),
                config.low_stock_alerts,
            )),
            bookings: Arc::new(BookingService::new(
                db.clone(),
                plans.clone(),
                event_sender,
                cache.clone(),
            )),
            dashboard: Arc::new(DashboardService::new(
                db,
                plans.clone(),
                cache,
                Duration::from_secs(config.dashboard_cache_ttl_secs),
            )),
            plans,
        }
    }
}
