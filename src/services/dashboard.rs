use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc, time::Duration as StdDuration};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use crate::{
    cache::InMemoryCache,
    entities::{
        bill::{self, BillType},
        booking::{self, BookingStatus},
        customer, product,
    },
    errors::ServiceError,
    services::{
        money,
        plans::{start_of_month, Feature, PlanService},
        start_of_day,
    },
};

pub const DASHBOARD_CACHE_KEY: &str = "dashboard:summary";
const DEFAULT_REPORT_DAYS: i64 = 30;
const MAX_REPORT_DAYS: i64 = 366;
const UPCOMING_BOOKING_DAYS: i64 = 7;

/// Drops the cached summary after a write that changes its numbers
pub fn invalidate(cache: &InMemoryCache) {
    cache.delete(DASHBOARD_CACHE_KEY);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub customers: u64,
    pub active_products: u64,
    pub low_stock_products: u64,
    pub today_bills: u64,
    pub today_sales: Decimal,
    pub month_revenue: Decimal,
    pub outstanding_balance: Decimal,
    pub active_rentals: u64,
    pub overdue_rentals: u64,
    pub upcoming_bookings: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailySales {
    pub date: NaiveDate,
    pub sale_count: u64,
    pub sale_total: Decimal,
    pub rental_count: u64,
    pub rental_total: Decimal,
    pub collected: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalesReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub bill_count: u64,
    pub total: Decimal,
    pub collected: Decimal,
    pub days: Vec<DailySales>,
}

/// Resolves the report window: defaults to the last 30 days ending today
fn report_window(
    query: &SalesReportQuery,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ServiceError> {
    let to = query.to.unwrap_or(today);
    let from = query
        .from
        .unwrap_or(to - Duration::days(DEFAULT_REPORT_DAYS - 1));
    if from > to {
        return Err(ServiceError::ValidationError(
            "from must not be after to".to_string(),
        ));
    }
    if (to - from).num_days() + 1 > MAX_REPORT_DAYS {
        return Err(ServiceError::ValidationError(format!(
            "Reports cover at most {} days",
            MAX_REPORT_DAYS
        )));
    }
    Ok((from, to))
}

/// Folds `(bill_type, total, paid_amount, created_at)` rows into per-day buckets
fn group_by_day(rows: Vec<(BillType, Decimal, Decimal, DateTime<Utc>)>) -> Vec<DailySales> {
    let mut days: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();
    for (bill_type, total, paid, created_at) in rows {
        let date = created_at.date_naive();
        let day = days.entry(date).or_insert_with(|| DailySales {
            date,
            ..Default::default()
        });
        match bill_type {
            BillType::Sale => {
                day.sale_count += 1;
                day.sale_total += total;
            }
            BillType::Rental => {
                day.rental_count += 1;
                day.rental_total += total;
            }
        }
        day.collected += paid;
    }

    days.into_values()
        .map(|mut day| {
            day.sale_total = money(day.sale_total);
            day.rental_total = money(day.rental_total);
            day.collected = money(day.collected);
            day
        })
        .collect()
}

/// Headline numbers for the back-office home screen
#[derive(Debug, Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
    plans: Arc<PlanService>,
    cache: InMemoryCache,
    ttl: StdDuration,
}

impl DashboardService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        plans: Arc<PlanService>,
        cache: InMemoryCache,
        ttl: StdDuration,
    ) -> Self {
        Self {
            db,
            plans,
            cache,
            ttl,
        }
    }

    /// Cached summary, recomputed once the TTL lapses or a write invalidates it
    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        if let Some(cached) = self.cache.get_json::<DashboardSummary>(DASHBOARD_CACHE_KEY) {
            debug!("Dashboard summary served from cache");
            metrics::counter!("shopdesk.dashboard.cache_hits", 1);
            return Ok(cached);
        }

        let generation = self.cache.generation();
        let summary = self.compute_summary(Utc::now()).await?;
        match self
            .cache
            .set_json_if_fresh(DASHBOARD_CACHE_KEY, &summary, Some(self.ttl), generation)
        {
            Ok(true) => {}
            Ok(false) => debug!("Dashboard summary went stale while computing; not cached"),
            Err(e) => warn!(error = %e, "Failed to cache dashboard summary"),
        }
        Ok(summary)
    }

    async fn compute_summary(&self, now: DateTime<Utc>) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;
        let today = now.date_naive();
        let today_start = start_of_day(today);

        let customers = customer::Entity::find().count(db).await?;
        let active_products = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .count(db)
            .await?;
        let low_stock_products = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lte(Expr::col(product::Column::MinStockLevel)),
            )
            .count(db)
            .await?;

        let today_totals: Vec<Decimal> = bill::Entity::find()
            .select_only()
            .column(bill::Column::Total)
            .filter(bill::Column::CreatedAt.gte(today_start))
            .into_tuple()
            .all(db)
            .await?;
        let month_totals: Vec<Decimal> = bill::Entity::find()
            .select_only()
            .column(bill::Column::Total)
            .filter(bill::Column::CreatedAt.gte(start_of_month(now)))
            .into_tuple()
            .all(db)
            .await?;
        let open_balances: Vec<(Decimal, Decimal)> = bill::Entity::find()
            .select_only()
            .column(bill::Column::Total)
            .column(bill::Column::PaidAmount)
            .filter(bill::Column::PaymentStatus.ne(bill::PaymentStatus::Paid))
            .into_tuple()
            .all(db)
            .await?;

        let open_rentals = bill::Entity::find()
            .filter(bill::Column::BillType.eq(BillType::Rental))
            .filter(bill::Column::ReturnedAt.is_null());
        let active_rentals = open_rentals.clone().count(db).await?;
        let overdue_rentals = open_rentals
            .filter(bill::Column::RentalEnd.lt(today))
            .count(db)
            .await?;

        let upcoming_bookings = booking::Entity::find()
            .filter(
                booking::Column::Status.is_in([BookingStatus::Scheduled, BookingStatus::Confirmed]),
            )
            .filter(booking::Column::StartAt.gte(now))
            .filter(booking::Column::StartAt.lt(now + Duration::days(UPCOMING_BOOKING_DAYS)))
            .count(db)
            .await?;

        Ok(DashboardSummary {
            customers,
            active_products,
            low_stock_products,
            today_bills: today_totals.len() as u64,
            today_sales: money(today_totals.into_iter().sum()),
            month_revenue: money(month_totals.into_iter().sum()),
            outstanding_balance: money(
                open_balances
                    .into_iter()
                    .map(|(total, paid)| (total - paid).max(Decimal::ZERO))
                    .sum(),
            ),
            active_rentals,
            overdue_rentals,
            upcoming_bookings,
            generated_at: now,
        })
    }

    /// Per-day bill counts and totals, split by bill type
    #[instrument(skip(self))]
    pub async fn sales_report(&self, query: SalesReportQuery) -> Result<SalesReport, ServiceError> {
        self.plans.ensure_feature(&*self.db, Feature::Reports).await?;
        let (from, to) = report_window(&query, Utc::now().date_naive())?;

        let rows: Vec<(BillType, Decimal, Decimal, DateTime<Utc>)> = bill::Entity::find()
            .select_only()
            .column(bill::Column::BillType)
            .column(bill::Column::Total)
            .column(bill::Column::PaidAmount)
            .column(bill::Column::CreatedAt)
            .filter(bill::Column::CreatedAt.gte(start_of_day(from)))
            .filter(bill::Column::CreatedAt.lt(start_of_day(to) + Duration::days(1)))
            .into_tuple()
            .all(&*self.db)
            .await?;

        let bill_count = rows.len() as u64;
        let days = group_by_day(rows);
        let total = money(days.iter().map(|d| d.sale_total + d.rental_total).sum());
        let collected = money(days.iter().map(|d| d.collected).sum());

        Ok(SalesReport {
            from,
            to,
            bill_count,
            total,
            collected,
            days,
        })
    }
}
