//! Subscription plans and the limits/features they unlock.
//!
//! The catalog is static. The current plan is the newest active subscription row
//! that has not expired; with no such row the shop is on the free plan.

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        bill, customer, product,
        subscription::{self, PlanTier, SubscriptionStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Plan-gated capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Rentals,
    Bookings,
    Reports,
}

impl Feature {
    fn label(&self) -> &'static str {
        match self {
            Feature::Rentals => "Rental billing",
            Feature::Bookings => "The booking calendar",
            Feature::Reports => "Sales reports",
        }
    }
}

/// Counted resources with a per-plan ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Customers,
    Products,
    MonthlyBills,
}

impl Limit {
    fn label(&self) -> &'static str {
        match self {
            Limit::Customers => "customers",
            Limit::Products => "products",
            Limit::MonthlyBills => "bills this month",
        }
    }
}

/// `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlanLimits {
    pub max_customers: Option<u64>,
    pub max_products: Option<u64>,
    pub max_bills_per_month: Option<u64>,
}

impl PlanLimits {
    pub fn get(&self, limit: Limit) -> Option<u64> {
        match limit {
            Limit::Customers => self.max_customers,
            Limit::Products => self.max_products,
            Limit::MonthlyBills => self.max_bills_per_month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlanDefinition {
    pub tier: PlanTier,
    pub name: String,
    pub limits: PlanLimits,
    pub features: Vec<Feature>,
}

impl PlanDefinition {
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                tier,
                name: "Free".to_string(),
                limits: PlanLimits {
                    max_customers: Some(50),
                    max_products: Some(50),
                    max_bills_per_month: Some(100),
                },
                features: vec![],
            },
            PlanTier::Basic => Self {
                tier,
                name: "Basic".to_string(),
                limits: PlanLimits {
                    max_customers: Some(500),
                    max_products: Some(500),
                    max_bills_per_month: Some(1000),
                },
                features: vec![Feature::Rentals],
            },
            PlanTier::Pro => Self {
                tier,
                name: "Pro".to_string(),
                limits: PlanLimits {
                    max_customers: None,
                    max_products: None,
                    max_bills_per_month: None,
                },
                features: vec![Feature::Rentals, Feature::Bookings, Feature::Reports],
            },
        }
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Cheapest tier that includes `feature`
    fn minimum_tier_for(feature: Feature) -> PlanTier {
        plan_catalog()
            .into_iter()
            .find(|plan| plan.has_feature(feature))
            .map(|plan| plan.tier)
            .unwrap_or(PlanTier::Pro)
    }
}

/// All plans, cheapest first
pub fn plan_catalog() -> Vec<PlanDefinition> {
    [PlanTier::Free, PlanTier::Basic, PlanTier::Pro]
        .into_iter()
        .map(PlanDefinition::for_tier)
        .collect()
}

/// Rejects a create when `current` already reached the plan ceiling
pub fn check_limit(plan: &PlanDefinition, limit: Limit, current: u64) -> Result<(), ServiceError> {
    match plan.limits.get(limit) {
        Some(max) if current >= max => Err(ServiceError::PlanLimitReached(format!(
            "The {} plan allows at most {} {}; upgrade to add more",
            plan.name,
            max,
            limit.label()
        ))),
        _ => Ok(()),
    }
}

pub fn check_feature(plan: &PlanDefinition, feature: Feature) -> Result<(), ServiceError> {
    if plan.has_feature(feature) {
        return Ok(());
    }
    let needed = PlanDefinition::for_tier(PlanDefinition::minimum_tier_for(feature));
    Err(ServiceError::UpgradeRequired(format!(
        "{} is not included in the {} plan; upgrade to {} or higher",
        feature.label(),
        plan.name,
        needed.name
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlanUsage {
    pub customers: u64,
    pub products: u64,
    pub bills_this_month: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionOverview {
    pub plan: PlanDefinition,
    /// `None` when running on the implicit free plan
    pub subscription_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage: PlanUsage,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePlanInput {
    pub plan: PlanTier,
    /// Length of the paid period; ignored for the free plan
    #[validate(range(min = 1, max = 36))]
    pub months: Option<u32>,
}

pub(crate) fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    super::start_of_day(first)
}

/// Resolves the current plan and enforces its limits
#[derive(Debug, Clone)]
pub struct PlanService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl PlanService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    async fn current_subscription<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Option<subscription::Model>, ServiceError> {
        let now = Utc::now();
        let latest = subscription::Entity::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
            .order_by_desc(subscription::Column::StartedAt)
            .one(conn)
            .await?;
        Ok(latest.filter(|sub| sub.is_current(now)))
    }

    /// Plan in force right now
    pub async fn current_plan<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<PlanDefinition, ServiceError> {
        let tier = self
            .current_subscription(conn)
            .await?
            .map(|sub| sub.plan)
            .unwrap_or(PlanTier::Free);
        Ok(PlanDefinition::for_tier(tier))
    }

    async fn count<C: ConnectionTrait>(&self, conn: &C, limit: Limit) -> Result<u64, ServiceError> {
        let count = match limit {
            Limit::Customers => customer::Entity::find().count(conn).await?,
            Limit::Products => {
                product::Entity::find()
                    .filter(product::Column::IsActive.eq(true))
                    .count(conn)
                    .await?
            }
            Limit::MonthlyBills => {
                bill::Entity::find()
                    .filter(bill::Column::CreatedAt.gte(start_of_month(Utc::now())))
                    .count(conn)
                    .await?
            }
        };
        Ok(count)
    }

    /// Fails with `PLAN_LIMIT_REACHED` when one more `limit` item would exceed the plan
    pub async fn ensure_capacity<C: ConnectionTrait>(
        &self,
        conn: &C,
        limit: Limit,
    ) -> Result<(), ServiceError> {
        let plan = self.current_plan(conn).await?;
        if plan.limits.get(limit).is_none() {
            return Ok(());
        }
        let current = self.count(conn, limit).await?;
        check_limit(&plan, limit, current)
    }

    /// Fails with `UPGRADE_REQUIRED` unless the plan includes `feature`
    pub async fn ensure_feature<C: ConnectionTrait>(
        &self,
        conn: &C,
        feature: Feature,
    ) -> Result<(), ServiceError> {
        let plan = self.current_plan(conn).await?;
        check_feature(&plan, feature)
    }

    pub async fn usage(&self) -> Result<PlanUsage, ServiceError> {
        let db = &*self.db;
        Ok(PlanUsage {
            customers: self.count(db, Limit::Customers).await?,
            products: self.count(db, Limit::Products).await?,
            bills_this_month: self.count(db, Limit::MonthlyBills).await?,
        })
    }

    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<SubscriptionOverview, ServiceError> {
        let current = self.current_subscription(&*self.db).await?;
        let usage = self.usage().await?;

        Ok(match current {
            Some(sub) => SubscriptionOverview {
                plan: PlanDefinition::for_tier(sub.plan),
                subscription_id: Some(sub.id),
                status: sub.status,
                started_at: Some(sub.started_at),
                expires_at: sub.expires_at,
                usage,
            },
            None => SubscriptionOverview {
                plan: PlanDefinition::for_tier(PlanTier::Free),
                subscription_id: None,
                status: SubscriptionStatus::Active,
                started_at: None,
                expires_at: None,
                usage,
            },
        })
    }

    /// Cancels the active subscription and starts a new one
    #[instrument(skip(self))]
    pub async fn change_plan(
        &self,
        input: ChangePlanInput,
        actor: Uuid,
    ) -> Result<SubscriptionOverview, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let expires_at = match input.plan {
            PlanTier::Free => None,
            _ => {
                let months = input.months.unwrap_or(1);
                Some(
                    now.checked_add_months(Months::new(months))
                        .unwrap_or(now + Duration::days(30 * i64::from(months))),
                )
            }
        };

        let txn = self.db.begin().await?;
        let previous = self
            .current_subscription(&txn)
            .await?
            .map(|sub| sub.plan)
            .unwrap_or(PlanTier::Free);

        subscription::Entity::update_many()
            .col_expr(
                subscription::Column::Status,
                sea_orm::sea_query::Expr::value(SubscriptionStatus::Cancelled),
            )
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
            .exec(&txn)
            .await?;

        subscription::ActiveModel {
            id: Set(Uuid::new_v4()),
            plan: Set(input.plan),
            status: Set(SubscriptionStatus::Active),
            started_at: Set(now),
            expires_at: Set(expires_at),
            created_by: Set(Some(actor)),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(from = ?previous, to = ?input.plan, "Subscription plan changed");
        metrics::counter!("shopdesk.plan_changes.total", 1);
        self.events
            .emit(Event::PlanChanged {
                from: previous,
                to: input.plan,
            })
            .await;

        self.overview().await
    }
}
