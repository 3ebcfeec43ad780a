use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::InMemoryCache,
    entities::{
        booking::{self, BookingStatus},
        customer, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        dashboard, normalize_string,
        plans::{Feature, PlanService},
        PageRequest,
    },
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBookingInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub customer_id: Option<Uuid>,
    /// Reserved item; overlapping bookings of the same product conflict
    pub product_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBookingInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub customer_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateBookingStatusInput {
    pub status: BookingStatus,
}

/// Calendar window; a booking matches when it overlaps `[from, to)`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
    pub customer_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: BookingStatus,
    pub customer_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<booking::Model> for BookingResponse {
    fn from(model: booking::Model) -> Self {
        Self {
            duration_minutes: (model.end_at - model.start_at).num_minutes(),
            id: model.id,
            title: model.title,
            notes: model.notes,
            start_at: model.start_at,
            end_at: model.end_at,
            status: model.status,
            customer_id: model.customer_id,
            product_id: model.product_id,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn ensure_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::ValidationError(
            "end_at must be after start_at".to_string(),
        ));
    }
    Ok(())
}

/// Calendar of appointments and product reservations
#[derive(Debug, Clone)]
pub struct BookingService {
    db: Arc<DatabaseConnection>,
    plans: Arc<PlanService>,
    events: EventSender,
    cache: InMemoryCache,
}

impl BookingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        plans: Arc<PlanService>,
        events: EventSender,
        cache: InMemoryCache,
    ) -> Self {
        Self {
            db,
            plans,
            events,
            cache,
        }
    }

    async fn ensure_references<C: ConnectionTrait>(
        conn: &C,
        customer_id: Option<Uuid>,
        product_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if let Some(id) = customer_id {
            customer::Entity::find_by_id(id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))?;
        }
        if let Some(id) = product_id {
            product::Entity::find_by_id(id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        }
        Ok(())
    }

    /// Rejects a non-cancelled booking of the same product overlapping `[start, end)`
    async fn ensure_slot_free<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = booking::Entity::find()
            .filter(booking::Column::ProductId.eq(product_id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
            .filter(booking::Column::StartAt.lt(end))
            .filter(booking::Column::EndAt.gt(start));
        if let Some(id) = except {
            query = query.filter(booking::Column::Id.ne(id));
        }

        if let Some(clash) = query.order_by_asc(booking::Column::StartAt).one(conn).await? {
            return Err(ServiceError::BookingConflict(format!(
                "Product is already booked for '{}' from {} to {}",
                clash.title,
                clash.start_at.to_rfc3339(),
                clash.end_at.to_rfc3339()
            )));
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<booking::Model, ServiceError> {
        booking::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", id)))
    }

    #[instrument(skip(self, input), fields(start_at = %input.start_at))]
    pub async fn create(
        &self,
        input: CreateBookingInput,
        actor: Option<Uuid>,
    ) -> Result<BookingResponse, ServiceError> {
        input.validate()?;
        ensure_interval(input.start_at, input.end_at)?;
        let status = input.status.unwrap_or(BookingStatus::Scheduled);

        let txn = self.db.begin().await?;
        self.plans.ensure_feature(&txn, Feature::Bookings).await?;
        Self::ensure_references(&txn, input.customer_id, input.product_id).await?;
        if let Some(product_id) = input.product_id {
            if status != BookingStatus::Cancelled {
                Self::ensure_slot_free(&txn, product_id, input.start_at, input.end_at, None)
                    .await?;
            }
        }

        let now = Utc::now();
        let model = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(input.customer_id),
            product_id: Set(input.product_id),
            title: Set(input.title.trim().to_string()),
            notes: Set(normalize_string(input.notes)),
            start_at: Set(input.start_at),
            end_at: Set(input.end_at),
            status: Set(status),
            created_by: Set(actor),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(booking_id = %model.id, "Booking created");
        metrics::counter!("shopdesk.bookings.created", 1);
        self.events
            .emit(Event::BookingCreated {
                booking_id: model.id,
                start_at: model.start_at,
            })
            .await;
        dashboard::invalidate(&self.cache);

        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<BookingResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    /// Bookings overlapping the window, earliest first
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<BookingResponse>, ServiceError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            ensure_interval(from, to)?;
        }

        let mut query = booking::Entity::find();
        if let Some(from) = filter.from {
            query = query.filter(booking::Column::EndAt.gt(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(booking::Column::StartAt.lt(to));
        }
        if let Some(status) = filter.status {
            query = query.filter(booking::Column::Status.eq(status));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(booking::Column::CustomerId.eq(customer_id));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(booking::Column::ProductId.eq(product_id));
        }

        let paginator = query
            .order_by_asc(booking::Column::StartAt)
            .paginate(&*self.db, page.per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    /// Reschedules or edits a booking; the new slot is checked for clashes
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateBookingInput,
    ) -> Result<BookingResponse, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;
        let existing = booking::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", id)))?;

        let start_at = input.start_at.unwrap_or(existing.start_at);
        let end_at = input.end_at.unwrap_or(existing.end_at);
        ensure_interval(start_at, end_at)?;
        let product_id = input.product_id.or(existing.product_id);
        Self::ensure_references(&txn, input.customer_id, input.product_id).await?;
        if let Some(product_id) = product_id {
            if existing.status != BookingStatus::Cancelled {
                Self::ensure_slot_free(&txn, product_id, start_at, end_at, Some(id)).await?;
            }
        }

        let mut active: booking::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if input.notes.is_some() {
            active.notes = Set(normalize_string(input.notes));
        }
        if input.customer_id.is_some() {
            active.customer_id = Set(input.customer_id);
        }
        active.product_id = Set(product_id);
        active.start_at = Set(start_at);
        active.end_at = Set(end_at);
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;
        txn.commit().await?;

        info!(booking_id = %id, "Booking updated");
        dashboard::invalidate(&self.cache);
        Ok(model.into())
    }

    /// Moves a booking through its lifecycle. Reviving a cancelled booking re-checks its slot.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<BookingResponse, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = booking::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", id)))?;
        if existing.status == status {
            txn.commit().await?;
            return Ok(existing.into());
        }

        if existing.status == BookingStatus::Cancelled {
            if let Some(product_id) = existing.product_id {
                Self::ensure_slot_free(
                    &txn,
                    product_id,
                    existing.start_at,
                    existing.end_at,
                    Some(id),
                )
                .await?;
            }
        }

        let mut active: booking::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;
        txn.commit().await?;

        info!(booking_id = %id, status = ?status, "Booking status changed");
        self.events
            .emit(Event::BookingStatusChanged {
                booking_id: id,
                status,
            })
            .await;
        dashboard::invalidate(&self.cache);
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        existing.delete(&*self.db).await?;

        info!(booking_id = %id, "Booking deleted");
        dashboard::invalidate(&self.cache);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    #[test]
    fn interval_must_move_forward() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        assert!(ensure_interval(start, start + Duration::minutes(30)).is_ok());
        assert_matches!(
            ensure_interval(start, start),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            ensure_interval(start, start - Duration::hours(1)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn response_reports_duration() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let model = booking::Model {
            id: Uuid::new_v4(),
            customer_id: None,
            product_id: None,
            title: "Fitting".into(),
            notes: None,
            start_at: start,
            end_at: start + Duration::minutes(90),
            status: BookingStatus::Scheduled,
            created_by: None,
            created_at: start,
            updated_at: start,
        };
        assert_eq!(BookingResponse::from(model).duration_minutes, 90);
    }
}
