use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::InMemoryCache,
    db::is_unique_violation,
    entities::{bill, booking, customer},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        dashboard, normalize_string,
        plans::{Limit, PlanService},
        PageRequest,
    },
    PaginatedResponse,
};

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-.]{7,25}$").expect("valid phone regex"));

/// Canonical phone form: digits only, keeping a leading `+`.
///
/// `+91 98765-43210` and `+919876543210` are the same customer.
pub fn normalize_phone(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if !PHONE_PATTERN.is_match(trimmed) {
        return Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid phone number",
            trimmed
        )));
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(7..=15).contains(&digits.len()) {
        return Err(ServiceError::ValidationError(
            "Phone number must contain between 7 and 15 digits".to_string(),
        ));
    }

    if trimmed.starts_with('+') {
        Ok(format!("+{}", digits))
    } else {
        Ok(digits)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            email: model.email,
            address: model.address,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Customer records
#[derive(Debug, Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    plans: Arc<PlanService>,
    events: EventSender,
    cache: InMemoryCache,
}

impl CustomerService {
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

    fn duplicate_phone(phone: &str) -> ServiceError {
        ServiceError::DuplicatePhone(format!("A customer with phone {} already exists", phone))
    }

    async fn ensure_phone_available(
        &self,
        phone: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = customer::Entity::find().filter(customer::Column::Phone.eq(phone));
        if let Some(id) = except {
            query = query.filter(customer::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(Self::duplicate_phone(phone));
        }
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateCustomerInput) -> Result<CustomerResponse, ServiceError> {
        input.validate()?;
        let phone = normalize_phone(&input.phone)?;

        self.plans
            .ensure_capacity(&*self.db, Limit::Customers)
            .await?;
        self.ensure_phone_available(&phone, None).await?;

        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            phone: Set(phone.clone()),
            email: Set(normalize_string(input.email)),
            address: Set(normalize_string(input.address)),
            notes: Set(normalize_string(input.notes)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Self::duplicate_phone(&phone)
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(customer_id = %model.id, "Customer created");
        metrics::counter!("shopdesk.customers.created", 1);
        self.events.emit(Event::CustomerCreated(model.id)).await;
        dashboard::invalidate(&self.cache);

        Ok(model.into())
    }

    pub async fn find(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<CustomerResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    /// Lists customers by name; `search` matches name, phone or email
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<PaginatedResponse<CustomerResponse>, ServiceError> {
        let mut query = customer::Entity::find();
        if let Some(term) = normalize_string(search) {
            query = query.filter(
                Condition::any()
                    .add(customer::Column::Name.contains(&term))
                    .add(customer::Column::Phone.contains(&term))
                    .add(customer::Column::Email.contains(&term)),
            );
        }

        let paginator = query
            .order_by_asc(customer::Column::Name)
            .paginate(&*self.db, page.per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCustomerInput,
    ) -> Result<CustomerResponse, ServiceError> {
        input.validate()?;
        let existing = self.find(id).await?;
        let mut active: customer::ActiveModel = existing.into();

        let mut new_phone = None;
        if let Some(raw) = input.phone.as_deref() {
            let phone = normalize_phone(raw)?;
            self.ensure_phone_available(&phone, Some(id)).await?;
            active.phone = Set(phone.clone());
            new_phone = Some(phone);
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if input.email.is_some() {
            active.email = Set(normalize_string(input.email));
        }
        if input.address.is_some() {
            active.address = Set(normalize_string(input.address));
        }
        if input.notes.is_some() {
            active.notes = Set(normalize_string(input.notes));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await.map_err(|e| {
            match new_phone.as_deref() {
                Some(phone) if is_unique_violation(&e) => Self::duplicate_phone(phone),
                _ => ServiceError::DatabaseError(e),
            }
        })?;

        info!(customer_id = %id, "Customer updated");
        Ok(model.into())
    }

    /// Deletes a customer. Bills keep their name/phone snapshot; links are cleared.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        let txn = self.db.begin().await?;

        bill::Entity::update_many()
            .col_expr(bill::Column::CustomerId, Expr::value(Option::<Uuid>::None))
            .filter(bill::Column::CustomerId.eq(id))
            .exec(&txn)
            .await?;
        booking::Entity::update_many()
            .col_expr(booking::Column::CustomerId, Expr::value(Option::<Uuid>::None))
            .filter(booking::Column::CustomerId.eq(id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;
        txn.commit().await?;

        info!(customer_id = %id, "Customer deleted");
        self.events.emit(Event::CustomerDeleted(id)).await;
        dashboard::invalidate(&self.cache);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("+91 98765-43210", "+919876543210")]
    #[case("(020) 555 0199", "0205550199")]
    #[case("9876543210", "9876543210")]
    #[case(" +1.415.555.0100 ", "+14155550100")]
    fn phones_normalize_to_digits(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_phone(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("call me")]
    #[case("12345")]
    #[case("+1234567890123456")]
    #[case("98765x43210")]
    fn bad_phones_rejected(#[case] raw: &str) {
        assert!(normalize_phone(raw).is_err());
    }
}
