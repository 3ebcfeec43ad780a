//! Sales and rental bills.
//!
//! Serial numbers are allocated per bill type as `max + 1` inside the same transaction
//! that inserts the bill. The `(bill_type, serial_no)` unique index turns a race between
//! two writers into a constraint violation, which is retried a bounded number of times.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::InMemoryCache,
    db::is_unique_violation,
    entities::{
        bill::{self, BillType, PaymentStatus},
        bill_item, customer, product,
        stock_history::StockChangeType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        customers::normalize_phone,
        dashboard, ensure_amount, money, normalize_string, MAX_MONEY,
        plans::{Feature, Limit, PlanService},
        products::{apply_stock_change, ProductService, StockChange},
        start_of_day, PageRequest,
    },
    PaginatedResponse,
};

const MAX_SERIAL_ATTEMPTS: u32 = 3;
pub const MAX_RENTAL_DAYS: i64 = 366;
const DEFAULT_PAYMENT_METHOD: &str = "cash";

/// Inclusive day count of a rental period
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> Result<i32, ServiceError> {
    if start > end {
        return Err(ServiceError::ValidationError(
            "rental_start must not be after rental_end".to_string(),
        ));
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_RENTAL_DAYS {
        return Err(ServiceError::ValidationError(format!(
            "A rental covers at most {} days",
            MAX_RENTAL_DAYS
        )));
    }
    i32::try_from(days)
        .map_err(|_| ServiceError::ValidationError("Rental period is too long".to_string()))
}

fn amount_too_large(field: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{} must not exceed {}", field, MAX_MONEY))
}

/// `unit_price × quantity`, times the rental days for rentals
pub fn line_total(
    unit_price: Decimal,
    quantity: i32,
    days: Option<i32>,
) -> Result<Decimal, ServiceError> {
    let total = unit_price
        .checked_mul(Decimal::from(quantity))
        .and_then(|t| t.checked_mul(Decimal::from(days.unwrap_or(1))))
        .map(money)
        .filter(|t| *t <= MAX_MONEY)
        .ok_or_else(|| amount_too_large("line total"))?;
    Ok(total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Tax applies to the discounted subtotal and is rounded to cents on its own.
pub fn compute_totals(
    line_totals: &[Decimal],
    discount: Decimal,
    tax_rate: Decimal,
) -> Result<BillTotals, ServiceError> {
    ensure_amount("discount", discount)?;
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
        return Err(ServiceError::ValidationError(
            "tax_rate must be between 0 and 1".to_string(),
        ));
    }

    let subtotal = line_totals
        .iter()
        .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(*line))
        .map(money)
        .filter(|t| *t <= MAX_MONEY)
        .ok_or_else(|| amount_too_large("subtotal"))?;
    let discount = money(discount);
    if discount > subtotal {
        return Err(ServiceError::ValidationError(format!(
            "discount {} exceeds subtotal {}",
            discount, subtotal
        )));
    }

    let taxable = subtotal - discount;
    let tax_amount = money(taxable * tax_rate);
    let total = money(taxable + tax_amount);
    if total > MAX_MONEY {
        return Err(amount_too_large("bill total"));
    }
    Ok(BillTotals {
        subtotal,
        discount,
        tax_amount,
        total,
    })
}

pub fn payment_status(total: Decimal, paid: Decimal) -> PaymentStatus {
    if paid >= total {
        PaymentStatus::Paid
    } else if paid > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BillItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100000))]
    pub quantity: i32,
    /// Defaults to the product's sale or rental price
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBillInput {
    pub bill_type: BillType,
    pub customer_id: Option<Uuid>,
    #[validate(length(max = 120))]
    pub customer_name: Option<String>,
    #[validate(length(max = 32))]
    pub customer_phone: Option<String>,
    pub items: Vec<BillItemInput>,
    pub discount: Option<Decimal>,
    /// Overrides the configured default rate, as a fraction (0.18 = 18%)
    pub tax_rate: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub rental_start: Option<NaiveDate>,
    pub rental_end: Option<NaiveDate>,
    pub deposit: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillFilter {
    pub bill_type: Option<BillType>,
    pub customer_id: Option<Uuid>,
    /// Inclusive creation date bounds
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub rental_days: Option<i32>,
    pub line_total: Decimal,
}

impl From<bill_item::Model> for BillItemResponse {
    fn from(model: bill_item::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            unit_price: money(model.unit_price),
            rental_days: model.rental_days,
            line_total: money(model.line_total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillResponse {
    pub id: Uuid,
    pub bill_type: BillType,
    pub serial_no: i64,
    pub display_number: String,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub rental_start: Option<NaiveDate>,
    pub rental_end: Option<NaiveDate>,
    pub deposit: Option<Decimal>,
    pub returned_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<BillItemResponse>>,
}

impl BillResponse {
    fn build(model: bill::Model, items: Option<Vec<bill_item::Model>>) -> Self {
        let today = Utc::now().date_naive();
        Self {
            display_number: model.display_number(),
            balance_due: money(model.balance_due()),
            is_overdue: model.is_overdue(today),
            id: model.id,
            bill_type: model.bill_type,
            serial_no: model.serial_no,
            customer_id: model.customer_id,
            customer_name: model.customer_name,
            customer_phone: model.customer_phone,
            subtotal: money(model.subtotal),
            discount: money(model.discount),
            tax_rate: model.tax_rate.round_dp(4).normalize(),
            tax_amount: money(model.tax_amount),
            total: money(model.total),
            paid_amount: money(model.paid_amount),
            payment_status: model.payment_status,
            payment_method: model.payment_method,
            rental_start: model.rental_start,
            rental_end: model.rental_end,
            deposit: model.deposit.map(money),
            returned_at: model.returned_at,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            items: items.map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<bill::Model> for BillResponse {
    fn from(model: bill::Model) -> Self {
        Self::build(model, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NextSerialResponse {
    pub bill_type: BillType,
    pub serial_no: i64,
    pub display_number: String,
}

/// Name and phone copied onto the bill, plus the linked customer when known
struct CustomerSnapshot {
    id: Option<Uuid>,
    name: Option<String>,
    phone: Option<String>,
}

async fn next_serial_no<C: ConnectionTrait>(
    conn: &C,
    bill_type: BillType,
) -> Result<i64, ServiceError> {
    let max: Option<Option<i64>> = bill::Entity::find()
        .select_only()
        .column_as(bill::Column::SerialNo.max(), "max_serial")
        .filter(bill::Column::BillType.eq(bill_type))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(max.flatten().unwrap_or(0) + 1)
}

async fn bill_items<C: ConnectionTrait>(
    conn: &C,
    bill_id: Uuid,
) -> Result<Vec<bill_item::Model>, ServiceError> {
    Ok(bill_item::Entity::find()
        .filter(bill_item::Column::BillId.eq(bill_id))
        .all(conn)
        .await?)
}

/// Sales and rental billing
#[derive(Debug, Clone)]
pub struct BillService {
    db: Arc<DatabaseConnection>,
    plans: Arc<PlanService>,
    events: EventSender,
    cache: InMemoryCache,
    default_tax_rate: Decimal,
    low_stock_alerts: bool,
}

impl BillService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        plans: Arc<PlanService>,
        events: EventSender,
        cache: InMemoryCache,
        default_tax_rate: Decimal,
        low_stock_alerts: bool,
    ) -> Self {
        Self {
            db,
            plans,
            events,
            cache,
            default_tax_rate,
            low_stock_alerts,
        }
    }

    async fn find<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<bill::Model, ServiceError> {
        bill::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bill {} not found", id)))
    }

    async fn resolve_customer<C: ConnectionTrait>(
        conn: &C,
        input: &CreateBillInput,
    ) -> Result<CustomerSnapshot, ServiceError> {
        let name = normalize_string(input.customer_name.clone());

        if let Some(customer_id) = input.customer_id {
            let found = customer::Entity::find_by_id(customer_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Customer {} not found", customer_id))
                })?;
            return Ok(CustomerSnapshot {
                id: Some(found.id),
                name: name.or(Some(found.name)),
                phone: Some(found.phone),
            });
        }

        let Some(raw_phone) = normalize_string(input.customer_phone.clone()) else {
            return Ok(CustomerSnapshot {
                id: None,
                name,
                phone: None,
            });
        };

        // walk-in bills still link to a known customer with the same phone
        let phone = normalize_phone(&raw_phone)?;
        let existing = customer::Entity::find()
            .filter(customer::Column::Phone.eq(phone.as_str()))
            .one(conn)
            .await?;
        Ok(match existing {
            Some(found) => CustomerSnapshot {
                id: Some(found.id),
                name: name.or(Some(found.name)),
                phone: Some(phone),
            },
            None => CustomerSnapshot {
                id: None,
                name,
                phone: Some(phone),
            },
        })
    }

    /// Creates a bill, moving stock for every line
    #[instrument(skip(self, input), fields(bill_type = input.bill_type.as_str(), items = input.items.len()))]
    pub async fn create(
        &self,
        input: CreateBillInput,
        actor: Option<Uuid>,
    ) -> Result<BillResponse, ServiceError> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "A bill needs at least one item".to_string(),
            ));
        }
        for item in &input.items {
            item.validate()?;
            if let Some(price) = item.unit_price {
                ensure_amount("unit_price", price)?;
            }
        }

        let mut attempt = 1;
        loop {
            match self.try_create(&input, actor).await {
                Err(ServiceError::DatabaseError(e))
                    if is_unique_violation(&e) && attempt < MAX_SERIAL_ATTEMPTS =>
                {
                    warn!(attempt, "Bill serial number collided, retrying");
                    metrics::counter!("shopdesk.bills.serial_retries", 1);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_create(
        &self,
        input: &CreateBillInput,
        actor: Option<Uuid>,
    ) -> Result<BillResponse, ServiceError> {
        let days = match input.bill_type {
            BillType::Rental => {
                let (Some(start), Some(end)) = (input.rental_start, input.rental_end) else {
                    return Err(ServiceError::ValidationError(
                        "Rental bills need rental_start and rental_end".to_string(),
                    ));
                };
                Some(rental_days(start, end)?)
            }
            BillType::Sale => {
                if input.deposit.is_some() {
                    return Err(ServiceError::ValidationError(
                        "Only rental bills take a deposit".to_string(),
                    ));
                }
                None
            }
        };
        if let Some(deposit) = input.deposit {
            ensure_amount("deposit", deposit)?;
        }

        let txn = self.db.begin().await?;

        self.plans
            .ensure_capacity(&txn, Limit::MonthlyBills)
            .await?;
        if input.bill_type == BillType::Rental {
            self.plans.ensure_feature(&txn, Feature::Rentals).await?;
        }

        let customer = Self::resolve_customer(&txn, input).await?;

        let bill_id = Uuid::new_v4();
        let mut lines = Vec::with_capacity(input.items.len());
        let mut line_totals = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            if !product.is_active {
                return Err(ServiceError::InvalidOperation(format!(
                    "{} is no longer sold",
                    product.name
                )));
            }

            let list_price = match input.bill_type {
                BillType::Sale => product.price,
                BillType::Rental => product.rental_price.ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "{} has no rental price and cannot be rented",
                        product.name
                    ))
                })?,
            };
            let unit_price = money(item.unit_price.unwrap_or(list_price));
            let total = line_total(unit_price, item.quantity, days)?;
            line_totals.push(total);

            lines.push(bill_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                bill_id: Set(bill_id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                rental_days: Set(days),
                line_total: Set(total),
            });
        }

        let tax_rate = input.tax_rate.unwrap_or(self.default_tax_rate);
        let totals = compute_totals(
            &line_totals,
            input.discount.unwrap_or(Decimal::ZERO),
            tax_rate,
        )?;

        let paid = money(input.paid_amount.unwrap_or(Decimal::ZERO));
        ensure_amount("paid_amount", paid)?;
        if paid > totals.total {
            return Err(ServiceError::ValidationError(format!(
                "paid_amount {} exceeds bill total {}",
                paid, totals.total
            )));
        }

        let serial_no = next_serial_no(&txn, input.bill_type).await?;
        let now = Utc::now();
        let model = bill::ActiveModel {
            id: Set(bill_id),
            bill_type: Set(input.bill_type),
            serial_no: Set(serial_no),
            customer_id: Set(customer.id),
            customer_name: Set(customer.name),
            customer_phone: Set(customer.phone),
            subtotal: Set(totals.subtotal),
            discount: Set(totals.discount),
            tax_rate: Set(tax_rate),
            tax_amount: Set(totals.tax_amount),
            total: Set(totals.total),
            paid_amount: Set(paid),
            payment_status: Set(payment_status(totals.total, paid)),
            payment_method: Set(normalize_string(input.payment_method.clone())
                .map(|m| m.to_lowercase())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string())),
            rental_start: Set(input.rental_start.filter(|_| days.is_some())),
            rental_end: Set(input.rental_end.filter(|_| days.is_some())),
            deposit: Set(input.deposit.map(money)),
            returned_at: Set(None),
            notes: Set(normalize_string(input.notes.clone())),
            created_by: Set(actor),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let change_type = match input.bill_type {
            BillType::Sale => StockChangeType::Sale,
            BillType::Rental => StockChangeType::RentalOut,
        };
        let mut items = Vec::with_capacity(lines.len());
        let mut moved = Vec::with_capacity(lines.len());
        for line in lines {
            let item = line.insert(&txn).await?;
            let (product, _) = apply_stock_change(
                &txn,
                StockChange {
                    product_id: item.product_id,
                    delta: -item.quantity,
                    change_type,
                    note: Some(model.display_number()),
                    reference_id: Some(model.id),
                    actor,
                },
            )
            .await?;
            moved.push(product);
            items.push(item);
        }
        txn.commit().await?;

        info!(
            bill_id = %model.id,
            number = %model.display_number(),
            total = %model.total,
            "Bill created"
        );
        metrics::counter!("shopdesk.bills.created", 1, "bill_type" => model.bill_type.as_str());
        self.events
            .emit(Event::BillCreated {
                bill_id: model.id,
                bill_type: model.bill_type,
                serial_no: model.serial_no,
                total: model.total,
            })
            .await;
        for product in &moved {
            ProductService::notify_stock_level(&self.events, self.low_stock_alerts, product).await;
        }
        dashboard::invalidate(&self.cache);

        Ok(BillResponse::build(model, Some(items)))
    }

    /// Bill with its items
    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<BillResponse, ServiceError> {
        let model = Self::find(&*self.db, id).await?;
        let items = bill_items(&*self.db, id).await?;
        Ok(BillResponse::build(model, Some(items)))
    }

    /// Bills newest first, without items
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: BillFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<BillResponse>, ServiceError> {
        let mut query = bill::Entity::find();
        if let Some(bill_type) = filter.bill_type {
            query = query.filter(bill::Column::BillType.eq(bill_type));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(bill::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.payment_status {
            query = query.filter(bill::Column::PaymentStatus.eq(status));
        }
        if let Some(from) = filter.from {
            query = query.filter(bill::Column::CreatedAt.gte(start_of_day(from)));
        }
        if let Some(to) = filter.to {
            query = query.filter(bill::Column::CreatedAt.lt(start_of_day(to) + Duration::days(1)));
        }

        let paginator = query
            .order_by_desc(bill::Column::CreatedAt)
            .order_by_desc(bill::Column::SerialNo)
            .paginate(&*self.db, page.per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    /// Bills linked to one customer
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: PageRequest,
    ) -> Result<PaginatedResponse<BillResponse>, ServiceError> {
        customer::Entity::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        self.list(
            BillFilter {
                customer_id: Some(customer_id),
                ..Default::default()
            },
            page,
        )
        .await
    }

    /// Serial number the next bill of this type would get
    pub async fn next_serial(&self, bill_type: BillType) -> Result<NextSerialResponse, ServiceError> {
        let serial_no = next_serial_no(&*self.db, bill_type).await?;
        Ok(NextSerialResponse {
            bill_type,
            serial_no,
            display_number: format!("{}-{:06}", bill_type.prefix(), serial_no),
        })
    }

    #[instrument(skip(self, input))]
    pub async fn record_payment(
        &self,
        id: Uuid,
        input: RecordPaymentInput,
    ) -> Result<BillResponse, ServiceError> {
        input.validate()?;
        ensure_amount("amount", input.amount)?;
        let amount = money(input.amount);
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be greater than zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let existing = Self::find(&txn, id).await?;
        let paid = money(existing.paid_amount + amount);
        if paid > money(existing.total) {
            return Err(ServiceError::ValidationError(format!(
                "Payment of {} exceeds the balance due of {}",
                amount,
                money(existing.balance_due())
            )));
        }

        let status = payment_status(existing.total, paid);
        let mut active: bill::ActiveModel = existing.into();
        active.paid_amount = Set(paid);
        active.payment_status = Set(status);
        if let Some(method) = normalize_string(input.payment_method) {
            active.payment_method = Set(method.to_lowercase());
        }
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;
        let items = bill_items(&txn, id).await?;
        txn.commit().await?;

        info!(bill_id = %id, %amount, status = ?model.payment_status, "Payment recorded");
        metrics::counter!("shopdesk.payments.recorded", 1);
        self.events
            .emit(Event::PaymentRecorded { bill_id: id, amount })
            .await;
        dashboard::invalidate(&self.cache);

        Ok(BillResponse::build(model, Some(items)))
    }

    /// Marks a rental as returned and puts its items back in stock
    #[instrument(skip(self))]
    pub async fn return_rental(
        &self,
        id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<BillResponse, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = Self::find(&txn, id).await?;
        if existing.bill_type != BillType::Rental {
            return Err(ServiceError::InvalidOperation(
                "Only rental bills can be returned".to_string(),
            ));
        }

        let now = Utc::now();
        let claimed = bill::Entity::update_many()
            .col_expr(bill::Column::ReturnedAt, Expr::value(Some(now)))
            .col_expr(bill::Column::UpdatedAt, Expr::value(now))
            .filter(bill::Column::Id.eq(id))
            .filter(bill::Column::ReturnedAt.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "{} has already been returned",
                existing.display_number()
            )));
        }

        let items = bill_items(&txn, id).await?;
        for item in &items {
            apply_stock_change(
                &txn,
                StockChange {
                    product_id: item.product_id,
                    delta: item.quantity,
                    change_type: StockChangeType::RentalReturn,
                    note: Some(existing.display_number()),
                    reference_id: Some(id),
                    actor,
                },
            )
            .await?;
        }
        let model = Self::find(&txn, id).await?;
        txn.commit().await?;

        info!(bill_id = %id, number = %model.display_number(), "Rental returned");
        self.events.emit(Event::RentalReturned(id)).await;
        dashboard::invalidate(&self.cache);

        Ok(BillResponse::build(model, Some(items)))
    }

    /// Voids a bill. Stock still out on the bill goes back on the shelf.
    #[instrument(skip(self))]
    pub async fn void(&self, id: Uuid, actor: Option<Uuid>) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let existing = Self::find(&txn, id).await?;
        let items = bill_items(&txn, id).await?;

        let restore = match existing.bill_type {
            BillType::Sale => true,
            BillType::Rental => existing.returned_at.is_none(),
        };
        if restore {
            for item in &items {
                apply_stock_change(
                    &txn,
                    StockChange {
                        product_id: item.product_id,
                        delta: item.quantity,
                        change_type: StockChangeType::BillVoid,
                        note: Some(format!("Void {}", existing.display_number())),
                        reference_id: Some(id),
                        actor,
                    },
                )
                .await?;
            }
        }

        bill_item::Entity::delete_many()
            .filter(bill_item::Column::BillId.eq(id))
            .exec(&txn)
            .await?;
        bill::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        warn!(
            bill_id = %id,
            number = %existing.display_number(),
            stock_restored = restore,
            "Bill voided"
        );
        metrics::counter!("shopdesk.bills.voided", 1);
        self.events
            .emit(Event::BillVoided {
                bill_id: id,
                bill_type: existing.bill_type,
                serial_no: existing.serial_no,
            })
            .await;
        dashboard::invalidate(&self.cache);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2024, 5, 1), date(2024, 5, 1), 1)]
    #[case(date(2024, 5, 1), date(2024, 5, 3), 3)]
    #[case(date(2024, 2, 28), date(2024, 3, 1), 3)]
    fn rental_days_are_inclusive(
        #[case] start: NaiveDate,
        #[case] end: NaiveDate,
        #[case] expected: i32,
    ) {
        assert_eq!(rental_days(start, end).unwrap(), expected);
    }

    #[test]
    fn rental_end_before_start_rejected() {
        assert_matches!(
            rental_days(date(2024, 5, 3), date(2024, 5, 1)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn line_total_multiplies_rental_days() {
        assert_eq!(line_total(dec!(250), 2, Some(3)).unwrap(), dec!(1500.00));
        assert_eq!(line_total(dec!(19.99), 3, None).unwrap(), dec!(59.97));
    }

    #[test]
    fn oversized_amounts_are_validation_errors() {
        assert_matches!(
            line_total(MAX_MONEY, 100_000, Some(366)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            line_total(Decimal::MAX, 100_000, None),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            compute_totals(&[MAX_MONEY, MAX_MONEY], Decimal::ZERO, Decimal::ZERO),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            compute_totals(&[Decimal::MAX, Decimal::MAX], Decimal::ZERO, Decimal::ZERO),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            compute_totals(&[MAX_MONEY], Decimal::ZERO, dec!(0.5)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn rentals_longer_than_a_year_rejected() {
        assert_eq!(rental_days(date(2024, 1, 1), date(2024, 12, 31)).unwrap(), 366);
        assert_matches!(
            rental_days(date(2024, 1, 1), date(2025, 1, 1)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            rental_days(date(2024, 1, 1), date(9999, 12, 31)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn totals_apply_tax_after_discount() {
        let totals = compute_totals(&[dec!(100), dec!(50)], dec!(20), dec!(0.18)).unwrap();
        assert_eq!(totals.subtotal, dec!(150.00));
        assert_eq!(totals.discount, dec!(20.00));
        assert_eq!(totals.tax_amount, dec!(23.40));
        assert_eq!(totals.total, dec!(153.40));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        let totals = compute_totals(&[dec!(0.05)], Decimal::ZERO, dec!(0.1)).unwrap();
        assert_eq!(totals.tax_amount, dec!(0.01));
        assert_eq!(totals.total, dec!(0.06));
    }

    #[rstest]
    #[case(dec!(-1), dec!(0.1))]
    #[case(dec!(200), dec!(0.1))]
    #[case(dec!(0), dec!(1.5))]
    #[case(dec!(0), dec!(-0.1))]
    fn invalid_discount_or_rate_rejected(#[case] discount: Decimal, #[case] rate: Decimal) {
        assert_matches!(
            compute_totals(&[dec!(100)], discount, rate),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[rstest]
    #[case(dec!(100), dec!(100), PaymentStatus::Paid)]
    #[case(dec!(100), dec!(40), PaymentStatus::Partial)]
    #[case(dec!(100), dec!(0), PaymentStatus::Unpaid)]
    #[case(dec!(0), dec!(0), PaymentStatus::Paid)]
    fn payment_status_from_amounts(
        #[case] total: Decimal,
        #[case] paid: Decimal,
        #[case] expected: PaymentStatus,
    ) {
        assert_eq!(payment_status(total, paid), expected);
    }

    proptest! {
        #[test]
        fn totals_are_consistent(
            cents in prop::collection::vec(0i64..10_000_000, 1..8),
            discount_pct in 0u32..=100,
            rate_bp in 0u32..=10_000,
        ) {
            let lines: Vec<Decimal> = cents.iter().map(|c| Decimal::new(*c, 2)).collect();
            let subtotal: Decimal = lines.iter().copied().sum();
            let discount = money(subtotal * Decimal::from(discount_pct) / Decimal::from(100));
            let rate = Decimal::new(i64::from(rate_bp), 4);

            let totals = compute_totals(&lines, discount, rate).unwrap();
            prop_assert_eq!(totals.total, totals.subtotal - totals.discount + totals.tax_amount);
            prop_assert!(totals.tax_amount >= Decimal::ZERO);
            prop_assert!(totals.total >= Decimal::ZERO);
            prop_assert!(totals.tax_amount.scale() <= 2);
            prop_assert!(totals.tax_amount <= totals.subtotal - totals.discount);
        }
    }
}
