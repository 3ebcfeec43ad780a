use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
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
        product,
        stock_history::{self, StockChangeType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        dashboard, ensure_amount, money, normalize_string, nullable,
        plans::{Limit, PlanService},
        PageRequest,
    },
    PaginatedResponse,
};

const DEFAULT_UNIT: &str = "pcs";
/// Largest quantity a single restock or adjustment may move
pub const MAX_STOCK_MOVEMENT: u32 = 1_000_000;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(length(max = 64))]
    pub category: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    pub price: Decimal,
    pub rental_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock_quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub min_stock_level: Option<i32>,
}

/// Catalog fields only; stock moves through restock and adjust
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    /// `null` clears the SKU
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub sku: Option<Option<String>>,
    #[validate(length(max = 64))]
    pub category: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    pub price: Option<Decimal>,
    /// `null` makes the product sale-only
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub rental_price: Option<Option<Decimal>>,
    #[validate(range(min = 0))]
    pub min_stock_level: Option<i32>,
    pub is_active: Option<bool>,
    /// Rejected when present
    #[schema(ignore)]
    pub stock_quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RestockInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AdjustStockInput {
    /// Signed; at most `MAX_STOCK_MOVEMENT` either way
    pub quantity_change: i32,
    #[validate(length(min = 1, max = 500))]
    pub note: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit: String,
    pub price: Decimal,
    pub rental_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub min_stock_level: i32,
    pub stock_deficit: i32,
    pub is_low_stock: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            stock_deficit: model.stock_deficit(),
            is_low_stock: model.is_low_stock(),
            id: model.id,
            name: model.name,
            sku: model.sku,
            category: model.category,
            description: model.description,
            unit: model.unit,
            price: money(model.price),
            rental_price: model.rental_price.map(money),
            stock_quantity: model.stock_quantity,
            min_stock_level: model.min_stock_level,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockHistoryResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub change_type: StockChangeType,
    pub quantity_change: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub note: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<stock_history::Model> for StockHistoryResponse {
    fn from(model: stock_history::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            change_type: model.change_type,
            quantity_change: model.quantity_change,
            previous_quantity: model.previous_quantity,
            new_quantity: model.new_quantity,
            note: model.note,
            reference_id: model.reference_id,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

/// Product after a stock movement, with the history row it produced
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockMovementResponse {
    pub product: ProductResponse,
    pub history: StockHistoryResponse,
}

/// One stock movement to apply
#[derive(Debug, Clone)]
pub(crate) struct StockChange {
    pub product_id: Uuid,
    pub delta: i32,
    pub change_type: StockChangeType,
    pub note: Option<String>,
    pub reference_id: Option<Uuid>,
    pub actor: Option<Uuid>,
}

fn insufficient_stock(current: &product::Model, delta: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "{} has {} {} in stock; {} requested",
        current.name,
        current.stock_quantity,
        current.unit,
        delta.unsigned_abs()
    ))
}

/// Moves stock and appends the matching history row.
///
/// Runs on whatever connection it is given; callers pass their transaction so the
/// quantity update and the history insert commit together. Decrements are guarded in
/// the UPDATE itself so concurrent sales cannot drive stock negative.
pub(crate) async fn apply_stock_change<C: ConnectionTrait>(
    conn: &C,
    change: StockChange,
) -> Result<(product::Model, stock_history::Model), ServiceError> {
    let current = product::Entity::find_by_id(change.product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", change.product_id)))?;

    let Some(next_quantity) = current.stock_quantity.checked_add(change.delta) else {
        return Err(ServiceError::ValidationError(
            "Stock quantity out of range".to_string(),
        ));
    };
    if next_quantity < 0 {
        return Err(insufficient_stock(&current, change.delta));
    }

    let now = Utc::now();
    let mut update = product::Entity::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).add(change.delta),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::Id.eq(change.product_id));
    if change.delta < 0 {
        let needed = change.delta.checked_neg().ok_or_else(|| {
            ServiceError::ValidationError("Stock quantity out of range".to_string())
        })?;
        update = update.filter(product::Column::StockQuantity.gte(needed));
    }
    let result = update.exec(conn).await?;

    if result.rows_affected == 0 {
        return Err(insufficient_stock(&current, change.delta));
    }

    let updated = product::Entity::find_by_id(change.product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", change.product_id)))?;

    let history = stock_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(updated.id),
        change_type: Set(change.change_type),
        quantity_change: Set(change.delta),
        previous_quantity: Set(updated.stock_quantity - change.delta),
        new_quantity: Set(updated.stock_quantity),
        note: Set(change.note),
        reference_id: Set(change.reference_id),
        created_by: Set(change.actor),
        created_at: Set(now),
    }
    .insert(conn)
    .await?;

    Ok((updated, history))
}

/// Catalog and stock management
#[derive(Debug, Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    plans: Arc<PlanService>,
    events: EventSender,
    cache: InMemoryCache,
    low_stock_alerts: bool,
}

impl ProductService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        plans: Arc<PlanService>,
        events: EventSender,
        cache: InMemoryCache,
        low_stock_alerts: bool,
    ) -> Self {
        Self {
            db,
            plans,
            events,
            cache,
            low_stock_alerts,
        }
    }

    fn duplicate_sku(sku: &str) -> ServiceError {
        ServiceError::DuplicateSku(format!("A product with SKU {} already exists", sku))
    }

    fn normalize_sku(sku: Option<String>) -> Option<String> {
        normalize_string(sku).map(|s| s.to_uppercase())
    }

    async fn ensure_sku_available(&self, sku: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = product::Entity::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(Self::duplicate_sku(sku));
        }
        Ok(())
    }

    /// Emits a low-stock warning when a movement leaves the product at or under its minimum
    pub(crate) async fn notify_stock_level(
        events: &EventSender,
        alerts_enabled: bool,
        product: &product::Model,
    ) {
        if alerts_enabled && product.is_active && product.is_low_stock() {
            events
                .emit(Event::StockLow {
                    product_id: product.id,
                    name: product.name.clone(),
                    stock_quantity: product.stock_quantity,
                    min_stock_level: product.min_stock_level,
                })
                .await;
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        input: CreateProductInput,
        actor: Option<Uuid>,
    ) -> Result<ProductResponse, ServiceError> {
        input.validate()?;
        ensure_amount("price", input.price)?;
        if let Some(rental_price) = input.rental_price {
            ensure_amount("rental_price", rental_price)?;
        }

        let sku = Self::normalize_sku(input.sku);
        self.plans
            .ensure_capacity(&*self.db, Limit::Products)
            .await?;
        if let Some(sku) = sku.as_deref() {
            self.ensure_sku_available(sku, None).await?;
        }

        let initial_stock = input.stock_quantity.unwrap_or(0);
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            sku: Set(sku.clone()),
            category: Set(normalize_string(input.category)),
            description: Set(normalize_string(input.description)),
            unit: Set(normalize_string(input.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string())),
            price: Set(money(input.price)),
            rental_price: Set(input.rental_price.map(money)),
            stock_quantity: Set(initial_stock),
            min_stock_level: Set(input.min_stock_level.unwrap_or(0)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match sku.as_deref() {
            Some(sku) if is_unique_violation(&e) => Self::duplicate_sku(sku),
            _ => ServiceError::DatabaseError(e),
        })?;

        if initial_stock > 0 {
            stock_history::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(model.id),
                change_type: Set(StockChangeType::Initial),
                quantity_change: Set(initial_stock),
                previous_quantity: Set(0),
                new_quantity: Set(initial_stock),
                note: Set(Some("Opening stock".to_string())),
                reference_id: Set(None),
                created_by: Set(actor),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        info!(product_id = %model.id, initial_stock, "Product created");
        metrics::counter!("shopdesk.products.created", 1);
        self.events.emit(Event::ProductCreated(model.id)).await;
        Self::notify_stock_level(&self.events, self.low_stock_alerts, &model).await;
        dashboard::invalidate(&self.cache);

        Ok(model.into())
    }

    pub async fn find(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ProductResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    /// Active products by name
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<ProductResponse>, ServiceError> {
        let mut query = product::Entity::find().filter(product::Column::IsActive.eq(true));

        if let Some(term) = normalize_string(filter.search) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(&term))
                    .add(product::Column::Sku.contains(&term))
                    .add(product::Column::Category.contains(&term)),
            );
        }
        if let Some(category) = normalize_string(filter.category) {
            query = query.filter(product::Column::Category.eq(category));
        }
        if filter.low_stock == Some(true) {
            query = query.filter(
                Expr::col(product::Column::StockQuantity)
                    .lte(Expr::col(product::Column::MinStockLevel)),
            );
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, page.per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    /// Active products at or below their minimum, largest deficit first
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<ProductResponse>, ServiceError> {
        let items = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lte(Expr::col(product::Column::MinStockLevel)),
            )
            .order_by_desc(
                Expr::col(product::Column::MinStockLevel)
                    .sub(Expr::col(product::Column::StockQuantity)),
            )
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(items.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductResponse, ServiceError> {
        input.validate()?;
        if input.stock_quantity.is_some() {
            return Err(ServiceError::ValidationError(
                "stock_quantity cannot be edited directly; use restock or adjust".to_string(),
            ));
        }

        let existing = self.find(id).await?;
        let mut active: product::ActiveModel = existing.into();

        let mut sku = None;
        match input.sku {
            Some(Some(raw)) if raw.chars().count() > 64 => {
                return Err(ServiceError::ValidationError(
                    "sku must be at most 64 characters".to_string(),
                ));
            }
            Some(raw) => {
                // Blank behaves like null
                sku = Self::normalize_sku(raw);
                if let Some(sku) = sku.as_deref() {
                    self.ensure_sku_available(sku, Some(id)).await?;
                }
                active.sku = Set(sku.clone());
            }
            None => {}
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if input.category.is_some() {
            active.category = Set(normalize_string(input.category));
        }
        if input.description.is_some() {
            active.description = Set(normalize_string(input.description));
        }
        if let Some(unit) = normalize_string(input.unit) {
            active.unit = Set(unit);
        }
        if let Some(price) = input.price {
            ensure_amount("price", price)?;
            active.price = Set(money(price));
        }
        match input.rental_price {
            Some(Some(rental_price)) => {
                ensure_amount("rental_price", rental_price)?;
                active.rental_price = Set(Some(money(rental_price)));
            }
            Some(None) => active.rental_price = Set(None),
            None => {}
        }
        if let Some(min) = input.min_stock_level {
            active.min_stock_level = Set(min);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await.map_err(|e| match sku.as_deref() {
            Some(sku) if is_unique_violation(&e) => Self::duplicate_sku(sku),
            _ => ServiceError::DatabaseError(e),
        })?;

        info!(product_id = %id, "Product updated");
        dashboard::invalidate(&self.cache);
        Ok(model.into())
    }

    /// Soft delete; bills and history keep referring to the product
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        if !existing.is_active {
            return Ok(());
        }

        let mut active: product::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(product_id = %id, "Product deactivated");
        self.events.emit(Event::ProductDeactivated(id)).await;
        dashboard::invalidate(&self.cache);
        Ok(())
    }

    /// Adds stock and records a `restock` history row in one transaction
    #[instrument(skip(self, input), fields(product_id = %input.product_id, quantity = input.quantity))]
    pub async fn restock(
        &self,
        input: RestockInput,
        actor: Option<Uuid>,
    ) -> Result<StockMovementResponse, ServiceError> {
        input.validate()?;
        let existing = self.find(input.product_id).await?;
        if !existing.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "{} is inactive and cannot be restocked",
                existing.name
            )));
        }

        let txn = self.db.begin().await?;
        let (product, history) = apply_stock_change(
            &txn,
            StockChange {
                product_id: input.product_id,
                delta: input.quantity,
                change_type: StockChangeType::Restock,
                note: normalize_string(input.note),
                reference_id: None,
                actor,
            },
        )
        .await?;
        txn.commit().await?;

        info!(
            product_id = %product.id,
            new_quantity = product.stock_quantity,
            "Product restocked"
        );
        metrics::counter!("shopdesk.stock.restocks", 1);
        self.events
            .emit(Event::ProductRestocked {
                product_id: product.id,
                quantity: input.quantity,
                new_quantity: product.stock_quantity,
            })
            .await;
        Self::notify_stock_level(&self.events, self.low_stock_alerts, &product).await;
        dashboard::invalidate(&self.cache);

        Ok(StockMovementResponse {
            product: product.into(),
            history: history.into(),
        })
    }

    /// Manual correction, e.g. after a stock count or breakage
    #[instrument(skip(self, input), fields(quantity_change = input.quantity_change))]
    pub async fn adjust(
        &self,
        id: Uuid,
        input: AdjustStockInput,
        actor: Option<Uuid>,
    ) -> Result<StockMovementResponse, ServiceError> {
        input.validate()?;
        if input.quantity_change == 0 {
            return Err(ServiceError::ValidationError(
                "quantity_change must not be zero".to_string(),
            ));
        }
        if input.quantity_change.unsigned_abs() > MAX_STOCK_MOVEMENT {
            return Err(ServiceError::ValidationError(format!(
                "quantity_change must be within ±{}",
                MAX_STOCK_MOVEMENT
            )));
        }

        let txn = self.db.begin().await?;
        let (product, history) = apply_stock_change(
            &txn,
            StockChange {
                product_id: id,
                delta: input.quantity_change,
                change_type: StockChangeType::Adjustment,
                note: Some(input.note.trim().to_string()),
                reference_id: None,
                actor,
            },
        )
        .await?;
        txn.commit().await?;

        warn!(
            product_id = %id,
            quantity_change = input.quantity_change,
            new_quantity = product.stock_quantity,
            "Manual stock adjustment"
        );
        self.events
            .emit(Event::StockAdjusted {
                product_id: id,
                quantity_change: input.quantity_change,
                new_quantity: product.stock_quantity,
            })
            .await;
        Self::notify_stock_level(&self.events, self.low_stock_alerts, &product).await;
        dashboard::invalidate(&self.cache);

        Ok(StockMovementResponse {
            product: product.into(),
            history: history.into(),
        })
    }

    /// Stock movements of one product, newest first
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        id: Uuid,
        page: PageRequest,
    ) -> Result<PaginatedResponse<StockHistoryResponse>, ServiceError> {
        self.find(id).await?;

        let paginator = stock_history::Entity::find()
            .filter(stock_history::Column::ProductId.eq(id))
            .order_by_desc(stock_history::Column::CreatedAt)
            .paginate(&*self.db, page.per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }
}
