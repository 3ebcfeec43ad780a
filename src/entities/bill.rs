use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sales or rental bill header
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bill_type: BillType,
    pub serial_no: i64,
    #[sea_orm(nullable)]
    pub customer_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub customer_name: Option<String>,
    #[sea_orm(nullable)]
    pub customer_phone: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 4)))")]
    pub tax_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub paid_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    #[sea_orm(nullable)]
    pub rental_start: Option<NaiveDate>,
    #[sea_orm(nullable)]
    pub rental_end: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub deposit: Option<Decimal>,
    #[sea_orm(nullable)]
    pub returned_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub notes: Option<String>,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Printed bill number, e.g. `S-000042`
    pub fn display_number(&self) -> String {
        format!("{}-{:06}", self.bill_type.prefix(), self.serial_no)
    }

    pub fn balance_due(&self) -> Decimal {
        (self.total - self.paid_amount).max(Decimal::ZERO)
    }

    /// Rental still out after its end date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.bill_type == BillType::Rental
            && self.returned_at.is_none()
            && self.rental_end.map(|end| end < today).unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bill_item::Entity")]
    Items,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::bill_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "rental")]
    Rental,
}

impl BillType {
    pub fn prefix(&self) -> &'static str {
        match self {
            BillType::Sale => "S",
            BillType::Rental => "R",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Sale => "sale",
            BillType::Rental => "rental",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bill(bill_type: BillType, serial_no: i64) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            bill_type,
            serial_no,
            customer_id: None,
            customer_name: None,
            customer_phone: None,
            subtotal: dec!(100),
            discount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: dec!(100),
            paid_amount: dec!(40),
            payment_status: PaymentStatus::Partial,
            payment_method: "cash".into(),
            rental_start: None,
            rental_end: None,
            deposit: None,
            returned_at: None,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn display_number_is_prefixed_and_padded() {
        assert_eq!(bill(BillType::Sale, 42).display_number(), "S-000042");
        assert_eq!(bill(BillType::Rental, 7).display_number(), "R-000007");
    }

    #[test]
    fn balance_due_never_negative() {
        let mut b = bill(BillType::Sale, 1);
        assert_eq!(b.balance_due(), dec!(60));
        b.paid_amount = dec!(150);
        assert_eq!(b.balance_due(), Decimal::ZERO);
    }

    #[test]
    fn overdue_only_for_unreturned_rentals_past_end() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let mut b = bill(BillType::Rental, 1);
        b.rental_end = NaiveDate::from_ymd_opt(2024, 5, 9);
        assert!(b.is_overdue(today));

        b.returned_at = Some(Utc::now());
        assert!(!b.is_overdue(today));

        let mut sale = bill(BillType::Sale, 2);
        sale.rental_end = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert!(!sale.is_overdue(today));
    }
}
