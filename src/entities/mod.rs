pub mod admin;
pub mod bill;
pub mod bill_item;
pub mod booking;
pub mod customer;
pub mod product;
pub mod stock_history;
pub mod subscription;
