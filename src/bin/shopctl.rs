use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shopdesk_api::{
    config, db,
    entities::admin::AdminRole,
    events::{self, EventSender},
    services::{
        admins::{AdminResponse, CreateAdminInput},
        plans::plan_catalog,
    },
    AppState,
};
use tokio::sync::mpsc;

/// Operator tooling for a ShopDesk installation
#[derive(Parser)]
#[command(name = "shopctl", version, about)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a back-office account without going through the API
    CreateAdmin(CreateAdminArgs),
    /// List admin accounts
    Admins,
    /// Print the plan catalog
    Plans,
    /// Show the current subscription and usage
    Subscription,
    /// List active products at or below their minimum stock level
    LowStock,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long, value_enum, default_value_t = RoleArg::Owner)]
    role: RoleArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Owner,
    Staff,
}

impl From<RoleArg> for AdminRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Owner => AdminRole::Owner,
            RoleArg::Staff => AdminRole::Staff,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load application config")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;

    if let Commands::Migrate = cli.command {
        db::run_migrations(&db_pool)
            .await
            .context("failed to run migrations")?;
        println!("Migrations applied");
        return Ok(());
    }

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    tokio::spawn(events::process_events(event_rx));
    let state = AppState::new(Arc::new(db_pool), cfg, EventSender::new(event_tx));
    let services = &state.services;

    match cli.command {
        Commands::Migrate => {}
        Commands::CreateAdmin(args) => {
            let admin = services
                .admins
                .create_admin(CreateAdminInput {
                    username: args.username,
                    password: args.password,
                    display_name: args.display_name,
                    role: Some(args.role.into()),
                })
                .await
                .context("failed to create admin")?;
            if cli.json {
                print_json(&admin)?;
            } else {
                println!("Created admin:");
                render_admin(&admin);
            }
        }
        Commands::Admins => {
            let admins = services.admins.list().await.context("failed to list admins")?;
            if cli.json {
                print_json(&admins)?;
            } else if admins.is_empty() {
                println!("No admin accounts yet; run `shopctl create-admin` or POST /api/v1/auth/setup");
            } else {
                admins.iter().for_each(render_admin);
            }
        }
        Commands::Plans => {
            let plans = plan_catalog();
            if cli.json {
                print_json(&plans)?;
            } else {
                for plan in &plans {
                    println!(
                        "- {} • customers {} • products {} • bills/month {} • features {:?}",
                        plan.name,
                        limit_label(plan.limits.max_customers),
                        limit_label(plan.limits.max_products),
                        limit_label(plan.limits.max_bills_per_month),
                        plan.features
                    );
                }
            }
        }
        Commands::Subscription => {
            let overview = services
                .plans
                .overview()
                .await
                .context("failed to load subscription")?;
            if cli.json {
                print_json(&overview)?;
            } else {
                println!("Plan: {} ({:?})", overview.plan.name, overview.status);
                if let Some(expires_at) = overview.expires_at {
                    println!("Expires: {}", expires_at.to_rfc3339());
                }
                println!(
                    "Usage: {} customers • {} products • {} bills this month",
                    overview.usage.customers, overview.usage.products, overview.usage.bills_this_month
                );
            }
        }
        Commands::LowStock => {
            let products = services
                .products
                .low_stock()
                .await
                .context("failed to list low stock products")?;
            if cli.json {
                print_json(&products)?;
            } else if products.is_empty() {
                println!("All products are above their minimum stock level");
            } else {
                for product in &products {
                    println!(
                        "- {} [{}] • {} {} on hand • minimum {} • short {}",
                        product.name,
                        product.sku.as_deref().unwrap_or("-"),
                        product.stock_quantity,
                        product.unit,
                        product.min_stock_level,
                        product.stock_deficit
                    );
                }
            }
        }
    }

    Ok(())
}

fn limit_label(limit: Option<u64>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_admin(admin: &AdminResponse) {
    println!(
        "- {} • {} • role {} • {}",
        admin.id,
        admin.username,
        admin.role.as_str(),
        if admin.is_active { "active" } else { "disabled" }
    );
}
