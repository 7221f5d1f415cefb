use std::{collections::HashMap, fs, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use uuid::Uuid;

use quoteflow::{
    auth::ActorRole,
    client::HttpPersistenceApi,
    config::{self, WorkflowConfig},
    events::{self, Event, EventSender},
    models::{Inquiry, InquiryStatus, Order, OrderStatus, QuotationUpload},
    services::{
        pricing,
        workflow::{DispatchRequest, WorkflowService},
    },
    timeline::{self, Milestone, MilestoneState, OrderProgress, OrderStatusSummary},
    WorkflowError,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;
    let role = cli
        .role
        .map(ActorRole::from)
        .unwrap_or(context.config.default_actor_role);

    match cli.command {
        Commands::Inquiry(command) => {
            handle_inquiry_command(&context, command, role, cli.json).await?
        }
        Commands::Quotation(command) => {
            handle_quotation_command(&context, command, role, cli.json).await?
        }
        Commands::Order(command) => handle_order_command(&context, command, role, cli.json).await?,
        Commands::Orders(command) => handle_orders_command(&context, command, cli.json).await?,
        Commands::SmsTest(args) => handle_sms_test(&context, args, cli.json).await?,
    }

    Ok(())
}

const BUILD_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "quoteflow",
    about = "Workflow CLI for the quoting desk: inquiries, quotations, and orders",
    version = BUILD_VERSION
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[arg(
        long,
        global = true,
        value_enum,
        help = "Act as this role (defaults to the configured role)"
    )]
    role: Option<RoleArg>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Inquiry(InquiryCommands),
    #[command(subcommand)]
    Quotation(QuotationCommands),
    #[command(subcommand)]
    Order(OrderCommands),
    #[command(subcommand)]
    Orders(OrdersCommands),
    SmsTest(SmsTestArgs),
}

#[derive(Subcommand)]
enum InquiryCommands {
    Get(GetInquiryArgs),
    SetStatus(SetInquiryStatusArgs),
}

#[derive(Subcommand)]
enum QuotationCommands {
    Create(CreateQuotationArgs),
    Upload(UploadQuotationArgs),
    Send(SendQuotationArgs),
}

#[derive(Subcommand)]
enum OrderCommands {
    Get(GetOrderArgs),
    List(ListOrdersArgs),
    SetStatus(SetOrderStatusArgs),
    Dispatch(DispatchOrderArgs),
    SetDelivery(SetDeliveryArgs),
}

#[derive(Subcommand)]
enum OrdersCommands {
    /// Per-status counts across all orders
    Summary,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Customer,
    Backoffice,
    Subadmin,
    Admin,
}

impl From<RoleArg> for ActorRole {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Customer => ActorRole::Customer,
            RoleArg::Backoffice => ActorRole::Backoffice,
            RoleArg::Subadmin => ActorRole::Subadmin,
            RoleArg::Admin => ActorRole::Admin,
        }
    }
}

/// Statuses an inquiry can be asked to move to. `pending` is only ever a
/// starting point and `order_created` is set collaborator-side.
#[derive(Clone, Copy, ValueEnum)]
enum InquiryStatusArg {
    Quoted,
    Accepted,
    Rejected,
}

impl From<InquiryStatusArg> for InquiryStatus {
    fn from(value: InquiryStatusArg) -> Self {
        match value {
            InquiryStatusArg::Quoted => InquiryStatus::Quoted,
            InquiryStatusArg::Accepted => InquiryStatus::Accepted,
            InquiryStatusArg::Rejected => InquiryStatus::Rejected,
        }
    }
}

/// Statuses an order can be asked to move to here. Dispatching carries
/// courier details and goes through `order dispatch` instead.
#[derive(Clone, Copy, ValueEnum)]
enum OrderStatusArg {
    Confirmed,
    InProduction,
    ReadyForDispatch,
    Delivered,
    Cancelled,
}

impl From<OrderStatusArg> for OrderStatus {
    fn from(value: OrderStatusArg) -> Self {
        match value {
            OrderStatusArg::Confirmed => OrderStatus::Confirmed,
            OrderStatusArg::InProduction => OrderStatus::InProduction,
            OrderStatusArg::ReadyForDispatch => OrderStatus::ReadyForDispatch,
            OrderStatusArg::Delivered => OrderStatus::Delivered,
            OrderStatusArg::Cancelled => OrderStatus::Cancelled,
        }
    }
}

#[derive(Args)]
struct GetInquiryArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Inquiry identifier")]
    id: Uuid,
}

#[derive(Args)]
struct SetInquiryStatusArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Inquiry identifier")]
    id: Uuid,
    #[arg(long, value_enum, help = "New status value")]
    status: InquiryStatusArg,
}

#[derive(Args)]
struct CreateQuotationArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Inquiry identifier")]
    inquiry_id: Uuid,
    #[arg(
        long,
        help = "CSV price sheet (part_ref,material,unit_price) applied to the inquiry parts"
    )]
    price_sheet: Option<PathBuf>,
    #[arg(
        long = "material-price",
        value_parser = parse_material_price,
        help = "Price every part of a material, as material=unit_price; repeatable"
    )]
    material_prices: Vec<(String, Decimal)>,
    #[arg(long, help = "Terms shown on the quotation (standard terms if omitted)")]
    terms: Option<String>,
    #[arg(long, help = "Internal notes")]
    notes: Option<String>,
    #[arg(
        long,
        value_parser = parse_datetime,
        help = "Validity deadline, RFC3339 (30 days out if omitted)"
    )]
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct UploadQuotationArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Inquiry identifier")]
    inquiry_id: Uuid,
    #[arg(long, help = "Path to the quotation PDF")]
    file: PathBuf,
    #[arg(long, value_parser = parse_decimal, help = "Quotation total")]
    total_amount: Decimal,
    #[arg(long, help = "Terms shown on the quotation (standard terms if omitted)")]
    terms: Option<String>,
    #[arg(long, help = "Internal notes")]
    notes: Option<String>,
    #[arg(
        long,
        value_parser = parse_datetime,
        help = "Validity deadline, RFC3339 (30 days out if omitted)"
    )]
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct SendQuotationArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Quotation identifier")]
    id: Uuid,
}

#[derive(Args)]
struct GetOrderArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Order identifier")]
    id: Uuid,
}

#[derive(Args)]
struct ListOrdersArgs {
    #[arg(
        long,
        value_parser = parse_order_status,
        help = "Filter by status (e.g. in_production)"
    )]
    status: Option<OrderStatus>,
}

#[derive(Args)]
struct SetOrderStatusArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Order identifier")]
    id: Uuid,
    #[arg(long, value_enum, help = "New status value")]
    status: OrderStatusArg,
    #[arg(
        long,
        help = "Notes to include with the change (a standard note if omitted)"
    )]
    notes: Option<String>,
}

#[derive(Args)]
struct DispatchOrderArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Order identifier")]
    id: Uuid,
    #[arg(long, help = "Courier carrying the shipment")]
    courier: String,
    #[arg(long, help = "Courier tracking number")]
    tracking_number: String,
    #[arg(
        long,
        value_parser = parse_datetime,
        help = "Estimated delivery, RFC3339"
    )]
    estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct SetDeliveryArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Order identifier")]
    id: Uuid,
    #[arg(long, value_parser = parse_datetime, help = "Estimated delivery, RFC3339")]
    estimated_delivery: DateTime<Utc>,
    #[arg(
        long,
        help = "Notes to include with the change (a standard note if omitted)"
    )]
    notes: Option<String>,
}

#[derive(Args)]
struct SmsTestArgs {
    #[arg(long, help = "Destination phone number")]
    phone: String,
    #[arg(long, help = "Message body")]
    message: String,
}

struct CliContext {
    config: WorkflowConfig,
    service: WorkflowService,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        config::init_tracing(config.log_level(), config.log_json);

        let (event_tx, event_rx) = mpsc::channel::<Event>(32);
        tokio::spawn(events::process_events(event_rx));

        let api = HttpPersistenceApi::new(&config).context("failed to build the API client")?;
        let service = WorkflowService::new(
            Arc::new(api),
            Some(Arc::new(EventSender::new(event_tx))),
            config.optimistic_locking,
        );

        Ok(Self { config, service })
    }
}

async fn handle_inquiry_command(
    context: &CliContext,
    command: InquiryCommands,
    role: ActorRole,
    json: bool,
) -> Result<()> {
    match command {
        InquiryCommands::Get(args) => {
            let inquiry = context
                .service
                .get_inquiry(args.id)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&inquiry)?;
            } else {
                render_inquiry(&inquiry);
                for milestone in timeline::inquiry_timeline(&inquiry) {
                    render_milestone(&milestone);
                }
            }
            Ok(())
        }
        InquiryCommands::SetStatus(args) => {
            let updated = context
                .service
                .update_inquiry_status(args.id, args.status.into(), role)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&updated)?;
            } else {
                println!("Inquiry {} is now {}", updated.id, updated.status);
            }
            Ok(())
        }
    }
}

async fn handle_quotation_command(
    context: &CliContext,
    command: QuotationCommands,
    role: ActorRole,
    json: bool,
) -> Result<()> {
    match command {
        QuotationCommands::Create(args) => handle_quotation_create(context, args, role, json).await,
        QuotationCommands::Upload(args) => handle_quotation_upload(context, args, role, json).await,
        QuotationCommands::Send(args) => {
            let sent = context
                .service
                .send_quotation(args.id, role)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&sent)?;
            } else {
                println!("Quotation {} sent to the customer", sent.id);
            }
            Ok(())
        }
    }
}

async fn handle_quotation_create(
    context: &CliContext,
    args: CreateQuotationArgs,
    role: ActorRole,
    json: bool,
) -> Result<()> {
    let inquiry = context
        .service
        .get_inquiry(args.inquiry_id)
        .await
        .map_err(user_error)?;
    let mut parts = pricing::seed_parts(&inquiry);

    let mut sheet_priced = None;
    if let Some(path) = &args.price_sheet {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read price sheet {}", path.display()))?;
        let sheet = pricing::PriceSheet::parse(&text);
        if !sheet.skipped_lines.is_empty() {
            eprintln!(
                "Skipped unparsable price sheet line(s): {}",
                sheet
                    .skipped_lines
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        sheet_priced = Some(sheet.apply(&mut parts).map_err(user_error)?);
    }

    if !args.material_prices.is_empty() {
        let prices: HashMap<String, Decimal> = args.material_prices.iter().cloned().collect();
        pricing::apply_material_prices(&mut parts, &prices).map_err(user_error)?;
    }

    let draft = pricing::build_draft(
        args.inquiry_id,
        parts,
        args.terms,
        args.notes,
        args.valid_until,
        Utc::now(),
    );
    let quotation = context
        .service
        .create_quotation(args.inquiry_id, draft, role)
        .await
        .map_err(user_error)?;

    if json {
        print_json(&quotation)?;
    } else {
        if let Some(priced) = sheet_priced {
            println!("Priced {} part(s) from the sheet", priced);
        }
        println!(
            "Quotation {} created for inquiry {} (total {})",
            quotation.id, args.inquiry_id, quotation.total_amount
        );
    }
    Ok(())
}

async fn handle_quotation_upload(
    context: &CliContext,
    args: UploadQuotationArgs,
    role: ActorRole,
    json: bool,
) -> Result<()> {
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("{} has no usable file name", args.file.display()))?;
    let pdf_bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let upload = QuotationUpload {
        inquiry_ref: args.inquiry_id,
        file_name,
        pdf_bytes,
        total_amount: args.total_amount,
        customer: None,
        terms: args
            .terms
            .unwrap_or_else(|| pricing::DEFAULT_TERMS.to_owned()),
        notes: args.notes,
        valid_until: args
            .valid_until
            .unwrap_or_else(|| Utc::now() + Duration::days(pricing::DEFAULT_VALIDITY_DAYS)),
    };
    let quotation = context
        .service
        .upload_quotation(args.inquiry_id, upload, role)
        .await
        .map_err(user_error)?;

    if json {
        print_json(&quotation)?;
    } else {
        println!(
            "Quotation {} uploaded for inquiry {} (total {})",
            quotation.id, args.inquiry_id, quotation.total_amount
        );
    }
    Ok(())
}

async fn handle_order_command(
    context: &CliContext,
    command: OrderCommands,
    role: ActorRole,
    json: bool,
) -> Result<()> {
    match command {
        OrderCommands::Get(args) => {
            let order = context
                .service
                .get_order(args.id)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&order)?;
            } else {
                render_order(&order);
            }
            Ok(())
        }
        OrderCommands::List(args) => {
            let mut orders = context.service.list_orders().await.map_err(user_error)?;
            if let Some(status) = args.status {
                orders.retain(|order| order.status == status);
            }
            if json {
                print_json(&orders)?;
            } else if orders.is_empty() {
                println!("No matching orders");
            } else {
                println!("{} order(s):", orders.len());
                for order in &orders {
                    render_order(order);
                }
            }
            Ok(())
        }
        OrderCommands::SetStatus(args) => {
            let status: OrderStatus = args.status.into();
            let notes = args
                .notes
                .or_else(|| standard_note(status).map(str::to_owned));
            let updated = context
                .service
                .update_order_status(args.id, status, role, notes)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&updated)?;
            } else {
                println!("Order {} is now {}", updated.id, updated.status);
            }
            Ok(())
        }
        OrderCommands::Dispatch(args) => {
            let updated = context
                .service
                .dispatch_order(
                    args.id,
                    DispatchRequest {
                        courier: args.courier,
                        tracking_number: args.tracking_number,
                        estimated_delivery: args.estimated_delivery,
                    },
                    role,
                )
                .await
                .map_err(user_error)?;
            if json {
                print_json(&updated)?;
            } else {
                render_order(&updated);
            }
            Ok(())
        }
        OrderCommands::SetDelivery(args) => {
            let notes = args
                .notes
                .unwrap_or_else(|| "Production started with estimated delivery time".to_owned());
            let updated = context
                .service
                .update_delivery(args.id, args.estimated_delivery, Some(notes), role)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&updated)?;
            } else {
                println!(
                    "Order {} delivery estimate set to {}",
                    updated.id, args.estimated_delivery
                );
            }
            Ok(())
        }
    }
}

async fn handle_orders_command(
    context: &CliContext,
    command: OrdersCommands,
    json: bool,
) -> Result<()> {
    match command {
        OrdersCommands::Summary => {
            let orders = context.service.list_orders().await.map_err(user_error)?;
            let summary = OrderStatusSummary::tally(&orders);
            if json {
                print_json(&summary)?;
            } else {
                render_summary(&summary);
            }
            Ok(())
        }
    }
}

async fn handle_sms_test(context: &CliContext, args: SmsTestArgs, json: bool) -> Result<()> {
    let acknowledgement = context
        .service
        .send_test_sms(&args.phone, &args.message)
        .await
        .map_err(user_error)?;
    if json {
        print_json(&serde_json::json!({ "message": acknowledgement }))?;
    } else {
        println!("{}", acknowledgement);
    }
    Ok(())
}

/// The note the web form attaches when the operator does not write one.
fn standard_note(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Confirmed => Some("Order confirmed and ready for production"),
        OrderStatus::InProduction => Some("Production started for this order"),
        OrderStatus::ReadyForDispatch => Some("Order completed and ready for dispatch"),
        OrderStatus::Delivered => Some("Order delivered successfully"),
        _ => None,
    }
}

fn user_error(err: WorkflowError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_inquiry(inquiry: &Inquiry) {
    println!(
        "- Inquiry {} • customer {} • status {} • {} part(s)",
        inquiry.id,
        inquiry.customer_ref,
        inquiry.status,
        inquiry.parts.len()
    );
    if let Some(quotation_ref) = inquiry.quotation_ref {
        println!("  • quotation {}", quotation_ref);
    }
}

fn render_milestone(milestone: &Milestone) {
    let marker = match milestone.state {
        MilestoneState::Done => "x",
        MilestoneState::Current => ">",
        MilestoneState::Pending => " ",
    };
    match milestone.at {
        Some(at) => println!("  [{marker}] {} ({at})", milestone.label),
        None => println!("  [{marker}] {}", milestone.label),
    }
}

fn render_order(order: &Order) {
    println!(
        "- Order {} • customer {} • status {} • total {}",
        order.id, order.customer_ref, order.status, order.total_amount
    );
    match timeline::order_progress(order.status) {
        OrderProgress::OnTrack { step, of } => println!("  • pipeline step {step}/{of}"),
        OrderProgress::Cancelled => println!("  • off the pipeline (cancelled)"),
    }
    if let Some(dispatch) = &order.dispatch {
        println!(
            "  • dispatched via {} ({})",
            dispatch.courier, dispatch.tracking_number
        );
    }
    if let Some(estimate) = order.estimated_delivery {
        println!("  • estimated delivery {}", estimate);
    }
}

fn render_summary(summary: &OrderStatusSummary) {
    println!("Orders: {} total, {} open", summary.total, summary.open());
    for status in OrderStatus::iter() {
        println!("  • {:<18} {}", status.to_string(), summary.count(status));
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw).map_err(|_| format!("invalid decimal '{raw}'"))
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("invalid datetime '{}', expected RFC3339", raw))
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, String> {
    OrderStatus::from_str(raw).map_err(|_| format!("invalid status '{raw}'"))
}

fn parse_material_price(raw: &str) -> Result<(String, Decimal), String> {
    let (material, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid material price '{raw}', expected material=price"))?;
    let material = material.trim();
    if material.is_empty() {
        return Err(format!("invalid material price '{raw}', material is empty"));
    }
    let price = Decimal::from_str(price.trim())
        .map_err(|_| format!("invalid decimal '{}'", price.trim()))?;
    Ok((material.to_owned(), price))
}
