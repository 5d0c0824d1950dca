use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use agri_backoffice::{
    DeliveryStatus, NewDelivery, NewOrderLine, OrderKind, Transaction, TransactionType,
    create_delivery, create_order, create_transaction, initialize_db, update_delivery_status,
};

/// A utility for creating a demo database for the finance back-office server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// How many days of history to generate.
    #[arg(long, short, default_value_t = 90)]
    days: i64,
}

const DRIVERS: [&str; 3] = ["Kamau", "Achieng", "Mutua"];
const FARMERS: [&str; 3] = ["Wanjiru Farm", "Otieno Growers", "Kiprop Dairy"];
const EXPENSE_CATEGORIES: [&str; 4] = ["Fuel", "Packaging", "Salaries", "Rent"];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'demo.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    let now = OffsetDateTime::now_utc();

    println!("Creating {} days of records...", args.days);
    for day in 0..args.days {
        let date = now - Duration::days(day);
        let index = day as usize;

        create_order(
            &format!("ORD-{:04}", day + 1),
            vec![
                NewOrderLine {
                    farmer: FARMERS[index % FARMERS.len()].to_owned(),
                    kind: OrderKind::Inventory,
                    item: "Tomatoes (crate)".to_owned(),
                    quantity: 1 + (day % 5) as u32,
                    unit_price: 1200.0,
                },
                NewOrderLine {
                    farmer: FARMERS[(index + 1) % FARMERS.len()].to_owned(),
                    kind: OrderKind::Rental,
                    item: "Tractor (day)".to_owned(),
                    quantity: 1,
                    unit_price: 4500.0,
                },
            ],
            date,
            &conn,
        )?;

        let delivery = create_delivery(
            NewDelivery {
                order_ref: Some(format!("ORD-{:04}", day + 1)),
                driver: Some(DRIVERS[index % DRIVERS.len()].to_owned()),
                fee: 250.0,
                created_at: date,
            },
            &conn,
        )?;
        if day > 0 {
            update_delivery_status(delivery.id, DeliveryStatus::InTransit, date, &conn)?;
            update_delivery_status(
                delivery.id,
                DeliveryStatus::Delivered,
                date + Duration::hours(3),
                &conn,
            )?;
        }

        if day % 3 == 0 {
            create_transaction(
                Transaction::build(TransactionType::Expense, 800.0 + (day * 37 % 500) as f64, date)
                    .category(Some(
                        EXPENSE_CATEGORIES[index % EXPENSE_CATEGORIES.len()].to_owned(),
                    ))
                    .description(Some("Demo expense".to_owned())),
                &conn,
            )?;
        }

        if day % 7 == 0 {
            create_transaction(
                Transaction::build(TransactionType::Income, 2000.0, date)
                    .source(Some("other".to_owned()))
                    .description(Some("Market stall hire".to_owned())),
                &conn,
            )?;
        }
    }

    println!("Success!");

    Ok(())
}
