use std::error::Error;

use clap::{Parser, Subcommand};

use fmxml::{Action, LayoutItem, Query, Record, RecordItem, Server, SortField};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// FileMaker Server host
    host: String,
    /// XML gateway port
    #[arg(long, default_value_t = 80)]
    port: u16,
    /// Account name (empty for guest access)
    #[arg(long, default_value = "")]
    user: String,
    /// Account password
    #[arg(long, default_value = "")]
    password: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List databases hosted by the server
    Databases,
    /// List layouts in a database
    Layouts { database: String },
    /// Print the fields and related sets a layout exposes
    LayoutInfo { database: String, layout: String },
    /// Find records in a layout
    Find {
        database: String,
        layout: String,
        /// Records to skip in the found set
        #[arg(long, default_value_t = 0)]
        skip: u64,
        /// Maximum records to return (negative for all)
        #[arg(long, default_value_t = -1)]
        max: i64,
        /// Sort ascending by this field
        #[arg(long)]
        sort: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let server = Server::connect(&cli.host, cli.port, &cli.user, &cli.password);

    match cli.command {
        Command::Databases => {
            for name in server.database_names()? {
                println!("{name}");
            }
        }
        Command::Layouts { database } => {
            for name in server.layout_names(&database)? {
                println!("{name}");
            }
        }
        Command::LayoutInfo { database, layout } => {
            for item in server.layout_info(&database, &layout)?.items {
                match item {
                    LayoutItem::Field(def) => println!("{} ({:?})", def.name, def.ty),
                    LayoutItem::RelatedSet { table, fields } => {
                        println!("{table} (related set)");
                        for def in fields {
                            println!("  {} ({:?})", def.name, def.ty);
                        }
                    }
                }
            }
        }
        Command::Find {
            database,
            layout,
            skip,
            max,
            sort,
        } => {
            let mut query = Query::new(&database, &layout, Action::FindAll)
                .skip_records(skip)
                .max_records(max);
            if let Some(field) = sort {
                query = query.sort_fields(vec![SortField::ascending(field)]);
            }

            let set = server.query(&query)?;
            println!("found {} of {} records", set.found_count, set.database_info.record_count);
            for record in &set.records {
                print_record(record, 0);
            }
        }
    }

    Ok(())
}

fn print_record(record: &Record, indent: usize) {
    let pad = "  ".repeat(indent);
    println!("{pad}record {}", record.record_id);

    let mut names: Vec<&String> = record.elements.keys().collect();
    names.sort();
    for name in names {
        match &record.elements[name] {
            RecordItem::Field(_, value) => println!("{pad}  {name} = {value}"),
            RecordItem::RelatedSet(_, related) => {
                println!("{pad}  {name}:");
                for child in related {
                    print_record(child, indent + 2);
                }
            }
        }
    }
}
