// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use recipe_catalog::aggregate::{AggregateKey, GroupBy, GroupOrder};
use recipe_catalog::catalog::recipe_detail;
use recipe_catalog::database::models::{RecipeField, RecipeId, RecipeUnique};
use recipe_catalog::logging::stdout_filter;
use recipe_catalog::query::SortOrder;
use recipe_catalog::{Client, ClientConfig, Executor as _};
use std::path::PathBuf;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
struct Args {
    /// The SQLite database file. Defaults to `DATABASE_URL`, then to the user data directory.
    #[arg(long)]
    database: Option<String>,
    /// A TOML file with client settings.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates the database if needed and applies pending migrations.
    Migrate,
    /// Prints a recipe with its category, yield unit, author and lines.
    Show { id: i32 },
    /// Runs a query and prints its rows.
    Query { sql: String },
    /// Runs a statement and prints how many rows it changed.
    Execute { sql: String },
    /// Prints how many recipes each category has.
    CategoryCounts,
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(client: &Client, command: Commands) -> Result<()> {
    let rendered = |e: recipe_catalog::Error| client.render_error(&e);
    match command {
        Commands::Migrate => log::info!("database is up to date"),
        Commands::Show { id } => {
            let key = RecipeUnique::Id(RecipeId::new(id));
            let detail = client
                .transaction(|tx| recipe_detail(tx, &key))
                .map_err(rendered)?;
            match detail {
                Some(detail) => print_json(&detail)?,
                None => return Err(format!("no recipe with id {id}").into()),
            }
        }
        Commands::Query { sql } => print_json(&client.query_raw(&sql, vec![]).map_err(rendered)?)?,
        Commands::Execute { sql } => {
            let changed = client.execute_raw(&sql, vec![]).map_err(rendered)?;
            println!("{changed} row(s) changed");
        }
        Commands::CategoryCounts => {
            let groups = client
                .recipes()
                .group_by(
                    GroupBy::new([RecipeField::CategoryId])
                        .select(AggregateKey::count_all())
                        .order_by(GroupOrder::Field(RecipeField::CategoryId, SortOrder::Asc)),
                )
                .map_err(rendered)?;
            print_json(&groups)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_toml_file(path)?,
        None => ClientConfig::default(),
    };
    simple_logger::SimpleLogger::new()
        .with_level(stdout_filter(&config.log))
        .env()
        .init()?;

    if let Some(database) = args.database {
        config = config.with_datasource_url(database);
    }
    let format = config.error_format;
    let client = Client::connect(config).map_err(|e| e.render(format))?;
    run(&client, args.commands)
}
