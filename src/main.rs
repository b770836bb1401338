//! Factorio Production Ratios
//!
//! A production ratio and cargo wagon calculator for Factorio.

mod allocator;
mod db;
mod extract;
mod models;
mod resolver;
mod tables;

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::models::Catalog;

#[derive(Parser)]
#[command(name = "factorio-ratios")]
#[command(about = "Production ratio and cargo wagon calculator for Factorio")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "factorio_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract recipe and item data from the game's prototype files
    Extract {
        /// Path to an unpacked game data directory
        data_dir: PathBuf,

        /// Clear existing data before extraction
        #[arg(long)]
        clear: bool,
    },

    /// Per-unit intermediate costs for a recipe
    Cost {
        /// Target recipe (e.g. "electronic-circuit")
        recipe: String,

        /// Comma-separated boundary items (defaults to the stored intermediate set)
        #[arg(short, long)]
        boundary: Option<String>,
    },

    /// Balance a cargo wagon's slots across a recipe's inputs
    Wagon {
        /// Target recipe
        recipe: String,

        /// Storage slots available
        #[arg(short, long, default_value_t = tables::WAGON_SLOTS)]
        slots: u32,

        /// Comma-separated boundary items (defaults to the stored intermediate set)
        #[arg(short, long)]
        boundary: Option<String>,
    },

    /// Render the wagon-ratio and compression reference tables
    Tables {
        /// Storage slots available
        #[arg(short, long, default_value_t = tables::WAGON_SLOTS)]
        slots: u32,
    },

    /// List all recipes in the database
    ListRecipes,

    /// List all items in the database
    ListItems,

    /// Show details for a specific recipe
    Recipe {
        /// Recipe name
        name: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without game files)
    LoadSample,
}

/// Recipes shown by the `tables` command
const SHOWCASE_RECIPES: &[&str] = &[
    "electronic-circuit",
    "advanced-circuit",
    "science-pack-1",
    "transport-belt",
    "inserter",
    "battery",
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Extract { data_dir, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_catalog(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &data_dir)?;
            println!("\n{}", stats);
        }

        Commands::Cost { recipe, boundary } => {
            let catalog = db::load_catalog(&conn)?;
            let boundary = boundary_set(&catalog, boundary.as_deref());
            let costs = resolver::resolve(&catalog, &recipe, &boundary)?;
            println!("Per-unit costs for {}:\n", recipe);
            print!("{}", tables::unit_cost_table(&costs));
        }

        Commands::Wagon {
            recipe,
            slots,
            boundary,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let boundary = boundary_set(&catalog, boundary.as_deref());
            print!(
                "{}",
                tables::wagon_ratio_table(&catalog, &[recipe.as_str()], &boundary, slots)?
            );
        }

        Commands::Tables { slots } => {
            let catalog = db::load_catalog(&conn)?;
            println!("Stack Ratios for Mixed Cargo Wagons\n");
            print!(
                "{}",
                tables::wagon_ratio_table(
                    &catalog,
                    SHOWCASE_RECIPES,
                    catalog.intermediates(),
                    slots
                )?
            );
            println!("\nCompression Ratios\n");
            print!("{}", tables::compression_table(&catalog, SHOWCASE_RECIPES)?);
        }

        Commands::ListRecipes => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.recipes().is_empty() {
                println!("No recipes in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!("{:<32} {}", "Recipe", "Category");
                println!("{}", "-".repeat(48));
                for recipe in catalog.recipes() {
                    println!("{:<32} {}", recipe.name, recipe.category);
                }
            }
        }

        Commands::ListItems => {
            let catalog = db::load_catalog(&conn)?;
            let mut items: Vec<_> = catalog.items().collect();
            if items.is_empty() {
                println!("No items in database. Run 'extract' or 'load-sample' first.");
            } else {
                items.sort_by(|a, b| a.name.cmp(&b.name));
                println!("{:<32} {:>10}", "Item", "Stack");
                println!("{}", "-".repeat(43));
                for item in items {
                    println!("{:<32} {:>10}", item.name, item.stack_size);
                }
            }
        }

        Commands::Recipe { name } => {
            let catalog = db::load_catalog(&conn)?;
            if let Some(recipe) = catalog.recipe(&name) {
                println!("Recipe: {}", recipe.name);
                println!("  Category: {}", recipe.category);
                if let Some(bonus) = catalog.yield_bonus(&recipe.name) {
                    println!("  Yield multiplier: {}", bonus);
                }
                println!("  Ingredients:");
                for ing in &recipe.ingredients {
                    println!("    {} x{} ({})", ing.name, ing.amount, ing.kind.as_str());
                }
                println!("  Products:");
                for product in &recipe.products {
                    match catalog.item(&product.name) {
                        Some(item) => println!(
                            "    {} x{} ({}, stack {})",
                            product.name,
                            product.amount,
                            product.kind.as_str(),
                            item.stack_size
                        ),
                        None => println!(
                            "    {} x{} ({})",
                            product.name,
                            product.amount,
                            product.kind.as_str()
                        ),
                    }
                }
            } else {
                println!("Recipe '{}' not found", name);
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

fn boundary_set(catalog: &Catalog, flag: Option<&str>) -> BTreeSet<String> {
    match flag {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => catalog.intermediates().clone(),
    }
}

/// Load a small self-contained catalog for testing without game files
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{Item, Kind, Reagent, Recipe};

    db::clear_catalog(conn)?;

    let items: &[(&str, u32)] = &[
        ("iron-plate", 100),
        ("copper-plate", 100),
        ("steel-plate", 100),
        ("plastic-bar", 100),
        ("sulfur", 50),
        ("coal", 50),
        ("iron-gear-wheel", 100),
        ("copper-cable", 200),
        ("electronic-circuit", 200),
        ("advanced-circuit", 200),
        ("battery", 200),
        ("empty-barrel", 10),
        ("sulfuric-acid-barrel", 10),
        ("transport-belt", 100),
        ("inserter", 50),
        ("science-pack-1", 200),
    ];
    for (name, stack_size) in items {
        db::upsert_item(
            conn,
            &Item {
                name: name.to_string(),
                stack_size: *stack_size,
            },
        )?;
    }

    let item = |name: &str, amount: f64| Reagent {
        name: name.to_string(),
        amount,
        kind: Kind::Item,
    };
    let fluid = |name: &str, amount: f64| Reagent {
        name: name.to_string(),
        amount,
        kind: Kind::Fluid,
    };
    let recipe = |name: &str, category: &str, ingredients: Vec<Reagent>, products: Vec<Reagent>| {
        Recipe {
            name: name.to_string(),
            category: category.to_string(),
            ingredients,
            products,
        }
    };

    let recipes = vec![
        recipe(
            "iron-gear-wheel",
            "crafting",
            vec![item("iron-plate", 2.0)],
            vec![item("iron-gear-wheel", 1.0)],
        ),
        recipe(
            "copper-cable",
            "crafting",
            vec![item("copper-plate", 1.0)],
            vec![item("copper-cable", 2.0)],
        ),
        recipe(
            "electronic-circuit",
            "crafting",
            vec![item("iron-plate", 1.0), item("copper-cable", 3.0)],
            vec![item("electronic-circuit", 1.0)],
        ),
        recipe(
            "advanced-circuit",
            "crafting",
            vec![
                item("electronic-circuit", 2.0),
                item("plastic-bar", 2.0),
                item("copper-cable", 4.0),
            ],
            vec![item("advanced-circuit", 1.0)],
        ),
        recipe(
            "transport-belt",
            "crafting",
            vec![item("iron-plate", 1.0), item("iron-gear-wheel", 1.0)],
            vec![item("transport-belt", 2.0)],
        ),
        recipe(
            "inserter",
            "crafting",
            vec![
                item("electronic-circuit", 1.0),
                item("iron-gear-wheel", 1.0),
                item("iron-plate", 1.0),
            ],
            vec![item("inserter", 1.0)],
        ),
        recipe(
            "science-pack-1",
            "crafting",
            vec![item("copper-plate", 1.0), item("iron-gear-wheel", 1.0)],
            vec![item("science-pack-1", 1.0)],
        ),
        // Sulfuric acid: made in a chemical plant, moved in barrels
        recipe(
            "sulfuric-acid",
            "chemistry",
            vec![
                item("sulfur", 5.0),
                item("iron-plate", 1.0),
                fluid("water", 100.0),
            ],
            vec![fluid("sulfuric-acid", 50.0)],
        ),
        recipe(
            "empty-sulfuric-acid-barrel",
            "crafting-with-fluid",
            vec![item("sulfuric-acid-barrel", 1.0)],
            vec![fluid("sulfuric-acid", 50.0), item("empty-barrel", 1.0)],
        ),
        recipe(
            "fill-sulfuric-acid-barrel",
            "crafting-with-fluid",
            vec![fluid("sulfuric-acid", 50.0), item("empty-barrel", 1.0)],
            vec![item("sulfuric-acid-barrel", 1.0)],
        ),
        recipe(
            "battery",
            "crafting",
            vec![
                item("iron-plate", 1.0),
                item("copper-plate", 1.0),
                fluid("sulfuric-acid", 20.0),
            ],
            vec![item("battery", 1.0)],
        ),
    ];
    for r in &recipes {
        db::insert_recipe(conn, r)?;
    }

    // the long-standing copper cable productivity bonus
    db::set_yield_bonus(conn, "copper-cable", 1.4)?;

    let intermediates: &[&str] = &[
        "iron-plate",
        "copper-plate",
        "steel-plate",
        "plastic-bar",
        "iron-gear-wheel",
        "electronic-circuit",
        "advanced-circuit",
        "battery",
        "coal",
        "sulfuric-acid-barrel",
        "empty-barrel",
    ];
    for name in intermediates {
        db::set_intermediate(conn, name)?;
    }

    println!(
        "Loaded {} sample items and {} sample recipes",
        items.len(),
        recipes.len()
    );
    Ok(())
}
