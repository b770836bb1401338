//! Game-data extraction for the recipe catalog
//!
//! Parses recipe and item prototypes from an unpacked copy of the game's
//! data directory (Lua prototype files) and loads them into the database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::db;
use crate::models::{Item, Kind, Reagent, Recipe};

enum Prototype {
    Recipe(Recipe),
    Item(Item),
}

/// Find all .lua files that define recipe or item prototypes
pub fn find_prototype_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(data_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "lua") {
            let content = fs::read_to_string(path).unwrap_or_default();
            if content.contains(r#"type = "recipe""#) || content.contains(r#"type = "item""#) {
                files.push(path.to_path_buf());
            }
        }
    }

    Ok(files)
}

/// Split a prototype file into its top-level `{ ... }` prototype blocks.
/// Prototype tables sit at brace depth 2, inside `data:extend({ ... })`.
fn split_blocks(content: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut depth = 0u32;
    let mut start = None;

    for (i, ch) in content.char_indices() {
        match ch {
            '{' => {
                depth += 1;
                if depth == 2 && start.is_none() {
                    start = Some(i);
                }
            }
            '}' => {
                if depth == 2 {
                    if let Some(s) = start.take() {
                        blocks.push(&content[s..=i]);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    blocks
}

/// The sub-table assigned to `field`, including its braces
fn field_table<'a>(block: &'a str, field: &str) -> Result<Option<&'a str>> {
    let re = Regex::new(&format!(r"\b{field}\s*=\s*\{{"))?;
    let Some(m) = re.find(block) else {
        return Ok(None);
    };
    Ok(balanced(block, m.end() - 1))
}

/// The balanced `{ ... }` span starting at `open`
fn balanced(s: &str, open: usize) -> Option<&str> {
    let mut depth = 0i32;
    for (i, ch) in s[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[open..open + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse one ingredient/product entry. Handles both the long form
/// `{type = "fluid", name = "water", amount = 100}` and the shorthand
/// `{"iron-plate", 2}`.
fn parse_reagent(entry: &str) -> Result<Option<Reagent>> {
    let name_re = Regex::new(r#"name\s*=\s*"([\w-]+)""#)?;
    if let Some(name) = name_re.captures(entry) {
        let amount_re = Regex::new(r"amount\s*=\s*([\d.]+)")?;
        let type_re = Regex::new(r#"type\s*=\s*"(\w+)""#)?;
        let Some(amount) = amount_re.captures(entry) else {
            return Ok(None);
        };
        let kind = match type_re.captures(entry) {
            Some(cap) if &cap[1] == "fluid" => Kind::Fluid,
            _ => Kind::Item,
        };
        return Ok(Some(Reagent {
            name: name[1].to_string(),
            amount: amount[1].parse()?,
            kind,
        }));
    }

    let short_re = Regex::new(r#""([\w-]+)"\s*,\s*([\d.]+)"#)?;
    match short_re.captures(entry) {
        Some(cap) => Ok(Some(Reagent {
            name: cap[1].to_string(),
            amount: cap[2].parse()?,
            kind: Kind::Item,
        })),
        None => Ok(None),
    }
}

fn parse_recipe_block(block: &str, name: String) -> Result<Option<Prototype>> {
    let category_re = Regex::new(r#"category\s*=\s*"([\w-]+)""#)?;
    let category = category_re
        .captures(block)
        .map(|cap| cap[1].to_string())
        .unwrap_or_else(|| "crafting".to_string());

    let mut ingredients = Vec::new();
    if let Some(table) = field_table(block, "ingredients")? {
        for entry in split_blocks(table) {
            if let Some(reagent) = parse_reagent(entry)? {
                ingredients.push(reagent);
            }
        }
    }

    let mut products = Vec::new();
    if let Some(table) = field_table(block, "results")? {
        for entry in split_blocks(table) {
            if let Some(reagent) = parse_reagent(entry)? {
                products.push(reagent);
            }
        }
    } else {
        // shorthand: result = "name" with an optional result_count
        let result_re = Regex::new(r#"result\s*=\s*"([\w-]+)""#)?;
        let count_re = Regex::new(r"result_count\s*=\s*([\d.]+)")?;
        if let Some(cap) = result_re.captures(block) {
            let amount = match count_re.captures(block) {
                Some(count) => count[1].parse()?,
                None => 1.0,
            };
            products.push(Reagent {
                name: cap[1].to_string(),
                amount,
                kind: Kind::Item,
            });
        }
    }

    if products.is_empty() {
        // nothing to scale yields against
        return Ok(None);
    }

    Ok(Some(Prototype::Recipe(Recipe {
        name,
        category,
        ingredients,
        products,
    })))
}

/// Parse a single prototype block
fn parse_block(block: &str) -> Result<Option<Prototype>> {
    let type_re = Regex::new(r#"type\s*=\s*"([\w-]+)""#)?;
    let name_re = Regex::new(r#"name\s*=\s*"([\w-]+)""#)?;

    let Some(ty) = type_re.captures(block) else {
        return Ok(None);
    };
    let Some(name) = name_re.captures(block) else {
        return Ok(None);
    };
    let name = name[1].to_string();

    match &ty[1] {
        "recipe" => parse_recipe_block(block, name),
        // fluids have no stack size and never ride in a wagon slot
        "fluid" => Ok(None),
        _ => {
            // any other prototype that stacks is an item for our purposes
            // (plain items, ammo, modules, tools, ...)
            let stack_re = Regex::new(r"stack_size\s*=\s*(\d+)")?;
            match stack_re.captures(block) {
                Some(cap) => Ok(Some(Prototype::Item(Item {
                    name,
                    stack_size: cap[1].parse()?,
                }))),
                None => Ok(None),
            }
        }
    }
}

/// Extract all recipe and item prototypes from the game data and populate
/// the database
pub fn extract_to_database(conn: &Connection, data_dir: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    println!("Scanning {} for prototype files...", data_dir.display());
    let files = find_prototype_files(data_dir)?;
    println!("Found {} prototype files", files.len());

    for filepath in &files {
        let content = fs::read_to_string(filepath)
            .with_context(|| format!("Failed to read {}", filepath.display()))?;

        for block in split_blocks(&content) {
            match parse_block(block) {
                Ok(Some(Prototype::Recipe(recipe))) => {
                    db::insert_recipe(conn, &recipe)?;
                    stats.recipes += 1;
                }
                Ok(Some(Prototype::Item(item))) => {
                    db::upsert_item(conn, &item)?;
                    stats.items += 1;
                }
                Ok(None) => {
                    stats.skipped += 1;
                }
                Err(e) => {
                    eprintln!("  Error parsing block in {}: {}", filepath.display(), e);
                    stats.errors += 1;
                }
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub recipes: usize,
    pub items: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} recipes and {} items. Skipped: {}, Errors: {}",
            self.recipes, self.items, self.skipped, self.errors
        )
    }
}
