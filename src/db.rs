//! Catalog schema and persistence

use std::collections::{BTreeSet, HashMap};

use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{Catalog, Item, Kind, Reagent, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Item definitions
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            stack_size INTEGER NOT NULL
        );

        -- Recipe definitions; rowid order is catalog order
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            category TEXT NOT NULL DEFAULT 'crafting'
        );

        -- What a recipe consumes
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id INTEGER,
            ord INTEGER,
            name TEXT NOT NULL,
            amount REAL NOT NULL,
            kind TEXT NOT NULL,
            PRIMARY KEY (recipe_id, ord)
        );

        -- What a recipe produces; ord 0 is the primary product
        CREATE TABLE IF NOT EXISTS recipe_products (
            recipe_id INTEGER,
            ord INTEGER,
            name TEXT NOT NULL,
            amount REAL NOT NULL,
            kind TEXT NOT NULL,
            PRIMARY KEY (recipe_id, ord)
        );

        -- Recipes with a fixed output multiplier (productivity bonuses)
        CREATE TABLE IF NOT EXISTS yield_bonuses (
            recipe_name TEXT PRIMARY KEY,
            multiplier REAL NOT NULL
        );

        -- Default boundary set for cost resolution
        CREATE TABLE IF NOT EXISTS intermediates (
            item_name TEXT PRIMARY KEY
        );

        -- Producer lookups go through product names
        CREATE INDEX IF NOT EXISTS idx_recipe_products_name ON recipe_products(name);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (name, stack_size) VALUES (?1, ?2)",
        (&item.name, item.stack_size),
    )?;
    Ok(())
}

/// Insert or replace a recipe together with its ingredient and product rows
pub fn insert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    // replacing assigns a fresh rowid, so the old reagent rows must go first
    let old_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM recipes WHERE name = ?1",
            [&recipe.name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(old_id) = old_id {
        conn.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            [old_id],
        )?;
        conn.execute("DELETE FROM recipe_products WHERE recipe_id = ?1", [old_id])?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO recipes (name, category) VALUES (?1, ?2)",
        (&recipe.name, &recipe.category),
    )?;
    let recipe_id: i64 = conn.query_row(
        "SELECT id FROM recipes WHERE name = ?1",
        [&recipe.name],
        |row| row.get(0),
    )?;

    for (ord, ing) in recipe.ingredients.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, ord, name, amount, kind)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (recipe_id, ord as i64, &ing.name, ing.amount, ing.kind.as_str()),
        )?;
    }
    for (ord, product) in recipe.products.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_products (recipe_id, ord, name, amount, kind)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                recipe_id,
                ord as i64,
                &product.name,
                product.amount,
                product.kind.as_str(),
            ),
        )?;
    }
    Ok(())
}

/// Record a fixed output multiplier for a recipe
pub fn set_yield_bonus(conn: &Connection, recipe_name: &str, multiplier: f64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO yield_bonuses (recipe_name, multiplier) VALUES (?1, ?2)",
        (recipe_name, multiplier),
    )?;
    Ok(())
}

/// Mark an item as part of the default boundary set
pub fn set_intermediate(conn: &Connection, item_name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO intermediates (item_name) VALUES (?1)",
        [item_name],
    )?;
    Ok(())
}

/// Clear all catalog data (for re-extraction)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM intermediates;
        DELETE FROM yield_bonuses;
        DELETE FROM recipe_products;
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Load the whole catalog into memory. Recipes come back in catalog order,
/// reagent lists in their stored order.
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare("SELECT name, stack_size FROM items")?;
    let rows = stmt.query_map([], |row| {
        Ok(Item {
            name: row.get(0)?,
            stack_size: row.get(1)?,
        })
    })?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }

    let mut stmt = conn.prepare("SELECT id, name, category FROM recipes ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut recipe_rows = Vec::new();
    for row in rows {
        recipe_rows.push(row?);
    }

    let mut recipes = Vec::new();
    for (recipe_id, name, category) in recipe_rows {
        let ingredients = load_reagents(conn, "recipe_ingredients", recipe_id)?;
        let products = load_reagents(conn, "recipe_products", recipe_id)?;
        recipes.push(Recipe {
            name,
            category,
            ingredients,
            products,
        });
    }

    let mut stmt = conn.prepare("SELECT recipe_name, multiplier FROM yield_bonuses")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut yield_bonuses = HashMap::new();
    for row in rows {
        let (name, multiplier) = row?;
        yield_bonuses.insert(name, multiplier);
    }

    let mut stmt = conn.prepare("SELECT item_name FROM intermediates")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut intermediates = BTreeSet::new();
    for row in rows {
        intermediates.insert(row?);
    }

    Ok(Catalog::new(items, recipes, yield_bonuses, intermediates))
}

fn load_reagents(conn: &Connection, table: &str, recipe_id: i64) -> Result<Vec<Reagent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name, amount, kind FROM {table} WHERE recipe_id = ?1 ORDER BY ord"
    ))?;
    let rows = stmt.query_map([recipe_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut reagents = Vec::new();
    for row in rows {
        let (name, amount, kind) = row?;
        let Some(kind) = Kind::parse(&kind) else {
            bail!("unknown reagent kind '{kind}' for '{name}'");
        };
        reagents.push(Reagent { name, amount, kind });
    }
    Ok(reagents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn reagent(name: &str, amount: f64, kind: Kind) -> Reagent {
        Reagent {
            name: name.to_string(),
            amount,
            kind,
        }
    }

    #[test]
    fn catalog_round_trips() {
        let conn = open();
        upsert_item(
            &conn,
            &Item {
                name: "iron-plate".to_string(),
                stack_size: 100,
            },
        )
        .unwrap();
        insert_recipe(
            &conn,
            &Recipe {
                name: "sulfuric-acid".to_string(),
                category: "chemistry".to_string(),
                ingredients: vec![
                    reagent("sulfur", 5.0, Kind::Item),
                    reagent("water", 100.0, Kind::Fluid),
                ],
                products: vec![reagent("sulfuric-acid", 50.0, Kind::Fluid)],
            },
        )
        .unwrap();
        set_yield_bonus(&conn, "copper-cable", 1.4).unwrap();
        set_intermediate(&conn, "iron-plate").unwrap();

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.stack_size("iron-plate"), Some(100));
        let recipe = catalog.recipe("sulfuric-acid").unwrap();
        assert_eq!(recipe.category, "chemistry");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[1].kind, Kind::Fluid);
        assert_eq!(recipe.primary_product().unwrap().amount, 50.0);
        assert_eq!(catalog.yield_bonus("copper-cable"), Some(1.4));
        assert!(catalog.intermediates().contains("iron-plate"));
    }

    #[test]
    fn recipes_load_in_insertion_order() {
        let conn = open();
        for name in ["gamma", "alpha", "beta"] {
            insert_recipe(
                &conn,
                &Recipe {
                    name: name.to_string(),
                    category: "crafting".to_string(),
                    ingredients: Vec::new(),
                    products: vec![reagent("widget", 1.0, Kind::Item)],
                },
            )
            .unwrap();
        }
        let catalog = load_catalog(&conn).unwrap();
        let names: Vec<&str> = catalog.recipes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["gamma", "alpha", "beta"]);
        let producers: Vec<&str> = catalog
            .producers("widget")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(producers, ["gamma", "alpha", "beta"]);
    }

    #[test]
    fn reinserting_a_recipe_replaces_its_reagents() {
        let conn = open();
        let mut recipe = Recipe {
            name: "circuit".to_string(),
            category: "crafting".to_string(),
            ingredients: vec![reagent("iron-plate", 1.0, Kind::Item)],
            products: vec![reagent("circuit", 1.0, Kind::Item)],
        };
        insert_recipe(&conn, &recipe).unwrap();
        recipe.ingredients = vec![
            reagent("iron-plate", 2.0, Kind::Item),
            reagent("copper-cable", 3.0, Kind::Item),
        ];
        insert_recipe(&conn, &recipe).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        let loaded = catalog.recipe("circuit").unwrap();
        assert_eq!(loaded.ingredients.len(), 2);
        assert_eq!(loaded.ingredients[0].amount, 2.0);
    }
}
