//! Reference tables rendered from resolver and allocator output
//!
//! All number crunching happens in the core modules; this layer only turns
//! plain numeric results into fixed-width text tables.

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow};

use crate::allocator::{self, Allocation};
use crate::models::{Catalog, Kind, Recipe, UnitCostMap};
use crate::resolver;

/// Storage slots in a cargo wagon.
pub const WAGON_SLOTS: u32 = 40;

/// Stack ratios for mixed cargo wagons: per target recipe, how to split the
/// wagon's slots across its intermediate inputs. Each recipe is resolved and
/// allocated once and the results reused for every row of its block.
pub fn wagon_ratio_table(
    catalog: &Catalog,
    recipe_names: &[&str],
    boundary: &BTreeSet<String>,
    capacity: u32,
) -> Result<String> {
    let mut out = String::new();

    for name in recipe_names {
        let costs = resolver::resolve(catalog, name, boundary)
            .with_context(|| format!("resolving '{name}'"))?;
        let alloc = allocator::allocate(&costs, |n| catalog.stack_size(n), capacity)
            .with_context(|| format!("allocating slots for '{name}'"))?;

        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!(
            "{} ({} per wagon, {} of {} slots)\n",
            name,
            wagon_output(catalog, name, &alloc),
            alloc.capacity_used,
            capacity
        ));
        out.push_str(&format!(
            "{:<28} {:>6} {:>10} {:>10}\n",
            "Input", "Stacks", "Quantity", "Leftover"
        ));
        out.push_str(&format!("{}\n", "-".repeat(57)));
        for input in &alloc.inputs {
            let leftover = input.leftover.round();
            let leftover = if leftover == 0.0 {
                String::new()
            } else {
                format!("{leftover}")
            };
            out.push_str(&format!(
                "{:<28} {:>6} {:>10} {:>10}\n",
                input.name, input.stacks, input.quantity, leftover
            ));
        }
    }

    Ok(out)
}

/// Units of the recipe's primary product a full wagon load sustains.
fn wagon_output(catalog: &Catalog, recipe: &str, alloc: &Allocation) -> u64 {
    let yield_per_craft = catalog
        .recipe(recipe)
        .and_then(|r| r.primary_product())
        .map(|p| p.amount)
        .unwrap_or(1.0);
    if alloc.achieved_rate.is_finite() {
        (alloc.achieved_rate * yield_per_craft).floor() as u64
    } else {
        0
    }
}

/// Stack and belt compression ratios: how many stacks (or items) of inputs
/// it takes to make one stack (or item) of output. Fluids are excluded --
/// they ride in pipes, not stacks or belts.
pub fn compression_table(catalog: &Catalog, recipe_names: &[&str]) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<28} {:>8} {:>8}\n",
        "Recipe", "Stack", "Belt"
    ));
    out.push_str(&format!("{}\n", "-".repeat(46)));

    for name in recipe_names {
        let recipe = catalog
            .recipe(name)
            .ok_or_else(|| anyhow!("no recipe named '{name}' in the catalog"))?;
        out.push_str(&format!(
            "{:<28} {:>8.2} {:>8.2}\n",
            name,
            stack_ratio(catalog, recipe)?,
            belt_ratio(recipe)
        ));
    }

    Ok(out)
}

fn stack_ratio(catalog: &Catalog, recipe: &Recipe) -> Result<f64> {
    let output = recipe
        .primary_product()
        .ok_or_else(|| anyhow!("recipe '{}' has no products", recipe.name))?;
    let output_size = catalog
        .stack_size(&output.name)
        .ok_or_else(|| anyhow!("no stack size known for item '{}'", output.name))?;
    // fraction of a stack produced per craft
    let output_fraction = output.amount / output_size as f64;

    let mut input_fraction = 0.0;
    for ing in &recipe.ingredients {
        if ing.kind == Kind::Fluid {
            continue;
        }
        let size = catalog
            .stack_size(&ing.name)
            .ok_or_else(|| anyhow!("no stack size known for item '{}'", ing.name))?;
        input_fraction += ing.amount / size as f64;
    }

    Ok(input_fraction / output_fraction)
}

fn belt_ratio(recipe: &Recipe) -> f64 {
    let output_amount = recipe.primary_product().map(|p| p.amount).unwrap_or(1.0);
    let input_amount: f64 = recipe
        .ingredients
        .iter()
        .filter(|i| i.kind == Kind::Item)
        .map(|i| i.amount)
        .sum();
    input_amount / output_amount
}

/// Sorted per-unit cost listing for one resolved recipe
pub fn unit_cost_table(costs: &UnitCostMap) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<28} {:>10}\n", "Item", "Per Unit"));
    out.push_str(&format!("{}\n", "-".repeat(39)));
    for (name, cost) in costs {
        out.push_str(&format!("{:<28} {:>10.4}\n", name, cost));
    }
    out
}
