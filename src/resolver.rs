//! Recipe-cost resolution
//!
//! Walks the recipe graph from a target recipe down to a set of boundary
//! ("intermediate") item names, accumulating the per-unit cost of each
//! boundary item relative to one unit of the target's primary product.
//! Fluids never occupy wagon slots directly, so a fluid ingredient is costed
//! through the single packaging recipe that unpacks it from a container item.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::models::{Catalog, Kind, Recipe, UnitCostMap};

/// Recipes in this category repackage fluids into container items.
const FLUID_PACKAGING_CATEGORY: &str = "crafting-with-fluid";

// The catalog is assumed acyclic relative to the boundary set; a miswritten
// boundary set would otherwise recurse forever.
const MAX_DEPTH: usize = 20;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no recipe named '{0}' in the catalog")]
    UnknownRecipe(String),

    #[error("no fluid-free recipe produces '{0}'")]
    UnresolvedIngredient(String),

    #[error("found {matches} packaging recipes for fluid '{fluid}', expected exactly 1")]
    AmbiguousPackaging { fluid: String, matches: usize },

    #[error("recipe '{0}' yields no usable amount of its primary product")]
    DegenerateYield(String),

    #[error("recursion limit reached while expanding '{0}'; recipe graph may contain a cycle")]
    DepthExceeded(String),
}

/// Per-unit costs of every boundary item needed for one unit of `target`'s
/// primary product.
///
/// Known limitation: when several recipes produce the same ingredient, the
/// first fluid-free one in catalog order wins, so results are sensitive to
/// catalog load order.
pub fn resolve(
    catalog: &Catalog,
    target: &str,
    boundary: &BTreeSet<String>,
) -> Result<UnitCostMap, ResolveError> {
    resolve_with_demand(catalog, target, boundary, 1.0)
}

/// Same as [`resolve`] but for `demand` units of the primary product. Costs
/// scale linearly with `demand`.
pub fn resolve_with_demand(
    catalog: &Catalog,
    target: &str,
    boundary: &BTreeSet<String>,
    demand: f64,
) -> Result<UnitCostMap, ResolveError> {
    let recipe = catalog
        .recipe(target)
        .ok_or_else(|| ResolveError::UnknownRecipe(target.to_string()))?;

    let mut costs = UnitCostMap::new();
    expand(catalog, recipe, demand, boundary, &mut costs, 0)?;
    Ok(costs)
}

fn expand(
    catalog: &Catalog,
    recipe: &Recipe,
    amount: f64,
    boundary: &BTreeSet<String>,
    costs: &mut UnitCostMap,
    depth: usize,
) -> Result<(), ResolveError> {
    if depth > MAX_DEPTH {
        return Err(ResolveError::DepthExceeded(recipe.name.clone()));
    }

    let primary = recipe
        .primary_product()
        .ok_or_else(|| ResolveError::DegenerateYield(recipe.name.clone()))?;
    let mut output_factor = primary.amount;
    if let Some(bonus) = catalog.yield_bonus(&recipe.name) {
        output_factor *= bonus;
    }
    if output_factor <= 0.0 {
        return Err(ResolveError::DegenerateYield(recipe.name.clone()));
    }

    for ing in &recipe.ingredients {
        if ing.kind == Kind::Fluid {
            add_packaged_fluid(catalog, &ing.name, amount * ing.amount, costs)?;
        } else if boundary.contains(&ing.name) {
            *costs.entry(ing.name.clone()).or_insert(0.0) += amount * ing.amount / output_factor;
        } else {
            let producer = catalog
                .producers(&ing.name)
                .into_iter()
                .find(|r| !r.has_fluid_ingredient())
                .ok_or_else(|| ResolveError::UnresolvedIngredient(ing.name.clone()))?;
            // demand is not pre-divided by output_factor; the callee scales
            // against its own yield
            expand(
                catalog,
                producer,
                amount * ing.amount,
                boundary,
                costs,
                depth + 1,
            )?;
        }
    }
    Ok(())
}

/// Cost `demanded` units of a fluid through its packaging recipe: both the
/// packaging recipe's primary ingredient and the companion container item are
/// charged in proportion to the fluid output amount. The fluid's own
/// production chain is not expanded.
fn add_packaged_fluid(
    catalog: &Catalog,
    fluid: &str,
    demanded: f64,
    costs: &mut UnitCostMap,
) -> Result<(), ResolveError> {
    let candidates: Vec<&Recipe> = catalog
        .producers(fluid)
        .into_iter()
        .filter(|r| {
            r.category == FLUID_PACKAGING_CATEGORY
                && !r.ingredients.is_empty()
                && r.products.iter().any(|p| p.name == fluid)
                && r.products.iter().any(|p| p.kind == Kind::Item && p.name != fluid)
        })
        .collect();
    if candidates.len() != 1 {
        return Err(ResolveError::AmbiguousPackaging {
            fluid: fluid.to_string(),
            matches: candidates.len(),
        });
    }
    let packaging = candidates[0];

    let mut fluid_out = None;
    let mut container = None;
    for product in &packaging.products {
        if product.name == fluid {
            fluid_out = Some(product);
        } else if product.kind == Kind::Item && container.is_none() {
            container = Some(product);
        }
    }
    // the candidate filter guarantees all three are present
    let (Some(fluid_out), Some(container), Some(source)) =
        (fluid_out, container, packaging.ingredients.first())
    else {
        return Err(ResolveError::AmbiguousPackaging {
            fluid: fluid.to_string(),
            matches: 0,
        });
    };
    if fluid_out.amount <= 0.0 {
        return Err(ResolveError::DegenerateYield(packaging.name.clone()));
    }

    let per_unit = demanded / fluid_out.amount;
    *costs.entry(source.name.clone()).or_insert(0.0) += per_unit;
    *costs.entry(container.name.clone()).or_insert(0.0) += per_unit;
    Ok(())
}
