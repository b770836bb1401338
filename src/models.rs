//! Data models for Factorio recipes and items

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Whether a recipe entry refers to a stackable item or a fluid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Item,
    Fluid,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Item => "item",
            Kind::Fluid => "fluid",
        }
    }

    pub fn parse(s: &str) -> Option<Kind> {
        match s {
            "item" => Some(Kind::Item),
            "fluid" => Some(Kind::Fluid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub stack_size: u32,
}

/// One entry in a recipe's ingredient or product list.
#[derive(Debug, Clone)]
pub struct Reagent {
    pub name: String,
    pub amount: f64,
    pub kind: Kind,
}

#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub category: String,
    pub ingredients: Vec<Reagent>,
    pub products: Vec<Reagent>,
}

impl Recipe {
    /// The first product entry; yield scaling is based on it.
    pub fn primary_product(&self) -> Option<&Reagent> {
        self.products.first()
    }

    pub fn has_fluid_ingredient(&self) -> bool {
        self.ingredients.iter().any(|i| i.kind == Kind::Fluid)
    }
}

/// Per-unit item costs relative to one unit of a target recipe's primary
/// product. BTreeMap keys iterate sorted by name.
pub type UnitCostMap = BTreeMap<String, f64>;

/// Immutable recipe/item catalog, loaded once and read-only afterwards.
///
/// Recipes keep their load order ("catalog order"); producer selection in
/// the resolver depends on it.
pub struct Catalog {
    items: HashMap<String, Item>,
    recipes: Vec<Recipe>,
    by_name: HashMap<String, usize>,
    // product name -> producing recipe indices, in catalog order
    producers: HashMap<String, Vec<usize>>,
    // recipe name -> output multiplier (e.g. a fixed productivity bonus)
    yield_bonuses: HashMap<String, f64>,
    // default boundary set for resolution
    intermediates: BTreeSet<String>,
}

impl Catalog {
    pub fn new(
        items: Vec<Item>,
        recipes: Vec<Recipe>,
        yield_bonuses: HashMap<String, f64>,
        intermediates: BTreeSet<String>,
    ) -> Self {
        let mut by_name = HashMap::new();
        let mut producers: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, recipe) in recipes.iter().enumerate() {
            by_name.insert(recipe.name.clone(), idx);
            for product in &recipe.products {
                let entry = producers.entry(product.name.clone()).or_default();
                if entry.last() != Some(&idx) {
                    entry.push(idx);
                }
            }
        }
        let items = items.into_iter().map(|i| (i.name.clone(), i)).collect();
        Catalog {
            items,
            recipes,
            by_name,
            producers,
            yield_bonuses,
            intermediates,
        }
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn stack_size(&self, name: &str) -> Option<u32> {
        self.items.get(name).map(|i| i.stack_size)
    }

    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.by_name.get(name).map(|&idx| &self.recipes[idx])
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Recipes whose products include `name`, in catalog order.
    pub fn producers(&self, name: &str) -> Vec<&Recipe> {
        self.producers
            .get(name)
            .map(|idxs| idxs.iter().map(|&idx| &self.recipes[idx]).collect())
            .unwrap_or_default()
    }

    pub fn yield_bonus(&self, recipe: &str) -> Option<f64> {
        self.yield_bonuses.get(recipe).copied()
    }

    pub fn intermediates(&self) -> &BTreeSet<String> {
        &self.intermediates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str, products: &[&str]) -> Recipe {
        Recipe {
            name: name.to_string(),
            category: "crafting".to_string(),
            ingredients: Vec::new(),
            products: products
                .iter()
                .map(|p| Reagent {
                    name: p.to_string(),
                    amount: 1.0,
                    kind: Kind::Item,
                })
                .collect(),
        }
    }

    #[test]
    fn producers_keep_catalog_order() {
        let catalog = Catalog::new(
            Vec::new(),
            vec![
                recipe("second", &["gear"]),
                recipe("first", &["plate"]),
                recipe("third", &["gear"]),
            ],
            HashMap::new(),
            BTreeSet::new(),
        );
        let names: Vec<&str> = catalog
            .producers("gear")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["second", "third"]);
        assert!(catalog.producers("unknown").is_empty());
    }

    #[test]
    fn recipe_lookup_by_name() {
        let catalog = Catalog::new(
            vec![Item {
                name: "plate".to_string(),
                stack_size: 100,
            }],
            vec![recipe("smelt", &["plate"])],
            HashMap::new(),
            BTreeSet::new(),
        );
        assert_eq!(catalog.recipe("smelt").unwrap().name, "smelt");
        assert!(catalog.recipe("missing").is_none());
        assert_eq!(catalog.stack_size("plate"), Some(100));
        assert_eq!(catalog.stack_size("gear"), None);
    }

    #[test]
    fn kind_round_trips_through_strings() {
        assert_eq!(Kind::parse(Kind::Item.as_str()), Some(Kind::Item));
        assert_eq!(Kind::parse(Kind::Fluid.as_str()), Some(Kind::Fluid));
        assert_eq!(Kind::parse("gas"), None);
    }
}
