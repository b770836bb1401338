//! Wagon slot allocation
//!
//! Balances the per-unit costs from the resolver against a fixed number of
//! storage slots, one stack per slot. The goal is an integer stack count per
//! input that maximizes the minimum sustainable output rate across inputs,
//! where an input's rate is `stacks * stack_size / unit_cost`.

use thiserror::Error;

use crate::models::UnitCostMap;

// Rates are quantized to the nearest 1/128 before equality comparison to
// absorb floating-point noise.
const ROUND_GRAIN: f64 = 128.0;

/// Quantize to the nearest 1/128.
pub fn quantize(x: f64) -> f64 {
    (x * ROUND_GRAIN).round() / ROUND_GRAIN
}

#[derive(Debug, Error)]
pub enum AllocateError {
    #[error("{required} distinct inputs cannot fit in {capacity} slots")]
    InfeasibleCapacity { required: usize, capacity: u32 },

    #[error("no stack size known for item '{0}'")]
    UnknownStackSize(String),
}

/// One input line of a finished allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedInput {
    pub name: String,
    pub stacks: u32,
    /// Item units carried by the allocated stacks.
    pub quantity: f64,
    /// Units left over once the bottleneck rate's worth of product is built.
    pub leftover: f64,
}

/// Integer stack allocation across the wagon, inputs sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub inputs: Vec<AllocatedInput>,
    pub capacity_used: u32,
    /// Units of product the weakest input can sustain; +inf when nothing
    /// constrains the output.
    pub achieved_rate: f64,
}

/// Balance `capacity` slots across the inputs of `unit_costs`.
///
/// Greedy iterative balancing: every input starts at one stack, then each
/// round grants one extra stack to every input sitting at the bottleneck
/// rate. When the bottleneck set no longer fits in the remaining slots the
/// allocation is locally optimal and the loop stops; a partial grant is
/// intentionally not attempted.
pub fn allocate<F>(
    unit_costs: &UnitCostMap,
    stack_size_of: F,
    capacity: u32,
) -> Result<Allocation, AllocateError>
where
    F: Fn(&str) -> Option<u32>,
{
    if unit_costs.is_empty() {
        return Ok(Allocation {
            inputs: Vec::new(),
            capacity_used: 0,
            achieved_rate: f64::INFINITY,
        });
    }

    let names: Vec<&String> = unit_costs.keys().collect();
    let costs: Vec<f64> = unit_costs.values().copied().collect();
    let n = names.len();
    if n > capacity as usize {
        return Err(AllocateError::InfeasibleCapacity {
            required: n,
            capacity,
        });
    }

    let mut sizes = Vec::with_capacity(n);
    for name in &names {
        let size = stack_size_of(name.as_str())
            .ok_or_else(|| AllocateError::UnknownStackSize((*name).clone()))?;
        sizes.push(size as f64);
    }

    // a zero cost gives an infinite rate, which never registers as the
    // bottleneck below
    let rate = |stacks: &[u32], i: usize| stacks[i] as f64 * sizes[i] / costs[i];
    let bottleneck =
        |stacks: &[u32]| (0..n).map(|i| rate(stacks, i)).fold(f64::INFINITY, f64::min);

    let mut stacks = vec![1u32; n];
    let mut remaining = capacity - n as u32;

    let mut best: Option<Vec<u32>> = None;
    let mut best_bottleneck_count = 0usize;

    let mut improved = true;
    while improved && remaining > 0 {
        improved = false;

        let floor = bottleneck(&stacks);
        let constrained: Vec<usize> = (0..n)
            .filter(|&i| quantize(rate(&stacks, i) / floor) == 1.0)
            .collect();
        if constrained.is_empty() {
            // every input has infinite rate; nothing to balance
            break;
        }
        if constrained.len() as u32 <= remaining {
            for &i in &constrained {
                stacks[i] += 1;
                remaining -= 1;
            }
            improved = true;
        }

        // Granting a stack to the whole bottleneck set can shift the
        // bottleneck to a different, equally large set; keep the widest
        // balance point seen instead of the latest state.
        let floor = bottleneck(&stacks);
        let count = (0..n).filter(|&i| rate(&stacks, i) == floor).count();
        if count >= best_bottleneck_count {
            best = Some(stacks.clone());
            best_bottleneck_count = count;
        }
    }

    if let Some(snapshot) = best {
        stacks = snapshot;
    }

    let achieved = bottleneck(&stacks);
    let built = if achieved.is_finite() {
        achieved.floor()
    } else {
        0.0
    };
    let mut inputs = Vec::with_capacity(n);
    for i in 0..n {
        let quantity = stacks[i] as f64 * sizes[i];
        inputs.push(AllocatedInput {
            name: names[i].clone(),
            stacks: stacks[i],
            quantity,
            leftover: quantity - built * costs[i],
        });
    }

    Ok(Allocation {
        capacity_used: stacks.iter().sum(),
        inputs,
        achieved_rate: achieved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn costs(entries: &[(&str, f64)]) -> UnitCostMap {
        entries
            .iter()
            .map(|(name, cost)| (name.to_string(), *cost))
            .collect()
    }

    fn sizes(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        entries
            .iter()
            .map(|(name, size)| (name.to_string(), *size))
            .collect()
    }

    fn stacks_of<'a>(alloc: &'a Allocation, name: &str) -> &'a AllocatedInput {
        alloc
            .inputs
            .iter()
            .find(|input| input.name == name)
            .unwrap()
    }

    #[test]
    fn gear_plate_regression() {
        // both inputs balance at 8*50/2 == 2*100/1 == 200
        let unit_costs = costs(&[("gear", 2.0), ("plate", 1.0)]);
        let stack_sizes = sizes(&[("gear", 50), ("plate", 100)]);
        let alloc = allocate(&unit_costs, |n| stack_sizes.get(n).copied(), 10).unwrap();

        assert_eq!(stacks_of(&alloc, "gear").stacks, 8);
        assert_eq!(stacks_of(&alloc, "plate").stacks, 2);
        assert_eq!(alloc.capacity_used, 10);
        assert_eq!(alloc.achieved_rate, 200.0);
        assert_eq!(stacks_of(&alloc, "gear").leftover, 0.0);
        assert_eq!(stacks_of(&alloc, "plate").leftover, 0.0);
    }

    #[test]
    fn empty_cost_map_is_unconstrained() {
        let alloc = allocate(&UnitCostMap::new(), |_| None, 40).unwrap();
        assert!(alloc.inputs.is_empty());
        assert_eq!(alloc.capacity_used, 0);
        assert_eq!(alloc.achieved_rate, f64::INFINITY);
    }

    #[test]
    fn more_inputs_than_slots_is_infeasible() {
        let unit_costs = costs(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let err = allocate(&unit_costs, |_| Some(10), 2).unwrap_err();
        match err {
            AllocateError::InfeasibleCapacity { required, capacity } => {
                assert_eq!(required, 3);
                assert_eq!(capacity, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_stack_size_is_reported() {
        let unit_costs = costs(&[("a", 1.0)]);
        assert!(matches!(
            allocate(&unit_costs, |_| None, 10),
            Err(AllocateError::UnknownStackSize(_))
        ));
    }

    #[test]
    fn single_input_absorbs_all_slots() {
        let unit_costs = costs(&[("plate", 1.0)]);
        let alloc = allocate(&unit_costs, |_| Some(100), 10).unwrap();
        assert_eq!(stacks_of(&alloc, "plate").stacks, 10);
        assert_eq!(alloc.achieved_rate, 1000.0);
    }

    #[test]
    fn stops_when_bottleneck_set_does_not_fit() {
        // after one grant both inputs sit at rate 100; granting both would
        // need 2 slots with only 1 remaining, so the loop stops at 3 of 4
        let unit_costs = costs(&[("a", 1.0), ("b", 1.0)]);
        let stack_sizes = sizes(&[("a", 50), ("b", 100)]);
        let alloc = allocate(&unit_costs, |n| stack_sizes.get(n).copied(), 4).unwrap();

        assert_eq!(stacks_of(&alloc, "a").stacks, 2);
        assert_eq!(stacks_of(&alloc, "b").stacks, 1);
        assert_eq!(alloc.capacity_used, 3);
        assert_eq!(alloc.achieved_rate, 100.0);
    }

    #[test]
    fn zero_cost_input_never_takes_slots() {
        let unit_costs = costs(&[("byproduct", 0.0), ("real", 1.0)]);
        let alloc = allocate(&unit_costs, |_| Some(10), 5).unwrap();

        assert_eq!(stacks_of(&alloc, "byproduct").stacks, 1);
        assert_eq!(stacks_of(&alloc, "real").stacks, 4);
        assert_eq!(alloc.achieved_rate, 40.0);
        // nothing of the free input is consumed
        assert_eq!(stacks_of(&alloc, "byproduct").leftover, 10.0);
    }

    #[test]
    fn all_zero_costs_terminate() {
        let unit_costs = costs(&[("a", 0.0), ("b", 0.0)]);
        let alloc = allocate(&unit_costs, |_| Some(10), 40).unwrap();
        assert_eq!(alloc.achieved_rate, f64::INFINITY);
        assert_eq!(alloc.capacity_used, 2);
        assert_eq!(stacks_of(&alloc, "a").leftover, 10.0);
    }

    #[test]
    fn capacity_bound_holds() {
        let cases: &[(&[(&str, f64)], u32)] = &[
            (&[("a", 2.0), ("b", 1.0)], 10),
            (&[("a", 7.0), ("b", 3.0), ("c", 1.0)], 11),
            (&[("a", 0.25), ("b", 1.0), ("c", 5.5), ("d", 2.0)], 40),
            (&[("a", 1.0)], 1),
        ];
        for (entries, capacity) in cases {
            let alloc = allocate(&costs(entries), |_| Some(50), *capacity).unwrap();
            assert!(
                alloc.capacity_used <= *capacity,
                "capacity {capacity} exceeded"
            );
            let total: u32 = alloc.inputs.iter().map(|i| i.stacks).sum();
            assert_eq!(total, alloc.capacity_used);
        }
    }

    #[test]
    fn allocation_is_deterministic() {
        let unit_costs = costs(&[("a", 2.2), ("b", 1.1), ("c", 0.7)]);
        let stack_sizes = sizes(&[("a", 50), ("b", 100), ("c", 200)]);
        let first = allocate(&unit_costs, |n| stack_sizes.get(n).copied(), 40).unwrap();
        let second = allocate(&unit_costs, |n| stack_sizes.get(n).copied(), 40).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn input_names_match_cost_map_keys() {
        let unit_costs = costs(&[("gear", 2.0), ("plate", 1.0), ("rod", 4.0)]);
        let alloc = allocate(&unit_costs, |_| Some(100), 12).unwrap();
        let names: Vec<&str> = alloc.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["gear", "plate", "rod"]);
    }

    #[test]
    fn quantize_absorbs_float_noise() {
        assert_eq!(quantize(1.003), 1.0);
        assert_eq!(quantize(0.997), 1.0);
        assert_eq!(quantize(25.0 / 25.001), 1.0);
        // a quarter is representable exactly on the 1/128 grid
        assert_eq!(quantize(0.25), 0.25);
        assert!(quantize(0.99) != 1.0);
    }
}
