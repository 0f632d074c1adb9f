use std::collections::HashMap;
use trio::model::Agent;
use trio::turn_order::TurnOrderSelector;

fn ids(agents: &[Agent]) -> Vec<u64> {
    agents.iter().map(|a| a.id).collect()
}

#[test]
fn test_shuffle_returns_permutation() {
    let agents = vec![Agent::new(1, "Ada"), Agent::new(2, "Bob"), Agent::new(3, "Cy")];
    let selector = TurnOrderSelector::seeded(11);

    for _ in 0..50 {
        let mut order = ids(&selector.shuffle(&agents));
        order.sort_unstable();
        assert_eq!(order, vec![1, 2, 3]);
    }
    assert_eq!(ids(&agents), vec![1, 2, 3]);
}

#[test]
fn test_every_ordering_appears() {
    let agents = vec![Agent::new(1, "Ada"), Agent::new(2, "Bob")];
    let selector = TurnOrderSelector::seeded(2024);

    let mut seen: HashMap<Vec<u64>, usize> = HashMap::new();
    for _ in 0..400 {
        *seen.entry(ids(&selector.shuffle(&agents))).or_default() += 1;
    }

    assert_eq!(seen.len(), 2);
    // Both orders should show up roughly half of the time.
    for (order, count) in &seen {
        assert!(*count > 120, "order {:?} appeared only {} times", order, count);
    }
}

#[test]
fn test_empty_and_single_agent_lists() {
    let selector = TurnOrderSelector::from_entropy();
    assert!(selector.shuffle(&[]).is_empty());
    assert!(selector.seed().is_none());

    let single = vec![Agent::new(9, "Solo")];
    assert_eq!(ids(&selector.shuffle(&single)), vec![9]);
}

#[test]
fn test_seeded_selectors_repeat() {
    let agents: Vec<Agent> = (1..=6).map(|i| Agent::new(i, format!("agent-{}", i))).collect();
    let a = TurnOrderSelector::seeded(5);
    let b = TurnOrderSelector::seeded(5);

    for _ in 0..10 {
        assert_eq!(a.shuffle(&agents), b.shuffle(&agents));
    }
    assert_eq!(a.seed(), Some(5));
}
