use std::collections::HashMap;

use p2p_core::entities::ProviderRecord;

/// Maps each chunk with at least one provider to exactly one provider,
/// keyed `"ip:port"`. Chunks nobody offered are omitted; the search simply
/// yields an incomplete file and the user restarts it.
///
/// For every chunk, providers are ranked by descending advertised rate
/// (stable, so equal rates keep arrival order) and the least-loaded one in
/// that ranking wins, ties going to the faster position. Assuming each
/// provider saturates its advertised rate while serving, this approximates
/// minimum completion time independent of chunk size.
pub fn assign_chunks(providers_by_chunk: &[Vec<ProviderRecord>]) -> HashMap<String, Vec<u32>> {
    let mut plan: HashMap<String, Vec<u32>> = HashMap::new();

    for (chunk_index, candidates) in providers_by_chunk.iter().enumerate() {
        if candidates.is_empty() {
            continue;
        }

        let mut ranked = candidates.clone();
        ranked.sort_by(|a, b| b.rate.cmp(&a.rate));

        let mut selected = &ranked[0];
        let mut fewest_assigned = assigned_count(&plan, selected);
        for candidate in &ranked[1..] {
            let assigned = assigned_count(&plan, candidate);
            if assigned < fewest_assigned {
                selected = candidate;
                fewest_assigned = assigned;
            }
        }

        plan.entry(selected.key()).or_default().push(chunk_index as u32);
    }

    plan
}

fn assigned_count(plan: &HashMap<String, Vec<u32>>, provider: &ProviderRecord) -> usize {
    plan.get(&provider.key()).map_or(0, Vec::len)
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn provider(ip: &str, rate: u32) -> ProviderRecord {
        ProviderRecord::new(ip, 8000, rate)
    }

    #[test]
    fn test_two_speeds_alternate_across_four_chunks() {
        let fast = provider("10.0.0.1", 100);
        let slow = provider("10.0.0.2", 50);
        let table = vec![vec![fast.clone(), slow.clone()]; 4];

        let plan = assign_chunks(&table);
        assert_eq!(plan[&fast.key()], vec![0, 2]);
        assert_eq!(plan[&slow.key()], vec![1, 3]);
    }

    #[test]
    fn test_every_provided_chunk_is_assigned_exactly_once() {
        let a = provider("10.0.0.1", 80);
        let b = provider("10.0.0.2", 80);
        let table = vec![
            vec![a.clone()],
            vec![a.clone(), b.clone()],
            vec![b.clone(), a.clone()],
            vec![b.clone()],
        ];

        let plan = assign_chunks(&table);
        let mut assigned: Vec<u32> = plan.values().flatten().copied().collect();
        assigned.sort_unstable();
        assert_eq!(assigned, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_chunks_without_providers_are_omitted() {
        let only = provider("10.0.0.1", 10);
        let table = vec![vec![only.clone()], Vec::new(), vec![only.clone()]];

        let plan = assign_chunks(&table);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[&only.key()], vec![0, 2]);
    }

    #[test]
    fn test_load_ties_break_toward_higher_rate() {
        let fast = provider("10.0.0.1", 100);
        let slow = provider("10.0.0.2", 50);
        // Both unloaded at chunk 0: the faster provider must win the tie.
        let table = vec![vec![slow.clone(), fast.clone()]];

        let plan = assign_chunks(&table);
        assert_eq!(plan[&fast.key()], vec![0]);
        assert!(!plan.contains_key(&slow.key()));
    }

    #[test]
    fn test_equal_rates_keep_arrival_order_on_ties() {
        let first = ProviderRecord::new("10.0.0.1", 8000, 60);
        let second = ProviderRecord::new("10.0.0.2", 8000, 60);
        let table = vec![vec![first.clone(), second.clone()]];

        let plan = assign_chunks(&table);
        assert_eq!(plan[&first.key()], vec![0]);
    }

    #[test]
    fn test_empty_table_yields_empty_plan() {
        assert!(assign_chunks(&[]).is_empty());
    }
}
