//! 随机源。所有抽样都通过调用方注入的 `Rng`，相同种子复现相同对局。

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub fn seeded(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// 从候选标识中不放回地随机抽取至多 `count` 个。
pub fn sample_ids<R: Rng + ?Sized>(candidates: &[&String], count: usize, rng: &mut R) -> Vec<String> {
    candidates
        .choose_multiple(rng, count)
        .map(|id| (*id).clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sample() {
        let ids: Vec<String> = (0..10).map(|i| format!("card{i}")).collect();
        let refs: Vec<&String> = ids.iter().collect();

        let first = sample_ids(&refs, 3, &mut seeded(9));
        let second = sample_ids(&refs, 3, &mut seeded(9));
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn sample_is_capped_by_candidates() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let refs: Vec<&String> = ids.iter().collect();
        let mut picked = sample_ids(&refs, 5, &mut seeded(1));
        picked.sort();
        assert_eq!(picked, vec!["a".to_string(), "b".to_string()]);
    }
}
