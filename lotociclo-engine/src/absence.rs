use lotociclo_db::models::{DrawRecord, NumberStats, POOL_SIZE};

use crate::error::CycleError;

/// Les `window` derniers tirages (moins si l'historique est plus court).
pub fn recent_window(draws: &[DrawRecord], window: usize) -> &[DrawRecord] {
    &draws[draws.len().saturating_sub(window)..]
}

/// Seuil de basse fréquence : présent dans au plus un tiers des concours.
pub fn low_frequency_threshold(window: usize) -> u32 {
    (window / 3) as u32
}

/// Fréquence et retard de chaque dezena sur la fenêtre.
/// `draws` est chronologique ; le retard vaut 0 si la dezena sort au dernier concours.
pub fn compute_stats(draws: &[DrawRecord], window: usize) -> Vec<NumberStats> {
    let recent = recent_window(draws, window);
    let mut stats: Vec<NumberStats> = (1..=POOL_SIZE)
        .map(|n| NumberStats {
            number: n,
            frequency: 0,
            gap: recent.len() as u32,
        })
        .collect();

    for (age, draw) in recent.iter().rev().enumerate() {
        for &n in &draw.numbers {
            // Hors 1-25 : ignoré.
            let Some(idx) = n.checked_sub(1) else {
                continue;
            };
            let Some(stat) = stats.get_mut(idx as usize) else {
                continue;
            };
            stat.frequency += 1;
            if stat.gap == recent.len() as u32 {
                stat.gap = age as u32;
            }
        }
    }

    stats
}

/// Classement croissant par fréquence, puis par dezena.
pub fn frequency_ranking(draws: &[DrawRecord], window: usize) -> Vec<NumberStats> {
    let mut ranking = compute_stats(draws, window);
    ranking.sort_by(|a, b| a.frequency.cmp(&b.frequency).then(a.number.cmp(&b.number)));
    ranking
}

/// Sélectionne les `k` dezenas les plus absentes des `window` derniers concours.
///
/// Candidates are numbers seen at most `window / 3` times. When fewer than `k`
/// qualify, the threshold is widened step by step, which amounts to taking the
/// next entries of the ascending ranking.
pub fn select_absent_numbers(
    draws: &[DrawRecord],
    window: usize,
    k: usize,
) -> Result<Vec<u8>, CycleError> {
    if draws.is_empty() {
        return Err(CycleError::NoHistory);
    }
    if window == 0 {
        return Err(CycleError::InvalidConfig("fenêtre d'analyse nulle".to_string()));
    }
    if k == 0 || k > POOL_SIZE as usize {
        return Err(CycleError::InvalidConfig(format!("k = {} (attendu 1-{})", k, POOL_SIZE)));
    }

    let ranking = frequency_ranking(draws, window);
    let threshold = low_frequency_threshold(window);
    let qualified = ranking.iter().filter(|s| s.frequency <= threshold).count();
    if qualified < k {
        let widened = ranking[k - 1].frequency;
        log::debug!(
            "Only {} numbers at or below {} occurrences, threshold widened to {}",
            qualified, threshold, widened
        );
    }

    Ok(ranking.iter().take(k).map(|s| s.number).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::test_support::{absent_scenario, draw_with};

    #[test]
    fn test_select_absent_scenario() {
        let draws = absent_scenario(100);
        let selected = select_absent_numbers(&draws, 10, 10).unwrap();
        assert_eq!(selected, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_ranking_orders_by_count_then_number() {
        let ranking = frequency_ranking(&absent_scenario(100), 10);
        assert_eq!(ranking[0].number, 1);
        assert_eq!(ranking[0].frequency, 0);
        assert_eq!(ranking[1].number, 2);
        assert_eq!(ranking[2].number, 3);
        assert_eq!(ranking[2].frequency, 1);
        assert_eq!(ranking[10].number, 11);
        assert_eq!(ranking[10].frequency, 2);
        assert!(ranking[11..].iter().all(|s| s.frequency == 10));
    }

    #[test]
    fn test_empty_history_is_no_history() {
        let err = select_absent_numbers(&[], 10, 10).unwrap_err();
        assert!(matches!(err, CycleError::NoHistory));
    }

    #[test]
    fn test_shorter_history_than_window() {
        let draws = vec![draw_with(1, &[], &(16..=25).collect::<Vec<_>>())];
        let selected = select_absent_numbers(&draws, 10, 10).unwrap();
        assert_eq!(selected, (16..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_shortfall_widens_threshold() {
        // 3 tirages identiques 1-15 : seuil 1, seules 16-25 sont candidates.
        let draws: Vec<DrawRecord> = (1..=3)
            .map(|i| draw_with(i, &[], &(16..=25).collect::<Vec<_>>()))
            .collect();
        let selected = select_absent_numbers(&draws, 3, 12).unwrap();
        let mut expected: Vec<u8> = (16..=25).collect();
        expected.extend([1, 2]);
        assert_eq!(selected, expected);
    }

    #[test]
    fn test_only_last_window_counts() {
        let mut draws = vec![draw_with(1, &[], &(16..=25).collect::<Vec<_>>())];
        draws.push(draw_with(2, &(11..=25).collect::<Vec<_>>(), &[]));
        let stats = compute_stats(&draws, 1);
        assert_eq!(stats[0].frequency, 0);
        assert_eq!(stats[24].frequency, 1);
    }

    #[test]
    fn test_gap_counts_from_latest() {
        let draws = vec![
            draw_with(1, &[], &(16..=25).collect::<Vec<_>>()),
            draw_with(2, &(11..=25).collect::<Vec<_>>(), &[]),
        ];
        let stats = compute_stats(&draws, 10);
        // 25 sort au dernier concours, 1 à l'avant-dernier.
        assert_eq!(stats[24].gap, 0);
        assert_eq!(stats[0].gap, 1);
    }

    #[test]
    fn test_selection_is_distinct_and_in_range() {
        let draws = absent_scenario(100);
        for k in 1..=25 {
            let selected = select_absent_numbers(&draws, 10, k).unwrap();
            assert_eq!(selected.len(), k);
            let mut dedup = selected.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), k);
            assert!(selected.iter().all(|&n| (1..=25).contains(&n)));
        }
    }

    #[test]
    fn test_out_of_range_numbers_are_ignored() {
        let mut numbers = [0u8; 15];
        numbers[1..].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 26]);
        let draws = vec![DrawRecord { draw_number: 1, date: "2024-01-01".to_string(), numbers }];

        let stats = compute_stats(&draws, 10);
        assert_eq!(stats.len(), 25);
        assert_eq!(stats.iter().map(|s| s.frequency).sum::<u32>(), 13);
        let selected = select_absent_numbers(&draws, 10, 3).unwrap();
        assert_eq!(selected, vec![14, 15, 16]);
    }

    #[test]
    fn test_invalid_k() {
        let draws = absent_scenario(100);
        assert!(matches!(select_absent_numbers(&draws, 10, 0), Err(CycleError::InvalidConfig(_))));
        assert!(matches!(select_absent_numbers(&draws, 10, 26), Err(CycleError::InvalidConfig(_))));
    }
}
