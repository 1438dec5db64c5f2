use lotociclo_db::models::{DrawRecord, validate_numbers};

use crate::error::CycleError;

/// Draw feed checked once at the boundary: strictly increasing draw numbers,
/// 15 distinct numbers in 1-25 per draw. Gaps between draw numbers are fine.
#[derive(Debug, Clone, Default)]
pub struct DrawHistory {
    draws: Vec<DrawRecord>,
}

impl DrawHistory {
    pub fn new(draws: Vec<DrawRecord>) -> Result<Self, CycleError> {
        for pair in draws.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.draw_number == prev.draw_number {
                return Err(CycleError::CorruptHistory(format!(
                    "concours {} en double",
                    next.draw_number
                )));
            }
            if next.draw_number < prev.draw_number {
                return Err(CycleError::CorruptHistory(format!(
                    "concours {} après {}",
                    next.draw_number, prev.draw_number
                )));
            }
        }
        for draw in &draws {
            validate_numbers(&draw.numbers).map_err(|e| {
                CycleError::CorruptHistory(format!("concours {} : {}", draw.draw_number, e))
            })?;
        }
        Ok(Self { draws })
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn latest(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Draws with `draw_number <= last`, i.e. what was known right after `last`.
    pub fn up_to(&self, last: u32) -> &[DrawRecord] {
        let end = self.draws.partition_point(|d| d.draw_number <= last);
        &self.draws[..end]
    }

    /// Draws strictly after `watermark`.
    pub fn after(&self, watermark: u32) -> &[DrawRecord] {
        let start = self.draws.partition_point(|d| d.draw_number <= watermark);
        &self.draws[start..]
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Tirage de test : les dezenas hors `exclude`, en commençant par `prefer`.
    pub fn draw_with(draw_number: u32, prefer: &[u8], exclude: &[u8]) -> DrawRecord {
        let mut numbers: Vec<u8> = prefer.iter().copied().filter(|n| !exclude.contains(n)).collect();
        for n in 1..=25u8 {
            if numbers.len() == 15 {
                break;
            }
            if !exclude.contains(&n) && !numbers.contains(&n) {
                numbers.push(n);
            }
        }
        DrawRecord::new(draw_number, format!("2024-01-{:02}", draw_number % 28 + 1), &numbers).unwrap()
    }

    /// Tirage sans aucune des dezenas de `exclude` (au plus 10 exclusions).
    pub fn draw_without(draw_number: u32, exclude: &[u8]) -> DrawRecord {
        draw_with(draw_number, &[], exclude)
    }

    /// 10 concours numérotés à partir de `first` : 1 et 2 absents, 3 à 10 une fois,
    /// 11 deux fois, 12 à 25 partout. Les 10 plus absentes sont donc 1 à 10.
    pub fn absent_scenario(first: u32) -> Vec<DrawRecord> {
        let always: Vec<u8> = (12..=25).collect();
        let extras = [3, 4, 5, 6, 7, 8, 9, 10, 11, 11];
        extras
            .iter()
            .enumerate()
            .map(|(i, &extra)| {
                let mut numbers = always.clone();
                numbers.push(extra);
                DrawRecord::new(first + i as u32, "2024-01-01", &numbers).unwrap()
            })
            .collect()
    }

    pub fn history(draws: Vec<DrawRecord>) -> DrawHistory {
        DrawHistory::new(draws).unwrap()
    }
}
