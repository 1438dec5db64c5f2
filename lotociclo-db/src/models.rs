use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Nombre de dezenas possibles (1-25).
pub const POOL_SIZE: u8 = 25;

/// Nombre de dezenas tirées par concours.
pub const PICK_COUNT: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub draw_number: u32,
    pub date: String,
    pub numbers: [u8; PICK_COUNT],
}

impl DrawRecord {
    /// Construit un tirage validé ; les dezenas sont triées.
    pub fn new(draw_number: u32, date: impl Into<String>, numbers: &[u8]) -> Result<Self> {
        if draw_number == 0 {
            bail!("Numéro de concours invalide : 0");
        }
        validate_numbers(numbers)?;
        let mut sorted = [0u8; PICK_COUNT];
        sorted.copy_from_slice(numbers);
        sorted.sort();
        Ok(Self {
            draw_number,
            date: date.into(),
            numbers: sorted,
        })
    }

    pub fn contains(&self, number: u8) -> bool {
        self.numbers.contains(&number)
    }

    pub fn numbers_csv(&self) -> String {
        self.numbers
            .iter()
            .map(|n| format!("{:02}", n))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone)]
pub struct NumberStats {
    pub number: u8,
    pub frequency: u32,
    pub gap: u32,
}

pub fn validate_numbers(numbers: &[u8]) -> Result<()> {
    if numbers.len() != PICK_COUNT {
        bail!("{} dezenas attendues, {} reçues", PICK_COUNT, numbers.len());
    }
    for &n in numbers {
        if n < 1 || n > POOL_SIZE {
            bail!("Dezena {} hors limites (1-{})", n, POOL_SIZE);
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                bail!("Dezena en double : {}", numbers[i]);
            }
        }
    }
    Ok(())
}

/// Parse une liste "01,02,03" (ou séparée par des espaces).
pub fn parse_numbers(raw: &str) -> Result<Vec<u8>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim()
                .parse::<u8>()
                .with_context(|| format!("Dezena illisible : '{}'", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_FIFTEEN: [u8; 15] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    #[test]
    fn test_validate_numbers_ok() {
        assert!(validate_numbers(&FIRST_FIFTEEN).is_ok());
        assert!(validate_numbers(&[25, 24, 23, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13, 12, 11]).is_ok());
    }

    #[test]
    fn test_validate_numbers_out_of_range() {
        assert!(validate_numbers(&[0, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]).is_err());
        assert!(validate_numbers(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 26]).is_err());
    }

    #[test]
    fn test_validate_numbers_duplicate() {
        assert!(validate_numbers(&[1, 1, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]).is_err());
    }

    #[test]
    fn test_validate_numbers_wrong_count() {
        assert!(validate_numbers(&[1, 2, 3]).is_err());
        assert!(validate_numbers(&[]).is_err());
    }

    #[test]
    fn test_draw_record_sorts_numbers() {
        let draw = DrawRecord::new(
            3001,
            "2024-01-02",
            &[15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1],
        )
        .unwrap();
        assert_eq!(draw.numbers, FIRST_FIFTEEN);
        assert!(draw.contains(7));
        assert!(!draw.contains(16));
    }

    #[test]
    fn test_draw_record_rejects_zero_number() {
        assert!(DrawRecord::new(0, "2024-01-02", &FIRST_FIFTEEN).is_err());
    }

    #[test]
    fn test_numbers_csv() {
        let draw = DrawRecord::new(1, "2024-01-02", &FIRST_FIFTEEN).unwrap();
        assert_eq!(draw.numbers_csv(), "01,02,03,04,05,06,07,08,09,10,11,12,13,14,15");
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_numbers("01,02,10").unwrap(), vec![1, 2, 10]);
        assert_eq!(parse_numbers(" 3 4  5 ").unwrap(), vec![3, 4, 5]);
        assert!(parse_numbers("1,x,3").is_err());
    }
}
