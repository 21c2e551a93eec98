use chrono::Datelike;

use crate::enrich::RunClock;

const MONTHS: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin",
    "juillet", "août", "septembre", "octobre", "novembre", "décembre",
];

/// Wall-clock strings: the only values that legitimately differ between two
/// runs over the same input in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freshness {
    pub month: &'static str,
    pub year: i32,
    pub date: String,
}

impl Freshness {
    pub fn at(clock: RunClock) -> Freshness {
        let date = clock.date();
        Freshness {
            month: MONTHS[date.month0() as usize],
            year: date.year(),
            date: date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        crate::pairs! {
            "mois_actuel" => self.month,
            "annee_actuelle" => self.year,
            "dernier_site_mois" => format!("{} {}", self.month, self.year),
            "date_modified" => self.date,
            "year" => self.year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_month_names() {
        let freshness = Freshness::at(RunClock::on(2026, 8, 3).unwrap());
        assert_eq!(freshness.month, "août");
        assert_eq!(freshness.date, "2026-08-03");

        let pairs = freshness.pairs();
        assert!(pairs.contains(&("dernier_site_mois", "août 2026".to_string())));
        assert!(pairs.contains(&("year", "2026".to_string())));
    }
}
