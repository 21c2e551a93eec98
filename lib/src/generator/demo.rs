//! Brand demo pages: one fictional business per locality and niche.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::data::LocalityRecord;
use crate::enrich::{Enricher, Purpose};
use crate::util::{slugify, title_case};

/// A niche for which demo pages are generated.
#[derive(Debug, Clone)]
pub struct DemoNiche {
    /// The niche key, as in `restaurant`: used in output paths and URLs.
    pub key: String,
    /// The domain the niche's demos are served from.
    pub domain: String,
    /// The dataset column suffix of the niche's brand URLs, as in `resto`
    /// for `url_resto_complete`.
    pub column: String,
}

impl DemoNiche {
    /// The absolute origin of this niche's pages.
    pub fn origin(&self) -> String {
        format!("https://{}", self.domain)
    }
}

/// Extracts a display brand name from a brand site URL: the first label of
/// the host, title-cased, with French elisions restored.
///
/// ```rust
/// use silo::generator::brand_from_url;
///
/// let brand = brand_from_url("https://la-table-des-halles.sites-restaurants.fr");
/// assert_eq!(brand.as_deref(), Some("La Table Des Halles"));
///
/// let brand = brand_from_url("https://l-atelier-de-marie.sitesartisans.fr/");
/// assert_eq!(brand.as_deref(), Some("L'Atelier de Marie"));
///
/// assert_eq!(brand_from_url("https://short.link/abc"), None);
/// ```
pub fn brand_from_url(url: &str) -> Option<String> {
    if !url.contains("sites") {
        return None;
    }

    let (_, rest) = url.split_once("://")?;
    let (label, _) = rest.split_once('.')?;
    if label.is_empty() || label.contains('/') {
        return None;
    }

    let words: Vec<String> = title_case(&label.replace('-', " "))
        .split(' ')
        .map(String::from)
        .collect();

    let mut name = String::new();
    let mut elided = false;
    for (i, word) in words.iter().enumerate() {
        if i > 0 && !elided {
            name.push(' ');
        }

        elided = false;
        match word.as_str() {
            "L" | "D" if i + 1 < words.len() => {
                name.push_str(word);
                name.push('\'');
                elided = true;
            }
            "Du" | "De" if i > 0 => name.push_str(&word.to_lowercase()),
            _ => name.push_str(word),
        }
    }

    Some(name)
}

/// The brand for `record` in `niche`: from its brand URL, if it has one, or
/// `"<Niche> <Ville>"`.
pub fn brand_name(record: &LocalityRecord, niche: &DemoNiche) -> String {
    let from_url = record.get_non_blank(&format!("url_{}_complete", niche.column))
        .or_else(|| record.niche_url(&niche.column))
        .and_then(brand_from_url);

    match from_url {
        Some(brand) => brand,
        None => format!("{} {}", title_case(&niche.key), record.name),
    }
}

/// The brand slug of `record` in `niche`.
pub fn brand_slug(record: &LocalityRecord, niche: &DemoNiche) -> String {
    slugify(&brand_name(record, niche))
}

const FIRST_NAMES: &[&str] = &[
    "Marc-André", "Jean-Baptiste", "Lucie", "Aurélie", "Thomas",
    "Antoine", "Sophie", "Élodie", "Nicolas", "Benoit",
];

const LAST_NAMES: &[&str] = &[
    "Valéry", "Moreau", "Lefebvre", "Roux", "Girard",
    "Petit", "Simon", "Bertrand", "Lauzier", "Gaillard",
];

fn digits<R: Rng>(rng: &mut R, n: usize) -> String {
    (0..n).map(|_| char::from(b'0' + rng.random_range(0..10u8))).collect()
}

/// Plausible, seeded professional details for a demo business.
pub fn professional_data(record: &LocalityRecord, niche: &DemoNiche, brand: &str, enricher: &Enricher) -> Vec<(&'static str, String)> {
    let mut rng = enricher.rng(&format!("{}/{}", record.slug, niche.key), Purpose::Demo);

    let owner = format!(
        "{} {}",
        FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Claire"),
        LAST_NAMES.choose(&mut rng).copied().unwrap_or("Martin"),
    );

    let phone = format!(
        "0{} {} {} {} {}",
        rng.random_range(1..=5),
        rng.random_range(40..=99),
        rng.random_range(10..=99),
        rng.random_range(10..=99),
        rng.random_range(10..=99),
    );

    let siren = digits(&mut rng, 9);
    let siret = format!("{siren} {}", digits(&mut rng, 5));
    let street = rng.random_range(1..=150);
    let address = match record.postal_code.trim() {
        "" => format!("{street} Boulevard de la République, {}", record.name),
        code => format!("{street} Boulevard de la République, {code} {}", record.name),
    };

    let (main, sub) = match brand.split_once(' ') {
        Some((main, sub)) => (main.to_uppercase(), sub.to_uppercase()),
        None => (brand.to_uppercase(), String::new()),
    };

    let mut pairs = crate::pairs! {
        "demo_brand_name" => brand,
        "demo_brand_main" => main,
        "demo_brand_sub" => sub,
        "demo_owner_name" => owner,
        "demo_phone" => phone,
        "demo_siret" => siret,
        "demo_email" => format!("contact@{}-{}.fr", slugify(&record.name), niche.key),
        "demo_address" => address,
    };

    match niche.key.as_str() {
        "avocat" => {
            pairs.push(("demo_tva", format!("FR {} {siren}", rng.random_range(10..=99))));
        }
        "sante" => {
            pairs.push(("demo_rpps", digits(&mut rng, 11)));
            pairs.push(("demo_tva", format!("FR {} {siren}", rng.random_range(10..=99))));
        }
        "artisan" => {
            pairs.push(("demo_assurance", format!("AXA-{}", rng.random_range(100000..=999999))));
        }
        "immo" => {
            pairs.push(("demo_carte_pro", format!(
                "CPI {}01 {} 000 0{}",
                rng.random_range(10..=99),
                rng.random_range(2018..=2024),
                rng.random_range(100..=999),
            )));
        }
        _ => {}
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Fields, Schema};
    use crate::enrich::{Bucket, RunClock};

    fn record(pairs: &[(&str, &str)]) -> LocalityRecord {
        let raw: Fields = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        LocalityRecord::from_row(raw, &Schema::standard()).unwrap()
    }

    fn niche(key: &str, column: &str) -> DemoNiche {
        DemoNiche { key: key.into(), domain: format!("sites-{key}.fr"), column: column.into() }
    }

    #[test]
    fn brands_come_from_urls_or_fall_back() {
        let albi = record(&[("ville", "Albi"), ("url_resto_complete", "https://chez-d-artagnan.sites-restaurants.fr")]);
        assert_eq!(brand_name(&albi, &niche("restaurant", "resto")), "Chez D'Artagnan");
        assert_eq!(brand_slug(&albi, &niche("restaurant", "resto")), "chez-d-artagnan");
        assert_eq!(brand_name(&albi, &niche("sante", "sante")), "Sante Albi");

        let rodez = record(&[("ville", "Rodez"), ("url_resto", "https://bit.ly/xyz")]);
        assert_eq!(brand_name(&rodez, &niche("restaurant", "resto")), "Restaurant Rodez");
    }

    #[test]
    fn professional_data_is_seeded() {
        let enricher = Enricher::new(RunClock::on(2026, 10, 18).unwrap(), Bucket::Month);
        let albi = record(&[("ville", "Albi"), ("code_postal", "81000")]);
        let sante = niche("sante", "sante");

        let first = professional_data(&albi, &sante, "Cabinet Albi", &enricher);
        let second = professional_data(&albi, &sante, "Cabinet Albi", &enricher);
        assert_eq!(first, second);

        let get = |key: &str| first.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());
        assert_eq!(get("demo_brand_main"), Some("CABINET"));
        assert_eq!(get("demo_brand_sub"), Some("ALBI"));
        assert_eq!(get("demo_email"), Some("contact@albi-sante.fr"));
        assert_eq!(get("demo_rpps").map(str::len), Some(11));
        assert!(get("demo_address").unwrap().ends_with(", 81000 Albi"));
        assert!(get("demo_siret").unwrap().len() == 15);
        assert!(get("demo_carte_pro").is_none());
    }
}
