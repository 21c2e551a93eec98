use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

/// Used when a record carries no testimonial first name.
pub const DEFAULT_FIRST_NAME: &str = "Client";

static FEMALE_NAMES: Lazy<FxHashSet<&'static str>> = Lazy::new(|| [
    "julie", "marie", "sophie", "claire", "anne", "nathalie", "céline", "isabelle",
    "laurence", "sandrine", "valérie", "christine", "catherine", "patricia", "sylvie",
    "caroline", "virginie", "stéphanie", "émilie", "aurélie", "delphine", "florence",
    "béatrice", "véronique", "dominique", "martine", "françoise", "monique", "danielle",
    "michelle", "brigitte", "hélène", "jacqueline", "chantal", "nicole", "pauline",
    "camille", "margot", "léa", "emma", "chloé", "manon", "océane", "laura", "sarah",
    "amélie", "lucie", "mathilde", "alice", "jeanne", "charlotte", "juliette", "louise",
    "zoé", "inès", "lola", "jade", "léna", "clara", "eva", "lisa", "anna", "nina",
    "rose", "victoire", "agathe", "adèle", "clémence", "margaux", "marion", "elsa",
].into_iter().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    /// Every name not known to be female, including unknown names.
    Other,
}

impl Gender {
    pub fn of(first_name: &str) -> Gender {
        match FEMALE_NAMES.contains(first_name.trim().to_lowercase().as_str()) {
            true => Gender::Female,
            false => Gender::Other,
        }
    }

    /// Avatar background color: coral or dark blue.
    pub fn color(self) -> &'static str {
        match self {
            Gender::Female => "e17055",
            Gender::Other => "2c3e50",
        }
    }
}

/// A generated initials avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub name: String,
    pub initials: String,
    pub gender: Gender,
}

impl Avatar {
    pub fn for_first_name(first_name: &str) -> Avatar {
        let name = match first_name.trim() {
            "" => DEFAULT_FIRST_NAME,
            name => name,
        };

        Avatar {
            initials: name.chars().take(2).flat_map(char::to_uppercase).collect(),
            gender: Gender::of(name),
            name: name.to_string(),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "https://ui-avatars.com/api/?name={}&background={}&color=fff&size=150&font-size=0.4&bold=true",
            urlencoding::encode(&self.name),
            self.gender.color(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_female_names_get_coral() {
        for name in ["Julie", " céline ", "CHLOÉ", "Zoé"] {
            assert_eq!(Gender::of(name), Gender::Female, "{name}");
            assert!(Avatar::for_first_name(name).url().contains("background=e17055"));
        }
    }

    #[test]
    fn other_names_get_the_default_branch() {
        for name in ["Thomas", "Jean-Baptiste", "Client", "", "Xylophone"] {
            assert_eq!(Gender::of(name), Gender::Other, "{name}");
            assert!(Avatar::for_first_name(name).url().contains("background=2c3e50"));
        }
    }

    #[test]
    fn names_are_encoded() {
        let avatar = Avatar::for_first_name("Élodie Marie");
        assert_eq!(avatar.initials, "ÉL");
        assert!(avatar.url().starts_with("https://ui-avatars.com/api/?name=%C3%89lodie%20Marie&"));
    }
}
