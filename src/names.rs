//! Display name generation.

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Brave", "Calm", "Clever", "Dusty", "Eager", "Fancy", "Gentle", "Happy", "Jolly", "Kind",
    "Lucky", "Mellow", "Nimble", "Proud", "Quiet", "Rapid", "Silly", "Swift", "Witty", "Zesty",
];

const NOUNS: &[&str] = &[
    "Badger", "Comet", "Falcon", "Gecko", "Heron", "Koala", "Lynx", "Marten", "Newt", "Otter",
    "Panda", "Quokka", "Raven", "Salmon", "Tapir", "Turtle", "Walrus", "Wombat", "Yak", "Zebra",
];

/// Source of display names for new sessions. Names need not be unique.
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// User-name style names such as `Brave_Otter42`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNames;

impl NameGenerator for RandomNames {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Anonymous");
        let noun = NOUNS.choose(&mut rng).copied().unwrap_or("User");

        match rng.gen_range(0..3) {
            0 => format!("{adjective}{noun}"),
            1 => format!("{adjective}_{noun}"),
            _ => format!("{adjective}_{noun}{}", rng.gen_range(0..100)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_names_are_word_based() {
        let names = RandomNames;
        for _ in 0..50 {
            let name = names.generate();
            assert!(!name.is_empty());
            assert!(!name.contains(char::is_whitespace));
            assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)), "{name}");
            assert!(NOUNS.iter().any(|n| name.contains(n)), "{name}");
        }
    }
}
