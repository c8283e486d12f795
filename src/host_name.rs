//! Random host name generation.

use rand::Rng;

/// Symbols used in generated names: the lowercase letters followed by the
/// decimal digits.
pub const CHARMAP: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a generated name, excluding any prefix.
pub const HOST_NAME_LENGTH: usize = 15;

const LETTERS: u8 = 26;
const SYMBOLS: u8 = 36;
// The first character is drawn from `a..=y`; `z` never leads a name.
const FIRST_SYMBOLS: u8 = 25;

/// Generates host names of the form `<prefix><15 random symbols>`.
///
/// Generation is stateless; two calls may return the same name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostNameGenerator {
    prefix: Option<String>,
}

impl HostNameGenerator {
    /// Creates a generator that prepends `prefix` when one is given.
    #[must_use]
    pub const fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Generates a name using the thread-local RNG.
    #[must_use]
    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::rng())
    }

    /// Generates a name using `rng`.
    pub fn generate_with<R: Rng>(&self, rng: &mut R) -> String {
        let prefix = self.prefix.as_deref().unwrap_or_default();
        let mut name = String::with_capacity(prefix.len() + HOST_NAME_LENGTH);
        name.push_str(prefix);
        name.push(symbol(rng.random_range(0..FIRST_SYMBOLS)));
        for _ in 1..HOST_NAME_LENGTH {
            name.push(symbol(rng.random_range(0..SYMBOLS)));
        }
        name
    }
}

fn symbol(index: u8) -> char {
    if index < LETTERS {
        char::from(b'a' + index)
    } else {
        char::from(b'0' + (index - LETTERS))
    }
}
