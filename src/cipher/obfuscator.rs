use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::table::{CipherTable, DEFAULT_ALPHABET};
use crate::cache::{Row, Scalar};

/// Reversible, non-cryptographic obfuscation of field values at rest.
///
/// Characters outside the table's alphabet pass through unchanged in both directions, so plain
/// legacy values mixed into an obfuscated column survive [`decipher`](Self::decipher) intact.
#[derive(Clone)]
pub struct Obfuscator {
    table: Arc<CipherTable>,
    seed: Arc<str>,
}

impl Obfuscator {
    pub fn new(seed: &str) -> Self {
        Self::with_alphabet(DEFAULT_ALPHABET, seed)
    }

    pub fn with_alphabet(alphabet: &str, seed: &str) -> Self {
        Self {
            table: CipherTable::memoized(alphabet, seed),
            seed: Arc::from(seed),
        }
    }

    pub fn table(&self) -> &CipherTable {
        &self.table
    }

    pub fn obfuscate(&self, text: &str) -> String {
        text.chars()
            .map(|c| self.table.forward(c).unwrap_or(c))
            .collect()
    }

    pub fn decipher(&self, text: &str) -> String {
        text.chars()
            .map(|c| self.table.inverse(c).unwrap_or(c))
            .collect()
    }

    /// Copy of `row` with every text value in `fields` obfuscated. Nulls and numbers are kept as is.
    pub fn obfuscate_fields<S: AsRef<str>>(&self, row: &Row, fields: &[S]) -> Row {
        self.map_fields(row, fields, |text| self.obfuscate(text))
    }

    /// Copy of `row` with every text value in `fields` deciphered. Other columns are untouched.
    pub fn decipher_fields<S: AsRef<str>>(&self, row: &Row, fields: &[S]) -> Row {
        self.map_fields(row, fields, |text| self.decipher(text))
    }

    /// One-way salted digest (`seed + text + reversed seed`), hex encoded. For values that only ever
    /// need comparing, such as passwords.
    pub fn fingerprint(&self, text: &str) -> String {
        let reversed: String = self.seed.chars().rev().collect();
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(reversed.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn map_fields<S, F>(&self, row: &Row, fields: &[S], transform: F) -> Row
    where
        S: AsRef<str>,
        F: Fn(&str) -> String,
    {
        let mut out = row.clone();
        for (column, value) in out.iter_mut() {
            if !fields.iter().any(|field| field.as_ref() == column) {
                continue;
            }
            if let Scalar::Text(text) = value {
                *text = transform(text);
            }
        }
        out
    }
}

impl fmt::Debug for Obfuscator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obfuscator")
            .field("table", &self.table)
            .field("seed", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_roundtrip_with_reference_seed() {
        let obfuscator = Obfuscator::new("seed123");
        let hidden = obfuscator.obfuscate("hello");
        assert_eq!(hidden, "IFMMP");
        assert_eq!(obfuscator.decipher(&hidden), "hello");
    }

    #[test]
    fn roundtrip_over_whole_alphabet() {
        for seed in ["seed123", "", "another seed", "ZZZ"] {
            let obfuscator = Obfuscator::new(seed);
            let hidden = obfuscator.obfuscate(DEFAULT_ALPHABET);
            assert_ne!(hidden, DEFAULT_ALPHABET);
            assert_eq!(obfuscator.decipher(&hidden), DEFAULT_ALPHABET);
        }
    }

    #[test]
    fn unmapped_characters_pass_through() {
        let obfuscator = Obfuscator::new("seed123");
        let hidden = obfuscator.obfuscate("Jane Doe <jane@example.com>");
        assert_eq!(hidden, "CROF =PF 2KROF9FfRNQMF.rPN7");
        assert_eq!(obfuscator.obfuscate(" .-ü€"), " .-ü€");
        assert_eq!(
            obfuscator.decipher(&hidden),
            "Jane Doe <jane@example.com>"
        );
    }

    #[test]
    fn decipher_fields_only_touches_named_non_null_columns() {
        let obfuscator = Obfuscator::new("seed123");
        let row = Row::new()
            .with("id", 12_i64)
            .with("email", obfuscator.obfuscate("jane@example.com"))
            .with("name", "plain")
            .with("phone", Option::<String>::None);

        let clear = obfuscator.decipher_fields(&row, &["email", "phone"]);
        assert_eq!(
            clear.get("email").and_then(Scalar::as_text),
            Some("jane@example.com")
        );
        assert_eq!(clear.get("name").and_then(Scalar::as_text), Some("plain"));
        assert_eq!(clear.get("id"), Some(&Scalar::Integer(12)));
        assert!(clear.get("phone").is_some_and(Scalar::is_null));
    }

    #[test]
    fn obfuscate_fields_then_decipher_fields_restores_row() {
        let obfuscator = Obfuscator::new("field-seed");
        let row = Row::new()
            .with("email", "ops@example.org")
            .with("city", "Oslo");
        let fields = vec!["email".to_string(), "city".to_string()];

        let hidden = obfuscator.obfuscate_fields(&row, &fields);
        assert_ne!(hidden, row);
        assert_eq!(obfuscator.decipher_fields(&hidden, &fields), row);
    }

    #[test]
    fn numeric_columns_survive_field_roundtrip() {
        let obfuscator = Obfuscator::new("seed123");
        let row = Row::new()
            .with("id", 12_i64)
            .with("score", 9.5)
            .with("name", "hello");
        let fields = ["id", "score", "name"];

        let hidden = obfuscator.obfuscate_fields(&row, &fields);
        assert_eq!(hidden.get("id"), Some(&Scalar::Integer(12)));
        assert_eq!(hidden.get("score"), Some(&Scalar::Float(9.5)));
        assert_eq!(hidden.get("name").and_then(Scalar::as_text), Some("IFMMP"));

        assert_eq!(obfuscator.decipher_fields(&hidden, &fields), row);
    }

    #[test]
    fn fingerprint_is_salted_and_stable() {
        let obfuscator = Obfuscator::new("seed123");
        assert_eq!(
            obfuscator.fingerprint("hunter2"),
            "46023a143371937586539ff04bf4d76bc5f99116caf1eb5bd2a023bdb0186006"
        );
        assert_ne!(
            obfuscator.fingerprint("hunter2"),
            Obfuscator::new("seed124").fingerprint("hunter2")
        );
    }

    #[test]
    fn debug_output_hides_seed() {
        let rendered = format!("{:?}", Obfuscator::new("top-secret"));
        assert!(!rendered.contains("top-secret"));
    }
}
