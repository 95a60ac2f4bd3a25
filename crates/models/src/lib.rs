pub mod db;
pub mod entitlement;
pub mod errors;
pub mod payment_record;
pub mod school;
pub mod user;
pub mod user_credentials;

#[cfg(test)]
mod tests;

pub mod text {
    /// Lowercase alphanumeric slug with single dashes, used for usernames
    /// and school slugs.
    pub fn slugify(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last_dash = true;
        for c in input.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
                last_dash = false;
            } else if !last_dash {
                out.push('-');
                last_dash = true;
            }
        }
        while out.ends_with('-') {
            out.pop();
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::slugify;

        #[test]
        fn slugify_joins_words() {
            assert_eq!(slugify("Ada Lovelace"), "ada-lovelace");
        }

        #[test]
        fn slugify_collapses_punctuation() {
            assert_eq!(slugify("St. Mary's  High!"), "st-mary-s-high");
        }

        #[test]
        fn slugify_empty_stays_empty() {
            assert_eq!(slugify("  "), "");
        }
    }
}
