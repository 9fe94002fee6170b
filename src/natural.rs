//! Natural ordering of entity names.
//!
//! Names such as `bb23` and `bb231` are split into numeric and non-numeric
//! runs. Numeric runs compare by value, everything else compares as text, so
//! `bb2` sorts before `bb10`.
//!
//! The hex variant treats runs of `[0-9a-fA-F]` as numbers instead. Names like
//! `bb234` are valid hex in their entirety, so one data set must always be
//! sorted with the same [`NameOrder`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// How numeric runs inside a name are recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameOrder {
    /// Runs of ASCII decimal digits.
    #[default]
    Decimal,
    /// Runs of ASCII hexadecimal digits.
    Hex,
}

impl NameOrder {
    fn is_numeric(self, c: char) -> bool {
        match self {
            NameOrder::Decimal => c.is_ascii_digit(),
            NameOrder::Hex => c.is_ascii_hexdigit(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Text(&'a str),
}

impl Ord for Token<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Token::Number(a), Token::Number(b)) => cmp_numeric(a, b),
            (Token::Text(a), Token::Text(b)) => a.cmp(b),
            // numbers order ahead of text
            (Token::Number(_), Token::Text(_)) => Ordering::Less,
            (Token::Text(_), Token::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Token<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two digit runs by value without parsing, so arbitrarily long runs
/// cannot overflow. Leading zeros are insignificant.
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| {
        a.bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
    })
}

fn tokenize(name: &str, order: NameOrder) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut numeric = None;
    for (idx, c) in name.char_indices() {
        let is_num = order.is_numeric(c);
        match numeric {
            Some(prev) if prev != is_num => {
                tokens.push(make_token(&name[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        numeric = Some(is_num);
    }
    if let Some(prev) = numeric {
        tokens.push(make_token(&name[start..], prev));
    }
    tokens
}

fn make_token(run: &str, numeric: bool) -> Token<'_> {
    if numeric {
        Token::Number(run)
    } else {
        Token::Text(run)
    }
}

/// Compare two names under the natural ordering.
///
/// Token sequences compare element-wise; a sequence that is a prefix of the
/// other orders first.
pub fn natural_cmp(a: &str, b: &str, order: NameOrder) -> Ordering {
    tokenize(a, order).cmp(&tokenize(b, order))
}

/// Return `names` sorted naturally. The sort is stable, so names that compare
/// equal (`n01` and `n1`) keep their input order.
pub fn natural_sorted<I, S>(names: I, order: NameOrder) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut sorted: Vec<String> = names.into_iter().map(Into::into).collect();
    sorted.sort_by(|a, b| natural_cmp(a, b, order));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_runs_sort_by_value() {
        let sorted = natural_sorted(["bb10", "bb2", "bb1"], NameOrder::Decimal);
        assert_eq!(sorted, vec!["bb1", "bb2", "bb10"]);
    }

    #[test]
    fn long_suffixes_sort_after_short_ones() {
        let sorted = natural_sorted(["bb231", "bb23", "bb3"], NameOrder::Decimal);
        assert_eq!(sorted, vec!["bb3", "bb23", "bb231"]);
    }

    #[test]
    fn prefix_sequence_orders_first() {
        assert_eq!(
            natural_cmp("snx11168n0", "snx11168n0-ost", NameOrder::Decimal),
            Ordering::Less
        );
    }

    #[test]
    fn numbers_precede_text() {
        let sorted = natural_sorted(["abc", "10", "2"], NameOrder::Decimal);
        assert_eq!(sorted, vec!["2", "10", "abc"]);
    }

    #[test]
    fn leading_zeros_compare_equal_and_stay_stable() {
        assert_eq!(natural_cmp("n01", "n1", NameOrder::Decimal), Ordering::Equal);
        let sorted = natural_sorted(["n01", "n1", "n0"], NameOrder::Decimal);
        assert_eq!(sorted, vec!["n0", "n01", "n1"]);
    }

    #[test]
    fn hex_mode_reads_hex_runs_as_numbers() {
        let sorted = natural_sorted(
            ["OST000a", "OST0009", "OST0010"],
            NameOrder::Hex,
        );
        assert_eq!(sorted, vec!["OST0009", "OST000a", "OST0010"]);

        // decimal mode reads "000" then text "a", which is smaller than 9
        let sorted = natural_sorted(["OST0009", "OST000a"], NameOrder::Decimal);
        assert_eq!(sorted, vec!["OST000a", "OST0009"]);
    }

    #[test]
    fn hex_mode_is_case_insensitive_for_values() {
        assert_eq!(natural_cmp("x-FF", "x-ff", NameOrder::Hex), Ordering::Equal);
        assert_eq!(natural_cmp("x-FE", "x-ff", NameOrder::Hex), Ordering::Less);
    }

    #[test]
    fn empty_names_sort_first() {
        let sorted = natural_sorted(["a", ""], NameOrder::Decimal);
        assert_eq!(sorted, vec!["", "a"]);
    }

    #[test]
    fn huge_numbers_do_not_overflow() {
        assert_eq!(
            natural_cmp(
                "n99999999999999999999999",
                "n100000000000000000000000",
                NameOrder::Decimal
            ),
            Ordering::Less
        );
    }
}
