//! Merchant key extraction
//!
//! Banks usually append a reference or store number to the merchant name
//! ("NETFLIX 23XAB", "Amazon 181015"). The merchant key keeps the leading
//! words up to the first token that contains a digit.

/// Derive the grouping key for a raw transaction description.
///
/// The first token is always kept so names such as "9th Ave Diner" survive.
/// Names with a digit inside the name itself ("Henry's on 12th") are cut
/// short; that trade-off is accepted to catch trailing reference numbers.
pub fn extract_merchant(description: &str) -> String {
    let mut tokens = description.split_whitespace();

    let Some(first) = tokens.next() else {
        return String::new();
    };

    let mut merchant = first.to_string();
    for token in tokens {
        if token.chars().any(|c| c.is_ascii_digit()) {
            break;
        }
        merchant.push(' ');
        merchant.push_str(token);
    }

    merchant
}
