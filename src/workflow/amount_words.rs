//! Rupee amounts spelled out in the Indian numbering system.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const UNITS: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn below_thousand(n: u64) -> String {
    match n {
        0..=19 => UNITS[n as usize].to_string(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                u => format!("{} {}", tens, UNITS[u as usize]),
            }
        }
        _ => {
            let hundreds = format!("{} Hundred", UNITS[(n / 100) as usize]);
            match n % 100 {
                0 => hundreds,
                rest => format!("{} and {}", hundreds, below_thousand(rest)),
            }
        }
    }
}

/// `1234.50` becomes "Rupees One Thousand Two Hundred and Thirty Four and Fifty Paise Only".
pub fn amount_in_words(amount: Decimal) -> String {
    let amount = amount.abs().round_dp(2);
    if amount.is_zero() {
        return "Rupees Zero Only".to_string();
    }

    let rupees_part = amount.trunc();
    let paise = ((amount - rupees_part) * Decimal::ONE_HUNDRED)
        .round()
        .to_u64()
        .unwrap_or(0);
    let mut rupees = rupees_part.to_u64().unwrap_or(0);

    let crore = rupees / 10_000_000;
    rupees %= 10_000_000;
    let lakh = rupees / 100_000;
    rupees %= 100_000;
    let thousand = rupees / 1_000;
    rupees %= 1_000;

    let mut parts: Vec<String> = vec!["Rupees".to_string()];
    // Crore counts above 999 are spelled recursively.
    if crore > 0 {
        let crore_words = if crore < 1_000 {
            below_thousand(crore)
        } else {
            spell_whole(crore)
        };
        parts.push(format!("{} Crore", crore_words));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", below_thousand(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", below_thousand(thousand)));
    }
    if rupees > 0 {
        parts.push(below_thousand(rupees));
    }
    if paise > 0 {
        parts.push(format!("and {} Paise", below_thousand(paise)));
    }
    parts.push("Only".to_string());

    parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn spell_whole(n: u64) -> String {
    let words = amount_in_words(Decimal::from(n));
    words
        .trim_start_matches("Rupees ")
        .trim_end_matches(" Only")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(dec!(0), "Rupees Zero Only"; "zero")]
    #[test_case(dec!(5), "Rupees Five Only"; "units")]
    #[test_case(dec!(40), "Rupees Forty Only"; "round tens")]
    #[test_case(dec!(105), "Rupees One Hundred and Five Only"; "hundreds with remainder")]
    #[test_case(dec!(1500), "Rupees One Thousand Five Hundred Only"; "thousands")]
    #[test_case(dec!(1234.50), "Rupees One Thousand Two Hundred and Thirty Four and Fifty Paise Only"; "paise")]
    #[test_case(dec!(250000), "Rupees Two Lakh Fifty Thousand Only"; "lakh")]
    #[test_case(dec!(12500000), "Rupees One Crore Twenty Five Lakh Only"; "crore")]
    #[test_case(dec!(0.75), "Rupees and Seventy Five Paise Only"; "paise only")]
    fn spells_amounts(amount: Decimal, expected: &str) {
        assert_eq!(amount_in_words(amount), expected);
    }

    #[test]
    fn large_crore_counts_are_spelled() {
        assert_eq!(
            amount_in_words(dec!(12000000000)),
            "Rupees One Thousand Two Hundred Crore Only"
        );
    }
}
