//! Currency, date and tax helpers (es-CL)

use chrono::NaiveDateTime;

/// Chilean VAT rate, in percent
pub const IVA_PERCENT: i64 = 19;

/// Date shown in the receipt header
pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Format integer pesos as `$ 1.234.567`
///
/// Negative amounts are rendered as `-$ 1.234`.
pub fn format_money(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-$ {}", grouped)
    } else {
        format!("$ {}", grouped)
    }
}

pub fn format_date(at: &NaiveDateTime) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Net amount and VAT contained in a gross total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxSplit {
    pub net: i64,
    pub tax: i64,
}

/// Split a VAT-inclusive total: `net = round(total / 1.19)`, `tax = total - net`
///
/// Integer arithmetic, halves rounded away from zero.
pub fn split_tax(total: i64) -> TaxSplit {
    let divisor = 100 + IVA_PERCENT;
    let magnitude = (total.unsigned_abs() as i128 * 200 + divisor as i128) / (2 * divisor as i128);
    let net = if total < 0 {
        -(magnitude as i64)
    } else {
        magnitude as i64
    };
    TaxSplit {
        net,
        tax: total - net,
    }
}
