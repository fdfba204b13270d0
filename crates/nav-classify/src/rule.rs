//! The assignment-vs-expiration rule.
//!
//! Assignments and expirations reach us as the *same* generic book entry
//! type. The only reliable signal is the instrument the entry references:
//!
//! | Instrument on the book entry            | Class        |
//! |-----------------------------------------|--------------|
//! | option (`OPT`/`FOP`, a complete strike  | `Expiration` |
//! | + right + expiry descriptor, or an OCC  |              |
//! | option symbol)                          |              |
//! | underlying equity (`STK`)               | `Assignment` |
//! | anything else                           | `Ambiguous`  |
//!
//! Nothing else (description text, quantity sign, cash) is consulted.

use nav_schemas::RawInstrument;

use crate::parse::occ_symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookEntryClass {
    Expiration,
    Assignment,
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssetClass {
    Option,
    Equity,
    Cash,
    Other,
    Missing,
}

pub(crate) fn asset_class(raw: &RawInstrument) -> AssetClass {
    match raw.asset_class.as_deref().map(|s| s.trim().to_ascii_uppercase()) {
        None => AssetClass::Missing,
        Some(s) if s.is_empty() => AssetClass::Missing,
        Some(s) => match s.as_str() {
            "OPT" | "FOP" | "OPTION" => AssetClass::Option,
            "STK" | "EQUITY" | "STOCK" | "ETF" => AssetClass::Equity,
            "CASH" => AssetClass::Cash,
            _ => AssetClass::Other,
        },
    }
}

/// True when strike, right and expiry are all present and non-blank.
pub(crate) fn has_option_descriptor(raw: &RawInstrument) -> bool {
    let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
    present(&raw.strike) && present(&raw.right) && present(&raw.expiry)
}

fn has_any_option_field(raw: &RawInstrument) -> bool {
    let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
    present(&raw.strike) || present(&raw.right) || present(&raw.expiry)
}

pub fn classify_book_entry(raw: &RawInstrument) -> BookEntryClass {
    match asset_class(raw) {
        AssetClass::Option => BookEntryClass::Expiration,
        AssetClass::Equity if !has_any_option_field(raw) => BookEntryClass::Assignment,
        // STK carrying option fields contradicts itself.
        AssetClass::Equity => BookEntryClass::Ambiguous,
        AssetClass::Missing if has_option_descriptor(raw) || occ_symbol(&raw.symbol).is_some() => {
            BookEntryClass::Expiration
        }
        AssetClass::Missing | AssetClass::Cash | AssetClass::Other => BookEntryClass::Ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(asset_class: Option<&str>, symbol: &str) -> RawInstrument {
        RawInstrument {
            asset_class: asset_class.map(str::to_string),
            symbol: symbol.to_string(),
            ..RawInstrument::default()
        }
    }

    fn option_fields(mut i: RawInstrument) -> RawInstrument {
        i.underlying = Some("SPY".to_string());
        i.strike = Some("628".to_string());
        i.right = Some("C".to_string());
        i.expiry = Some("2024-06-14".to_string());
        i
    }

    #[test]
    fn option_instrument_is_expiration() {
        assert_eq!(classify_book_entry(&inst(Some("OPT"), "SPY")), BookEntryClass::Expiration);
        assert_eq!(classify_book_entry(&inst(Some("opt"), "SPY")), BookEntryClass::Expiration);
    }

    #[test]
    fn equity_instrument_is_assignment() {
        assert_eq!(classify_book_entry(&inst(Some("STK"), "SPY")), BookEntryClass::Assignment);
    }

    #[test]
    fn descriptor_without_asset_class_is_expiration() {
        let i = option_fields(inst(None, "SPY"));
        assert_eq!(classify_book_entry(&i), BookEntryClass::Expiration);
    }

    #[test]
    fn occ_symbol_without_asset_class_is_expiration() {
        assert_eq!(
            classify_book_entry(&inst(None, "SPY   240614C00628000")),
            BookEntryClass::Expiration
        );
    }

    #[test]
    fn everything_else_is_ambiguous() {
        assert_eq!(classify_book_entry(&inst(None, "SPY")), BookEntryClass::Ambiguous);
        assert_eq!(classify_book_entry(&inst(Some("BOND"), "T 4 1/4")), BookEntryClass::Ambiguous);
        assert_eq!(classify_book_entry(&inst(Some("CASH"), "USD")), BookEntryClass::Ambiguous);
        let contradictory = option_fields(inst(Some("STK"), "SPY"));
        assert_eq!(classify_book_entry(&contradictory), BookEntryClass::Ambiguous);
        let mut partial = inst(None, "SPY");
        partial.strike = Some("628".to_string());
        assert_eq!(classify_book_entry(&partial), BookEntryClass::Ambiguous);
    }
}
