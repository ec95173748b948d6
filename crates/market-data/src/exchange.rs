use crate::types::Exchange;

const MCX_SYMBOLS: &[&str] = &[
    "GOLD",
    "GOLDM",
    "GOLDPETAL",
    "SILVER",
    "SILVERM",
    "CRUDEOIL",
    "NATURALGAS",
    "COPPER",
    "ZINC",
    "LEAD",
    "ALUMINIUM",
    "NICKEL",
    "COTTON",
    "MENTHAOIL",
    "CASTORSEED",
];

const CDS_SYMBOLS: &[&str] = &[
    "USDINR", "EURINR", "GBPINR", "JPYINR", "AUDINR", "CADINR", "CHFINR", "SGDINR", "HKDINR",
    "CNHINR",
];

/// Routes a symbol to its execution exchange using the fixed
/// commodity/currency alphabet. Anything not in the MCX or CDS lists is NSE.
pub fn resolve_exchange(symbol: &str) -> Exchange {
    let upper = symbol.to_ascii_uppercase();
    if MCX_SYMBOLS.contains(&upper.as_str()) {
        Exchange::Mcx
    } else if CDS_SYMBOLS.contains(&upper.as_str()) {
        Exchange::Cds
    } else {
        Exchange::Nse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_commodities_to_mcx() {
        assert_eq!(resolve_exchange("GOLD"), Exchange::Mcx);
        assert_eq!(resolve_exchange("crudeoil"), Exchange::Mcx);
    }

    #[test]
    fn routes_currency_pairs_to_cds() {
        assert_eq!(resolve_exchange("USDINR"), Exchange::Cds);
        assert_eq!(resolve_exchange("jpyinr"), Exchange::Cds);
    }

    #[test]
    fn defaults_to_nse() {
        assert_eq!(resolve_exchange("RELIANCE"), Exchange::Nse);
        assert_eq!(resolve_exchange("NIFTY 50"), Exchange::Nse);
    }
}
