use crate::types::{Exchange, SearchResult};

/// Static symbol catalogue backing `Search` and `GetTopMovers`. Real
/// deployments would refresh this from an exchange master-contract file;
/// for paper trading a fixed list is sufficient and deterministic.
pub struct Catalogue {
    entries: Vec<(&'static str, &'static str, Exchange)>,
}

impl Catalogue {
    pub fn new() -> Self {
        let mut entries = Vec::new();
        for (symbol, name) in EQUITIES {
            entries.push((*symbol, *name, Exchange::Nse));
        }
        for (symbol, name) in COMMODITIES {
            entries.push((*symbol, *name, Exchange::Mcx));
        }
        for (symbol, name) in CURRENCIES {
            entries.push((*symbol, *name, Exchange::Cds));
        }
        Self { entries }
    }

    pub fn search(&self, query: &str, limit: usize, exchange: Option<Exchange>) -> Vec<SearchResult> {
        let needle = query.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(symbol, name, ex)| {
                exchange.map(|want| *ex == want).unwrap_or(true)
                    && (symbol.to_ascii_lowercase().contains(&needle)
                        || name.to_ascii_lowercase().contains(&needle))
            })
            .take(limit)
            .map(|(symbol, name, ex)| SearchResult {
                symbol: symbol.to_string(),
                name: name.to_string(),
                exchange: *ex,
            })
            .collect()
    }

    pub fn equities(&self) -> impl Iterator<Item = &'static str> {
        EQUITIES.iter().map(|(s, _)| *s)
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

pub const EQUITIES: &[(&str, &str)] = &[
    ("RELIANCE", "Reliance Industries"),
    ("TCS", "Tata Consultancy Services"),
    ("INFY", "Infosys"),
    ("HDFCBANK", "HDFC Bank"),
    ("ICICIBANK", "ICICI Bank"),
    ("ITC", "ITC Limited"),
    ("SBIN", "State Bank of India"),
    ("BHARTIARTL", "Bharti Airtel"),
    ("KOTAKBANK", "Kotak Mahindra Bank"),
    ("LT", "Larsen & Toubro"),
    ("AXISBANK", "Axis Bank"),
    ("HINDUNILVR", "Hindustan Unilever"),
    ("BAJFINANCE", "Bajaj Finance"),
    ("ASIANPAINT", "Asian Paints"),
    ("MARUTI", "Maruti Suzuki"),
    ("SUNPHARMA", "Sun Pharmaceutical"),
    ("TITAN", "Titan Company"),
    ("ULTRACEMCO", "UltraTech Cement"),
    ("WIPRO", "Wipro"),
    ("NESTLEIND", "Nestle India"),
    ("ADANIENT", "Adani Enterprises"),
    ("ADANIPORTS", "Adani Ports"),
    ("TATAMOTORS", "Tata Motors"),
    ("TATASTEEL", "Tata Steel"),
    ("POWERGRID", "Power Grid Corporation"),
    ("NTPC", "NTPC Limited"),
    ("ONGC", "Oil & Natural Gas Corporation"),
    ("COALINDIA", "Coal India"),
    ("HCLTECH", "HCL Technologies"),
    ("TECHM", "Tech Mahindra"),
];

pub const COMMODITIES: &[(&str, &str)] = &[
    ("GOLD", "Gold"),
    ("GOLDM", "Gold Mini"),
    ("GOLDPETAL", "Gold Petal"),
    ("SILVER", "Silver"),
    ("SILVERM", "Silver Mini"),
    ("CRUDEOIL", "Crude Oil"),
    ("NATURALGAS", "Natural Gas"),
    ("COPPER", "Copper"),
    ("ZINC", "Zinc"),
    ("LEAD", "Lead"),
    ("ALUMINIUM", "Aluminium"),
    ("NICKEL", "Nickel"),
    ("COTTON", "Cotton"),
    ("MENTHAOIL", "Mentha Oil"),
    ("CASTORSEED", "Castor Seed"),
];

pub const CURRENCIES: &[(&str, &str)] = &[
    ("USDINR", "US Dollar / Indian Rupee"),
    ("EURINR", "Euro / Indian Rupee"),
    ("GBPINR", "British Pound / Indian Rupee"),
    ("JPYINR", "Japanese Yen / Indian Rupee"),
    ("AUDINR", "Australian Dollar / Indian Rupee"),
    ("CADINR", "Canadian Dollar / Indian Rupee"),
    ("CHFINR", "Swiss Franc / Indian Rupee"),
    ("SGDINR", "Singapore Dollar / Indian Rupee"),
    ("HKDINR", "Hong Kong Dollar / Indian Rupee"),
    ("CNHINR", "Offshore Yuan / Indian Rupee"),
];
