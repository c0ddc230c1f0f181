use serde::{Deserialize, Serialize};

/// Symbols fetched when the caller doesn't name any.
pub const DEFAULT_INDEX_SYMBOLS: &[&str] = &["SPY", "QQQ", "IWM", "DIA"];

/// Underlying used for gamma exposure when no symbol is given.
pub const DEFAULT_GAMMA_SYMBOL: &str = "SPY";

/// The kinds of data the feed can serve.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataKind {
    /// Index quotes (SPY, QQQ, ...)
    MarketData,
    /// Sector ETF performance
    SectorData,
    /// VIX level and regime
    Volatility,
    /// Dealer gamma exposure by strike
    GammaExposure,
    /// Unusual options activity
    OptionsFlow,
}

impl DataKind {
    /// Every kind, in the order the dashboard lays them out.
    pub const ALL: [DataKind; 5] = [
        DataKind::MarketData,
        DataKind::SectorData,
        DataKind::Volatility,
        DataKind::GammaExposure,
        DataKind::OptionsFlow,
    ];

    /// Stable camelCase name used in logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::MarketData => "marketData",
            DataKind::SectorData => "sectorData",
            DataKind::Volatility => "volatility",
            DataKind::GammaExposure => "gammaExposure",
            DataKind::OptionsFlow => "optionsFlow",
        }
    }

    /// URL path segment used by HTTP upstreams.
    pub fn path(&self) -> &'static str {
        match self {
            DataKind::MarketData => "market",
            DataKind::SectorData => "sectors",
            DataKind::Volatility => "volatility",
            DataKind::GammaExposure => "gamma",
            DataKind::OptionsFlow => "flow",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a single fetch.
///
/// Kinds that take one underlying (gamma, options flow) use the first symbol.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FetchParams {
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl FetchParams {
    /// Parameters without symbols.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parameters for a list of symbols, normalized to upper case.
    pub fn symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parameters for an optional single symbol.
    pub fn symbol(symbol: Option<&str>) -> Self {
        Self::symbols(symbol)
    }

    /// The first symbol, if any.
    pub fn primary_symbol(&self) -> Option<&str> {
        self.symbols.first().map(String::as_str)
    }
}

/// One field of an aggregate fetch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchRequest {
    pub kind: DataKind,
    pub params: FetchParams,
}

impl FetchRequest {
    pub fn new(kind: DataKind, params: FetchParams) -> Self {
        Self { kind, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_are_normalized() {
        let params = FetchParams::symbols(["spy", " qqq ", ""]);
        assert_eq!(params.symbols, vec!["SPY".to_string(), "QQQ".to_string()]);
        assert_eq!(params.primary_symbol(), Some("SPY"));
    }

    #[test]
    fn test_single_symbol() {
        assert_eq!(FetchParams::symbol(None).primary_symbol(), None);
        assert_eq!(FetchParams::symbol(Some("tsla")).primary_symbol(), Some("TSLA"));
    }

    #[test]
    fn test_kind_serializes_camel_case() {
        let json = serde_json::to_string(&DataKind::GammaExposure).unwrap();
        assert_eq!(json, "\"gammaExposure\"");
        assert_eq!(DataKind::GammaExposure.to_string(), "gammaExposure");
    }
}
