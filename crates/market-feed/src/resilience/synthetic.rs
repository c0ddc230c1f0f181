//! Synthetic market data for degraded mode.
//!
//! Values are random but stay inside plausible bounds around a base price
//! per known symbol, so charts and tables render sensibly while a provider
//! is down.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use rand::rngs::ThreadRng;
use rand::Rng;
use rust_decimal::Decimal;

use crate::errors::FeedError;
use crate::models::{
    DataKind, FetchParams, FlowSentiment, FlowTrade, GammaData, GammaLevel, IndexData, OptionSide,
    OptionsFlow, Payload, SectorData, VixData, VolatilityRegime,
};
use crate::models::{DEFAULT_GAMMA_SYMBOL, DEFAULT_INDEX_SYMBOLS};

use super::fallback::FallbackGenerator;

/// Sector ETFs with display names and base prices.
const SECTORS: &[(&str, &str, f64)] = &[
    ("XLK", "Technology", 210.0),
    ("XLF", "Financials", 41.0),
    ("XLV", "Health Care", 145.0),
    ("XLE", "Energy", 92.0),
    ("XLY", "Consumer Discretionary", 180.0),
    ("XLP", "Consumer Staples", 78.0),
    ("XLI", "Industrials", 125.0),
    ("XLB", "Materials", 88.0),
    ("XLU", "Utilities", 70.0),
    ("XLRE", "Real Estate", 40.0),
    ("XLC", "Communication Services", 82.0),
];

/// Underlyings used for options flow when no symbol is requested.
const FLOW_UNIVERSE: &[&str] = &["SPY", "QQQ", "AAPL", "NVDA", "TSLA", "AMZN", "MSFT"];

fn base_price(symbol: &str) -> Option<f64> {
    let price = match symbol {
        "SPY" => 520.0,
        "QQQ" => 440.0,
        "IWM" => 205.0,
        "DIA" => 390.0,
        "AAPL" => 190.0,
        "NVDA" => 880.0,
        "TSLA" => 175.0,
        "AMZN" => 180.0,
        "MSFT" => 420.0,
        _ => return SECTORS.iter().find(|(s, _, _)| *s == symbol).map(|(_, _, p)| *p),
    };
    Some(price)
}

fn price(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(2)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Default [`FallbackGenerator`]: randomized, schema-valid payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self
    }

    fn spot(rng: &mut ThreadRng, symbol: &str) -> f64 {
        let base = base_price(symbol).unwrap_or_else(|| rng.gen_range(20.0..500.0));
        base * (1.0 + rng.gen_range(-0.02..0.02))
    }

    fn index(rng: &mut ThreadRng, symbol: &str) -> IndexData {
        let last = Self::spot(rng, symbol);
        let change_percent = rng.gen_range(-2.5..2.5);
        let change = last * change_percent / 100.0;
        let high = last * (1.0 + rng.gen_range(0.0..0.01));
        let low = last * (1.0 - rng.gen_range(0.0..0.01));

        IndexData {
            symbol: symbol.to_string(),
            price: price(last),
            change: price(change),
            change_percent: round2(change_percent),
            volume: rng.gen_range(5_000_000..80_000_000),
            high: price(high),
            low: price(low),
        }
    }

    fn market_data(rng: &mut ThreadRng, params: &FetchParams) -> HashMap<String, IndexData> {
        let symbols: Vec<String> = if params.symbols.is_empty() {
            DEFAULT_INDEX_SYMBOLS.iter().map(|s| s.to_string()).collect()
        } else {
            params.symbols.clone()
        };

        symbols
            .into_iter()
            .map(|symbol| {
                let data = Self::index(rng, &symbol);
                (symbol, data)
            })
            .collect()
    }

    fn sector_data(rng: &mut ThreadRng) -> HashMap<String, SectorData> {
        SECTORS
            .iter()
            .map(|(symbol, name, base)| {
                let change_percent = rng.gen_range(-3.0..3.0);
                let data = SectorData {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                    price: price(base * (1.0 + change_percent / 100.0)),
                    change_percent: round2(change_percent),
                    relative_strength: round2(1.0 + change_percent / 10.0),
                };
                (symbol.to_string(), data)
            })
            .collect()
    }

    fn vix(rng: &mut ThreadRng) -> VixData {
        let value = round2(rng.gen_range(12.0..35.0));
        let change_percent = rng.gen_range(-8.0..8.0);
        let change = value * change_percent / (100.0 + change_percent);

        VixData {
            value,
            change: round2(change),
            change_percent: round2(change_percent),
            regime: VolatilityRegime::from_level(value),
        }
    }

    fn gamma(rng: &mut ThreadRng, params: &FetchParams) -> GammaData {
        let symbol = params
            .primary_symbol()
            .unwrap_or(DEFAULT_GAMMA_SYMBOL)
            .to_string();
        let spot = Self::spot(rng, &symbol);
        let step = if spot >= 200.0 { 5.0 } else { 1.0 };
        let atm = (spot / step).round() * step;
        let flip = spot * (1.0 + rng.gen_range(-0.02..0.02));

        // Dealers are long gamma above the flip and short below it
        let levels: Vec<GammaLevel> = (-10..=10)
            .map(|i| {
                let strike = atm + i as f64 * step;
                let distance = (strike - flip) / spot;
                let net_gamma = distance * rng.gen_range(0.5..1.5) * 1.0e10;
                GammaLevel {
                    strike: price(strike),
                    net_gamma: net_gamma.round(),
                }
            })
            .collect();

        let strike_of = |pick: fn(f64, f64) -> bool| {
            levels
                .iter()
                .fold(None::<&GammaLevel>, |best, level| match best {
                    Some(b) if !pick(level.net_gamma, b.net_gamma) => Some(b),
                    _ => Some(level),
                })
                .map(|l| l.strike)
                .unwrap_or_default()
        };
        let call_wall = strike_of(|a, b| a > b);
        let put_wall = strike_of(|a, b| a < b);

        GammaData {
            symbol,
            spot_price: price(spot),
            total_gamma: levels.iter().map(|l| l.net_gamma).sum(),
            gamma_flip: price(flip),
            call_wall,
            put_wall,
            levels,
        }
    }

    fn options_flow(rng: &mut ThreadRng, params: &FetchParams) -> OptionsFlow {
        let requested = params.primary_symbol().map(str::to_string);
        let today = Utc::now().date_naive();
        let count = rng.gen_range(8..16);

        let trades: Vec<FlowTrade> = (0..count)
            .map(|_| {
                let symbol = requested.clone().unwrap_or_else(|| {
                    FLOW_UNIVERSE[rng.gen_range(0..FLOW_UNIVERSE.len())].to_string()
                });
                let spot = Self::spot(rng, &symbol);
                let side = if rng.gen_bool(0.55) {
                    OptionSide::Call
                } else {
                    OptionSide::Put
                };
                let sentiment = if rng.gen_bool(0.2) {
                    FlowSentiment::Neutral
                } else if side == OptionSide::Call {
                    FlowSentiment::Bullish
                } else {
                    FlowSentiment::Bearish
                };

                FlowTrade {
                    strike: price((spot * (1.0 + rng.gen_range(-0.1..0.1))).round()),
                    expiry: today + Duration::days(rng.gen_range(1..60)),
                    premium: price((rng.gen_range(50_000.0..5_000_000.0_f64) / 100.0).round() * 100.0),
                    size: rng.gen_range(10..5000),
                    symbol,
                    side,
                    sentiment,
                }
            })
            .collect();

        let calls = trades.iter().filter(|t| t.side == OptionSide::Call).count();
        let puts = trades.len() - calls;

        OptionsFlow {
            symbol: requested,
            put_call_ratio: round2(puts as f64 / calls.max(1) as f64),
            trades,
        }
    }
}

impl FallbackGenerator for SyntheticGenerator {
    fn generate(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError> {
        let mut rng = rand::thread_rng();

        let payload = match kind {
            DataKind::MarketData => Payload::MarketData(Self::market_data(&mut rng, params)),
            DataKind::SectorData => Payload::SectorData(Self::sector_data(&mut rng)),
            DataKind::Volatility => Payload::Volatility(Self::vix(&mut rng)),
            DataKind::GammaExposure => Payload::GammaExposure(Self::gamma(&mut rng, params)),
            DataKind::OptionsFlow => Payload::OptionsFlow(Self::options_flow(&mut rng, params)),
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn generate(kind: DataKind, params: FetchParams) -> Payload {
        SyntheticGenerator::new().generate(kind, &params).unwrap()
    }

    #[test]
    fn test_every_kind_matches_its_arm() {
        for kind in DataKind::ALL {
            assert_eq!(generate(kind, FetchParams::none()).kind(), kind);
        }
    }

    #[test]
    fn test_market_data_covers_requested_symbols() {
        let Payload::MarketData(data) = generate(DataKind::MarketData, FetchParams::symbols(["SPY", "QQQ"])) else {
            panic!("wrong arm");
        };
        assert_eq!(data.len(), 2);

        let spy = &data["SPY"];
        assert!(spy.price > dec!(480) && spy.price < dec!(560));
        assert!(spy.low <= spy.price && spy.price <= spy.high);
    }

    #[test]
    fn test_market_data_defaults_to_major_indices() {
        let Payload::MarketData(data) = generate(DataKind::MarketData, FetchParams::none()) else {
            panic!("wrong arm");
        };
        for symbol in DEFAULT_INDEX_SYMBOLS {
            assert!(data.contains_key(*symbol));
        }
    }

    #[test]
    fn test_sectors_are_complete() {
        let Payload::SectorData(data) = generate(DataKind::SectorData, FetchParams::none()) else {
            panic!("wrong arm");
        };
        assert_eq!(data.len(), SECTORS.len());
        assert_eq!(data["XLK"].name, "Technology");
    }

    #[test]
    fn test_vix_is_in_bounds_and_regime_consistent() {
        for _ in 0..50 {
            let Payload::Volatility(vix) = generate(DataKind::Volatility, FetchParams::none()) else {
                panic!("wrong arm");
            };
            assert!((12.0..=35.0).contains(&vix.value));
            assert_eq!(vix.regime, VolatilityRegime::from_level(vix.value));
        }
    }

    #[test]
    fn test_gamma_walls_are_extremes() {
        let Payload::GammaExposure(gamma) = generate(DataKind::GammaExposure, FetchParams::none()) else {
            panic!("wrong arm");
        };
        assert_eq!(gamma.symbol, DEFAULT_GAMMA_SYMBOL);
        assert_eq!(gamma.levels.len(), 21);

        let max = gamma
            .levels
            .iter()
            .map(|l| l.net_gamma)
            .fold(f64::MIN, f64::max);
        let call_wall = gamma.levels.iter().find(|l| l.strike == gamma.call_wall).unwrap();
        assert_eq!(call_wall.net_gamma, max);
    }

    #[test]
    fn test_options_flow_respects_symbol_filter() {
        let Payload::OptionsFlow(flow) = generate(DataKind::OptionsFlow, FetchParams::symbol(Some("nvda"))) else {
            panic!("wrong arm");
        };
        assert_eq!(flow.symbol.as_deref(), Some("NVDA"));
        assert!(!flow.trades.is_empty());
        assert!(flow.trades.iter().all(|t| t.symbol == "NVDA"));
        assert!(flow.put_call_ratio >= 0.0);
    }
}
