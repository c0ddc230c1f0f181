use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::kind::DataKind;

/// Quote for a broad market index ETF.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexData {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: f64,
    pub volume: u64,
    pub high: Decimal,
    pub low: Decimal,
}

/// Performance of a sector ETF.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorData {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub change_percent: f64,
    /// Performance relative to the broad market, 1.0 = in line.
    pub relative_strength: f64,
}

/// Volatility regime bucket derived from the VIX level.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolatilityRegime {
    Low,
    Normal,
    Elevated,
    Extreme,
}

impl VolatilityRegime {
    pub fn from_level(vix: f64) -> Self {
        if vix < 15.0 {
            Self::Low
        } else if vix < 20.0 {
            Self::Normal
        } else if vix < 30.0 {
            Self::Elevated
        } else {
            Self::Extreme
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VixData {
    pub value: f64,
    pub change: f64,
    pub change_percent: f64,
    pub regime: VolatilityRegime,
}

/// Net dealer gamma at one strike.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaLevel {
    pub strike: Decimal,
    pub net_gamma: f64,
}

/// Dealer gamma exposure profile for one underlying.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaData {
    pub symbol: String,
    pub spot_price: Decimal,
    /// Aggregate exposure in dollars per 1% move.
    pub total_gamma: f64,
    pub gamma_flip: Decimal,
    pub call_wall: Decimal,
    pub put_wall: Decimal,
    pub levels: Vec<GammaLevel>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionSide {
    Call,
    Put,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowSentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTrade {
    pub symbol: String,
    pub side: OptionSide,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub premium: Decimal,
    pub size: u32,
    pub sentiment: FlowSentiment,
}

/// Recent unusual options activity, optionally filtered to one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsFlow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub trades: Vec<FlowTrade>,
    pub put_call_ratio: f64,
}

/// A provider response, one arm per data kind.
///
/// Provider clients validate upstream responses into one of these arms
/// before anything enters the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Payload {
    MarketData(HashMap<String, IndexData>),
    SectorData(HashMap<String, SectorData>),
    Volatility(VixData),
    GammaExposure(GammaData),
    OptionsFlow(OptionsFlow),
}

impl Payload {
    pub fn kind(&self) -> DataKind {
        match self {
            Payload::MarketData(_) => DataKind::MarketData,
            Payload::SectorData(_) => DataKind::SectorData,
            Payload::Volatility(_) => DataKind::Volatility,
            Payload::GammaExposure(_) => DataKind::GammaExposure,
            Payload::OptionsFlow(_) => DataKind::OptionsFlow,
        }
    }
}

/// Typed view of one [`Payload`] arm.
///
/// Lets the facade hand out `TypedResult<VixData>` instead of the raw enum.
pub trait PayloadData: Sized + Send + 'static {
    const KIND: DataKind;

    /// Extract the typed value, handing the payload back on a kind mismatch.
    fn from_payload(payload: Payload) -> Result<Self, Payload>;

    fn into_payload(self) -> Payload;
}

macro_rules! payload_data {
    ($ty:ty, $variant:ident) => {
        impl PayloadData for $ty {
            const KIND: DataKind = DataKind::$variant;

            fn from_payload(payload: Payload) -> Result<Self, Payload> {
                match payload {
                    Payload::$variant(data) => Ok(data),
                    other => Err(other),
                }
            }

            fn into_payload(self) -> Payload {
                Payload::$variant(self)
            }
        }
    };
}

payload_data!(HashMap<String, IndexData>, MarketData);
payload_data!(HashMap<String, SectorData>, SectorData);
payload_data!(VixData, Volatility);
payload_data!(GammaData, GammaExposure);
payload_data!(OptionsFlow, OptionsFlow);

#[cfg(test)]
mod tests {
    use super::*;

    fn vix(value: f64) -> VixData {
        VixData {
            value,
            change: 0.0,
            change_percent: 0.0,
            regime: VolatilityRegime::from_level(value),
        }
    }

    #[test]
    fn test_regime_buckets() {
        assert_eq!(VolatilityRegime::from_level(12.0), VolatilityRegime::Low);
        assert_eq!(VolatilityRegime::from_level(15.0), VolatilityRegime::Normal);
        assert_eq!(VolatilityRegime::from_level(25.0), VolatilityRegime::Elevated);
        assert_eq!(VolatilityRegime::from_level(42.0), VolatilityRegime::Extreme);
    }

    #[test]
    fn test_typed_extraction() {
        let payload = Payload::Volatility(vix(18.0));
        assert_eq!(payload.kind(), DataKind::Volatility);

        let data = VixData::from_payload(payload).unwrap();
        assert_eq!(data.value, 18.0);
    }

    #[test]
    fn test_mismatched_arm_is_returned() {
        let payload = Payload::Volatility(vix(18.0));
        let back = GammaData::from_payload(payload).unwrap_err();
        assert_eq!(back.kind(), DataKind::Volatility);
    }

    #[test]
    fn test_payload_json_is_tagged() {
        let json = serde_json::to_value(Payload::Volatility(vix(22.5))).unwrap();
        assert_eq!(json["kind"], "volatility");
        assert_eq!(json["data"]["regime"], "elevated");
    }
}
