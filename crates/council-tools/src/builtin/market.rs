//! Market data tools

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::BuiltinTool;
use crate::error::ToolError;

/// Point-in-time quote for one stock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    /// Exchange-prefixed code, e.g. `sh600519`
    pub symbol: String,
    pub name: String,
    pub price: f64,
    /// Change against previous close, in percent
    pub change_percent: f64,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    /// Traded volume in lots
    #[serde(default)]
    pub volume: u64,
}

/// Level of a market index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndex {
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// Source of quotes for the market tools
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Quotes for the given codes; unknown codes are omitted
    async fn quotes(&self, codes: &[String]) -> anyhow::Result<Vec<StockSnapshot>>;

    /// Major index levels
    async fn indices(&self) -> anyhow::Result<Vec<MarketIndex>>;
}

/// Fixed set of quotes, matched by symbol
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    pub quotes: Vec<StockSnapshot>,
    pub indices: Vec<MarketIndex>,
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn quotes(&self, codes: &[String]) -> anyhow::Result<Vec<StockSnapshot>> {
        Ok(self
            .quotes
            .iter()
            .filter(|quote| codes.iter().any(|code| code.eq_ignore_ascii_case(&quote.symbol)))
            .cloned()
            .collect())
    }

    async fn indices(&self) -> anyhow::Result<Vec<MarketIndex>> {
        Ok(self.indices.clone())
    }
}

/// Arguments of `get_stock_realtime`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct StockRealtimeInput {
    /// 股票代码列表，如 sh600519, sz000001
    #[serde(default)]
    pub codes: Vec<String>,
}

/// Result of `get_stock_realtime`
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockRealtimeOutput {
    data: String,
    market_index: String,
}

/// Realtime quotes plus index levels
pub struct StockRealtimeTool {
    market: Arc<dyn MarketData>,
}

impl StockRealtimeTool {
    pub const NAME: &'static str = "get_stock_realtime";

    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl BuiltinTool for StockRealtimeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "获取股票实时行情数据，包括当前价格、涨跌幅、开盘价、最高价、最低价、成交量等，以及大盘指数数据"
    }

    fn parameters(&self) -> serde_json::Value {
        schemars::schema_for!(StockRealtimeInput).to_value()
    }

    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let input: StockRealtimeInput = serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
            tool: Self::NAME.to_owned(),
            message: e.to_string(),
        })?;

        let output = if input.codes.is_empty() {
            StockRealtimeOutput {
                data: "请提供股票代码".to_owned(),
                ..StockRealtimeOutput::default()
            }
        } else {
            let stocks = self.market.quotes(&input.codes).await?;
            let indices = match self.market.indices().await {
                Ok(indices) => indices,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to fetch market indices");
                    Vec::new()
                }
            };
            tracing::debug!(stocks = stocks.len(), indices = indices.len(), "realtime quotes fetched");

            StockRealtimeOutput {
                data: format_quotes(&stocks),
                market_index: format_indices(&indices),
            }
        };

        serde_json::to_string(&output).map_err(|e| ToolError::Internal(e.into()))
    }
}

fn format_quotes(stocks: &[StockSnapshot]) -> String {
    let mut out = String::new();
    for s in stocks {
        let _ = writeln!(
            out,
            "【{}({})】价格:{:.2} 涨跌:{:.2}% 开盘:{:.2} 最高:{:.2} 最低:{:.2} 成交量:{}",
            s.name, s.symbol, s.price, s.change_percent, s.open, s.high, s.low, s.volume
        );
    }
    out
}

fn format_indices(indices: &[MarketIndex]) -> String {
    let mut out = String::new();
    for idx in indices {
        let _ = writeln!(
            out,
            "【{}】点位:{:.2} 涨跌:{:.2}({:.2}%)",
            idx.name, idx.price, idx.change, idx.change_percent
        );
    }
    out
}
