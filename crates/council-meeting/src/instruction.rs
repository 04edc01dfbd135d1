//! Agent instruction assembly

use std::fmt::Write;

use council_config::AgentConfig;
use council_memory::MemoryContext;
use council_tools::{StockSnapshot, ToolBox, ToolSource};
use jiff::civil::{DateTime, Weekday};
use jiff::tz::{self, TimeZone};

use crate::message::Position;

const SEARCH_KEYWORDS: &[&str] = &["search", "搜索", "web", "网页", "tavily", "google", "bing"];
const DATA_KEYWORDS: &[&str] = &["kline", "k线", "realtime", "实时", "orderbook", "盘口", "news", "新闻"];

/// Wall-clock time on the exchange (UTC+8)
pub fn exchange_now() -> DateTime {
    jiff::Timestamp::now()
        .to_zoned(TimeZone::fixed(tz::offset(8)))
        .datetime()
}

/// A-share session label for a local exchange time
pub fn market_status(now: DateTime) -> &'static str {
    if matches!(now.weekday(), Weekday::Saturday | Weekday::Sunday) {
        return "休市（周末）";
    }
    let minutes = i32::from(now.hour()) * 60 + i32::from(now.minute());
    match minutes {
        570..=690 => "盘中（上午交易时段）",
        780..=900 => "盘中（下午交易时段）",
        ..=569 => "盘前",
        901.. => "盘后",
        _ => "午间休市",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolCategory {
    Search,
    Data,
    Other,
}

impl ToolCategory {
    fn of(name: &str, description: &str) -> Self {
        let name = name.to_lowercase();
        let description = description.to_lowercase();
        if SEARCH_KEYWORDS
            .iter()
            .any(|kw| name.contains(kw) || description.contains(kw))
        {
            Self::Search
        } else if DATA_KEYWORDS.iter().any(|kw| name.contains(kw)) {
            Self::Data
        } else {
            Self::Other
        }
    }
}

/// Tool usage policy listing the agent's tools by category, empty without tools
pub fn tool_policy(tools: &ToolBox) -> String {
    let mut search = String::new();
    let mut data = String::new();
    let mut other = String::new();

    for tool in tools.iter() {
        let name = tool.name();
        let bucket = match ToolCategory::of(&name, tool.description()) {
            ToolCategory::Search => &mut search,
            ToolCategory::Data => &mut data,
            ToolCategory::Other => &mut other,
        };
        let _ = write!(bucket, "- {name}: {}", tool.description());
        if let ToolSource::Mcp(mcp) = tool {
            let _ = write!(bucket, " (来自 {})", mcp.server);
        }
        bucket.push('\n');
    }

    if search.is_empty() && data.is_empty() && other.is_empty() {
        return String::new();
    }

    let mut policy = String::from("\n## 工具使用规则（必须遵守）\n\n");
    if !search.is_empty() {
        policy.push_str("### 搜索工具（遇到信息查询必须调用）\n");
        policy.push_str(&search);
        policy.push_str(
            "\n**重要**: 当用户询问新闻、事件、公告、研报、市场动态等信息时，你**必须先调用搜索工具**获取最新信息，**禁止凭记忆回答**。\n\n",
        );
    }
    if !data.is_empty() {
        policy.push_str("### 数据查询工具\n");
        policy.push_str(&data);
        policy.push('\n');
    }
    if !other.is_empty() {
        policy.push_str("### 其他工具\n");
        policy.push_str(&other);
        policy.push('\n');
    }
    policy.push_str("### 工具调用原则\n");
    policy.push_str("1. 需要实时数据时，必须调用工具，不要编造数据\n");
    policy.push_str("2. 搜索类工具优先用于获取最新信息\n");
    policy.push_str("3. 工具返回结果后再组织回答\n");
    policy
}

/// Everything one agent turn's instruction is built from
pub struct InstructionContext<'a> {
    pub agent: &'a AgentConfig,
    pub tools: &'a ToolBox,
    pub stock: &'a StockSnapshot,
    pub position: Option<Position>,
    pub memory: &'a MemoryContext,
    pub query: &'a str,
    pub reply_content: Option<&'a str>,
    pub now: DateTime,
}

impl InstructionContext<'_> {
    pub fn render(&self) -> String {
        let mut prompt = if self.agent.instruction.is_empty() {
            format!("你是一位{}，名字是{}。", self.agent.role, self.agent.name)
        } else {
            self.agent.instruction.clone()
        };

        let _ = write!(
            prompt,
            "\n{}\n当前时间: {}\n市场状态: {}\n\n股票: {} ({})\n当前价格: {:.2}\n涨跌幅: {:.2}%\n",
            tool_policy(self.tools),
            self.now.strftime("%Y-%m-%d %H:%M:%S"),
            market_status(self.now),
            self.stock.symbol,
            self.stock.name,
            self.stock.price,
            self.stock.change_percent,
        );

        if let Some(position) = self.position
            && position.shares > 0
        {
            write_position(&mut prompt, position, self.stock.price);
        }

        write_memory(&mut prompt, self.memory);

        match self.reply_content.filter(|quoted| !quoted.is_empty()) {
            Some(quoted) => {
                let _ = write!(
                    prompt,
                    "--- 引用的观点 ---\n{quoted}\n---\n\n小韭菜问题: {}\n\n请结合以上引用的观点，发表你的看法。可以赞同、补充或反驳。回复控制在150字以内。",
                    self.query
                );
            }
            None => {
                let _ = write!(
                    prompt,
                    "小韭菜问题: {}\n\n请用简洁专业的语言回答，控制在150字以内。",
                    self.query
                );
            }
        }

        prompt
    }
}

#[allow(clippy::cast_precision_loss)]
fn write_position(prompt: &mut String, position: Position, price: f64) {
    let shares = position.shares as f64;
    let market_value = shares * price;
    let cost = shares * position.cost_price;
    let profit = market_value - cost;
    let profit_percent = if cost > 0.0 { profit / cost * 100.0 } else { 0.0 };

    let _ = write!(
        prompt,
        "\n用户持仓: {}股，成本价 {:.2}\n持仓市值: {:.2}，盈亏: {:.2} ({:.2}%)\n",
        position.shares, position.cost_price, market_value, profit, profit_percent
    );
}

fn write_memory(prompt: &mut String, memory: &MemoryContext) {
    if memory.is_empty() {
        return;
    }

    prompt.push_str("--- 历史讨论记忆 ---\n");
    if !memory.summary.is_empty() {
        let _ = writeln!(prompt, "摘要: {}", memory.summary);
    }
    if !memory.key_facts.is_empty() {
        prompt.push_str("关键信息:\n");
        for fact in &memory.key_facts {
            let _ = writeln!(prompt, "- [{}] {}", fact.kind, fact.text);
        }
    }
    if !memory.recent_rounds.is_empty() {
        prompt.push_str("最近讨论:\n");
        for round in &memory.recent_rounds {
            let _ = writeln!(prompt, "第{}轮 问题: {}", round.round, round.query);
            for entry in &round.entries {
                let _ = writeln!(prompt, "  {}: {}", entry.agent_name, entry.content);
            }
        }
    }
    prompt.push_str("---\n\n");
}
