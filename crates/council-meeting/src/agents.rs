//! Expert panel

use std::sync::OnceLock;

use council_config::{AgentConfig, MeetingConfig};
use regex::Regex;

/// The agents taking part in meetings
#[derive(Debug, Clone)]
pub struct Panel {
    agents: Vec<AgentConfig>,
}

impl Panel {
    /// Configured agents, or the built-in panel when none are configured
    pub fn from_config(config: &MeetingConfig) -> Self {
        if config.agents.is_empty() {
            Self::new(default_agents())
        } else {
            Self::new(config.agents.clone())
        }
    }

    pub const fn new(agents: Vec<AgentConfig>) -> Self {
        Self { agents }
    }

    /// Every agent, enabled or not
    pub fn all(&self) -> &[AgentConfig] {
        &self.agents
    }

    pub fn enabled(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter().filter(|agent| agent.enabled)
    }

    /// Enabled agent by id
    pub fn get(&self, id: &str) -> Option<&AgentConfig> {
        self.enabled().find(|agent| agent.id == id)
    }

    /// Enabled agents for the given ids, in request order, unknown ids dropped
    pub fn select(&self, ids: &[String]) -> Vec<AgentConfig> {
        let mut selected: Vec<AgentConfig> = Vec::new();
        for id in ids {
            match self.get(id) {
                Some(agent) if !selected.iter().any(|a| a.id == agent.id) => selected.push(agent.clone()),
                Some(_) => {}
                None => tracing::debug!(agent = %id, "ignoring unknown agent id"),
            }
        }
        selected
    }

    /// Agent ids addressed with `@id` or `@name` in `text`
    pub fn mentions(&self, text: &str) -> Vec<String> {
        fn re() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            // `@` followed by anything up to whitespace or punctuation
            RE.get_or_init(|| Regex::new(r"@([^\s@,，。:：;；!?！？]+)").expect("must be valid regex"))
        }

        let mut ids: Vec<String> = Vec::new();
        for capture in re().captures_iter(text) {
            let token = &capture[1];
            let found = self
                .enabled()
                .find(|agent| agent.id.eq_ignore_ascii_case(token) || agent.name == token);
            if let Some(agent) = found
                && !ids.contains(&agent.id)
            {
                ids.push(agent.id.clone());
            }
        }
        ids
    }
}

fn agent(id: &str, name: &str, role: &str, instruction: &str, tools: &[&str]) -> AgentConfig {
    AgentConfig {
        id: id.to_owned(),
        name: name.to_owned(),
        role: role.to_owned(),
        instruction: instruction.to_owned(),
        tools: tools.iter().map(|&t| t.to_owned()).collect(),
        mcp_servers: Vec::new(),
        enabled: true,
        provider: None,
    }
}

/// Built-in panel of six experts
pub fn default_agents() -> Vec<AgentConfig> {
    vec![
        agent(
            "fundamental",
            "老陈",
            "基本面研究员",
            "你是老陈，一位在券商研究所深耕15年的基本面研究员。你说话沉稳务实，喜欢用数据说话。\n\n【分析框架】\n1. 盈利能力：ROE、毛利率、净利率趋势\n2. 成长性：营收/利润增速，行业天花板\n3. 估值水平：PE/PB分位，与同行对比\n4. 财务健康：现金流、负债率、商誉风险\n\n【回复风格】简洁专业，150字以内。先给结论，再用核心数据支撑。",
            &["get_research_report", "get_report_content", "get_stock_realtime"],
        ),
        agent(
            "technical",
            "K线王",
            "技术分析师",
            "你是K线王，混迹A股20年的技术派老炮。你相信'价格包含一切信息'。\n\n【分析框架】\n1. 趋势判断：均线系统、趋势线\n2. 形态识别：头肩顶底、双重顶底\n3. 量价关系：放量突破、缩量回调\n4. 技术指标：MACD、KDJ、RSI\n\n【回复风格】直接了当，150字以内。明确给出关键价位和操作建议。",
            &["get_kline_data", "get_stock_realtime", "get_orderbook"],
        ),
        agent(
            "capital",
            "钱姐",
            "资金流向分析师",
            "你是钱姐，私募圈出身的资金流向专家。你深谙'跟着主力走'的生存法则。\n\n【分析框架】\n1. 主力动向：大单净流入、主力持仓变化\n2. 北向资金：外资流向、重仓股变化\n3. 筹码分布：集中度、套牢盘、获利盘\n4. 盘口异动：大单托盘、压盘信号\n\n【回复风格】直白实在，150字以内。重点说清资金动向和主力意图。",
            &["get_orderbook", "get_stock_realtime", "get_kline_data"],
        ),
        agent(
            "policy",
            "政策通",
            "政策解读专家",
            "你是政策通，前财经记者出身，现专注政策研究。擅长解读政策背后的投资机会。\n\n【分析框架】\n1. 宏观政策：货币政策、财政政策、产业政策\n2. 行业监管：准入门槛、合规要求、扶持方向\n3. 地方政策：区域规划、地方补贴\n4. 政策周期：出台节奏、执行力度\n\n【回复风格】有理有据，150字以内。点明政策要点和投资含义。",
            &["get_news", "get_research_report", "get_stock_realtime"],
        ),
        agent(
            "risk",
            "风控李",
            "风险控制师",
            "你是风控李，曾在公募基金做过5年风控。养成了'先想风险再想收益'的习惯。\n\n【分析框架】\n1. 下行风险：最大回撤、支撑位破位风险\n2. 波动风险：振幅、beta值、流动性\n3. 事件风险：财报、解禁、政策不确定性\n4. 仓位建议：根据风险收益比给出建议\n\n【回复风格】冷静客观，150字以内。明确风险点和应对建议。",
            &["get_kline_data", "get_stock_realtime", "get_research_report", "get_news"],
        ),
        agent(
            "hottrend",
            "舆情师",
            "全网舆情分析专家",
            "你是舆情师，专注全网热点追踪。监控微博、知乎、B站等平台热搜，擅长从社会热点中发现投资机会或风险。\n\n【分析框架】\n1. 热点识别：筛选与市场相关的话题\n2. 关联分析：热点对相关行业/个股的影响\n3. 情绪判断：通过讨论判断市场情绪\n4. 时效评估：热点的持续性和发酵可能\n\n【回复风格】信息量大但有重点，150字以内。先说热点，再分析影响。",
            &["get_hottrend", "get_news", "get_stock_realtime"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Panel {
        let mut agents = default_agents();
        agents[3].enabled = false;
        Panel::new(agents)
    }

    #[test]
    fn built_in_panel_when_none_configured() {
        let panel = Panel::from_config(&MeetingConfig::default());
        let ids: Vec<_> = panel.enabled().map(|a| a.id.as_str()).collect();

        assert_eq!(ids, ["fundamental", "technical", "capital", "policy", "risk", "hottrend"]);
    }

    #[test]
    fn mentions_by_id_or_name() {
        let panel = panel();

        assert_eq!(panel.mentions("@risk 和 @钱姐，怎么看？@risk"), ["risk", "capital"]);
        assert_eq!(panel.mentions("@K线王：压力位在哪"), ["technical"]);
        assert!(panel.mentions("@policy 政策面如何").is_empty());
        assert!(panel.mentions("邮箱 a@b.com").is_empty());
    }

    #[test]
    fn select_drops_unknown_and_disabled() {
        let panel = panel();

        let selected = panel.select(&["technical".into(), "ghost".into(), "policy".into(), "technical".into()]);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "technical");
    }
}
