//! TF-IDF relevance ranking over a topic's own memory

use std::collections::{HashMap, HashSet};

use crate::model::{KeyFact, RoundRecord};

/// Split text into scoring terms
///
/// ASCII alphanumeric runs become lowercase words. Runs of CJK characters
/// become overlapping bigrams, or a single term when the run is one
/// character long.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut word = String::new();
    let mut cjk: Vec<char> = Vec::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            flush_cjk(&mut cjk, &mut terms);
            word.push(c.to_ascii_lowercase());
        } else if is_cjk(c) {
            flush_word(&mut word, &mut terms);
            cjk.push(c);
        } else {
            flush_word(&mut word, &mut terms);
            flush_cjk(&mut cjk, &mut terms);
        }
    }
    flush_word(&mut word, &mut terms);
    flush_cjk(&mut cjk, &mut terms);
    terms
}

fn flush_word(word: &mut String, terms: &mut Vec<String>) {
    if !word.is_empty() {
        terms.push(std::mem::take(word));
    }
}

fn flush_cjk(run: &mut Vec<char>, terms: &mut Vec<String>) {
    match run.len() {
        0 => {}
        1 => terms.push(run[0].to_string()),
        _ => terms.extend(run.windows(2).map(|pair| pair.iter().collect())),
    }
    run.clear();
}

const fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

/// Pick the `limit` facts most relevant to `query`
///
/// Document frequencies come from the facts and the recent rounds
/// together. Facts with no overlap are never returned; ties keep the newer
/// fact first.
#[allow(clippy::cast_precision_loss)]
pub fn rank_facts(facts: &[KeyFact], rounds: &[RoundRecord], query: &str, limit: usize) -> Vec<KeyFact> {
    let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
    if query_terms.is_empty() || facts.is_empty() || limit == 0 {
        return Vec::new();
    }

    let fact_terms: Vec<Vec<String>> = facts.iter().map(|f| tokenize(&f.text)).collect();
    let round_terms: Vec<Vec<String>> = rounds.iter().map(|r| tokenize(&r.text())).collect();

    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for terms in fact_terms.iter().chain(&round_terms) {
        let unique: HashSet<&str> = terms.iter().map(String::as_str).collect();
        for term in unique {
            *document_frequency.entry(term).or_default() += 1;
        }
    }
    let documents = (fact_terms.len() + round_terms.len()) as f64;

    let mut scored: Vec<(f64, usize)> = fact_terms
        .iter()
        .enumerate()
        .filter_map(|(i, terms)| {
            if terms.is_empty() {
                return None;
            }
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for term in terms {
                *counts.entry(term.as_str()).or_default() += 1;
            }
            let score: f64 = query_terms
                .iter()
                .filter_map(|term| {
                    let tf = *counts.get(term.as_str())? as f64 / terms.len() as f64;
                    let df = document_frequency.get(term.as_str()).copied().unwrap_or(0) as f64;
                    Some(tf * (((1.0 + documents) / (1.0 + df)).ln() + 1.0))
                })
                .sum();
            (score > 0.0).then_some((score, i))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
    scored.into_iter().take(limit).map(|(_, i)| facts[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::model::FactKind;

    fn fact(text: &str) -> KeyFact {
        KeyFact {
            text: text.into(),
            kind: FactKind::Fact,
            timestamp: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn tokenizes_mixed_text() {
        assert_eq!(
            tokenize("MACD金叉, 量能放大 600519"),
            ["macd", "金叉", "量能", "能放", "放大", "600519"]
        );
        assert_eq!(tokenize("涨 up"), ["涨", "up"]);
    }

    #[test]
    fn ranks_overlapping_facts_first() {
        let facts = vec![
            fact("公司三季度营收同比增长12%"),
            fact("MACD出现金叉，短线偏强"),
            fact("北向资金连续三日净流入"),
        ];

        let ranked = rank_facts(&facts, &[], "现在MACD金叉了吗", 2);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "MACD出现金叉，短线偏强");
    }

    #[test]
    fn respects_limit_and_prefers_newer_on_tie() {
        let facts = vec![fact("资金流入"), fact("资金流入")];
        let ranked = rank_facts(&facts, &[], "资金", 1);
        assert_eq!(ranked.len(), 1);

        let mut newer = facts.clone();
        newer[1].text = "资金流入 ".into();
        let ranked = rank_facts(&newer, &[], "资金", 1);
        assert_eq!(ranked[0].text, "资金流入 ");
    }
}
