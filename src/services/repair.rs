//! 响应修复服务
//!
//! 流结束后对累积文本做确定性后处理：补全句尾、规整 Markdown
//! 表格、检测被截断的表格并发起一次有界续写。修复失败只降级，
//! 永不致命，入库的始终是规整后的文本。

use futures_util::StreamExt;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::generation::{ChatTurn, GenerationModel, Prompt};

static INTRA_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static PUNCT_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])([A-Za-z])").unwrap());

/// 表格扫描结果
///
/// `incomplete` 基于补齐之前的形态判定：最后一个表格块的末行
/// 列数少于其表头。纯结构检查，不判断内容正确性。
#[derive(Debug, Default, PartialEq)]
pub struct TableReport {
    pub header_columns: Option<usize>,
    pub incomplete: bool,
}

pub struct ResponseRepairer {
    generation: Arc<dyn GenerationModel>,
    repair_max_tokens: u32,
}

impl ResponseRepairer {
    pub fn new(generation: Arc<dyn GenerationModel>, repair_max_tokens: u32) -> Self {
        Self {
            generation,
            repair_max_tokens,
        }
    }

    /// 修复管线，固定顺序执行
    ///
    /// 续写最多发起一次，之后只重跑表格规整，不再检测，
    /// 以限定延迟并避免修复循环。
    pub async fn repair(&self, raw: &str) -> String {
        let text = complete_sentence(raw);
        let (mut text, report) = normalize_tables(&text);

        if report.incomplete {
            debug!("truncated table detected, requesting continuation");
            match self.continue_table(&text).await {
                Ok(continuation) if !continuation.trim().is_empty() => {
                    let joined = format!("{}\n{}", text, continuation.trim());
                    let (renormalized, _) = normalize_tables(&joined);
                    text = renormalized;
                }
                Ok(_) => {}
                Err(e) => {
                    // 降级：保留已规整的不完整表格
                    warn!("table repair abandoned: {}", e);
                }
            }
        }

        normalize_whitespace(&text)
    }

    /// 发起一次有界的表格续写
    async fn continue_table(&self, text: &str) -> Result<String> {
        let content = format!(
            "{}\n\nThe Markdown table at the end of this answer was cut off. \
             Continue the table from where it stopped, do not repeat existing rows, \
             output only the remaining rows.",
            text
        );

        let prompt = if self.generation.supports_templating() {
            Prompt::Turns(vec![ChatTurn::new("user", &content)])
        } else {
            Prompt::Text(content)
        };

        let mut fragments = self
            .generation
            .generate(&prompt, self.repair_max_tokens)
            .await
            .map_err(|e| AppError::Repair(e.to_string()))?;

        let mut continuation = String::new();
        let mut pulled: u32 = 0;
        while pulled < self.repair_max_tokens {
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    pulled += 1;
                    continuation.push_str(&fragment);
                }
                Some(Err(e)) => return Err(AppError::Repair(e.to_string())),
                None => break,
            }
        }

        Ok(continuation)
    }
}

/// 句尾补全：保证入库的回答读起来是完整句子
pub fn complete_sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match trimmed.chars().last() {
        Some('.' | '!' | '?' | '"' | '\'') => trimmed.to_string(),
        _ => format!("{}.", trimmed),
    }
}

fn cell_count(coerced_line: &str) -> usize {
    // 首尾管道符产生两个空片段
    coerced_line.split('|').count().saturating_sub(2)
}

/// 表格规整
///
/// 含管道符的行视为表格行：前后插空行隔离、首尾补管道符、
/// 按该块首行（表头）列数补齐短行。只补不裁。
pub fn normalize_tables(text: &str) -> (String, TableReport) {
    if !text.contains('|') {
        return (text.to_string(), TableReport::default());
    }

    let mut fixed: Vec<String> = Vec::new();
    let mut in_table = false;
    let mut header_columns: Option<usize> = None;
    let mut report = TableReport::default();

    for line in text.lines() {
        if line.contains('|') {
            if !in_table {
                if fixed.last().is_some_and(|l| !l.trim().is_empty()) {
                    fixed.push(String::new());
                }
                in_table = true;
                header_columns = None;
            }

            let mut coerced = line.trim().to_string();
            if !coerced.starts_with('|') {
                coerced.insert(0, '|');
            }
            if !coerced.ends_with('|') {
                coerced.push('|');
            }

            let columns = cell_count(&coerced);
            let header = *header_columns.get_or_insert(columns);

            // 末行的补齐前形态决定截断判定，最后一个表格块胜出。
            // 首尾管道符此时已补上，剩下的结构信号就是列数缺口。
            report.header_columns = Some(header);
            report.incomplete = columns < header;

            for _ in columns..header {
                coerced.push_str(" |");
            }

            fixed.push(coerced);
        } else {
            if in_table {
                in_table = false;
                if !line.trim().is_empty() {
                    fixed.push(String::new());
                }
            }
            fixed.push(line.to_string());
        }
    }

    (fixed.join("\n"), report)
}

/// 空白与标点规整
///
/// 行内空白折叠为单个空格、句末标点后保证有空格、紧跟散文的
/// 列表行前补空行、空行串折叠为一个。表格行不做行内改写。
pub fn normalize_whitespace(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let mut current = line.trim_end().to_string();

        if !current.contains('|') {
            current = INTRA_SPACE.replace_all(&current, " ").into_owned();
            current = PUNCT_SPACE.replace_all(&current, "$1 $2").into_owned();
        }

        let trimmed_start = current.trim_start();
        let is_bullet = trimmed_start.starts_with("- ") || trimmed_start.starts_with("* ");
        if is_bullet {
            if let Some(prev) = out.last() {
                let prev_start = prev.trim_start();
                let prev_is_bullet = prev_start.starts_with("- ") || prev_start.starts_with("* ");
                if !prev.is_empty() && !prev_is_bullet {
                    out.push(String::new());
                }
            }
        }

        if current.trim().is_empty() {
            // 折叠空行串，并吞掉开头的空行
            if out.last().is_none_or(|prev| prev.is_empty()) {
                continue;
            }
            out.push(String::new());
        } else {
            out.push(current);
        }
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ScriptedGenerationModel;
    use rstest::rstest;

    #[rstest]
    #[case("hello", "hello.")]
    #[case("hello.", "hello.")]
    #[case("really?", "really?")]
    #[case("wow!", "wow!")]
    #[case("he said \"done\"", "he said \"done\"")]
    #[case("it's 'fine'", "it's 'fine'")]
    #[case("  spaced out  ", "spaced out.")]
    #[case("", "")]
    fn test_complete_sentence(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(complete_sentence(input), expected);
    }

    #[test]
    fn test_normalize_bare_table() {
        let (fixed, report) = normalize_tables("Name|Age\nAlice|30");

        for line in fixed.lines().filter(|l| !l.is_empty()) {
            assert!(line.starts_with('|'), "line {:?} missing leading pipe", line);
            assert!(line.ends_with('|'), "line {:?} missing trailing pipe", line);
        }
        assert_eq!(report.header_columns, Some(2));
        assert!(!report.incomplete);
    }

    #[test]
    fn test_table_isolated_from_prose() {
        let input = "Here is a comparison:\nName|Age\nAlice|30\nThat is all.";
        let (fixed, _) = normalize_tables(input);
        let lines: Vec<&str> = fixed.lines().collect();

        assert_eq!(lines[0], "Here is a comparison:");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "|Name|Age|");
        assert_eq!(lines[3], "|Alice|30|");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "That is all.");
    }

    #[test]
    fn test_short_row_is_padded_never_truncated() {
        let (fixed, report) = normalize_tables("A|B|C\n1|2");

        assert!(fixed.contains("|1|2| |"));
        assert_eq!(report.header_columns, Some(3));
        assert!(report.incomplete);

        // 超出表头的列保持原样
        let (fixed, _) = normalize_tables("A|B\n1|2|3");
        assert!(fixed.contains("|1|2|3|"));
    }

    #[test]
    fn test_complete_table_is_not_flagged() {
        let (_, report) = normalize_tables("|A|B|\n|1|2|\n|3|4|");
        assert!(!report.incomplete);
    }

    #[test]
    fn test_whitespace_collapse_and_punct_spacing() {
        let fixed = normalize_whitespace("First  sentence.Second   one.");
        assert_eq!(fixed, "First sentence. Second one.");
    }

    #[test]
    fn test_blank_line_inserted_before_bullet_list() {
        let fixed = normalize_whitespace("Some prose line.\n- first item\n- second item");
        assert_eq!(
            fixed,
            "Some prose line.\n\n- first item\n- second item"
        );
    }

    #[test]
    fn test_blank_runs_collapse() {
        let fixed = normalize_whitespace("a\n\n\n\nb");
        assert_eq!(fixed, "a\n\nb");
    }

    #[tokio::test]
    async fn test_incomplete_table_triggers_exactly_one_repair() {
        let generation = Arc::new(ScriptedGenerationModel::new(vec!["|3|4|"]));
        let repairer = ResponseRepairer::new(
            generation.clone() as Arc<dyn GenerationModel>,
            200,
        );

        let repaired = repairer.repair("|A|B|\n|1|2|\n|3").await;

        assert_eq!(generation.request_count(), 1);
        assert!(repaired.contains("|3|4|"));
    }

    #[tokio::test]
    async fn test_complete_response_makes_no_repair_call() {
        let generation = Arc::new(ScriptedGenerationModel::new(vec!["unused"]));
        let repairer = ResponseRepairer::new(
            generation.clone() as Arc<dyn GenerationModel>,
            200,
        );

        let repaired = repairer.repair("Just a plain answer").await;

        assert_eq!(generation.request_count(), 0);
        assert_eq!(repaired, "Just a plain answer.");
    }

    #[tokio::test]
    async fn test_failed_repair_degrades_to_normalized_text() {
        let generation =
            Arc::new(ScriptedGenerationModel::new(vec!["x"]).failing_after(0));
        let repairer = ResponseRepairer::new(
            generation.clone() as Arc<dyn GenerationModel>,
            200,
        );

        let repaired = repairer.repair("|A|B|\n|1").await;

        // 续写失败，保留补齐后的表格（句尾补全先于表格规整）
        assert_eq!(generation.request_count(), 1);
        assert!(repaired.contains("|1.| |"));
    }
}
