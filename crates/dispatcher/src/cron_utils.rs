use chrono::{DateTime, Duration, Local};
use cron::Schedule;
use std::str::FromStr;
use tracing::debug;

use scheduler_core::{SchedulerError, SchedulerResult};

/// 解析后的调度规则
#[derive(Debug, Clone)]
enum ScheduleKind {
    Cron(Box<Schedule>),
    /// `@every` 固定间隔
    Every(Duration),
}

/// CRON表达式解析和调度工具
///
/// 支持以下写法，全部按本地时间计算：
/// - 5 段 `分 时 日 月 周`，秒固定为 0
/// - 6 段 `秒 分 时 日 月 周`
/// - `@yearly` `@monthly` `@weekly` `@daily` `@hourly` 等描述符
/// - `@every 30s`、`@every 1h30m` 固定间隔
///
/// 星期字段使用 0-6 (0 为周日)，7 同样表示周日。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    kind: ScheduleKind,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let expr = cron_expr.trim();
        let invalid = |message: String| SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message,
        };

        if expr.is_empty() {
            return Err(invalid("表达式不能为空".to_string()));
        }

        let kind = if let Some(interval) = expr.strip_prefix("@every") {
            ScheduleKind::Every(parse_interval(interval.trim()).map_err(invalid)?)
        } else {
            let normalized = normalize_expression(expr).map_err(invalid)?;
            let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
            ScheduleKind::Cron(Box::new(schedule))
        };

        Ok(Self {
            expression: expr.to_string(),
            kind,
        })
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> SchedulerResult<()> {
        Self::new(cron_expr).map(|_| ())
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 获取严格晚于 `after` 的下一次执行时间
    pub fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        match &self.kind {
            ScheduleKind::Cron(schedule) => schedule.after(&after).next(),
            ScheduleKind::Every(interval) => after.checked_add_signed(*interval),
        }
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming(&self, after: DateTime<Local>, count: usize) -> Vec<DateTime<Local>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        while times.len() < count {
            match self.next_after(cursor) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next(&self, now: DateTime<Local>) -> Option<std::time::Duration> {
        self.next_after(now)
            .map(|next| (next - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }
}

/// 转换成 cron 库使用的 6 段格式
fn normalize_expression(expr: &str) -> Result<String, String> {
    if expr.starts_with('@') {
        let normalized = match expr {
            "@yearly" | "@annually" => "0 0 0 1 1 *",
            "@monthly" => "0 0 0 1 * *",
            "@weekly" => "0 0 0 * * 1",
            "@daily" | "@midnight" => "0 0 0 * * *",
            "@hourly" => "0 0 * * * *",
            _ => return Err(format!("不支持的描述符: {expr}")),
        };
        debug!("CRON描述符 {} 转换为 {}", expr, normalized);
        return Ok(normalized.to_string());
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    let (seconds, rest) = match fields.len() {
        5 => ("0", &fields[..]),
        6 => (fields[0], &fields[1..]),
        n => return Err(format!("字段数量错误: 需要5或6段，实际{n}段")),
    };

    let day_of_week = translate_day_of_week(rest[4])?;
    Ok(format!(
        "{} {} {} {} {} {}",
        seconds, rest[0], rest[1], rest[2], rest[3], day_of_week
    ))
}

/// 星期字段从 0-6 (周日为0) 转换为 cron 库的 1-7 (周日为1)
fn translate_day_of_week(field: &str) -> Result<String, String> {
    let mut parts = Vec::new();

    for part in field.split(',') {
        let (base, step) = match part.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (part, None),
        };

        let translated = match base.split_once('-') {
            _ if base == "*" || base == "?" => base.to_string(),
            Some((start, end)) => {
                match (shift_weekday(start)?, shift_weekday(end)?) {
                    // 跨越周六到周日的范围，例如 5-7
                    (Some(s), Some(e)) if s > e && step.is_none() => format!("{s}-7,{e}"),
                    (s, e) => format!(
                        "{}-{}",
                        s.map_or_else(|| start.to_string(), |v| v.to_string()),
                        e.map_or_else(|| end.to_string(), |v| v.to_string())
                    ),
                }
            }
            None => match shift_weekday(base)? {
                Some(value) => value.to_string(),
                None => base.to_string(),
            },
        };

        match step {
            Some(step) => parts.push(format!("{translated}/{step}")),
            None => parts.push(translated),
        }
    }

    Ok(parts.join(","))
}

/// 数字星期加一，名称 (MON、TUE) 保持不变
fn shift_weekday(value: &str) -> Result<Option<u8>, String> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    match value.parse::<u8>() {
        Ok(day @ 0..=6) => Ok(Some(day + 1)),
        Ok(7) => Ok(Some(1)),
        _ => Err(format!("无效的星期取值: {value}")),
    }
}

/// 解析 `@every` 后的时长，例如 `30s`、`5m`、`1h30m`
fn parse_interval(text: &str) -> Result<Duration, String> {
    if text.is_empty() {
        return Err("@every 缺少时间间隔".to_string());
    }

    let mut total = Duration::zero();
    let mut digits = String::new();

    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| format!("无效的时间间隔: {text}"))?;
        digits.clear();

        let part = match c {
            's' => Duration::try_seconds(value),
            'm' => Duration::try_minutes(value),
            'h' => Duration::try_hours(value),
            _ => return Err(format!("不支持的时间单位 '{c}': {text}")),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| format!("时间间隔超出范围: {text}"))?;
    }

    if !digits.is_empty() {
        return Err(format!("时间间隔缺少单位: {text}"));
    }

    if total < Duration::seconds(1) {
        return Err(format!("时间间隔至少为1秒: {text}"));
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_translation() {
        assert_eq!(translate_day_of_week("*").unwrap(), "*");
        assert_eq!(translate_day_of_week("0").unwrap(), "1");
        assert_eq!(translate_day_of_week("1-5").unwrap(), "2-6");
        assert_eq!(translate_day_of_week("0,6").unwrap(), "1,7");
        assert_eq!(translate_day_of_week("5-7").unwrap(), "6-7,1");
        assert_eq!(translate_day_of_week("*/2").unwrap(), "*/2");
        assert_eq!(translate_day_of_week("MON-FRI").unwrap(), "MON-FRI");
        assert!(translate_day_of_week("8").is_err());
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::minutes(90));
        assert!(parse_interval("").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("5d").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("9999999999999999h").is_err());
    }

    #[test]
    fn test_field_count() {
        assert!(normalize_expression("* * *").is_err());
        assert_eq!(normalize_expression("*/5 * * * *").unwrap(), "0 */5 * * * *");
        assert_eq!(normalize_expression("10 0 2 * * 1").unwrap(), "10 0 2 * * 2");
    }
}
