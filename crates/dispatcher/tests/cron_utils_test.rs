use chrono::{Datelike, Local, TimeZone, Timelike, Weekday};
use scheduler_core::SchedulerError;
use scheduler_dispatcher::CronScheduler;

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
}

#[test]
fn test_weekday_range_skips_weekend() {
    let schedule = CronScheduler::new("0 9 * * 1-5").unwrap();
    // 2024-01-06 是周六
    let next = schedule.next_after(local(2024, 1, 6, 12, 0)).unwrap();

    assert_eq!(next.weekday(), Weekday::Mon);
    assert_eq!(next.day(), 8);
    assert_eq!((next.hour(), next.minute(), next.second()), (9, 0, 0));
}

#[test]
fn test_sunday_as_zero_and_seven() {
    for expr in ["30 8 * * 0", "30 8 * * 7"] {
        let schedule = CronScheduler::new(expr).unwrap();
        let next = schedule.next_after(local(2024, 1, 1, 0, 0)).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun, "{expr}");
        assert_eq!(next.day(), 7);
    }
}

#[test]
fn test_six_field_expression_with_seconds() {
    let schedule = CronScheduler::new("*/15 * * * * *").unwrap();
    let times = schedule.upcoming(local(2024, 3, 1, 10, 0), 4);

    let seconds: Vec<u32> = times.iter().map(|t| t.second()).collect();
    assert_eq!(seconds, vec![15, 30, 45, 0]);
}

#[test]
fn test_descriptors() {
    let start = local(2024, 5, 15, 10, 30);

    let hourly = CronScheduler::new("@hourly").unwrap();
    assert_eq!(hourly.next_after(start).unwrap(), local(2024, 5, 15, 11, 0));

    let daily = CronScheduler::new("@daily").unwrap();
    assert_eq!(daily.next_after(start).unwrap(), local(2024, 5, 16, 0, 0));

    let monthly = CronScheduler::new("@monthly").unwrap();
    assert_eq!(monthly.next_after(start).unwrap(), local(2024, 6, 1, 0, 0));

    let weekly = CronScheduler::new("@weekly").unwrap();
    assert_eq!(weekly.next_after(start).unwrap().weekday(), Weekday::Sun);

    assert!(CronScheduler::new("@fortnightly").is_err());
}

#[test]
fn test_every_interval() {
    let start = local(2024, 5, 15, 10, 30);
    let schedule = CronScheduler::new("@every 1h30m").unwrap();

    assert_eq!(schedule.next_after(start).unwrap(), local(2024, 5, 15, 12, 0));
    assert_eq!(schedule.upcoming(start, 3).len(), 3);

    assert!(CronScheduler::new("@every").is_err());
    assert!(CronScheduler::new("@every 0s").is_err());
    assert!(CronScheduler::new("@every 5x").is_err());
}

#[test]
fn test_every_interval_out_of_range_is_rejected() {
    for expr in [
        "@every 9999999999999999h",
        "@every 9999999999999999m",
        "@every 9223372036854775807s",
        "@every 2562047788015h2562047788015h",
    ] {
        let result = CronScheduler::new(expr);
        assert!(
            matches!(result, Err(SchedulerError::InvalidCron { .. })),
            "{expr} 应该被拒绝"
        );
    }
}

#[test]
fn test_next_is_strictly_after() {
    let schedule = CronScheduler::new("0 10 * * *").unwrap();
    let at_fire = local(2024, 5, 15, 10, 0);

    assert_eq!(schedule.next_after(at_fire).unwrap(), local(2024, 5, 16, 10, 0));
}

#[test]
fn test_invalid_expressions() {
    for expr in ["", "   ", "* * *", "* * * * * * *", "60 * * * *", "0 0 * * 8", "abc"] {
        assert!(
            CronScheduler::validate_cron_expression(expr).is_err(),
            "should reject {expr:?}"
        );
    }
}

#[test]
fn test_time_until_next() {
    let schedule = CronScheduler::new("@every 30s").unwrap();
    let now = Local::now();
    let wait = schedule.time_until_next(now).unwrap();

    assert_eq!(wait.as_secs(), 30);
    assert_eq!(schedule.expression(), "@every 30s");
}
