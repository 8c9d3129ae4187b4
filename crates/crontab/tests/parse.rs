//! Field-grid parsing checks covering each expression position.

use omicron_crontab::{CrontabRow, Schedule};

fn schedule(line: &str) -> Schedule {
    let row = CrontabRow::parse(1, line, 0);
    assert!(!row.is_malformed(), "expected '{line}' to parse");
    row.schedule().cloned().unwrap()
}

fn values(set: &std::collections::BTreeSet<u32>) -> Vec<u32> {
    set.iter().copied().collect()
}

#[test]
fn minute_field_grid() {
    let all = schedule("* * * * * root cd / && run-parts --report /etc/cron.hourly");
    assert_eq!(all.minutes().len(), 60);
    assert!(all.minutes().iter().all(|m| *m <= 59));

    let evens = schedule("*/2 * * * * root cd / && run-parts --report /etc/cron.hourly");
    assert_eq!(evens.minutes().len(), 30);
    assert!(evens.minutes().iter().all(|m| m % 2 == 0));

    let stepped_range = schedule("1-7/7 * * * * root cd / && run-parts --report /etc/cron.hourly");
    assert_eq!(values(stepped_range.minutes()), vec![1]);

    let range = schedule("0-31 * * * * root cd / && run-parts --report /etc/cron.hourly");
    assert_eq!(range.minutes().len(), 32);

    let list = schedule("0-10,20-30 * * * * root cd / && run-parts --report /etc/cron.hourly");
    assert_eq!(list.minutes().len(), 22);
    for minute in 11..20 {
        assert!(!list.minutes().contains(&minute));
    }
}

#[test]
fn hour_field_grid() {
    let all = schedule("* * * * * root x y");
    assert_eq!(all.hours().len(), 24);

    let evens = schedule("* */2 * * * root x y");
    assert_eq!(evens.hours().len(), 12);
    assert!(evens.hours().iter().all(|h| h % 2 == 0));

    let stepped = schedule("* 1-7/7 * * * root x y");
    assert_eq!(values(stepped.hours()), vec![1]);

    let range = schedule("* 0-15 * * * root x y");
    assert_eq!(range.hours().len(), 16);

    let list = schedule("* 1-3,5-9 * * * root x y");
    assert_eq!(list.hours().len(), 8);
    assert!(!list.hours().contains(&4));
}

#[test]
fn day_of_month_field_grid() {
    let all = schedule("* * * * * root x y");
    assert_eq!(all.days_of_month().len(), 31);
    assert!(!all.days_of_month().contains(&0));

    let stepped = schedule("* * */2 * * root x y");
    // 1,3,5..31: day-of-month steps start at 1.
    assert_eq!(stepped.days_of_month().len(), 16);
    for day in (1..=31).step_by(2) {
        assert!(stepped.days_of_month().contains(&day));
    }

    let list = schedule("* * 1-12,14-25 * * root x y");
    assert_eq!(list.days_of_month().len(), 24);
    assert!(!list.days_of_month().contains(&13));
}

#[test]
fn month_field_grid() {
    let all = schedule("* * * * * root x y");
    assert_eq!(all.months().len(), 12);

    let stepped = schedule("* * * */2 * root x y");
    assert_eq!(stepped.months().len(), 6);
    for month in [2u32, 4, 6, 8, 10, 12] {
        assert!(!stepped.months().contains(&month));
    }

    let named = schedule("* * * jan-may,jul-nov * root x y");
    assert_eq!(named.months().len(), 10);
    assert!(!named.months().contains(&6));
    assert!(!named.months().contains(&12));
}

#[test]
fn day_of_week_field_grid() {
    let all = schedule("* * * * * root x y");
    assert_eq!(all.days_of_week().len(), 7);

    let stepped = schedule("* * * * */2 root x y");
    assert_eq!(values(stepped.days_of_week()), vec![0, 2, 4, 6]);

    let one = schedule("* * * * 1-6/6 root x y");
    assert_eq!(values(one.days_of_week()), vec![1]);

    let named = schedule("* * * * sun-tue,thu-sat root x y");
    assert_eq!(named.days_of_week().len(), 6);
    assert!(!named.days_of_week().contains(&3));
}

#[test]
fn parsed_sets_are_never_empty_and_in_range() {
    let cases = [
        "* * * * * root x y",
        "*/7 3-9 1,15 mar-sep mon-fri deploy /usr/local/bin/sync --all",
        "59 23 31 12 6 root year-end",
    ];

    for line in cases {
        let s = schedule(line);
        assert!(!s.minutes().is_empty());
        assert!(!s.hours().is_empty());
        assert!(!s.days_of_month().is_empty());
        assert!(!s.months().is_empty());
        assert!(!s.days_of_week().is_empty());

        assert!(s.minutes().iter().all(|v| *v <= 59));
        assert!(s.hours().iter().all(|v| *v <= 23));
        assert!(s.days_of_month().iter().all(|v| (1..=31).contains(v)));
        assert!(s.months().iter().all(|v| (1..=12).contains(v)));
        assert!(s.days_of_week().iter().all(|v| *v <= 6));
    }
}

#[test]
fn stepped_range_members_satisfy_step_arithmetic() {
    for (line, start, step) in [
        ("3-59/4 * * * * root x y", 3u32, 4u32),
        ("10-40/10 * * * * root x y", 10, 10),
        ("0-6/3 * * * * root x y", 0, 3),
    ] {
        let s = schedule(line);
        for minute in s.minutes() {
            assert!(*minute >= start);
            assert_eq!((minute - start) % step, 0, "bad member {minute} in {line}");
        }
    }
}
