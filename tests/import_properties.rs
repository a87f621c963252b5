use chrono::NaiveDate;
use gainian::store::select;
use gainian::utils::{window_start, DateBounds};
use gainian::*;
use std::sync::Arc;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn importer(m: MembershipMap) -> Importer {
    let store = Arc::new(Store::open_in_memory().unwrap());
    Importer::new(store, Arc::new(m), ImportConfig::default())
        .with_bounds(DateBounds::until(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()))
}

fn catalog() -> MembershipMap {
    let mut m = MembershipMap::new();
    for i in 0..12 {
        let code = format!("{:06}", 600000 + i);
        m.insert(&code, if i % 2 == 0 { "Banking" } else { "Energy" });
        if i % 3 == 0 {
            m.insert(&code, "Dividend");
        }
    }
    m
}

fn daily_volume(d: u32, i: u32) -> u32 {
    ((d * 7 + i * 13) % 17 + 1) * 1000
}

fn day_content(d: u32) -> String {
    let mut s = String::new();
    for i in 0..12 {
        s.push_str(&format!(
            "SH{:06}\t2025-01-{:02}\t{}\n",
            600000 + i,
            d,
            daily_volume(d, i)
        ));
    }
    s
}

struct Snapshot {
    records: usize,
    summaries: Vec<ConceptDailySummary>,
    rankings: Vec<StockConceptRanking>,
    highs: Vec<ConceptHighRecord>,
}

fn snapshot(importer: &Importer, date: NaiveDate) -> Snapshot {
    importer
        .store()
        .read(|conn| {
            Ok(Snapshot {
                records: select::count_records(conn, "volume", date)?,
                summaries: select::select_summaries(conn, "volume", date)?,
                rankings: select::select_rankings(conn, "volume", date, None)?,
                highs: select::select_highs(conn, "volume", date, None)?,
            })
        })
        .unwrap()
}

#[test]
fn test_worked_example() {
    let importer = importer(MembershipMap::from_pairs(vec![
        ("600000", "Banking"),
        ("000001", "Banking"),
    ]));
    let content = "SH600000\t2025-01-02\t1000000\nSZ000001\t2025-01-02\t500000\n";
    importer.import(content, "volume.txt", false).unwrap();

    let snap = snapshot(&importer, day(2));
    assert_eq!(1, snap.summaries.len());
    let s = &snap.summaries[0];
    assert_eq!("Banking", s.concept_name);
    assert_eq!(1_500_000.0, s.total_volume);
    assert_eq!(2, s.stock_count);
    assert_eq!(750_000.0, s.avg_volume);
    assert_eq!(1_000_000.0, s.max_volume);
    assert_eq!(500_000.0, s.min_volume);

    assert_eq!(2, snap.rankings.len());
    assert_eq!("600000", snap.rankings[0].stock_code);
    assert_eq!(1, snap.rankings[0].concept_rank);
    assert!((snap.rankings[0].volume_percentage - 66.67).abs() < 0.01);
    assert_eq!("000001", snap.rankings[1].stock_code);
    assert_eq!(2, snap.rankings[1].concept_rank);
    assert!((snap.rankings[1].volume_percentage - 33.33).abs() < 0.01);
}

#[test]
fn test_overwrite_is_idempotent() {
    let importer = importer(catalog());
    for d in 2..5 {
        importer.import(&day_content(d), "v.txt", false).unwrap();
    }
    let first = snapshot(&importer, day(4));
    importer.import(&day_content(4), "v.txt", true).unwrap();
    let second = snapshot(&importer, day(4));
    assert_eq!(first.records, second.records);
    assert_eq!(first.summaries, second.summaries);
    assert_eq!(first.rankings, second.rankings);
    assert_eq!(first.highs, second.highs);
}

#[test]
fn test_conservation_and_ranking_validity() {
    let importer = importer(catalog());
    importer.import(&day_content(2), "v.txt", false).unwrap();
    let snap = snapshot(&importer, day(2));
    assert_eq!(3, snap.summaries.len());
    for s in &snap.summaries {
        let members: Vec<&StockConceptRanking> = snap
            .rankings
            .iter()
            .filter(|r| r.concept_name == s.concept_name)
            .collect();
        let sum: f64 = members.iter().map(|r| r.trading_volume).sum();
        assert!((sum - s.total_volume).abs() < 1e-6);
        assert_eq!(s.stock_count as usize, members.len());

        let ranks: Vec<u32> = members.iter().map(|r| r.concept_rank).collect();
        let expected: Vec<u32> = (1..=members.len() as u32).collect();
        assert_eq!(expected, ranks);
        for pair in members.windows(2) {
            assert!(pair[0].trading_volume >= pair[1].trading_volume);
        }
        let pct: f64 = members.iter().map(|r| r.volume_percentage).sum();
        assert!((pct - 100.0).abs() < 1e-6);
    }
}

#[test]
fn test_new_high_correctness() {
    let importer = importer(catalog());
    let mut content = String::new();
    for d in 2..=24 {
        content.push_str(&day_content(d));
    }
    let result = HistoricalBatchSplitter::new(&importer).run(&content, "history.txt", |_, _, _, _| {});
    assert!(result.success);
    assert_eq!(23, result.success_dates);

    let periods = ImportConfig::default().new_high_periods;
    for d in 2..=24 {
        let date = day(d);
        let snap = snapshot(&importer, date);
        for s in &snap.summaries {
            for period in &periods {
                let start = window_start(date, *period);
                let prior = importer
                    .store()
                    .read(|conn| {
                        select::select_concept_summaries(
                            conn,
                            "volume",
                            &s.concept_name,
                            start,
                            date.pred_opt().unwrap(),
                        )
                    })
                    .unwrap();
                let beaten = prior.iter().all(|p| p.total_volume < s.total_volume);
                let fired = snap
                    .highs
                    .iter()
                    .any(|h| h.concept_name == s.concept_name && h.days_period == *period);
                assert_eq!(
                    beaten, fired,
                    "{} {} period {}",
                    s.concept_name, date, period
                );
            }
        }
        assert!(snap.highs.iter().all(|h| h.is_active));
    }
}

#[test]
fn test_overwrite_safety() {
    let importer = importer(catalog());
    let first = match importer.import(&day_content(2), "a.txt", false).unwrap() {
        ImportOutcome::Single(r) => r,
        other => panic!("unexpected {:?}", other),
    };
    let before = snapshot(&importer, day(2));
    match importer.import(&day_content(3).replace("2025-01-03", "2025-01-02"), "b.txt", false) {
        Err(Error::DateConflict(prev)) => {
            assert_eq!(first.record_id, prev.id);
            assert_eq!(first.success_count as u64, prev.success_count);
            assert_eq!(ImportStatus::Success, prev.status);
        }
        other => panic!("unexpected {:?}", other),
    }
    let after = snapshot(&importer, day(2));
    assert_eq!(before.records, after.records);
    assert_eq!(before.summaries, after.summaries);
    assert_eq!(before.rankings, after.rankings);
    assert_eq!(before.highs, after.highs);
}

#[test]
fn test_concurrent_overwrites_of_one_date() {
    let first = day_content(2);
    let second = day_content(3).replace("2025-01-03", "2025-01-02");
    let expected: Vec<Snapshot> = [&first, &second]
        .iter()
        .map(|content| {
            let alone = importer(catalog());
            alone.import(content, "v.txt", false).unwrap();
            snapshot(&alone, day(2))
        })
        .collect();
    assert_ne!(expected[0].summaries, expected[1].summaries);

    for _ in 0..5 {
        let importer = Arc::new(importer(catalog()));
        let workers: Vec<_> = vec![first.clone(), second.clone()]
            .into_iter()
            .map(|content| {
                let importer = Arc::clone(&importer);
                std::thread::spawn(move || importer.import(&content, "v.txt", true).unwrap())
            })
            .collect();
        for w in workers {
            match w.join().unwrap() {
                ImportOutcome::Single(r) => assert_eq!(ImportStatus::Success, r.status),
                other => panic!("unexpected {:?}", other),
            }
        }
        let snap = snapshot(&importer, day(2));
        // one import fully replaced the other, no mix of both
        assert!(expected.iter().any(|e| e.records == snap.records
            && e.summaries == snap.summaries
            && e.rankings == snap.rankings
            && e.highs == snap.highs));
        let ledger = importer
            .store()
            .read(|conn| store::list_records(conn, &store::LedgerFilter::default()))
            .unwrap();
        assert_eq!(2, ledger.len());
        assert!(ledger.iter().all(|r| r.status == ImportStatus::Success));
    }
}

#[test]
fn test_ledger_cleanup_keeps_the_guard() {
    let importer = importer(catalog());
    importer.import(&day_content(2), "a.txt", false).unwrap();
    let before = snapshot(&importer, day(2));
    importer
        .store()
        .read(|conn| {
            conn.execute(
                "UPDATE import_records SET started_at = '2000-01-01 00:00:00.000'",
                [],
            )?;
            store::cleanup_older_than(conn, 24)
        })
        .unwrap();
    match importer.import("SH600000\t2025-01-02\t7\n", "b.txt", false) {
        Err(Error::DateConflict(prev)) => assert_eq!("a.txt", prev.filename),
        other => panic!("unexpected {:?}", other),
    }
    let after = snapshot(&importer, day(2));
    assert_eq!(before.records, after.records);
    assert_eq!(before.summaries, after.summaries);
}

#[test]
fn test_failed_date_keeps_committed_dates() {
    let importer = importer(catalog());
    let mut content = day_content(2);
    content.push_str("SH600000\t2025-01-03\tnot-a-number\n");
    content.push_str(&day_content(6));
    let mut statuses = Vec::new();
    let result = HistoricalBatchSplitter::new(&importer).run(&content, "h.txt", |_, _, d, s| {
        statuses.push((d, s))
    });
    assert!(!result.success);
    assert_eq!(2, result.success_dates);
    assert_eq!(1, result.failed_dates);
    assert_eq!(
        vec![
            (day(2), store::ProgressStatus::Success),
            (day(3), store::ProgressStatus::Failed),
            (day(6), store::ProgressStatus::Success),
        ],
        statuses
    );
    assert_eq!(12, snapshot(&importer, day(2)).records);
    assert_eq!(0, snapshot(&importer, day(3)).records);
    assert_eq!(12, snapshot(&importer, day(6)).records);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_background_batch_job() {
    let importer = Arc::new(importer(catalog()));
    let jobs = BatchJobs::new(Arc::clone(&importer));
    let mut content = String::new();
    for d in 2..=10 {
        content.push_str(&day_content(d));
    }
    let (id, handle) = jobs.submit(content, "history.txt".to_owned(), false);
    let result = handle.await.unwrap();
    assert!(result.success);
    assert_eq!(9, result.total_dates);
    let state = jobs.get(id).unwrap();
    assert_eq!(store::JobStatus::Completed, state.status);
    assert_eq!(9, state.current);
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!("completed", json["status"]);
}
