//! The full stack against a real SQLite database: two writers on one
//! file, the second genuinely blocking until the first commits.

use std::time::Duration;

use weave_common::CancelToken;
use weave_flow::{parse_script, run, Driver, EvalOptions, Event, History};
use weave_sqlite::SqliteDriver;

#[test]
fn test_second_writer_blocks_until_commit() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("blocking.db");

    // Seed the schema outside the evaluation.
    {
        let driver = SqliteDriver::open(&db_path);
        let mut conn = driver.connect().unwrap();
        conn.exec("create table t (id integer primary key, v integer)")
            .unwrap();
        conn.exec("insert into t values (1, 0)").unwrap();
    }

    let script = "\
/* a */ begin immediate;
/* b */ begin immediate;
/* a */ commit;
/* b */ commit;
";
    let driver = SqliteDriver::open(&db_path);
    let stmts = parse_script(script);
    let opts = EvalOptions {
        block_time: Some(Duration::from_millis(150)),
        ping_time: Some(Duration::from_millis(50)),
    };
    let mut history = History::default();
    run(
        &driver,
        &stmts,
        &opts,
        &CancelToken::new(),
        |e: &Event| history.collect(e),
    )
    .unwrap();

    let trace: Vec<(String, String)> = history
        .iter()
        .map(|e| (e.kind().to_string(), e.session.clone()))
        .collect();
    let expected = [
        ("Invoke", "a"), // begin immediate
        ("Return", "a"),
        ("Invoke", "b"), // begin immediate, blocked on a's write lock
        ("Block", "b"),
        ("Invoke", "a"), // commit releases it
        ("Return", "a"),
        ("Resume", "b"),
        ("Return", "b"),
        ("Invoke", "b"), // commit
        ("Return", "b"),
    ];
    let expected: Vec<(String, String)> = expected
        .iter()
        .map(|(k, s)| (k.to_string(), s.to_string()))
        .collect();
    assert_eq!(trace, expected);
}
