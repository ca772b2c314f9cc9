//! Run a small two-session script against a scratch SQLite database and
//! stream the text dump to stdout.
//!
//! ```sh
//! cargo run -p weave_sqlite --example interleave
//! ```

use std::time::Duration;

use weave_common::CancelToken;
use weave_flow::history::write_event;
use weave_flow::{parse_script, run, EvalOptions, TextDumpOptions};
use weave_sqlite::SqliteDriver;

const SCRIPT: &str = "\
/* setup */ create table if not exists t (id integer primary key, v integer);
/* setup */ delete from t;
/* setup */ insert into t values (1, 0);
/* a */ begin immediate;
/* a */ update t set v = v + 1 where id = 1;
/* b */ begin immediate;
/* a */ commit;
/* b */ update t set v = v + 10 where id = 1;
/* b */ commit;
/* check:wait */ select v from t;
";

fn main() {
    let path = std::env::temp_dir().join("sqlweave-example.db");
    let driver = SqliteDriver::open(&path);
    let stmts = parse_script(SCRIPT);
    let opts = EvalOptions {
        block_time: Some(Duration::from_millis(200)),
        ping_time: Some(Duration::from_millis(50)),
    };
    let dump = TextDumpOptions {
        verbose: true,
        with_lat: false,
    };

    let outcome = run(&driver, &stmts, &opts, &CancelToken::new(), |e| {
        let mut stdout = std::io::stdout();
        let _ = write_event(&mut stdout, e, &dump);
    });
    if let Err(e) = outcome {
        eprintln!("evaluation failed: {e}");
        std::process::exit(1);
    }
}
