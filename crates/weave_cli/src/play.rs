use std::fs;
use std::io;

use anyhow::{Context, Result};

use weave_common::{CancelToken, HarnessConfig};
use weave_flow::history::write_event;
use weave_flow::{parse_script, run, EvalOptions, History, TextDumpOptions};

use crate::args::PlayArgs;
use crate::db::open_driver;
use crate::paths::play_result_paths;

pub fn run_play(cfg: &HarnessConfig, args: &PlayArgs) -> Result<()> {
    let eval_opts = EvalOptions {
        block_time: cfg.block_time(),
        ping_time: cfg.ping_time(),
    };
    let dump_opts = TextDumpOptions {
        verbose: !args.no_verbose,
        with_lat: args.with_lat,
    };

    for path in &args.paths {
        println!("# {}", path.display());
        let script = fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        let stmts = parse_script(&script);

        let driver = open_driver(&cfg.dsn)?;
        let cancel = CancelToken::new();
        if let Some(timeout) = cfg.timeout() {
            cancel.cancel_after(timeout);
        }

        let mut history = History::default();
        let mut text_out: Vec<u8> = Vec::new();
        run(driver.as_ref(), &stmts, &eval_opts, &cancel, |e| {
            let mut stdout = io::stdout();
            let _ = write_event(&mut stdout, e, &dump_opts);
            if args.write {
                let _ = write_event(&mut text_out, e, &dump_opts);
                history.collect(e);
            }
        })
        .with_context(|| format!("play {}", path.display()))?;

        if args.write {
            let (text_path, json_path) = play_result_paths(path, args.negative);
            fs::write(&text_path, &text_out)
                .with_context(|| format!("write {}", text_path.display()))?;
            let mut json_file = fs::File::create(&json_path)
                .with_context(|| format!("write {}", json_path.display()))?;
            history.dump_json(&mut json_file)?;
        }
    }
    Ok(())
}
