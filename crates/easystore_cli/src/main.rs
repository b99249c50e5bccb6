//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `easystore_core` linkage without a host application.
//! - Exercise one add/update/delete round against an in-memory store and
//!   print every event an observer receives.
//! - Log to files under `EASYSTORE_LOG_DIR` when that variable is set.

use easystore_core::{
    core_version, default_log_level, init_logging, MutationKind, NotificationBus, ObjectStore,
    Record, StoreResult, TransactionalNotifier,
};
use serde::{Deserialize, Serialize};
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Memo {
    id: Uuid,
    text: String,
}

impl Record for Memo {
    const KIND: &'static str = "memo";

    fn primary_key(&self) -> String {
        self.id.to_string()
    }
}

fn main() -> ExitCode {
    println!("easystore_core version={}", core_version());

    // Optional: file logging only when a directory is provided.
    if let Ok(log_dir) = std::env::var("EASYSTORE_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run_smoke() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(
                "event=cli_smoke module=cli status=error error_code={}",
                err.code()
            );
            eprintln!("easystore smoke failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_smoke() -> StoreResult<()> {
    let store = Arc::new(ObjectStore::open_in_memory()?);
    let memos = TransactionalNotifier::<Memo>::new(store, Arc::new(NotificationBus::new()));
    let token = memos.observe(|kind: MutationKind| println!("event kind={kind}"));

    let memo = Memo {
        id: Uuid::new_v4(),
        text: "hello".to_string(),
    };
    let key = memo.primary_key();

    memos.create(&memo)?;
    memos.update(
        |session| session.modify::<Memo, _>(&key, |m| m.text.push_str(", world")),
        false,
    )?;
    memos.delete(&memo)?;
    memos.stop_observing(token);

    println!("channel={} remaining={}", memos.channel(), memos.count()?);
    Ok(())
}
