//! Interactive picker entry point, per spec §2 and §6.

pub mod app;
pub mod event;
pub mod message;
pub mod theme;
pub mod ui;

use anyhow::Result;

/// Launch the picker, or short-circuit to a deterministic banner under
/// `WTX_TEST_MODE` (spec §6's environment variable table) so scripted tests
/// never have to drive a real terminal.
pub fn run() -> Result<i32> {
    if std::env::var_os("WTX_TEST_MODE").is_some() {
        println!("wtx {} (test mode, no UI started)", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    app::App::new()?.run()?;
    Ok(0)
}
