use std::io::{self, Write};
use std::panic;

use log::error;

/// Install panic reporting: `better-panic` backtraces in debug builds,
/// `human-panic` crash reports in release builds. The panic is also logged
/// so it ends up in the log file next to the events that led to it.
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::install();
    } else {
        human_panic::setup_panic!();
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        log::logger().flush();
        let _ = io::stderr().flush();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}
