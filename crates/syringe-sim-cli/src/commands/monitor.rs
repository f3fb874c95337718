use std::path::PathBuf;

use syringe_sim_core::{StreamConfig, StreamController};

pub fn run(config: StreamConfig, output: &str, autostart: bool) {
    let rt = super::runtime();
    // The ticker lives on the runtime's workers; the TUI loop stays on this thread.
    let controller = {
        let _guard = rt.enter();
        StreamController::spawn(config)
    };
    if autostart {
        controller.start();
    }

    let mut app = crate::tui::app::App::new(controller, PathBuf::from(output));
    let result = app.run();
    rt.block_on(app.into_controller().shutdown());

    if let Err(e) = result {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
