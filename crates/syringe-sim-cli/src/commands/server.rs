use std::path::PathBuf;
use std::sync::Arc;

use syringe_sim_core::{StreamConfig, StreamController};

pub fn run(config: StreamConfig, host: &str, port: u16, autostart: bool, export_dir: PathBuf) {
    let base = format!("http://{host}:{port}");

    println!("💉 Syringe Sim Server v{}", syringe_sim_core::VERSION);
    println!("   {base}");
    println!(
        "   batch '{}', every {}s, {} inspected/interval, rates {:.1}/{:.1}/{:.1}%",
        config.batch_name,
        config.stream_speed_secs,
        config.inspections_per_interval,
        config.rates.flange,
        config.rates.glass,
        config.rates.wall,
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                      API index (try: curl {base})");
    println!("     GET  /health                Health check");
    println!("     GET  /api/v1/metrics        Totals, defect rate, batch");
    println!("     GET  /api/v1/samples        Sample log (?tag=tag-1 to filter)");
    println!("     GET  /api/v1/latest?tag=    Most recent sample for a tag");
    println!("     GET  /api/v1/cumulative     Running totals for tag-4 and tag-5");
    println!("     GET  /api/v1/config         Current configuration (PUT to replace)");
    println!("     POST /api/v1/stream/start   Start streaming ({{\"batch_name\": ...}})");
    println!("     POST /api/v1/stream/stop    Stop streaming");
    println!("     POST /api/v1/stream/toggle  Flip running/stopped");
    println!("     POST /api/v1/export         Save the log ({{\"file\": ...}})");
    println!("   Exports are written into {}", export_dir.display());
    println!();
    if !autostart {
        println!("   Stream is stopped; start it with: curl -X POST {base}/api/v1/stream/start");
        println!();
    }

    let rt = super::runtime();
    let result = rt.block_on(async {
        let controller = Arc::new(StreamController::spawn(config));
        if autostart {
            controller.start();
        }
        syringe_sim_server::run_server(controller, host, port, export_dir).await
    });

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
