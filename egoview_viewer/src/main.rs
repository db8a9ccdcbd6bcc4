//! EgoView Camera Viewer CLI
//!
//! Connects to the simulator bridge, spawns an ego vehicle with an attached
//! RGB camera, and renders the camera feed with 3D bounding-box overlays for
//! nearby vehicles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod session;

/// EgoView camera viewer
#[derive(Parser, Debug)]
#[command(name = "egoview-viewer")]
#[command(about = "Render the ego camera feed with 3D bounding-box overlays", long_about = None)]
pub struct Args {
    /// IP of the simulator host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// TCP port of the simulator bridge
    #[arg(short, long, default_value = "2000")]
    pub port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10.0")]
    pub timeout: f64,

    /// Camera rig file (JSON); the built-in front camera when omitted
    #[arg(long)]
    pub rig: Option<String>,

    /// Camera id to attach from the rig
    #[arg(long, default_value = "Center")]
    pub camera: String,

    /// Overlay distance cutoff in meters
    #[arg(long, default_value = "50.0")]
    pub range: f64,

    /// Disable bounding-box overlays (camera feed only)
    #[arg(long)]
    pub no_overlay: bool,

    /// Draw debug dots on projected box corners
    #[arg(long)]
    pub corner_dots: bool,

    /// Seed for spawn-point and color choice (0 = random)
    #[arg(short, long, default_value = "0")]
    pub seed: u64,

    /// Stop after this many frames (0 = run until interrupted)
    #[arg(long, default_value = "0")]
    pub frames: u64,

    /// Record to an .rrd file instead of spawning the viewer
    #[cfg(feature = "visualization")]
    #[arg(long)]
    pub record: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Interrupts flip the flag; the render loop exits through the normal
    // teardown path.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            error!("Failed to install interrupt handler: {}", e);
        }
    }

    info!("EgoView viewer v0.1.0");

    match session::run(&args, &running) {
        Ok(stats) => {
            info!(
                "✓ Done: {} frames shown, {} boxes drawn",
                stats.frames_shown, stats.boxes_drawn
            );
        }
        Err(e) => {
            error!("✗ Session failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_client() {
        let args = Args::try_parse_from(["egoview-viewer"]).unwrap();
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 2000);
        assert_eq!(args.timeout, 10.0);
        assert_eq!(args.camera, "Center");
        assert_eq!(args.range, 50.0);
        assert!(!args.no_overlay);
    }

    #[test]
    fn host_and_port_flags_parse() {
        let args =
            Args::try_parse_from(["egoview-viewer", "--host", "10.0.0.5", "-p", "3000"]).unwrap();
        assert_eq!(args.host, "10.0.0.5");
        assert_eq!(args.port, 3000);
    }
}
