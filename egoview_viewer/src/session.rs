//! Session orchestration: connect, configure, spawn, render loop, teardown.
//!
//! The flow mirrors the engine's reference client: enable synchronous mode,
//! spawn the ego vehicle on a shuffled spawn point, attach the rig camera,
//! then tick the world and draw boxes for every vehicle ahead of the ego and
//! inside the overlay range. Cleanup is a single best-effort path that runs
//! whatever the loop's outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nalgebra::{Point2, Vector3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use egoview_client::{
    ActorId, CameraFrame, CameraStream, ClientError, Simulator, StreamError, WorldSettings,
};
use egoview_core::frame::{bgra_to_rgba, FrameError};
use egoview_core::geometry::{distance, Transform};
use egoview_core::overlay::{self, OverlayStyle};
use egoview_core::projection::PinholeCamera;
use egoview_core::rig::{CameraRig, RigError, RigFile};

#[cfg(feature = "visualization")]
use egoview_core::visualization::FeedVisualizer;

use crate::Args;

/// Ego vehicle blueprint, same as the reference client.
const EGO_BLUEPRINT: &str = "vehicle.tesla.model3";

/// Fixed step for synchronous mode, seconds (20 FPS).
const FIXED_DELTA: f64 = 0.05;

/// How long to wait for the camera frame belonging to a tick.
const FRAME_WAIT: Duration = Duration::from_secs(1);

/// Progress log cadence, frames.
const STATS_EVERY: u64 = 100;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Rig(#[from] RigError),

    #[error("Camera stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Frame conversion error: {0}")]
    Frame(#[from] FrameError),

    #[error("No spawn points available")]
    NoSpawnPoints,

    #[cfg(feature = "visualization")]
    #[error("Visualization error: {0}")]
    Visualization(String),
}

/// Counters reported at exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub frames_shown: u64,
    pub boxes_drawn: u64,
}

/// Runs a full viewer session against the bridge at `args.host:args.port`.
pub fn run(args: &Args, running: &AtomicBool) -> Result<SessionStats, SessionError> {
    let timeout = Duration::from_secs_f64(args.timeout);
    let mut sim = Simulator::connect(&args.host, args.port, timeout)?;
    let version = sim.hello()?;
    info!(
        "Connected to simulator bridge {} at {}:{}",
        version, args.host, args.port
    );

    let rig = match &args.rig {
        Some(path) => RigFile::load(path)?.find(&args.camera)?.clone(),
        None => CameraRig::default(),
    };

    let mut session = Session::new(sim, rig);
    let result = session.drive(args, running);
    session.teardown();
    result
}

struct Session {
    sim: Simulator,
    rig: CameraRig,
    original_settings: Option<WorldSettings>,
    ego: Option<ActorId>,
    camera: Option<ActorId>,
    stream: Option<CameraStream>,
}

impl Session {
    fn new(sim: Simulator, rig: CameraRig) -> Self {
        Self {
            sim,
            rig,
            original_settings: None,
            ego: None,
            camera: None,
            stream: None,
        }
    }

    fn drive(&mut self, args: &Args, running: &AtomicBool) -> Result<SessionStats, SessionError> {
        self.configure_world()?;
        let ego = self.spawn_ego(args.seed)?;
        self.attach_camera(ego)?;
        self.render_loop(args, running, ego)
    }

    fn configure_world(&mut self) -> Result<(), SessionError> {
        let current = self.sim.settings()?;
        self.sim.apply_settings(WorldSettings {
            synchronous_mode: true,
            fixed_delta_seconds: Some(FIXED_DELTA),
        })?;
        self.original_settings = Some(current);
        info!("Synchronous mode enabled, fixed delta {}s", FIXED_DELTA);
        Ok(())
    }

    fn spawn_ego(&mut self, seed: u64) -> Result<ActorId, SessionError> {
        let mut rng: StdRng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };

        let blueprint = self.sim.find_blueprint(EGO_BLUEPRINT)?;
        let mut attributes = HashMap::new();
        attributes.insert("role_name".to_string(), "ego".to_string());
        if let Some(color) = blueprint.recommended_colors.choose(&mut rng) {
            attributes.insert("color".to_string(), color.clone());
        }

        let mut spawn_points = self.sim.spawn_points()?;
        if spawn_points.is_empty() {
            return Err(SessionError::NoSpawnPoints);
        }
        spawn_points.shuffle(&mut rng);

        let ego = self
            .sim
            .spawn_actor(&blueprint.id, attributes, spawn_points[0], None)?;
        self.ego = Some(ego);
        info!("Ego vehicle {} spawned", ego);

        self.sim.set_autopilot(ego, true)?;
        Ok(ego)
    }

    fn attach_camera(&mut self, ego: ActorId) -> Result<(), SessionError> {
        let mut attributes = HashMap::new();
        attributes.insert("image_size_x".to_string(), self.rig.width.to_string());
        attributes.insert("image_size_y".to_string(), self.rig.height.to_string());
        attributes.insert("fov".to_string(), self.rig.fov_deg.to_string());

        let camera = self.sim.spawn_actor(
            &self.rig.sensor_type,
            attributes,
            self.rig.mount_transform(),
            Some(ego),
        )?;
        self.camera = Some(camera);
        info!("Camera '{}' {} attached to {}", self.rig.id, camera, ego);

        let port = self.sim.listen(camera)?;
        let stream = CameraStream::connect(self.sim.host(), port, self.sim.timeout())?;
        self.stream = Some(stream);
        debug!("Camera stream open on port {}", port);
        Ok(())
    }

    fn render_loop(
        &mut self,
        args: &Args,
        running: &AtomicBool,
        ego: ActorId,
    ) -> Result<SessionStats, SessionError> {
        let intrinsics = self.rig.intrinsics();
        let style = OverlayStyle {
            corner_dots: args.corner_dots,
            ..OverlayStyle::default()
        };
        let mut stats = SessionStats::default();

        #[cfg(feature = "visualization")]
        let viz = match &args.record {
            Some(path) => FeedVisualizer::new_to_file("egoview", path),
            None => FeedVisualizer::new("egoview"),
        }
        .map_err(|e| SessionError::Visualization(e.to_string()))?;

        while running.load(Ordering::SeqCst) {
            let tick_started = Instant::now();
            let snapshot = self.sim.tick()?;

            let frame = match self.stream.as_ref() {
                Some(stream) => recv_matching(stream, snapshot.frame)?,
                None => return Err(SessionError::Stream(StreamError::Closed)),
            };

            let mut image = bgra_to_rgba(frame.header.width, frame.header.height, &frame.bgra)?;

            let mut boxes: Vec<[Option<Point2<f64>>; 8]> = Vec::new();
            if !args.no_overlay {
                let camera_state = self.camera.and_then(|id| snapshot.actor(id));
                if let (Some(ego_state), Some(camera_state)) =
                    (snapshot.actor(ego), camera_state)
                {
                    let pinhole = PinholeCamera::new(&intrinsics, &camera_state.transform());
                    let ego_transform = ego_state.transform();
                    let forward = ego_transform.forward_vector();

                    for npc in snapshot.vehicles() {
                        if npc.id == ego.0 {
                            continue;
                        }

                        let npc_transform = npc.transform();
                        if !should_overlay(
                            &ego_transform,
                            &forward,
                            &npc_transform.location,
                            args.range,
                        ) {
                            continue;
                        }

                        let vertices = npc.bounding_box().world_vertices(&npc_transform);
                        let mut corners: [Option<Point2<f64>>; 8] = [None; 8];
                        for (corner, vertex) in corners.iter_mut().zip(vertices.iter()) {
                            *corner = pinhole.project_world(vertex);
                        }

                        overlay::draw_box(&mut image, &corners, &style);
                        boxes.push(corners);
                    }
                } else {
                    debug!("Ego or camera missing from snapshot {}", snapshot.frame);
                }
            }

            stats.frames_shown += 1;
            stats.boxes_drawn += boxes.len() as u64;
            let latency_ms = tick_started.elapsed().as_secs_f64() * 1e3;

            #[cfg(feature = "visualization")]
            {
                viz.set_frame(snapshot.frame);
                viz.log_frame(&image)
                    .map_err(|e| SessionError::Visualization(e.to_string()))?;
                viz.log_boxes(&boxes)
                    .map_err(|e| SessionError::Visualization(e.to_string()))?;
                viz.log_stats(boxes.len(), latency_ms)
                    .map_err(|e| SessionError::Visualization(e.to_string()))?;
            }

            debug!(
                "frame {} | {} boxes | {:.1}ms",
                snapshot.frame,
                boxes.len(),
                latency_ms
            );

            if stats.frames_shown % STATS_EVERY == 0 {
                info!(
                    "frame {} | vehicles boxed: {} | sim time {:.1}s",
                    snapshot.frame,
                    boxes.len(),
                    snapshot.timestamp
                );
            }

            if args.frames != 0 && stats.frames_shown >= args.frames {
                break;
            }
        }

        Ok(stats)
    }

    /// Best-effort cleanup, the reference client's `finally` block: restore
    /// world settings, stop and destroy the camera, destroy the ego, close
    /// the stream. A failing step logs and moves on.
    fn teardown(&mut self) {
        if let Some(settings) = self.original_settings.take() {
            if let Err(e) = self.sim.apply_settings(settings) {
                warn!("Failed to restore world settings: {}", e);
            }
        }

        if let Some(camera) = self.camera.take() {
            if let Err(e) = self.sim.stop_sensor(camera) {
                warn!("Failed to stop camera {}: {}", camera, e);
            }
            if let Err(e) = self.sim.destroy_actor(camera) {
                warn!("Failed to destroy camera {}: {}", camera, e);
            }
        }

        if let Some(ego) = self.ego.take() {
            if let Err(e) = self.sim.destroy_actor(ego) {
                warn!("Failed to destroy ego {}: {}", ego, e);
            }
        }

        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }

        info!("Session cleaned up");
    }
}

/// Distance plus ahead-of-ego culling, as in the reference client: a vehicle
/// gets a box when it is inside `range` and its ray from the ego projects
/// more than one meter onto the ego's forward vector.
fn should_overlay(
    ego: &Transform,
    forward: &Vector3<f64>,
    target: &Vector3<f64>,
    range: f64,
) -> bool {
    if distance(&ego.location, target) >= range {
        return false;
    }
    let ray = target - ego.location;
    forward.dot(&ray) > 1.0
}

/// Waits for the camera frame belonging to `frame_id`, discarding stale
/// frames. One frame of skew is tolerated.
fn recv_matching(stream: &CameraStream, frame_id: u64) -> Result<CameraFrame, StreamError> {
    let deadline = Instant::now() + FRAME_WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(StreamError::Timeout(FRAME_WAIT.as_millis() as u64));
        }

        let frame = stream.recv_timeout(remaining)?;
        if frame.header.frame_id + 1 < frame_id {
            debug!(
                "Skipping stale frame {} while waiting for {}",
                frame.header.frame_id, frame_id
            );
            continue;
        }
        return Ok(frame);
    }
}
