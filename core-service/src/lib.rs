//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided engines into the playback core: it builds
//! the event bus and the coordinator from a validated
//! [`CoreConfig`](core_runtime::config::CoreConfig), installs logging, and
//! runs the background tasks that feed engine events into the play head.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use bridge_traits::media::MediaEngine;
//! # async fn example(audio: Arc<dyn MediaEngine>, video: Arc<dyn MediaEngine>) -> core_service::Result<()> {
//! use core_playback::{Episode, MediaMode, PlayerConfig};
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder().audio_engine(audio).build()?;
//! let mut core = CoreService::bootstrap(config, PlayerConfig::default())?;
//!
//! let player = core.mount_full_player(Some(video)).await?;
//! core.coordinator()
//!     .load_episode(Episode::new("ep-1", "https://cdn.example.com/ep-1.mp3"), None)
//!     .await?;
//! player.play().await?;
//! player.set_media_mode(MediaMode::Video).await?;
//!
//! player.unmount().await?;
//! core.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::media::MediaEngine;
use core_playback::{Coordinator, FullPlayer, MiniPlayer, PlayHeadObserver, PlayerConfig};
use core_runtime::{
    config::CoreConfig,
    events::{CoreEvent, EventBus, EventStream},
    logging::init_logging,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    event_bus: Arc<EventBus>,
    coordinator: Arc<Coordinator>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoreService {
    /// Create the service without starting background tasks.
    pub fn new(config: CoreConfig, player: PlayerConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let coordinator = Coordinator::new(
            player,
            Arc::clone(&config.audio_engine),
            Arc::clone(&config.clock),
            Arc::clone(&event_bus),
            config.manifest_client.clone(),
        )?;

        Ok(Self {
            config,
            event_bus,
            coordinator,
            tasks: Vec::new(),
        })
    }

    /// Install logging (if configured), create the service and start it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bootstrap(config: CoreConfig, player: PlayerConfig) -> Result<Self> {
        if let Some(logging) = config.logging.clone() {
            // Another component may own the global subscriber already.
            if let Err(e) = init_logging(logging) {
                warn!(error = %e, "Logging not installed");
            }
        }

        let mut service = Self::new(config, player)?;
        service.start()?;
        info!("Playback core started");
        Ok(service)
    }

    /// Spawn the engine event pump and the play head ticker.
    ///
    /// Calling `start` on a running service is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if !self.tasks.is_empty() {
            return Ok(());
        }
        if self.coordinator.is_shut_down() {
            return Err(CoreError::InitializationFailed(
                "service was shut down".to_string(),
            ));
        }

        tokio::runtime::Handle::try_current()
            .map_err(|e| core_runtime::Error::Task(format!("no Tokio runtime: {}", e)))?;

        self.tasks.push(self.coordinator.spawn_event_pump());
        self.tasks.push(self.coordinator.spawn_ticker());
        debug!("Background tasks spawned");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty() && !self.coordinator.is_shut_down()
    }

    /// Stop playback, release every engine and join the background tasks.
    pub async fn shutdown(&mut self) -> Result<()> {
        let stopped = self.coordinator.stop().await;
        self.coordinator.shutdown();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        info!("Playback core shut down");
        stopped.map_err(CoreError::from)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Observer of the shared play head.
    pub fn observe(&self) -> PlayHeadObserver {
        self.coordinator.observe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Mount a Full Player, optionally leasing it a video engine.
    pub async fn mount_full_player(&self, video_engine: Option<Arc<dyn MediaEngine>>) -> Result<FullPlayer> {
        Ok(FullPlayer::mount(Arc::clone(&self.coordinator), video_engine).await?)
    }

    /// Create a Mini Player around its own video engine.
    pub fn mini_player(&self, video_engine: Arc<dyn MediaEngine>) -> Result<MiniPlayer> {
        Ok(MiniPlayer::new(&self.coordinator, video_engine)?)
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}
