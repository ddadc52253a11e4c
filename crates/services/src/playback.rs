//! Binding to the externally controlled video player.
//!
//! The tracker never owns the player. It reads state on demand through
//! [`PlaybackProbe`] and issues at most a resume seek.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::BootstrapError;

/// Player state as reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Buffering,
    Ended,
}

/// On-demand view of a third-party player. Has no timer of its own.
///
/// Any call may happen before the player is ready; implementations return
/// `None` for values they cannot report yet.
pub trait PlaybackProbe: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Playhead in seconds.
    fn current_position(&self) -> Option<f64>;

    /// Media length in seconds, once known.
    fn duration(&self) -> Option<f64>;

    fn play_state(&self) -> PlayState;

    fn seek(&self, seconds: f64);
}

/// One consistent read of a ready probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSample {
    pub position: f64,
    pub duration: Option<f64>,
    pub state: PlayState,
}

impl PlaybackSample {
    /// Reads the probe, or `None` when it cannot report a position.
    #[must_use]
    pub fn read(probe: &dyn PlaybackProbe) -> Option<Self> {
        if !probe.is_ready() {
            return None;
        }
        let position = probe.current_position().filter(|p| p.is_finite() && *p >= 0.0)?;
        Some(Self {
            position,
            duration: probe.duration().filter(|d| d.is_finite() && *d > 0.0),
            state: probe.play_state(),
        })
    }
}

/// Creates probes bound to a lesson's video reference.
pub trait PlayerFactory: Send + Sync {
    fn bind(&self, video_ref: &str) -> Arc<dyn PlaybackProbe>;
}

/// Process-wide, one-time load of the player API.
///
/// Concurrent callers share a single load and all resume once it is ready.
/// A failed load leaves the cell empty so a later call can try again.
#[derive(Default)]
pub struct PlayerBootstrap {
    factory: OnceCell<Arc<dyn PlayerFactory>>,
}

impl PlayerBootstrap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared instance used by the application.
    pub fn global() -> &'static PlayerBootstrap {
        static GLOBAL: OnceLock<PlayerBootstrap> = OnceLock::new();
        GLOBAL.get_or_init(PlayerBootstrap::new)
    }

    /// Returns the loaded factory, running `loader` if nothing is loaded yet.
    ///
    /// # Errors
    ///
    /// Returns the loader's `BootstrapError` if loading fails.
    pub async fn ready<F, Fut>(&self, loader: F) -> Result<Arc<dyn PlayerFactory>, BootstrapError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PlayerFactory>, BootstrapError>>,
    {
        let factory = self
            .factory
            .get_or_try_init(|| async move {
                let factory = loader().await?;
                info!("player api ready");
                Ok::<_, BootstrapError>(factory)
            })
            .await?;
        Ok(Arc::clone(factory))
    }

    /// The factory if the API has already been loaded.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn PlayerFactory>> {
        self.factory.get().map(Arc::clone)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.factory.initialized()
    }
}
