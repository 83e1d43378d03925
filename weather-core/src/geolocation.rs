//! Location permission tracking and device coordinates.
//!
//! The acquirer owns the held [`PermissionState`]; nothing else writes it.
//! Every failed fix produces exactly one notification naming the failure.

use async_trait::async_trait;
use std::{
    fmt::{self, Debug},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    config::GeolocationConfig,
    model::Coordinates,
    notify::{Notification, Notifier},
    prefs::Preferences,
};

pub mod ip;
pub mod platform;

pub use ip::IpLocator;
pub use platform::{FixedLocation, NoLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
    Prompt,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PermissionState::Unknown => "unknown",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location information is unavailable")]
    PositionUnavailable,
    #[error("Geolocation is not supported")]
    Unsupported,
}

pub const DENIED_ACTION: &str = "Allow location access in your system settings, then try again.";

impl GeolocationError {
    /// The user-facing message for this failure category.
    pub fn notification(&self) -> Notification {
        match self {
            GeolocationError::PermissionDenied => Notification::error(
                "Location access denied. Enable location permission to use your current location.",
            )
            .with_action(DENIED_ACTION),
            GeolocationError::Timeout => {
                Notification::error("Location request timed out. Please try again.")
            }
            GeolocationError::PositionUnavailable => Notification::error(
                "Location information is unavailable. Please search for a city instead.",
            ),
            GeolocationError::Unsupported => {
                Notification::error("Geolocation is not supported on this device.")
            }
        }
    }
}

/// Options passed along with a single fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
    /// Oldest cached fix the platform may answer with.
    pub maximum_age: Duration,
}

/// The device's location capability.
#[async_trait]
pub trait LocationPlatform: Send + Sync + Debug {
    /// Current grant status without prompting, or `None` when the platform
    /// cannot be queried.
    async fn query_permission(&self) -> Option<PermissionState>;

    /// Ask the user for access ahead of a fix, for platforms whose prompt is
    /// separate from the fix itself. Time spent here is not part of the fix
    /// budget. The default lets the fix proceed.
    async fn prompt_permission(&self) -> Result<bool, GeolocationError> {
        Ok(true)
    }

    /// One fix attempt. May prompt the user for permission.
    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError>;

    /// Stream of externally-driven permission changes, if the platform has one.
    fn permission_changes(&self) -> Option<watch::Receiver<PermissionState>> {
        None
    }

    /// How the user lifts a denial on this platform.
    fn denied_action(&self) -> &'static str {
        DENIED_ACTION
    }
}

#[derive(Debug)]
pub struct GeolocationAcquirer {
    platform: Arc<dyn LocationPlatform>,
    prefs: Preferences,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<PermissionState>,
    request_timeout: Duration,
    fix_timeout: Duration,
}

impl GeolocationAcquirer {
    pub fn new(
        platform: Arc<dyn LocationPlatform>,
        prefs: Preferences,
        notifier: Arc<dyn Notifier>,
        config: &GeolocationConfig,
    ) -> Self {
        let (state, _) = watch::channel(PermissionState::Unknown);
        Self {
            platform,
            prefs,
            notifier,
            state,
            request_timeout: config.request_timeout(),
            fix_timeout: config.fix_timeout(),
        }
    }

    pub fn state(&self) -> PermissionState {
        *self.state.borrow()
    }

    /// Receiver that observes every change of the held permission state.
    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.state.subscribe()
    }

    /// Forward the platform's permission-change notifications into the held
    /// state. Returns `None` when the platform has no such notifications.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_permission_sync(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut changes = self.platform.permission_changes()?;
        let acquirer = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let next = *changes.borrow_and_update();
                let Some(acquirer) = acquirer.upgrade() else {
                    break;
                };
                acquirer.sync_from_platform(next);
            }
            debug!("Permission change stream closed");
        }))
    }

    /// Whether location access is currently granted, without prompting.
    pub async fn check_permission(&self) -> bool {
        match self.platform.query_permission().await {
            Some(state) => {
                self.sync_from_platform(state);
                state == PermissionState::Granted
            }
            None => self.prefs.location_enabled(),
        }
    }

    /// Ask for permission with one high-accuracy fix. Failures are reported
    /// through the notifier, never returned.
    pub async fn request_permission(&self) -> bool {
        self.request().await.is_ok()
    }

    /// Device coordinates, requesting permission first when it isn't held.
    pub async fn current_coordinates(&self) -> Result<Coordinates, GeolocationError> {
        let granted = self.check_permission().await;

        if self.state() == PermissionState::Denied {
            return Err(self.blocked());
        }
        if !granted {
            return self.request().await;
        }

        let options = PositionOptions {
            timeout: self.fix_timeout,
            high_accuracy: true,
            maximum_age: Duration::ZERO,
        };

        match self.fix(options).await {
            Ok(coords) => {
                self.record(PermissionState::Granted);
                Ok(coords)
            }
            Err(e) => {
                if e == GeolocationError::PermissionDenied {
                    self.prefs.set_location_enabled(false);
                }
                self.report(e);
                Err(e)
            }
        }
    }

    async fn request(&self) -> Result<Coordinates, GeolocationError> {
        if self.state() == PermissionState::Denied {
            return Err(self.blocked());
        }

        let options = PositionOptions {
            timeout: self.request_timeout,
            high_accuracy: true,
            maximum_age: Duration::ZERO,
        };

        let result = match self.platform.prompt_permission().await {
            Ok(true) => self.fix(options).await,
            Ok(false) => Err(GeolocationError::PermissionDenied),
            Err(e) => Err(e),
        };

        match result {
            Ok(coords) => {
                self.record(PermissionState::Granted);
                self.prefs.set_location_enabled(true);
                Ok(coords)
            }
            Err(e) => {
                self.prefs.set_location_enabled(false);
                self.report(e);
                Err(e)
            }
        }
    }

    async fn fix(&self, options: PositionOptions) -> Result<Coordinates, GeolocationError> {
        debug!(timeout = ?options.timeout, "Requesting location fix");
        match tokio::time::timeout(options.timeout, self.platform.current_position(options)).await
        {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        }
    }

    /// Denied is sticky: the platform won't prompt again, so tell the user
    /// how to unblock it instead.
    fn blocked(&self) -> GeolocationError {
        self.notifier.notify(
            Notification::error(
                "Location access is blocked. Enable it in your settings to use your current location.",
            )
            .with_action(self.platform.denied_action()),
        );
        GeolocationError::PermissionDenied
    }

    fn report(&self, error: GeolocationError) {
        warn!(error = %error, "Location fix failed");
        // A timeout or missing fix says nothing about the grant status.
        let mut notification = error.notification();
        if error == GeolocationError::PermissionDenied {
            self.record(PermissionState::Denied);
            notification = notification.with_action(self.platform.denied_action());
        }
        self.notifier.notify(notification);
    }

    /// Outcome of our own request. Denied only changes through the platform.
    fn record(&self, next: PermissionState) {
        if self.state() == PermissionState::Denied {
            return;
        }
        self.set_state(next);
    }

    fn sync_from_platform(&self, next: PermissionState) {
        match next {
            PermissionState::Granted => self.prefs.set_location_enabled(true),
            PermissionState::Denied => self.prefs.set_location_enabled(false),
            PermissionState::Unknown | PermissionState::Prompt => {}
        }
        self.set_state(next);
    }

    fn set_state(&self, next: PermissionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Location permission changed");
        }
    }
}
