use async_trait::async_trait;
use inquire::{Confirm, InquireError};
use tracing::debug;
use weather_core::{
    Coordinates, GeolocationError, LocationPlatform, PermissionState, PositionOptions,
    Preferences, geolocation::IpLocator,
};

pub const ENABLE_HINT: &str = "Run `weather location enable` to allow location lookups again.";

/// Location for a terminal session: an IP lookup guarded by a consent prompt.
///
/// The answer to the prompt is saved and stands in for a platform
/// permission, so a decline stays in force across runs until the user
/// enables location again.
#[derive(Debug)]
pub struct TerminalLocation {
    locator: IpLocator,
    prefs: Preferences,
}

impl TerminalLocation {
    pub fn new(locator: IpLocator, prefs: Preferences) -> Self {
        Self { locator, prefs }
    }

    fn saved_permission(&self) -> Option<PermissionState> {
        self.prefs.location_consent().map(|allowed| {
            if allowed { PermissionState::Granted } else { PermissionState::Denied }
        })
    }

    fn remember(&self, allowed: bool) {
        self.prefs.set_location_consent(Some(allowed));
    }
}

#[async_trait]
impl LocationPlatform for TerminalLocation {
    async fn query_permission(&self) -> Option<PermissionState> {
        self.saved_permission()
    }

    async fn prompt_permission(&self) -> Result<bool, GeolocationError> {
        let answer = tokio::task::spawn_blocking(|| {
            Confirm::new("Allow weather to look up your approximate location from your IP address?")
                .with_default(true)
                .prompt()
        })
        .await
        .map_err(|_| GeolocationError::Unsupported)?;

        match answer {
            Ok(allowed) => {
                self.remember(allowed);
                Ok(allowed)
            }
            Err(InquireError::NotTTY) => {
                debug!("No terminal to ask for location consent");
                Err(GeolocationError::Unsupported)
            }
            // Escape or Ctrl-C is not an answer; ask again next time.
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
            Err(e) => {
                debug!("Location consent prompt failed: {}", e);
                Err(GeolocationError::Unsupported)
            }
        }
    }

    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        self.locator.locate(options.timeout).await
    }

    fn denied_action(&self) -> &'static str {
        ENABLE_HINT
    }
}
