//! Host capability detection.

use {once_cell::sync::OnceCell, serde::Serialize, tracing::info};

/// First platform version with a job-admission scheduler.
pub const JOB_CAPABLE_VERSION: u32 = 26;

static HOST: OnceCell<HostEnvironment> = OnceCell::new();

/// Background-execution mechanisms available on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    /// Only inline processing and the fallback worker.
    Legacy,
    /// A job-admission scheduler is available as well.
    JobCapable,
}

impl CapabilityTier {
    #[must_use]
    pub fn from_platform_version(version: u32) -> Self {
        if version >= JOB_CAPABLE_VERSION {
            Self::JobCapable
        } else {
            Self::Legacy
        }
    }
}

/// The host's declared platform version and the tier derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEnvironment {
    platform_version: Option<u32>,
    tier: CapabilityTier,
}

impl HostEnvironment {
    /// An unknown version resolves to [`CapabilityTier::Legacy`].
    #[must_use]
    pub fn new(platform_version: Option<u32>) -> Self {
        Self {
            platform_version,
            tier: platform_version
                .map_or(CapabilityTier::Legacy, CapabilityTier::from_platform_version),
        }
    }

    /// Record the process-wide host environment. The first call wins; later
    /// calls return the already recorded value unchanged.
    pub fn init(platform_version: Option<u32>) -> &'static HostEnvironment {
        HOST.get_or_init(|| {
            let host = Self::new(platform_version);
            info!(
                platform_version = ?host.platform_version,
                tier = ?host.tier,
                "host capability tier resolved"
            );
            host
        })
    }

    /// The process-wide environment, if [`HostEnvironment::init`] has run.
    #[must_use]
    pub fn current() -> Option<&'static HostEnvironment> {
        HOST.get()
    }

    #[must_use]
    pub fn platform_version(&self) -> Option<u32> {
        self.platform_version
    }

    #[must_use]
    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// Whether the declared platform version is known and at least `floor`.
    #[must_use]
    pub fn meets(&self, floor: u32) -> bool {
        self.platform_version.is_some_and(|v| v >= floor)
    }
}
