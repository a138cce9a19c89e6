//! The protection agent.
//!
//! An [`Agent`] owns the protection state of one process: it checks the
//! hook table once at startup, then attaches and detaches callbacks by
//! symbol, keeping track of what it protects so it can undo it.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use warden_hook::{Callback, Hook, HookRegistry, HookTable, InstrumentationError};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::logging;

/// Attaches protection callbacks to instrumented functions.
///
/// # Example
///
/// ```
/// use warden_agent::{Agent, AgentConfig};
/// use warden_hook::{HookRegistry, InstrumentationError};
///
/// // A process that was not instrumented.
/// let registry: &'static HookRegistry = Box::leak(Box::new(HookRegistry::new(None)));
///
/// let agent = Agent::start(AgentConfig::default(), registry).unwrap();
/// assert!(!agent.is_healthy());
/// assert_eq!(agent.health(), Some(&InstrumentationError::NotInstrumented));
///
/// let strict = AgentConfig::default().with_strict(true);
/// assert!(Agent::start(strict, registry).is_err());
/// ```
pub struct Agent {
    config: AgentConfig,
    registry: &'static HookRegistry,
    health: Option<InstrumentationError>,
    protected: Mutex<HashMap<&'static str, Arc<Hook>>>,
}

impl Agent {
    /// Starts an agent over `registry`.
    ///
    /// Initializes logging, then checks the hook table against
    /// `config.expected_version`. An unhealthy table leaves the agent
    /// disabled: every [`protect`](Self::protect) fails and the program
    /// runs unprotected.
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`AgentError::Unhealthy`] instead of starting
    /// disabled.
    pub fn start(config: AgentConfig, registry: &'static HookRegistry) -> Result<Self, AgentError> {
        logging::init(&config);

        let health = registry.health(&config.expected_version).err();
        match &health {
            None => tracing::info!(
                version = %config.expected_version,
                hooks = registry.table().map_or(0, HookTable::len),
                "agent started"
            ),
            Some(error) if config.strict => {
                tracing::error!(%error, "instrumentation unhealthy, refusing to start");
                return Err(AgentError::Unhealthy(error.clone()));
            }
            Some(error) => {
                tracing::warn!(%error, "instrumentation unhealthy, protection disabled");
            }
        }

        Ok(Self {
            config,
            registry,
            health,
            protected: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the agent's configuration.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns whether the startup health check passed.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.health.is_none()
    }

    /// Returns why the startup health check failed.
    #[must_use]
    pub fn health(&self) -> Option<&InstrumentationError> {
        self.health.as_ref()
    }

    /// Replaces the callbacks of the function known as `symbol`.
    ///
    /// Attaching nothing (or only `None`s) unprotects it.
    ///
    /// # Errors
    ///
    /// - [`AgentError::Unhealthy`] if the agent started disabled.
    /// - [`AgentError::UnknownHook`] if `symbol` is not instrumented.
    /// - [`AgentError::Instrumentation`] if the hook table is invalid.
    /// - [`AgentError::Attach`] if a callback does not fit; the previous
    ///   callbacks stay attached.
    ///
    /// Callback getters run while the agent's bookkeeping is locked; they
    /// must not call back into the agent.
    pub fn protect<I, C>(&self, symbol: &str, callbacks: I) -> Result<(), AgentError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Callback>>,
    {
        if let Some(error) = &self.health {
            return Err(AgentError::Unhealthy(error.clone()));
        }

        let hook = self
            .registry
            .find(symbol)?
            .ok_or_else(|| AgentError::UnknownHook {
                symbol: symbol.to_owned(),
            })?;

        // The map and the slot change together, under the same lock.
        let mut protected = self.protected.lock();
        hook.attach(callbacks)?;
        if hook.is_attached() {
            tracing::info!(hook = hook.symbol(), "function protected");
            protected.insert(hook.symbol(), hook);
        } else if protected.remove(hook.symbol()).is_some() {
            tracing::info!(hook = hook.symbol(), "function unprotected");
        }
        Ok(())
    }

    /// Detaches the callbacks this agent attached to `symbol`.
    ///
    /// Any spelling the registry resolves to the same hook works, such as a
    /// vendored path. Returns whether the function was protected by this
    /// agent.
    pub fn unprotect(&self, symbol: &str) -> bool {
        let Ok(Some(hook)) = self.registry.find(symbol) else {
            return false;
        };
        let mut protected = self.protected.lock();
        let Some(hook) = protected.remove(hook.symbol()) else {
            return false;
        };

        hook.detach();
        tracing::info!(hook = hook.symbol(), "function unprotected");
        true
    }

    /// Returns the symbols this agent currently protects, sorted.
    #[must_use]
    pub fn protected(&self) -> Vec<&'static str> {
        let mut symbols: Vec<_> = self.protected.lock().keys().copied().collect();
        symbols.sort_unstable();
        symbols
    }

    /// Detaches every callback this agent attached.
    ///
    /// The agent stays usable; functions can be protected again.
    pub fn shutdown(&self) {
        let mut protected = self.protected.lock();
        let count = protected.len();
        for (_, hook) in protected.drain() {
            hook.detach();
        }
        tracing::info!(hooks = count, "agent shut down");
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("health", &self.health)
            .field("protected", &self.protected())
            .finish_non_exhaustive()
    }
}
