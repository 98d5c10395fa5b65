//! Navigation controller
//!
//! Single source of truth for which screen is visible, and the only component
//! allowed to change it. Forward navigation pushes the departed screen onto a
//! back stack; backward navigation releases the resources of the screen being
//! left (in-flight acquisition, playback, wake lock) before popping.
//!
//! Invariant: the active screen is never on the stack.

use crate::config::NavigationConfig;
use crate::host::{HostHistory, Presenter};
use crate::types::{Event, ScreenId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Something a screen owns that must stop when the screen is left
#[async_trait::async_trait]
pub trait ScreenResources: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Stop and release; must be idempotent and must not return before the resource is released
    async fn release(&self);
}

/// Screen stack and host back-signal reconciliation
pub struct NavigationController {
    active: ScreenId,
    stack: Vec<ScreenId>,
    resources: HashMap<ScreenId, Vec<Arc<dyn ScreenResources>>>,
    presenter: Arc<dyn Presenter>,
    history: Arc<dyn HostHistory>,
    event_tx: broadcast::Sender<Event>,
    focus_delay: Duration,
    /// Bumped on every activation; a pending focus handoff only runs if it is still current
    generation: Arc<AtomicU64>,
}

impl NavigationController {
    /// Create a controller whose active screen is `initial`
    ///
    /// Nothing is shown until [`NavigationController::show_screen`] is called.
    pub fn new(
        initial: ScreenId,
        config: &NavigationConfig,
        presenter: Arc<dyn Presenter>,
        history: Arc<dyn HostHistory>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            active: initial,
            stack: Vec::new(),
            resources: HashMap::new(),
            presenter,
            history,
            event_tx,
            focus_delay: config.focus_delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make `screen` the active screen without touching the back stack
    ///
    /// Records the position with the host history, notifies the presenter and
    /// schedules the focus handoff after the configured delay. The handoff is
    /// skipped if another screen is activated first.
    pub fn show_screen(&mut self, screen: ScreenId) {
        if let Some(index) = self.stack.iter().position(|s| *s == screen) {
            tracing::debug!(screen = %screen, "activated screen removed from back stack");
            self.stack.remove(index);
        }

        let previous = self.active;
        self.active = screen;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.history.push_position(screen);
        self.presenter.screen_activated(screen);
        self.event_tx
            .send(Event::ScreenActivated {
                screen,
                depth: self.stack.len(),
            })
            .ok();
        tracing::debug!(from = %previous, to = %screen, depth = self.stack.len(), "screen activated");

        self.schedule_focus(screen, generation);
    }

    fn schedule_focus(&self, screen: ScreenId, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(screen = %screen, "no runtime available, focus handoff skipped");
            return;
        };

        let presenter = self.presenter.clone();
        let current = self.generation.clone();
        let delay = self.focus_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                presenter.focus_default(screen);
            }
        });
    }

    /// Forward navigation: push the active screen, then show `screen`
    ///
    /// Returns `false` without changing anything when `screen` is already
    /// active or already on the back stack.
    pub fn navigate_to(&mut self, screen: ScreenId) -> bool {
        if screen == self.active {
            tracing::debug!(screen = %screen, "already on screen, navigation ignored");
            return false;
        }
        if self.stack.contains(&screen) {
            tracing::warn!(
                screen = %screen,
                active = %self.active,
                "screen is already on the back stack, navigation refused"
            );
            return false;
        }

        self.stack.push(self.active);
        self.show_screen(screen);
        true
    }

    /// Backward navigation
    ///
    /// With an empty stack this is a no-op returning `false`. Otherwise every
    /// resource registered for the active screen is released (and awaited)
    /// before the previous screen is shown.
    pub async fn go_back(&mut self) -> bool {
        let Some(&previous) = self.stack.last() else {
            tracing::debug!(screen = %self.active, "back at root, nothing to do");
            return false;
        };

        self.release_screen(self.active).await;

        self.stack.pop();
        self.show_screen(previous);
        true
    }

    /// Host back signal
    ///
    /// Re-asserts the current logical position with the host so its native
    /// history cannot leave the application, then goes back.
    pub async fn on_host_back(&mut self) -> bool {
        self.history.push_position(self.active);
        self.go_back().await
    }

    /// Attach a resource to `screen`, released whenever the screen is left backwards
    pub fn register_resources(&mut self, screen: ScreenId, resources: Arc<dyn ScreenResources>) {
        tracing::debug!(screen = %screen, resource = resources.name(), "resources registered");
        self.resources.entry(screen).or_default().push(resources);
    }

    /// Release every screen's resources, clear the back stack and show `root`
    pub async fn reset_to(&mut self, root: ScreenId) {
        self.release_all().await;
        self.stack.clear();
        self.show_screen(root);
    }

    /// Release the resources of every screen, keeping the active screen
    pub async fn release_all(&mut self) {
        for screen in ScreenId::ALL {
            self.release_screen(screen).await;
        }
    }

    async fn release_screen(&self, screen: ScreenId) {
        let Some(resources) = self.resources.get(&screen) else {
            return;
        };
        for resource in resources {
            tracing::debug!(screen = %screen, resource = resource.name(), "releasing resources");
            resource.release().await;
        }
    }

    /// The active screen
    pub fn active(&self) -> ScreenId {
        self.active
    }

    /// The back stack, oldest first
    pub fn stack(&self) -> &[ScreenId] {
        &self.stack
    }

    /// Number of screens on the back stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether `screen` is the active screen
    pub fn is_active(&self, screen: ScreenId) -> bool {
        self.active == screen
    }
}
