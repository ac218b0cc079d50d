//! A mounted dashboard.

use crate::{DashboardState, Outcome};
use chrono::Local;
use relay_broker::{BrokerResult, Subscribe, Subscription};
use relay_core::Topic;

/// Dashboard bound to one topic for as long as it is mounted.
///
/// Each view owns its own subscription. Unmounting (or dropping the view) unsubscribes, so no
/// listener outlives the view.
pub struct LiveView {
    subscription: Subscription,
    state: DashboardState,
}

impl LiveView {
    /// Subscribes to `topic`. The view starts out `Connecting` with no data.
    pub async fn mount<S>(broker: &S, topic: &Topic) -> BrokerResult<Self>
    where
        S: Subscribe + ?Sized,
    {
        let subscription = broker.subscribe(topic).await?;
        tracing::info!("dashboard mounted on {}/{}", topic.channel(), topic.event());
        Ok(Self {
            subscription,
            state: DashboardState::new(),
        })
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Waits for the next broker event and applies it, stamped with the local receipt time.
    /// Returns `None` once the subscription has ended.
    pub async fn step(&mut self) -> Option<Outcome> {
        let event = self.subscription.next().await?;
        Some(self.state.apply(event, Local::now()))
    }

    pub async fn unmount(self) {
        self.subscription.unsubscribe().await;
        tracing::info!("dashboard unmounted");
    }
}
