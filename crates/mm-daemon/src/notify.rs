use std::sync::Arc;

use async_trait::async_trait;
use mm_actuator::{ActuatorError, Notifier};
use mm_schemas::{MatchId, ParticipantId};
use tokio::sync::broadcast;

use crate::state::BusMsg;

/// Delivers through the platform notifier, then mirrors each delivered
/// message onto the SSE bus. Undelivered messages are not mirrored.
pub struct BusNotifier {
    inner: Arc<dyn Notifier>,
    bus: broadcast::Sender<BusMsg>,
}

impl BusNotifier {
    pub fn new(inner: Arc<dyn Notifier>, bus: broadcast::Sender<BusMsg>) -> Self {
        Self { inner, bus }
    }
}

#[async_trait]
impl Notifier for BusNotifier {
    async fn announce(&self, match_id: &MatchId, message: &str) -> Result<(), ActuatorError> {
        self.inner.announce(match_id, message).await?;
        let _ = self.bus.send(BusMsg::Announcement {
            match_id: match_id.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn direct(&self, participant: &ParticipantId, message: &str) -> Result<(), ActuatorError> {
        self.inner.direct(participant, message).await?;
        let _ = self.bus.send(BusMsg::Direct {
            participant: participant.clone(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_testkit::SimPlatform;

    #[tokio::test]
    async fn delivered_messages_reach_the_bus() {
        let sim = Arc::new(SimPlatform::new());
        let (bus, mut rx) = broadcast::channel(8);
        let n = BusNotifier::new(sim.clone(), bus);

        n.announce(&MatchId::new("m1"), "hello").await.unwrap();
        match rx.recv().await.unwrap() {
            BusMsg::Announcement { match_id, message } => {
                assert_eq!(match_id, MatchId::new("m1"));
                assert_eq!(message, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(sim.announcements().len(), 1);
    }

    #[tokio::test]
    async fn refused_direct_is_not_mirrored() {
        let sim = Arc::new(SimPlatform::new());
        let pid = sim.add_member("quiet", false, None);
        sim.close_inbox(&pid);
        let (bus, mut rx) = broadcast::channel(8);
        let n = BusNotifier::new(sim, bus);

        assert!(n.direct(&pid, "psst").await.is_err());
        assert!(rx.try_recv().is_err());
    }
}
