use crate::engine::{EngineInput, LinkLossReason, NegotiationEngine};
use meshcall_core::ParticipantId;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

impl NegotiationEngine {
    /// Tear down every link whose offer has waited longer than the answer
    /// timeout.
    pub async fn check_timeouts(&mut self, now: Instant) {
        let timeout = self.config.answer_timeout;
        let overdue = self
            .links
            .iter()
            .filter(|(_, link)| link.answer_overdue(now, timeout))
            .map(|(id, _)| id.clone())
            .collect::<Vec<ParticipantId>>();

        for id in overdue {
            warn!("No answer from {} within {:?}", id, timeout);
            self.drop_link(&id, LinkLossReason::AnswerTimeout).await;
        }
    }

    pub async fn handle_input(&mut self, input: EngineInput) {
        match input {
            EngineInput::JoinMeeting => self.join_meeting(),
            EngineInput::JoinCall => self.join_call(),
            EngineInput::LeaveCall => {
                if let Err(e) = self.leave_call().await {
                    warn!("Cannot leave: {}", e);
                }
            }
            EngineInput::Server(msg) => self.handle_server_message(msg).await,
            EngineInput::TracksChanged(tracks) => self.on_local_track_set_changed(tracks).await,
            EngineInput::SignalingClosed => self.signaling_closed().await,
        }
    }

    /// Drive the engine until its input channel closes.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<EngineInput>) {
        info!("Negotiation engine for {} started", self.local_id());

        let mut ticker = tokio::time::interval(self.config.timeout_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input).await,
                    None => {
                        self.signaling_closed().await;
                        break;
                    }
                },
                Some(event) = self.session_rx.recv() => self.handle_session_event(event).await,
                _ = ticker.tick() => self.check_timeouts(Instant::now()).await,
            }
        }

        info!("Negotiation engine for {} stopped", self.local_id());
    }
}
