use crate::session::{
    MediaSession, SenderId, SessionEventKind, SessionEventSink, SessionFactory, SignalingState,
    TransportState,
};
use crate::tracks::LocalTrack;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use meshcall_core::{
    IceCandidate, IceServerConfig, SdpType, SessionDescription, TrackId, TrackKind,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

type MediaTracks = Arc<DashMap<TrackId, Arc<TrackLocalStaticSample>>>;

/// Creates webrtc-rs backed sessions.
///
/// Every local track is one `TrackLocalStaticSample` shared by all sessions,
/// so a sample written once reaches every remote participant sending it.
pub struct RtcSessionFactory {
    api: API,
    media: MediaTracks,
    stream_id: String,
}

impl RtcSessionFactory {
    pub fn new(stream_id: impl Into<String>) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            media: Arc::new(DashMap::new()),
            stream_id: stream_id.into(),
        })
    }

    /// Feed one encoded media sample into the local track `track_id`.
    pub async fn write_sample(
        &self,
        track_id: TrackId,
        data: Bytes,
        duration: Duration,
    ) -> Result<()> {
        let track = self
            .media
            .get(&track_id)
            .map(|t| Arc::clone(t.value()))
            .with_context(|| format!("Track {} is not sent to anyone", track_id))?;

        track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    pub fn is_sending(&self, track_id: TrackId) -> bool {
        self.media.contains_key(&track_id)
    }
}

#[async_trait]
impl SessionFactory for RtcSessionFactory {
    async fn create(
        &self,
        events: SessionEventSink,
        ice_servers: &[IceServerConfig],
    ) -> Result<Box<dyn MediaSession>> {
        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(self.api.new_peer_connection(rtc_config).await?);
        register_callbacks(&peer_connection, &events);

        info!(
            "Created peer connection for {} (session {})",
            events.participant_id(),
            events.session_id()
        );

        Ok(Box::new(RtcSession {
            peer_connection,
            senders: Mutex::new(HashMap::new()),
            media: Arc::clone(&self.media),
            stream_id: self.stream_id.clone(),
        }))
    }

    fn release_track(&self, track_id: TrackId) {
        if self.media.remove(&track_id).is_some() {
            debug!("Released local track {}", track_id);
        }
    }
}

fn register_callbacks(peer_connection: &RTCPeerConnection, events: &SessionEventSink) {
    let state_events = events.clone();
    peer_connection.on_peer_connection_state_change(Box::new(
        move |s: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                debug!(
                    "Peer connection state for {}: {:?}",
                    events.participant_id(),
                    s
                );
                let state = match s {
                    RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                        TransportState::New
                    }
                    RTCPeerConnectionState::Connecting => TransportState::Connecting,
                    RTCPeerConnectionState::Connected => TransportState::Connected,
                    RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                    RTCPeerConnectionState::Failed => TransportState::Failed,
                    RTCPeerConnectionState::Closed => TransportState::Closed,
                };
                events.emit(SessionEventKind::TransportStateChanged(state));
            })
        },
    ));

    let ice_events = events.clone();
    peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
        let events = ice_events.clone();
        Box::pin(async move {
            let Some(candidate) = c else { return };
            let Ok(init) = candidate.to_json() else {
                return;
            };
            events.emit(SessionEventKind::LocalCandidate(IceCandidate {
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_m_line_index: init.sdp_mline_index,
            }));
        })
    }));

    let track_events = events.clone();
    peer_connection.on_track(Box::new(
        move |track: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let events = track_events.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    RTPCodecType::Unspecified => return,
                };
                events.emit(SessionEventKind::RemoteTrack {
                    kind,
                    track_id: track.id(),
                });
            })
        },
    ));
}

/// webrtc-rs peer connection behind [`MediaSession`].
pub struct RtcSession {
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<SenderId, Arc<RTCRtpSender>>>,
    media: MediaTracks,
    stream_id: String,
}

impl RtcSession {
    fn media_track(&self, track: &LocalTrack) -> Arc<dyn TrackLocal + Send + Sync> {
        let mime_type = match track.kind() {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };

        self.media
            .entry(track.id)
            .or_insert_with(|| {
                Arc::new(TrackLocalStaticSample::new(
                    RTCRtpCodecCapability {
                        mime_type: mime_type.to_owned(),
                        ..Default::default()
                    },
                    track.id.to_string(),
                    self.stream_id.clone(),
                ))
            })
            .value()
            .clone()
    }

    async fn sender(&self, sender: SenderId) -> Result<Arc<RTCRtpSender>> {
        self.senders
            .lock()
            .await
            .get(&sender)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown sender {:?}", sender))
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription> {
    match description.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(description.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(description.sdp)),
        other => bail!("Unexpected description type {:?}", other),
    }
}

#[async_trait]
impl MediaSession for RtcSession {
    fn signaling_state(&self) -> SignalingState {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::Unspecified | RTCSignalingState::Stable => SignalingState::Stable,
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveRemotePranswer => {
                SignalingState::HaveLocalOffer
            }
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer => {
                SignalingState::HaveRemoteOffer
            }
            RTCSignalingState::Closed => SignalingState::Closed,
        }
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let rollback: RTCSessionDescription =
            serde_json::from_value(json!({ "type": "rollback", "sdp": "" }))
                .context("Failed to build rollback description")?;
        self.peer_connection.set_local_description(rollback).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await?;
        Ok(())
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId> {
        let rtp_sender = self
            .peer_connection
            .add_track(self.media_track(track))
            .await?;

        // RTCP has to be read for interceptors like NACK to work.
        let rtcp_sender = Arc::clone(&rtp_sender);
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        let sender_id = SenderId::new();
        self.senders.lock().await.insert(sender_id, rtp_sender);
        Ok(sender_id)
    }

    async fn replace_track(&self, sender: SenderId, track: &LocalTrack) -> Result<()> {
        let rtp_sender = self.sender(sender).await?;
        rtp_sender
            .replace_track(Some(self.media_track(track)))
            .await?;
        Ok(())
    }

    async fn remove_track(&self, sender: SenderId) -> Result<()> {
        let rtp_sender = self.sender(sender).await?;
        self.peer_connection.remove_track(&rtp_sender).await?;
        self.senders.lock().await.remove(&sender);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
