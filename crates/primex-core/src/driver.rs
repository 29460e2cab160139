//! Session driver
//!
//! Runs a [`PlaybackController`] on its own task. Commands from the view
//! layer, engine events and finished resolutions are funnelled through one
//! `select!` loop, so the session is only ever touched by that task.
//! Resolutions run on spawned tasks and may overlap; the controller's ticket
//! check drops the ones that lost the race.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::Episode;
use crate::engine::EngineEventReceiver;
use crate::resolver::{Resolution, SourceResolver};
use crate::session::{LoadTicket, PlaybackController, SessionSnapshot};
use crate::{Error, Result, Server, SessionId, Track};

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    LoadEpisode(String, Reply<()>),
    ChangeServer {
        episode_id: String,
        server: Server,
        track: Track,
        reply: Reply<()>,
    },
    SelectQuality(usize, Reply<()>),
    NextEpisode(Reply<bool>),
    PrevEpisode(Reply<bool>),
    SetEpisodes(Vec<Episode>),
    Stop(Reply<()>),
    Shutdown,
}

struct SessionDriver {
    controller: PlaybackController,
    resolver: Arc<SourceResolver>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: EngineEventReceiver,
    resolved_tx: mpsc::UnboundedSender<(LoadTicket, Resolution)>,
    resolved_rx: mpsc::UnboundedReceiver<(LoadTicket, Resolution)>,
}

impl SessionDriver {
    async fn run(mut self) {
        info!(session_id = %self.controller.id(), "Session driver started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events.recv() => {
                    if let Err(e) = self.controller.handle_engine_event(event) {
                        warn!(error = %e, "Engine event rejected");
                    }
                }
                Some((ticket, resolution)) = self.resolved_rx.recv() => {
                    if let Err(e) = self.controller.apply_resolution(&ticket, resolution) {
                        warn!(error = %e, "Resolution rejected");
                    }
                }
            }
        }

        if let Err(e) = self.controller.stop() {
            debug!(error = %e, "Stop on shutdown");
        }
        info!(session_id = %self.controller.id(), "Session driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::LoadEpisode(episode_id, reply) => {
                let result = self.controller.begin_load(&episode_id);
                let _ = reply.send(self.dispatch(result));
            }
            Command::ChangeServer {
                episode_id,
                server,
                track,
                reply,
            } => {
                let result = self
                    .controller
                    .begin_change_server(&episode_id, server, track);
                let _ = reply.send(self.dispatch(result));
            }
            Command::SelectQuality(index, reply) => {
                let _ = reply.send(self.controller.select_quality(index));
            }
            Command::NextEpisode(reply) => {
                let result = self.controller.begin_next_episode();
                let _ = reply.send(self.dispatch_optional(result));
            }
            Command::PrevEpisode(reply) => {
                let result = self.controller.begin_prev_episode();
                let _ = reply.send(self.dispatch_optional(result));
            }
            Command::SetEpisodes(episodes) => self.controller.set_episodes(episodes),
            Command::Stop(reply) => {
                let _ = reply.send(self.controller.stop());
            }
            Command::Shutdown => {}
        }
    }

    fn dispatch(&self, ticket: Result<LoadTicket>) -> Result<()> {
        let ticket = ticket?;
        self.spawn_resolution(ticket);
        Ok(())
    }

    fn dispatch_optional(&self, ticket: Result<Option<LoadTicket>>) -> Result<bool> {
        match ticket? {
            Some(ticket) => {
                self.spawn_resolution(ticket);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn spawn_resolution(&self, ticket: LoadTicket) {
        let resolver = self.resolver.clone();
        let resolved = self.resolved_tx.clone();
        tokio::spawn(async move {
            let resolution = ticket.resolve(&resolver).await;
            let _ = resolved.send((ticket, resolution));
        });
    }
}

/// Handle to a running session driver
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

/// Move `controller` onto its own task
pub fn spawn(
    controller: PlaybackController,
    resolver: Arc<SourceResolver>,
    events: EngineEventReceiver,
) -> SessionHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
    let id = controller.id();
    let state = controller.subscribe();

    let driver = SessionDriver {
        controller,
        resolver,
        commands: commands_rx,
        events,
        resolved_tx,
        resolved_rx,
    };

    SessionHandle {
        id,
        commands: commands_tx,
        state,
        task: tokio::spawn(driver.run()),
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::DriverClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response.await.map_err(|_| Error::DriverClosed)?
    }

    /// Start loading an episode; returns once the session is Loading
    pub async fn load_episode(&self, episode_id: impl Into<String>) -> Result<()> {
        let episode_id = episode_id.into();
        self.request(|reply| Command::LoadEpisode(episode_id, reply))
            .await
    }

    pub async fn change_server(
        &self,
        episode_id: impl Into<String>,
        server: Server,
        track: Track,
    ) -> Result<()> {
        let episode_id = episode_id.into();
        self.request(|reply| Command::ChangeServer {
            episode_id,
            server,
            track,
            reply,
        })
        .await
    }

    pub async fn select_quality(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::SelectQuality(index, reply))
            .await
    }

    /// Returns false at the end of the episode list
    pub async fn next_episode(&self) -> Result<bool> {
        self.request(Command::NextEpisode).await
    }

    /// Returns false at the start of the episode list
    pub async fn prev_episode(&self) -> Result<bool> {
        self.request(Command::PrevEpisode).await
    }

    pub fn set_episodes(&self, episodes: Vec<Episode>) -> Result<()> {
        self.send(Command::SetEpisodes(episodes))
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Wait until the session is Playing or Failed
    pub async fn wait_until_settled(&self) -> Result<SessionSnapshot> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(|s| s.is_settled())
            .await
            .map_err(|_| Error::DriverClosed)?;
        Ok(snapshot.clone())
    }

    /// Stop the driver and wait for it to exit
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|_| Error::DriverClosed)
    }
}
