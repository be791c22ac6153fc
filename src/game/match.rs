//! Match lifecycle state machine and the authoritative task

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchRules;
use crate::ws::protocol::{ClientMsg, ServerMsg, SpawnedPlayer};

use super::combat::{self, HitOutcome, Projectile};
use super::roster::{PlayerRecord, PlayerSummary, Roster};
use super::spawn::SpawnSelector;
use super::{PlayerId, Vec2};

/// Match lifecycle phase, owned by the authority and replicated read-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Not enough players yet
    Lobby,
    /// Countdown running before the round starts
    Waiting,
    /// Round in progress
    Game,
    /// Winner announced, rematch pending
    Finish,
}

/// Admission verdict returned to an approved connection
#[derive(Debug, Clone)]
pub struct Admission {
    pub player_id: PlayerId,
    pub spawn: Vec2,
    pub state: MatchPhase,
    pub players: Vec<PlayerSummary>,
}

/// Errors surfaced to a connecting client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("match is full")]
    MatchFull,
    #[error("session is already admitted")]
    DuplicateIdentity,
    #[error("match authority is not running")]
    Unavailable,
}

impl AdmissionError {
    /// Stable error code for the wire protocol
    pub fn code(&self) -> &'static str {
        match self {
            Self::MatchFull => "match_full",
            Self::DuplicateIdentity => "duplicate_identity",
            Self::Unavailable => "unavailable",
        }
    }
}

/// A player intent forwarded from a session in arrival order
#[derive(Debug, Clone)]
pub struct PlayerIntent {
    pub player_id: PlayerId,
    pub msg: ClientMsg,
}

/// Commands delivered to the authority mailbox
#[derive(Debug)]
pub enum Command {
    Connect {
        session: Uuid,
        display_name: String,
        loadout: u8,
        reply: oneshot::Sender<Result<Admission, AdmissionError>>,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Intent(PlayerIntent),
    /// Projectile-vs-player collision reported by the physics layer
    Hit {
        shooter: PlayerId,
        victim: PlayerId,
    },
    /// One-second countdown step; stale generations are discarded
    CountdownTick {
        generation: u64,
    },
    /// Finish-phase delay expired; stale generations are discarded
    FinishElapsed {
        generation: u64,
    },
}

/// Timer work the async shell must schedule after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    StartCountdown { generation: u64 },
    StartFinishDelay { generation: u64 },
}

/// Synchronous match logic. Owns the roster, the phase, and the countdown
/// value; collects observer notifications and timer directives for the shell
/// to flush after each command.
pub struct MatchCore {
    rules: MatchRules,
    roster: Roster,
    spawner: SpawnSelector,
    phase: MatchPhase,
    countdown: u32,
    /// Bumped on every transition; orphans any timer task still in flight
    generation: u64,
    next_player_id: PlayerId,
    events: Vec<ServerMsg>,
    directives: Vec<Directive>,
}

impl MatchCore {
    pub fn new(rules: MatchRules, spawner: SpawnSelector) -> Self {
        let countdown = rules.countdown_seconds;
        Self {
            rules,
            roster: Roster::new(),
            spawner,
            phase: MatchPhase::Lobby,
            countdown,
            generation: 0,
            next_player_id: 1,
            events: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Drain pending observer notifications
    pub fn take_events(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.events)
    }

    fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.directives)
    }

    /// Admission check: capacity gate, identity assignment, spawn placement.
    /// The spawn point is only computed for approved players.
    pub fn admit(
        &mut self,
        session: Uuid,
        display_name: String,
        loadout: u8,
    ) -> Result<Admission, AdmissionError> {
        if self.roster.len() >= self.rules.max_players {
            info!(
                players = self.roster.len(),
                "admission rejected: match full"
            );
            return Err(AdmissionError::MatchFull);
        }
        if self.roster.has_session(session) {
            warn!(%session, "admission rejected: session already admitted");
            return Err(AdmissionError::DuplicateIdentity);
        }

        let loadout = if loadout < self.rules.loadout_count {
            loadout
        } else {
            warn!(loadout, "loadout index out of range, defaulting to 0");
            0
        };

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        let record = PlayerRecord::new(
            player_id,
            session,
            display_name,
            loadout,
            self.rules.starting_health,
        );
        let summary = PlayerSummary::from(&record);
        if let Err(e) = self.roster.insert(record) {
            // Identity counter guarantees uniqueness; a collision is a
            // protocol bug, not a reason to tear down the match
            warn!(player_id, error = %e, "roster insert failed");
            return Err(AdmissionError::DuplicateIdentity);
        }

        let spawn = self.spawner.choose();

        info!(
            player_id,
            name = %summary.display_name,
            players = self.roster.len(),
            "player admitted"
        );
        self.events.push(ServerMsg::PlayerJoined {
            player: summary,
            spawn,
        });

        if self.phase == MatchPhase::Lobby && self.roster.len() >= self.rules.min_players {
            self.enter_waiting();
        }

        Ok(Admission {
            player_id,
            spawn,
            state: self.phase,
            players: self.roster.summaries(),
        })
    }

    /// Remove a player; forces the match back to the lobby when too few
    /// players remain
    pub fn disconnect(&mut self, player_id: PlayerId) {
        let Some(record) = self.roster.remove(player_id) else {
            debug!(player_id, "disconnect for unknown player");
            return;
        };

        info!(
            player_id,
            name = %record.display_name,
            players = self.roster.len(),
            "player disconnected"
        );
        self.events.push(ServerMsg::PlayerLeft {
            player_id,
            display_name: record.display_name,
        });

        if self.phase != MatchPhase::Lobby && self.roster.len() < self.rules.min_players {
            info!(players = self.roster.len(), "below minimum, back to lobby");
            self.reset_all();
            self.enter_lobby();
        }
    }

    fn handle_intent(&mut self, intent: PlayerIntent) {
        let PlayerIntent { player_id, msg } = intent;
        match msg {
            // Movement integration is external; the authority only vouches
            // for the sender
            ClientMsg::Move { .. } | ClientMsg::Jump => {
                if self.roster.get(player_id).is_none() {
                    debug!(player_id, "movement intent from unknown player");
                }
            }
            ClientMsg::Fire { direction } => self.fire(player_id, direction),
            ClientMsg::SetLoadout { index } => self.set_loadout(player_id, index),
            ClientMsg::SetDisplayName { name } => self.set_display_name(player_id, name),
        }
    }

    /// Spawn a shooter-tagged projectile for the physics layer
    fn fire(&mut self, player_id: PlayerId, direction: Vec2) {
        if self.phase != MatchPhase::Game {
            debug!(player_id, phase = ?self.phase, "fire intent outside game");
            return;
        }
        if self.roster.get(player_id).is_none() {
            debug!(player_id, "fire intent from unknown player");
            return;
        }
        let projectile = Projectile::new(player_id, direction);
        self.events.push(ServerMsg::ShotFired {
            shooter: projectile.shooter,
            direction: projectile.direction,
        });
    }

    fn set_loadout(&mut self, player_id: PlayerId, index: u8) {
        if index >= self.rules.loadout_count {
            warn!(player_id, index, "loadout index out of range, ignored");
            return;
        }
        let Some(record) = self.roster.get_mut(player_id) else {
            debug!(player_id, "loadout intent from unknown player");
            return;
        };
        record.loadout = index;
        self.events
            .push(ServerMsg::LoadoutChanged { player_id, index });
    }

    fn set_display_name(&mut self, player_id: PlayerId, name: String) {
        let Some(record) = self.roster.get_mut(player_id) else {
            debug!(player_id, "name intent from unknown player");
            return;
        };
        record.display_name = if name.trim().is_empty() {
            format!("player{}", player_id)
        } else {
            name
        };
        let name = record.display_name.clone();
        self.events.push(ServerMsg::NameChanged { player_id, name });
    }

    /// Adjudicate a projectile-vs-player collision. The projectile is gone
    /// whatever the outcome; only in-game hits mutate state.
    pub fn hit(&mut self, shooter: PlayerId, victim: PlayerId) {
        if self.phase != MatchPhase::Game {
            debug!(shooter, victim, phase = ?self.phase, "hit outside game ignored");
            return;
        }

        match combat::resolve_hit(&mut self.roster, shooter, victim) {
            HitOutcome::SelfHitIgnored => {
                debug!(shooter, "self hit ignored");
            }
            HitOutcome::VictimMissing => {
                warn!(shooter, victim, "hit references unknown victim");
            }
            HitOutcome::Damaged { remaining } => {
                self.events.push(ServerMsg::HealthChanged {
                    player_id: victim,
                    health: remaining,
                });
            }
            HitOutcome::Killed => {
                self.events.push(ServerMsg::HealthChanged {
                    player_id: victim,
                    health: 0,
                });

                let killer = match self.roster.get_mut(shooter) {
                    Some(killer) => {
                        killer.kills += 1;
                        let kills = killer.kills;
                        let name = killer.display_name.clone();
                        self.events.push(ServerMsg::KillsChanged {
                            player_id: shooter,
                            kills,
                        });
                        info!(shooter, victim, kills, "kill registered");
                        Some((kills, name))
                    }
                    None => {
                        // Shooter disconnected mid-flight; the death stands
                        // but nobody is credited
                        warn!(shooter, victim, "kill report for unknown shooter");
                        None
                    }
                };

                self.respawn(victim);

                if let Some((kills, name)) = killer {
                    if kills >= self.rules.win_threshold {
                        self.enter_finish(shooter, name);
                    }
                }
            }
        }
    }

    fn countdown_tick(&mut self, generation: u64) {
        if self.phase != MatchPhase::Waiting || generation != self.generation {
            debug!(generation, current = self.generation, "stale countdown tick");
            return;
        }
        self.countdown = self.countdown.saturating_sub(1);
        self.events.push(ServerMsg::CountdownTick {
            seconds: self.countdown,
        });
        if self.countdown == 0 {
            self.enter_game();
        }
    }

    fn finish_elapsed(&mut self, generation: u64) {
        if self.phase != MatchPhase::Finish || generation != self.generation {
            debug!(generation, current = self.generation, "stale finish timer");
            return;
        }
        self.reset_all();
        if self.roster.len() >= self.rules.min_players {
            self.enter_waiting();
        } else {
            self.enter_lobby();
        }
    }

    fn enter_waiting(&mut self) {
        self.phase = MatchPhase::Waiting;
        self.generation += 1;
        self.countdown = self.rules.countdown_seconds;
        info!(countdown = self.countdown, "entering waiting");
        self.events.push(ServerMsg::MatchStateChanged {
            state: MatchPhase::Waiting,
        });
        self.events.push(ServerMsg::CountdownTick {
            seconds: self.countdown,
        });
        self.directives.push(Directive::StartCountdown {
            generation: self.generation,
        });
    }

    fn enter_game(&mut self) {
        self.phase = MatchPhase::Game;
        self.generation += 1;
        info!(players = self.roster.len(), "entering game");
        self.reset_all();
        self.events.push(ServerMsg::MatchStateChanged {
            state: MatchPhase::Game,
        });
    }

    fn enter_finish(&mut self, winner: PlayerId, name: String) {
        self.phase = MatchPhase::Finish;
        self.generation += 1;
        info!(winner, name = %name, "match finished");
        self.events.push(ServerMsg::MatchStateChanged {
            state: MatchPhase::Finish,
        });
        self.events.push(ServerMsg::WinnerAnnounced {
            player_id: winner,
            name,
        });
        self.directives.push(Directive::StartFinishDelay {
            generation: self.generation,
        });
    }

    fn enter_lobby(&mut self) {
        self.phase = MatchPhase::Lobby;
        self.generation += 1;
        self.countdown = self.rules.countdown_seconds;
        info!("entering lobby");
        self.events.push(ServerMsg::MatchStateChanged {
            state: MatchPhase::Lobby,
        });
    }

    /// Atomic respawn: full heal plus a freshly chosen spawn point
    fn respawn(&mut self, player_id: PlayerId) {
        let starting_health = self.rules.starting_health;
        let spawn = self.spawner.choose();
        if let Some(record) = self.roster.get_mut(player_id) {
            record.health = starting_health;
            self.events.push(ServerMsg::Respawned {
                player_id,
                spawn,
                health: starting_health,
            });
        }
    }

    /// Reset every record (kills to zero, full heal, fresh spawn) and tell
    /// observers in one message
    fn reset_all(&mut self) {
        let starting_health = self.rules.starting_health;
        let mut players = Vec::with_capacity(self.roster.len());
        let ids = self.roster.ids();
        for id in ids {
            let spawn = self.spawner.choose();
            if let Some(record) = self.roster.get_mut(id) {
                record.kills = 0;
                record.health = starting_health;
                players.push(SpawnedPlayer {
                    player: PlayerSummary::from(&*record),
                    spawn,
                });
            }
        }
        players.sort_by_key(|p| p.player.id);
        self.events.push(ServerMsg::RosterReset { players });
    }
}

/// Handle to the running match authority
#[derive(Clone)]
pub struct MatchHandle {
    command_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ServerMsg>,
    phase_rx: watch::Receiver<MatchPhase>,
    roster_rx: watch::Receiver<Vec<PlayerSummary>>,
}

impl MatchHandle {
    /// Request admission for a new connection
    pub async fn connect(
        &self,
        session: Uuid,
        display_name: String,
        loadout: u8,
    ) -> Result<Admission, AdmissionError> {
        let (reply, verdict) = oneshot::channel();
        self.command_tx
            .send(Command::Connect {
                session,
                display_name,
                loadout,
                reply,
            })
            .await
            .map_err(|_| AdmissionError::Unavailable)?;
        verdict.await.map_err(|_| AdmissionError::Unavailable)?
    }

    /// Remove a player after its transport session ends
    pub async fn disconnect(&self, player_id: PlayerId) {
        let _ = self.command_tx.send(Command::Disconnect { player_id }).await;
    }

    /// Forward a player intent in arrival order
    pub async fn intent(&self, player_id: PlayerId, msg: ClientMsg) {
        let _ = self
            .command_tx
            .send(Command::Intent(PlayerIntent { player_id, msg }))
            .await;
    }

    /// Entry point for the physics layer's collision reports
    pub async fn report_hit(&self, shooter: PlayerId, victim: PlayerId) {
        let _ = self.command_tx.send(Command::Hit { shooter, victim }).await;
    }

    /// Subscribe to observer notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Current replicated phase
    pub fn phase(&self) -> MatchPhase {
        *self.phase_rx.borrow()
    }

    /// Replicated roster snapshot
    pub fn roster(&self) -> Vec<PlayerSummary> {
        self.roster_rx.borrow().clone()
    }

    pub fn player_count(&self) -> usize {
        self.roster_rx.borrow().len()
    }
}

/// The authority task: single owner of all match state. Drains the mailbox,
/// applies commands to the core, then flushes notifications and timers.
pub struct MatchTask {
    core: MatchCore,
    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
    events_tx: broadcast::Sender<ServerMsg>,
    phase_tx: watch::Sender<MatchPhase>,
    roster_tx: watch::Sender<Vec<PlayerSummary>>,
}

impl MatchTask {
    /// Create the authority and its handle
    pub fn new(rules: MatchRules, spawner: SpawnSelector) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(256);
        let (phase_tx, phase_rx) = watch::channel(MatchPhase::Lobby);
        let (roster_tx, roster_rx) = watch::channel(Vec::new());

        let handle = MatchHandle {
            command_tx: command_tx.clone(),
            events_tx: events_tx.clone(),
            phase_rx,
            roster_rx,
        };

        let task = Self {
            core: MatchCore::new(rules, spawner),
            command_tx,
            command_rx,
            events_tx,
            phase_tx,
            roster_tx,
        };

        (task, handle)
    }

    /// Run the authority loop for the lifetime of the process
    pub async fn run(mut self) {
        info!("match authority started");
        while let Some(cmd) = self.command_rx.recv().await {
            let reply = self.dispatch(cmd);
            // Flush before answering an admission so the caller never
            // observes replicated state older than its own verdict
            self.flush();
            if let Some((tx, verdict)) = reply {
                // The connection may have dropped while queued; nothing to do
                let _ = tx.send(verdict);
            }
        }
        info!("match authority stopped");
    }

    #[allow(clippy::type_complexity)]
    fn dispatch(
        &mut self,
        cmd: Command,
    ) -> Option<(
        oneshot::Sender<Result<Admission, AdmissionError>>,
        Result<Admission, AdmissionError>,
    )> {
        match cmd {
            Command::Connect {
                session,
                display_name,
                loadout,
                reply,
            } => {
                let verdict = self.core.admit(session, display_name, loadout);
                Some((reply, verdict))
            }
            Command::Disconnect { player_id } => {
                self.core.disconnect(player_id);
                None
            }
            Command::Intent(intent) => {
                self.core.handle_intent(intent);
                None
            }
            Command::Hit { shooter, victim } => {
                self.core.hit(shooter, victim);
                None
            }
            Command::CountdownTick { generation } => {
                self.core.countdown_tick(generation);
                None
            }
            Command::FinishElapsed { generation } => {
                self.core.finish_elapsed(generation);
                None
            }
        }
    }

    fn flush(&mut self) {
        // Publish the phase first so a timer task waking mid-flush sees the
        // fresh value
        let phase = self.core.phase();
        if *self.phase_tx.borrow() != phase {
            let _ = self.phase_tx.send(phase);
        }
        self.roster_tx.send_replace(self.core.roster().summaries());

        for directive in self.core.take_directives() {
            match directive {
                Directive::StartCountdown { generation } => self.spawn_countdown(generation),
                Directive::StartFinishDelay { generation } => self.spawn_finish_delay(generation),
            }
        }

        for event in self.core.take_events() {
            // Err means no subscribers right now; that's fine
            let _ = self.events_tx.send(event);
        }
    }

    /// One countdown task per waiting phase. It re-checks the replicated
    /// phase after every sleep and exits silently once the phase moved on;
    /// the generation stamp discards any tick that still slips through.
    fn spawn_countdown(&self, generation: u64) {
        let command_tx = self.command_tx.clone();
        let phase_rx = self.phase_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if *phase_rx.borrow() != MatchPhase::Waiting {
                    return;
                }
                if command_tx
                    .send(Command::CountdownTick { generation })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
    }

    fn spawn_finish_delay(&self, generation: u64) {
        let command_tx = self.command_tx.clone();
        let delay = Duration::from_secs(self.core.rules().finish_delay_seconds);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = command_tx.send(Command::FinishElapsed { generation }).await;
        });
    }
}
