use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::detector::{self, MoveIntent, Violation};
use crate::events::{Announcement, RoundEvent, VictoryStats};
use crate::player::{PlayerId, PlayerStatus, Position, SPAWN_POSITION};
use crate::round::{EliminationReason, Phase, Round, RoundOutcome};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::signal::{Signal, SignalController};

/// Offsets (ms into `Preparing`) of the scripted announcements.
const PREPARING_SCRIPT: [(u64, Announcement); 4] = [
    (1000, Announcement::Welcome),
    (4000, Announcement::Rules),
    (8000, Announcement::Instructions),
    (12_000, Announcement::Warning),
];

/// Every delayed action in a round, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTimer {
    Announce(Announcement),
    BeginCountdown,
    CountdownStep,
    PlaySecond,
    RedLightEnds,
    EliminationDone,
}

/// The player this client owns and mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPlayer {
    pub id: PlayerId,
    /// `None` until presence assigns a slot; movement is ignored until then.
    pub slot_number: Option<u16>,
    pub position: Position,
    pub status: PlayerStatus,
}

/// Drives one client's round: ticks the state machine, runs the light,
/// checks every movement sample and reports what happened as events.
pub struct RoundController {
    config: RoundConfig,
    round: Round,
    signal: SignalController,
    scheduler: Scheduler<RoundTimer>,
    rng: StdRng,
    local: LocalPlayer,
    remote_alive: u32,
    countdown_timer: Option<TimerHandle>,
    play_timer: Option<TimerHandle>,
    red_timer: Option<TimerHandle>,
}

impl RoundController {
    pub fn new(config: RoundConfig, player_id: PlayerId) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            round: Round::new(&config),
            signal: SignalController::new(&config),
            scheduler: Scheduler::new(),
            rng,
            local: LocalPlayer {
                id: player_id,
                slot_number: None,
                position: SPAWN_POSITION,
                status: PlayerStatus::Alive,
            },
            remote_alive: 0,
            countdown_timer: None,
            play_timer: None,
            red_timer: None,
            config,
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn phase(&self) -> Phase {
        self.round.phase
    }

    pub fn signal(&self) -> Signal {
        self.signal.signal()
    }

    pub fn local_player(&self) -> &LocalPlayer {
        &self.local
    }

    /// Timers still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Virtual time since the controller was created (ms).
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// Record the slot presence handed out. Unlocks movement.
    pub fn assign_slot(&mut self, slot: u16) {
        tracing::debug!(slot, player_id = %self.local.id, "Slot assigned");
        self.local.slot_number = Some(slot);
    }

    /// Number of remote players still alive, used for the victory stats.
    pub fn set_remote_alive(&mut self, count: u32) {
        self.remote_alive = count;
    }

    /// The presentation layer finished loading.
    pub fn assets_ready(&mut self) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        if self.round.phase == Phase::Loading {
            self.enter(Phase::Preparing, &mut events);
        }
        events
    }

    /// Start over after a round ended. Ignored in every other phase.
    ///
    /// The round is back in `Preparing` at once, but its script only starts
    /// after `restart_delay_ms`.
    pub fn request_restart(&mut self) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        if !self.round.phase.is_ended() {
            tracing::debug!(phase = ?self.round.phase, "Ignoring restart outside Ended");
            return events;
        }

        // Stale callbacks from the old round must never reach the new one.
        self.scheduler.cancel_all();
        self.countdown_timer = None;
        self.play_timer = None;
        self.red_timer = None;

        self.round.reset(&self.config);
        self.signal = SignalController::new(&self.config);
        self.local.position = SPAWN_POSITION;
        self.local.status = PlayerStatus::Alive;

        tracing::info!(player_id = %self.local.id, "Round restarted");
        events.push(RoundEvent::PhaseChanged(Phase::Preparing));
        events.push(RoundEvent::Announcement(Announcement::Restarting));
        events.push(RoundEvent::LocalPlayerReset(SPAWN_POSITION));
        self.schedule_preparing(self.config.restart_delay_ms);
        events
    }

    /// Apply one movement sample. Call once per input sample, not per frame.
    pub fn request_move(&mut self, dx: f32, dz: f32) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        if !self.round.phase.is_playing()
            || self.local.slot_number.is_none()
            || self.local.status == PlayerStatus::Eliminated
            || !(dx.is_finite() && dz.is_finite())
        {
            return events;
        }

        let previous = self.local.position;
        let requested = previous.moved_by(dx, dz);

        if requested.has_crossed_finish() {
            self.local.position = requested;
            events.push(RoundEvent::LocalPlayerMoved(requested));
            self.enter(Phase::Ended(RoundOutcome::Victory), &mut events);
            return events;
        }

        if let Some(violation) = detector::detect(
            &self.local.id,
            previous,
            requested,
            self.signal.state(),
            self.round.play_tick,
        ) {
            self.apply_violation(violation, &mut events);
            return events;
        }

        if requested != previous {
            self.local.position = requested;
            events.push(RoundEvent::LocalPlayerMoved(requested));
        }
        events
    }

    /// Movement sample from held keys and camera heading.
    pub fn request_move_intent(&mut self, intent: MoveIntent, heading: f32) -> Vec<RoundEvent> {
        if intent.is_idle() {
            return Vec::new();
        }
        let (dx, dz) = intent.delta(heading, &self.config);
        self.request_move(dx, dz)
    }

    /// Move virtual time forward, firing every timer that comes due.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<RoundEvent> {
        let until = self.scheduler.now_ms() + elapsed_ms;
        let mut events = Vec::new();
        while let Some((handle, timer)) = self.scheduler.pop_due(until) {
            self.fire(handle, timer, &mut events);
        }
        self.scheduler.settle(until);
        events
    }

    fn fire(&mut self, handle: TimerHandle, timer: RoundTimer, events: &mut Vec<RoundEvent>) {
        match timer {
            RoundTimer::Announce(line) => {
                if self.round.phase == Phase::Preparing {
                    events.push(RoundEvent::Announcement(line));
                }
            },
            RoundTimer::BeginCountdown => {
                if self.round.phase == Phase::Preparing {
                    self.enter(Phase::Countdown, events);
                }
            },
            RoundTimer::CountdownStep => {
                if self.round.phase != Phase::Countdown {
                    self.scheduler.cancel(handle);
                    return;
                }
                self.round.countdown_remaining = self.round.countdown_remaining.saturating_sub(1);
                if self.round.countdown_remaining == 0 {
                    self.enter(Phase::Playing, events);
                } else {
                    events.push(RoundEvent::CountdownTick(self.round.countdown_remaining));
                }
            },
            RoundTimer::PlaySecond => {
                if !self.round.phase.is_playing() {
                    self.scheduler.cancel(handle);
                    return;
                }
                self.play_second(events);
            },
            RoundTimer::RedLightEnds => {
                self.red_timer = None;
                if !self.round.phase.is_playing() {
                    tracing::trace!(phase = ?self.round.phase, "Suppressed red light end");
                    return;
                }
                if self.signal.turn_green() {
                    self.round.signal = self.signal.state();
                    events.push(RoundEvent::SignalChanged(Signal::Green));
                }
            },
            RoundTimer::EliminationDone => {
                if let Phase::Eliminating(reason) = self.round.phase {
                    self.enter(Phase::Ended(reason.into()), events);
                }
            },
        }
    }

    fn play_second(&mut self, events: &mut Vec<RoundEvent>) {
        self.round.play_tick += 1;
        self.round.time_remaining_secs = self.round.time_remaining_secs.saturating_sub(1);
        events.push(RoundEvent::TimeRemaining(self.round.time_remaining_secs));

        if self.round.time_remaining_secs == 0 {
            self.enter(Phase::Eliminating(EliminationReason::Timeout), events);
            return;
        }

        if let Some(red_ms) = self.signal.roll(&mut self.rng) {
            self.round.signal = self.signal.state();
            tracing::debug!(red_ms, tick = self.round.play_tick, "Red light");
            events.push(RoundEvent::SignalChanged(Signal::Red));
            self.red_timer = Some(self.scheduler.after(red_ms, RoundTimer::RedLightEnds));
        }
    }

    fn apply_violation(&mut self, violation: Violation, events: &mut Vec<RoundEvent>) {
        tracing::info!(
            player_id = %violation.player_id,
            tick = violation.detected_at_tick,
            "Movement during red light"
        );
        self.enter(Phase::Eliminating(EliminationReason::Caught), events);
    }

    fn schedule_preparing(&mut self, lead_in_ms: u64) {
        for (offset, line) in PREPARING_SCRIPT {
            if offset < self.config.preparing_ms {
                self.scheduler
                    .after(lead_in_ms.saturating_add(offset), RoundTimer::Announce(line));
            }
        }
        self.scheduler.after(
            lead_in_ms.saturating_add(self.config.preparing_ms),
            RoundTimer::BeginCountdown,
        );
    }

    fn enter(&mut self, next: Phase, events: &mut Vec<RoundEvent>) {
        if !self.round.phase.can_transition_to(next) {
            tracing::warn!(from = ?self.round.phase, to = ?next, "Rejected phase transition");
            return;
        }
        tracing::debug!(from = ?self.round.phase, to = ?next, "Phase transition");
        self.round.phase = next;
        events.push(RoundEvent::PhaseChanged(next));

        match next {
            Phase::Loading => {},
            Phase::Preparing => self.schedule_preparing(0),
            Phase::Countdown => {
                self.round.countdown_remaining = self.config.countdown_steps;
                events.push(RoundEvent::CountdownTick(self.round.countdown_remaining));
                self.countdown_timer = Some(self.scheduler.every_second(RoundTimer::CountdownStep));
            },
            Phase::Playing => {
                if let Some(handle) = self.countdown_timer.take() {
                    self.scheduler.cancel(handle);
                }
                self.signal.turn_green();
                self.round.signal = self.signal.state();
                events.push(RoundEvent::SignalChanged(Signal::Green));
                events.push(RoundEvent::Announcement(Announcement::Go));
                self.play_timer = Some(self.scheduler.every_second(RoundTimer::PlaySecond));
            },
            Phase::Eliminating(reason) => {
                self.stop_play_timer();
                self.local.status = PlayerStatus::Eliminated;
                events.push(RoundEvent::PlayerEliminated(reason));
                self.scheduler
                    .after(self.config.elimination_delay_ms, RoundTimer::EliminationDone);
            },
            Phase::Ended(outcome) => {
                self.stop_play_timer();
                events.push(RoundEvent::Announcement(Announcement::for_outcome(outcome)));
                if outcome == RoundOutcome::Victory {
                    let stats = VictoryStats {
                        time_used_secs: self.round.time_used_secs(&self.config),
                        survivors: self.remote_alive + 1,
                    };
                    tracing::info!(
                        time_used_secs = stats.time_used_secs,
                        survivors = stats.survivors,
                        "Crossed the finish line"
                    );
                    events.push(RoundEvent::Victory(stats));
                }
            },
        }
    }

    fn stop_play_timer(&mut self) {
        if let Some(handle) = self.play_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// Place the local player directly, bypassing movement rules.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn place_local_player(&mut self, position: Position) {
        self.local.position = position.clamped();
    }
}
