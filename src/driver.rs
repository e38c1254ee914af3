//! Tokio host for a game
//!
//! [`spawn`] moves a [`Game`] into its own task. Commands from the view arrive
//! over a channel and countdown alarms are kept in a local queue; the task
//! handles one of them at a time, so a tick can never interleave with a click.

use std::time::Duration;

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, info};

use crate::{
    AlarmMessage, SyncMessage,
    game::{self, Game, QuizOptions},
    supply::QuestionSupply,
    tunnel::Tunnel,
};

const COMMAND_BUFFER: usize = 32;

/// Errors returned through a [`GameHandle`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The game task is no longer running
    #[error("the game has shut down")]
    Closed,
    /// The game rejected the command
    #[error(transparent)]
    Game(#[from] game::Error),
}

enum Command {
    Start {
        options: QuizOptions,
        reply: oneshot::Sender<Result<(), game::Error>>,
    },
    SelectAnswer {
        index: usize,
        reply: oneshot::Sender<Result<(), game::Error>>,
    },
    Advance {
        reply: oneshot::Sender<Result<(), game::Error>>,
    },
    Restart {
        reply: oneshot::Sender<()>,
    },
    State {
        reply: oneshot::Sender<SyncMessage>,
    },
    Shutdown,
}

/// Cloneable handle for sending commands to a spawned game
#[derive(Debug, Clone)]
pub struct GameHandle {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Start { .. } => "Start",
            Self::SelectAnswer { .. } => "SelectAnswer",
            Self::Advance { .. } => "Advance",
            Self::Restart { .. } => "Restart",
            Self::State { .. } => "State",
            Self::Shutdown => "Shutdown",
        })
    }
}

impl GameHandle {
    /// Supplies questions and starts playing
    ///
    /// # Errors
    ///
    /// See [`Game::start`]; [`Error::Closed`] once the task has stopped.
    pub async fn start(&self, options: QuizOptions) -> Result<(), Error> {
        self.request(|reply| Command::Start { options, reply })
            .await?
            .map_err(Error::from)
    }

    /// Provisionally selects an option
    ///
    /// # Errors
    ///
    /// See [`Game::select_answer`]; [`Error::Closed`] once the task has stopped.
    pub async fn select_answer(&self, index: usize) -> Result<(), Error> {
        self.request(|reply| Command::SelectAnswer { index, reply })
            .await?
            .map_err(Error::from)
    }

    /// Finalizes the current question
    ///
    /// # Errors
    ///
    /// See [`Game::advance`]; [`Error::Closed`] once the task has stopped.
    pub async fn advance(&self) -> Result<(), Error> {
        self.request(|reply| Command::Advance { reply })
            .await?
            .map_err(Error::from)
    }

    /// Discards the session and returns to setup
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once the task has stopped.
    pub async fn restart(&self) -> Result<(), Error> {
        self.request(|reply| Command::Restart { reply }).await
    }

    /// The full current state
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once the task has stopped.
    pub async fn state(&self) -> Result<SyncMessage, Error> {
        self.request(|reply| Command::State { reply }).await
    }

    /// Stops the game task, which closes the tunnel
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the task had already stopped.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::Closed)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::Closed)?;
        response.await.map_err(|_| Error::Closed)
    }
}

/// Runs a new game in its own task
///
/// The task ends, closing the tunnel, after [`GameHandle::shutdown`] or once
/// every handle is dropped.
pub fn spawn<Q, T>(supply: Q, tunnel: T) -> (GameHandle, JoinHandle<()>)
where
    Q: QuestionSupply + Send + Sync + 'static,
    T: Tunnel + Send + Sync + 'static,
{
    let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run(Game::new(), supply, tunnel, receiver));
    (GameHandle { commands }, task)
}

#[derive(Debug, Default)]
struct Alarms {
    pending: Vec<(Instant, AlarmMessage)>,
}

impl Alarms {
    /// Deadlines count from the moment each alarm is scheduled
    fn scheduler(&mut self) -> impl FnMut(AlarmMessage, Duration) + '_ {
        move |alarm, delay| self.pending.push((Instant::now() + delay, alarm))
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|(deadline, _)| *deadline).min()
    }

    fn take_due(&mut self, now: Instant) -> Vec<AlarmMessage> {
        let (mut due, pending): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|(deadline, _)| *deadline <= now);
        self.pending = pending;
        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, alarm)| alarm).collect()
    }

    fn retain_live(&mut self, game: &Game) {
        self.pending.retain(|(_, alarm)| game.is_alarm_live(alarm));
    }
}

async fn run<Q, T>(mut game: Game, supply: Q, tunnel: T, mut commands: mpsc::Receiver<Command>)
where
    Q: QuestionSupply,
    T: Tunnel,
{
    let mut alarms = Alarms::default();
    tunnel.send_state(&game.state_message());

    loop {
        let deadline = alarms.next_deadline();

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                debug!(?command, "game command received");
                if !handle(&mut game, &supply, &tunnel, &mut alarms, command).await {
                    break;
                }
            }
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                for alarm in alarms.take_due(Instant::now()) {
                    game.receive_alarm(alarm, &tunnel, alarms.scheduler());
                }
            }
        }

        alarms.retain_live(&game);
    }

    info!(session = %game.session().id(), "game task stopped");
    tunnel.close();
}

/// Applies one command; returns whether the task should keep running
async fn handle<Q: QuestionSupply, T: Tunnel>(
    game: &mut Game,
    supply: &Q,
    tunnel: &T,
    alarms: &mut Alarms,
    command: Command,
) -> bool {
    // a dropped reply only means the caller stopped waiting
    match command {
        Command::Start { options, reply } => {
            let result = game
                .start(supply, &options, tunnel, alarms.scheduler())
                .await;
            let _ = reply.send(result);
        }
        Command::SelectAnswer { index, reply } => {
            let _ = reply.send(game.select_answer(index, tunnel));
        }
        Command::Advance { reply } => {
            let _ = reply.send(game.advance(tunnel, alarms.scheduler()));
        }
        Command::Restart { reply } => {
            game.restart(tunnel);
            let _ = reply.send(());
        }
        Command::State { reply } => {
            let _ = reply.send(game.state_message());
        }
        Command::Shutdown => return false,
    }
    true
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
    };

    use tokio::time::sleep;

    use super::*;
    use crate::{UpdateMessage, countdown, game::SyncMessage as GameState, supply::StaticBank};

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        messages: Arc<Mutex<VecDeque<UpdateMessage>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTunnel {
        fn timeouts(&self) -> usize {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|message| {
                    matches!(
                        message,
                        UpdateMessage::Countdown(countdown::UpdateMessage::TimedOut { .. })
                    )
                })
                .count()
        }
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.messages.lock().unwrap().push_back(message.clone());
        }

        fn send_state(&self, _state: &SyncMessage) {}

        fn close(self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct SlowSupply {
        delay: Duration,
        bank: StaticBank,
    }

    impl QuestionSupply for SlowSupply {
        async fn supply(
            &self,
            request: &crate::supply::SupplyRequest,
        ) -> Result<Vec<crate::question::Question>, crate::supply::GenerationFailure> {
            sleep(self.delay).await;
            self.bank.supply(request).await
        }
    }

    fn remaining_seconds(state: &SyncMessage) -> Option<u64> {
        match state {
            SyncMessage::Game(GameState::Playing { question, .. }) => {
                Some(question.remaining_seconds)
            }
            _ => None,
        }
    }

    fn current_index(state: &SyncMessage) -> Option<usize> {
        match state {
            SyncMessage::Game(GameState::Playing { question, .. }) => Some(question.index),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_questions_time_out_on_their_own() {
        let tunnel = MockTunnel::default();
        let (handle, task) = spawn(StaticBank::general_knowledge(), tunnel.clone());

        handle
            .start(QuizOptions::new("general knowledge", 2, 4))
            .await
            .unwrap();
        assert_eq!(current_index(&handle.state().await.unwrap()), Some(0));

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(current_index(&handle.state().await.unwrap()), Some(1));
        assert_eq!(tunnel.timeouts(), 1);

        sleep(Duration::from_secs(2)).await;
        match handle.state().await.unwrap() {
            SyncMessage::Game(GameState::Completed(result)) => {
                assert_eq!(result.score, 0);
                assert!(result.review.iter().all(|entry| entry.answer.is_none()));
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(tunnel.timeouts(), 2);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(tunnel.closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_supply_does_not_eat_into_the_first_question() {
        let supply = SlowSupply {
            delay: Duration::from_secs(5),
            bank: StaticBank::general_knowledge(),
        };
        let (handle, _task) = spawn(supply, MockTunnel::default());

        handle
            .start(QuizOptions::new("general knowledge", 2, 20))
            .await
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(remaining_seconds(&handle.state().await.unwrap()), Some(10));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(remaining_seconds(&handle.state().await.unwrap()), Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_holds_the_clock() {
        let tunnel = MockTunnel::default();
        let (handle, _task) = spawn(StaticBank::general_knowledge(), tunnel.clone());

        handle
            .start(QuizOptions::new("general knowledge", 2, 4))
            .await
            .unwrap();
        handle.select_answer(2).await.unwrap();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(current_index(&handle.state().await.unwrap()), Some(0));
        assert_eq!(tunnel.timeouts(), 0);

        handle.advance().await.unwrap();
        sleep(Duration::from_millis(2500)).await;
        match handle.state().await.unwrap() {
            SyncMessage::Game(GameState::Completed(result)) => {
                // "What is the capital of France?" -> Paris
                assert_eq!(result.score, 1);
                assert_eq!(result.total, 2);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_pending_ticks() {
        let tunnel = MockTunnel::default();
        let (handle, _task) = spawn(StaticBank::general_knowledge(), tunnel.clone());

        handle
            .start(QuizOptions::new("general knowledge", 2, 4))
            .await
            .unwrap();
        sleep(Duration::from_millis(500)).await;
        handle.restart().await.unwrap();

        sleep(Duration::from_secs(10)).await;
        assert!(matches!(
            handle.state().await.unwrap(),
            SyncMessage::Game(GameState::Setup { error: None })
        ));
        assert_eq!(tunnel.timeouts(), 0);
    }

    #[tokio::test]
    async fn test_errors_come_back_through_the_handle() {
        let (handle, _task) = spawn(StaticBank::general_knowledge(), MockTunnel::default());

        assert!(matches!(
            handle.advance().await,
            Err(Error::Game(game::Error::Session(_)))
        ));
        assert!(matches!(
            handle.start(QuizOptions::new("general knowledge", 15, 300)).await,
            Err(Error::Game(game::Error::Generation(_)))
        ));
        assert!(matches!(
            handle.state().await.unwrap(),
            SyncMessage::Game(GameState::Setup { error: Some(_) })
        ));
    }

    #[tokio::test]
    async fn test_dropping_every_handle_stops_the_task() {
        let tunnel = MockTunnel::default();
        let (handle, task) = spawn(StaticBank::general_knowledge(), tunnel.clone());
        drop(handle);
        task.await.unwrap();
        assert!(tunnel.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_closed_handle() {
        let (handle, task) = spawn(StaticBank::general_knowledge(), MockTunnel::default());
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.state().await.unwrap_err(), Error::Closed);
    }
}
