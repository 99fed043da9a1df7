//! Async driver around the [`Controller`].
//!
//! The runtime owns the controller and is the only thing that touches it.
//! It reloads the stored timers, then waits on two things at once: the next
//! scheduler deadline and user commands arriving through a
//! [`RuntimeHandle`]. Commands are handled one at a time, so operations never
//! interleave.
//!
//! ```ignore
//! let controller = Controller::new(store, TokioClock::new(), &config.timers);
//! let (runtime, handle) = Runtime::new(controller, presenter, notifier);
//! tokio::spawn(async move { handle.add_timer(5, 40).await });
//! runtime.run().await?;
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::controller::Controller;
use crate::error::{Result, TimerError};
use crate::events::{Event, Notifier, Presenter};
use crate::model::{Level, RegistryEntry};
use crate::storage::TimerStore;

/// Pending commands beyond this make senders wait.
const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    AddTimer {
        level: Level,
        minutes: u32,
        reply: Reply<Result<Vec<Event>>>,
    },
    DismissEarly {
        level: Level,
        reply: Reply<Result<Vec<Event>>>,
    },
    BeginDismiss {
        level: Level,
        reply: Reply<Result<Vec<Event>>>,
    },
    CancelDismiss {
        level: Level,
        reply: Reply<Result<Vec<Event>>>,
    },
    Snapshot {
        reply: Reply<Vec<RegistryEntry>>,
    },
    Shutdown,
}

enum Wake {
    Command(Option<Command>),
    Deadline,
}

pub struct Runtime<S, C> {
    controller: Controller<S, C>,
    presenter: Box<dyn Presenter>,
    notifier: Box<dyn Notifier>,
    commands: mpsc::Receiver<Command>,
}

/// Cloneable sender side of a [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
}

impl<S: TimerStore, C: Clock> Runtime<S, C> {
    pub fn new(
        controller: Controller<S, C>,
        presenter: impl Presenter + 'static,
        notifier: impl Notifier + 'static,
    ) -> (Self, RuntimeHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let runtime = Self {
            controller,
            presenter: Box::new(presenter),
            notifier: Box::new(notifier),
            commands: rx,
        };
        (runtime, RuntimeHandle { commands: tx })
    }

    /// Reload stored timers, then serve commands and deadlines until
    /// shutdown or until every handle is dropped.
    ///
    /// # Errors
    /// Fails only if the startup reload fails.
    pub async fn run(mut self) -> Result<Controller<S, C>> {
        let events = self.controller.reload_on_startup().await?;
        self.dispatch(&events);

        loop {
            let sleep_for = self.controller.next_deadline().map(|at| {
                let wait = (at - self.controller.now_ms()).max(0);
                Duration::from_millis(wait as u64)
            });

            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                _ = tokio::time::sleep(sleep_for.unwrap_or_default()), if sleep_for.is_some() => {
                    Wake::Deadline
                }
            };

            match wake {
                Wake::Deadline => {
                    let events = self.controller.tick().await;
                    self.dispatch(&events);
                }
                Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle(command).await,
            }
        }

        info!("timer runtime stopped");
        Ok(self.controller)
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::AddTimer {
                level,
                minutes,
                reply,
            } => {
                let result = self.controller.add_timer(level, minutes).await;
                self.reply(result, reply);
            }
            Command::DismissEarly { level, reply } => {
                let result = self.controller.dismiss_early(level).await;
                self.reply(result, reply);
            }
            Command::BeginDismiss { level, reply } => {
                let result = self.controller.begin_dismiss(level);
                self.reply(result, reply);
            }
            Command::CancelDismiss { level, reply } => {
                let result = self.controller.cancel_dismiss(level);
                self.reply(result, reply);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.registry().entries().to_vec());
            }
            Command::Shutdown => {}
        }
    }

    fn reply(&mut self, result: Result<Vec<Event>>, reply: Reply<Result<Vec<Event>>>) {
        match &result {
            Ok(events) => self.dispatch(events),
            Err(e) => debug!("command rejected: {e}"),
        }
        // The caller may have given up waiting.
        let _ = reply.send(result);
    }

    fn dispatch(&mut self, events: &[Event]) {
        for event in events {
            if let Event::Notification {
                level,
                minutes_remaining,
            } = *event
            {
                self.notifier.notify(level, minutes_remaining);
            }
            self.presenter.present(event);
        }
    }
}

impl RuntimeHandle {
    /// # Errors
    /// Whatever [`Controller::add_timer`] reports, or `RuntimeStopped`.
    pub async fn add_timer(&self, level: Level, minutes: u32) -> Result<Vec<Event>> {
        self.request(|reply| Command::AddTimer {
            level,
            minutes,
            reply,
        })
        .await?
    }

    /// # Errors
    /// Whatever [`Controller::dismiss_early`] reports, or `RuntimeStopped`.
    pub async fn dismiss_early(&self, level: Level) -> Result<Vec<Event>> {
        self.request(|reply| Command::DismissEarly { level, reply })
            .await?
    }

    /// # Errors
    /// `NotFound` for an unknown level, or `RuntimeStopped`.
    pub async fn begin_dismiss(&self, level: Level) -> Result<Vec<Event>> {
        self.request(|reply| Command::BeginDismiss { level, reply })
            .await?
    }

    /// # Errors
    /// `NotFound` for an unknown level, or `RuntimeStopped`.
    pub async fn cancel_dismiss(&self, level: Level) -> Result<Vec<Event>> {
        self.request(|reply| Command::CancelDismiss { level, reply })
            .await?
    }

    /// Current registry contents, ascending by expiry.
    ///
    /// # Errors
    /// `RuntimeStopped` if the loop has exited.
    pub async fn snapshot(&self) -> Result<Vec<RegistryEntry>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the loop to stop after the commands already queued.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| TimerError::RuntimeStopped)?;
        response.await.map_err(|_| TimerError::RuntimeStopped)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::clock::TokioClock;
    use crate::events::RemovalReason;
    use crate::model::TimerRecord;
    use crate::storage::{MemoryStore, TimersConfig};

    type Log = Rc<RefCell<Vec<Event>>>;

    fn runtime_with(
        store: MemoryStore,
    ) -> (
        Runtime<MemoryStore, TokioClock>,
        RuntimeHandle,
        Log,
        Rc<RefCell<Vec<(Level, u32)>>>,
    ) {
        let controller = Controller::new(store, TokioClock::starting_at(0), &TimersConfig::default());
        let events: Log = Rc::default();
        let notices = Rc::new(RefCell::new(Vec::new()));

        let presented = Rc::clone(&events);
        let notified = Rc::clone(&notices);
        let (runtime, handle) = Runtime::new(
            controller,
            move |event: &Event| presented.borrow_mut().push(event.clone()),
            move |level: Level, minutes: u32| notified.borrow_mut().push((level, minutes)),
        );
        (runtime, handle, events, notices)
    }

    #[tokio::test(start_paused = true)]
    async fn timer_runs_through_imminent_to_expiry() {
        let (runtime, handle, events, notices) = runtime_with(MemoryStore::new());

        let driver = async {
            let added = handle.add_timer(5, 3).await.unwrap();
            assert_eq!(added, vec![Event::Inserted { level: 5, index: 0 }]);

            tokio::time::sleep(Duration::from_secs(61)).await;
            assert_eq!(notices.borrow().as_slice(), &[(5, 2)]);

            tokio::time::sleep(Duration::from_secs(120)).await;
            assert!(handle.snapshot().await.unwrap().is_empty());
            handle.shutdown().await;
        };

        let (controller, ()) = tokio::join!(runtime.run(), driver);
        let controller = controller.unwrap();
        assert!(controller.store().snapshot().is_empty());

        assert_eq!(
            events.borrow().as_slice(),
            &[
                Event::Inserted { level: 5, index: 0 },
                Event::MarkedImminent { level: 5 },
                Event::Notification {
                    level: 5,
                    minutes_remaining: 2
                },
                Event::Removed {
                    level: 5,
                    reason: RemovalReason::Expired
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dismissal_cancels_pending_expiry() {
        let (runtime, handle, events, notices) = runtime_with(MemoryStore::new());

        let driver = async {
            handle.add_timer(9, 10).await.unwrap();
            handle.begin_dismiss(9).await.unwrap();
            let removed = handle.dismiss_early(9).await.unwrap();
            assert_eq!(
                removed,
                vec![Event::Removed {
                    level: 9,
                    reason: RemovalReason::Dismissed
                }]
            );

            tokio::time::sleep(Duration::from_secs(15 * 60)).await;
            handle.shutdown().await;
        };

        let (result, ()) = tokio::join!(runtime.run(), driver);
        result.unwrap();

        let removals = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Removed { .. }))
            .count();
        assert_eq!(removals, 1);
        assert!(notices.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn startup_reload_happens_before_commands() {
        let store = MemoryStore::with_records([TimerRecord::new(4, 30 * 60_000)]);
        let (runtime, handle, events, _) = runtime_with(store);

        let driver = async {
            let err = handle.add_timer(4, 5).await.unwrap_err();
            assert!(matches!(err, TimerError::DuplicateKey { level: 4 }));
            let snapshot = handle.snapshot().await.unwrap();
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot[0].level(), 4);
            drop(handle);
        };

        let (result, ()) = tokio::join!(runtime.run(), driver);
        result.unwrap();
        assert_eq!(
            events.borrow().first(),
            Some(&Event::Inserted { level: 4, index: 0 })
        );
    }

    #[tokio::test]
    async fn stopped_runtime_rejects_requests() {
        let (runtime, handle, _, _) = runtime_with(MemoryStore::new());
        drop(runtime);
        assert!(matches!(
            handle.add_timer(5, 5).await,
            Err(TimerError::RuntimeStopped)
        ));
    }
}
