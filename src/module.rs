//! Module state machine and worker.
//!
//! Lifecycle events and receiver notifications are merged into one
//! bounded inbound queue, consumed by a single worker ([Module::run]).
use log::{debug, error, info, warn};

use tokio::sync::mpsc::{self, Receiver, Sender, WeakSender, error::TrySendError};

use crate::{
    Error,
    controller::Controller,
    device::{AtCommands, Gnss},
    dispatcher::Dispatcher,
    event::{AppDataKind, LifecycleEvent, Message, OutputEvent},
    publisher::{self, Publisher},
    runtime::Clock,
    settings::Settings,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Initialized,
    Running,
    /// Terminal state
    ShuttingDown,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting down"),
        }
    }
}

/// Lifecycle events submission handle
#[derive(Debug, Clone)]
pub struct LifecycleBus {
    tx: Sender<Message>,
}

impl LifecycleBus {
    /// Submits a [LifecycleEvent], waiting for room in the inbound queue.
    pub async fn submit(&self, event: LifecycleEvent) -> Result<(), Error> {
        self.tx
            .send(Message::Lifecycle(event))
            .await
            .map_err(|_| Error::Closed)
    }

    /// Submits a [LifecycleEvent] without waiting.
    pub fn try_submit(&self, event: LifecycleEvent) -> Result<(), Error> {
        match self.tx.try_send(Message::Lifecycle(event)) {
            Ok(_) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::NoMessageSpace),
            Err(TrySendError::Closed(_)) => Err(Error::Closed),
        }
    }
}

pub struct Module<D: Gnss> {
    /// Current [State]
    state: State,

    controller: Controller<D>,

    dispatcher: Dispatcher,

    /// Hardware toggles channel
    at: Box<dyn AtCommands>,

    /// Commands issued on [LifecycleEvent::AppStarted]
    toggles: &'static [&'static str],

    publisher: Publisher,

    /// Inbound queue
    rx: Receiver<Message>,

    /// Inbound queue handle given to the receiver handler
    weak_tx: WeakSender<Message>,
}

impl<D: Gnss> Module<D> {
    /// Builds a new [Module], returns it with its [LifecycleBus]
    /// and the output bus consumer.
    pub fn new(
        settings: Settings,
        driver: D,
        at: Box<dyn AtCommands>,
        clock: Box<dyn Clock>,
    ) -> Result<(Self, LifecycleBus, Receiver<OutputEvent>), Error> {
        settings.validate()?;

        let (publisher, output) = publisher::channel(settings.queue_capacity);
        let (tx, rx) = mpsc::channel(settings.inbound_capacity);

        let controller = Controller::new(driver, &settings, publisher.clone());
        let dispatcher = Dispatcher::new(clock, publisher.clone(), settings.format);

        let module = Self {
            state: State::Uninitialized,
            controller,
            dispatcher,
            at,
            toggles: settings.board.toggles(),
            publisher,
            rx,
            weak_tx: tx.downgrade(),
        };

        Ok((module, LifecycleBus { tx }, output))
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn controller(&self) -> &Controller<D> {
        &self.controller
    }

    fn transition(&mut self, state: State) {
        info!("{} -> {}", self.state, state);
        self.state = state;
    }

    /// Issues the hardware toggles, then registers the receiver handler.
    fn start(&mut self) -> Result<(), Error> {
        for command in self.toggles {
            self.at
                .write(command)
                .map_err(|source| Error::Toggle {
                    command: command.to_string(),
                    source,
                })?;

            debug!("{} - OK", command);
        }

        let handler = Dispatcher::handler(self.weak_tx.clone(), self.publisher.clone());
        self.dispatcher.register(&mut self.controller, handler)
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.controller.stop_session() {
            warn!("failed to stop receiver: {}", e);
        }

        self.dispatcher.release(&mut self.controller);
        self.publisher.publish(OutputEvent::ShutdownReady);
        self.transition(State::ShuttingDown);
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) -> Result<(), Error> {
        match (self.state, event) {
            (State::Uninitialized, LifecycleEvent::AppStarted) => {
                self.start()?;
                self.transition(State::Initialized);
            },
            (State::Initialized, LifecycleEvent::ModemInitialized) => {
                self.transition(State::Running);
            },
            (State::Running, LifecycleEvent::DataRequested(kinds))
                if kinds.contains(&AppDataKind::Gnss) =>
            {
                self.dispatcher.session_started();
                // failures are published by the controller, a new request retries
                let _ = self.controller.start_session();
            },
            (state, LifecycleEvent::ShutdownRequested) if state != State::ShuttingDown => {
                self.shutdown();
            },
            (state, event) => {
                debug!("{:?} ignored in {} state", event, state);
            },
        }

        Ok(())
    }

    /// Processes one inbound [Message]. Errors are fatal.
    pub fn handle(&mut self, message: Message) -> Result<(), Error> {
        match message {
            Message::Lifecycle(event) => self.on_lifecycle(event),
            Message::Receiver(event) => {
                if self.state == State::Running {
                    self.dispatcher.dispatch(event, &mut self.controller);
                } else {
                    debug!("{:?} ignored in {} state", event, self.state);
                }
                Ok(())
            },
        }
    }

    /// Processes all queued messages without waiting,
    /// returns the number of messages processed.
    pub fn consume_pending(&mut self) -> Result<usize, Error> {
        let mut processed = 0;

        while self.state != State::ShuttingDown {
            let Ok(message) = self.rx.try_recv() else {
                break;
            };

            self.handle(message)?;
            processed += 1;
        }

        Ok(processed)
    }

    /// Worker: consumes the inbound queue until shutdown.
    pub async fn run(mut self) -> Result<(), Error> {
        while let Some(message) = self.rx.recv().await {
            if let Err(e) = self.handle(message) {
                error!("fatal error: {}", e);
                return Err(e);
            }

            if self.state == State::ShuttingDown {
                break;
            }
        }

        let dropped = self.publisher.dropped();
        if dropped > 0 {
            warn!("{} events dropped", dropped);
        }

        debug!("worker exited");
        Ok(())
    }
}
